//! Extracted records

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sentinel for any value the engine could not resolve
pub const UNKNOWN: &str = "Unknown";

/// Value stored under one record key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Scalar text, possibly the [`UNKNOWN`] sentinel
    Text(String),

    /// Rows of a list field, each aligned to the field's subfield order
    Rows(Vec<Vec<String>>),
}

impl FieldValue {
    #[must_use]
    pub fn unknown() -> Self {
        Self::Text(UNKNOWN.to_string())
    }

    /// Whether this is exactly the [`UNKNOWN`] sentinel.
    ///
    /// Row lists never are, even when empty.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Text(s) if s == UNKNOWN)
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Rows(_) => None,
        }
    }

    #[must_use]
    pub fn as_rows(&self) -> Option<&[Vec<String>]> {
        match self {
            Self::Text(_) => None,
            Self::Rows(rows) => Some(rows),
        }
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Vec<Vec<String>>> for FieldValue {
    fn from(rows: Vec<Vec<String>>) -> Self {
        Self::Rows(rows)
    }
}

impl fmt::Display for FieldValue {
    /// Rows are flattened to comma-separated cells
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "{s}"),
            Self::Rows(rows) => {
                let cells: Vec<&str> = rows.iter().flatten().map(String::as_str).collect();
                write!(f, "{}", cells.join(","))
            }
        }
    }
}

/// Field name to value mapping that keeps insertion order.
///
/// Re-inserting an existing key replaces its value in place, so keys keep
/// the position where they first appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    entries: Vec<(String, FieldValue)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((name, value)),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Scalar value for a key, if the key holds text
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True iff every required name is present and not [`UNKNOWN`].
    ///
    /// A list-valued field satisfies the check once its key exists, even
    /// when it holds no rows.
    #[must_use]
    pub fn satisfies<S: AsRef<str>>(&self, required: &[S]) -> bool {
        self.missing(required).is_empty()
    }

    /// Required names that are absent or [`UNKNOWN`], in the given order
    #[must_use]
    pub fn missing<'r, S: AsRef<str>>(&self, required: &'r [S]) -> Vec<&'r str> {
        required
            .iter()
            .map(|name| name.as_ref())
            .filter(|name| self.get(name).is_none_or(FieldValue::is_unknown))
            .collect()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = Record;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of field names to strings or row lists")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
        let mut record = Record::new();
        while let Some((k, v)) = access.next_entry::<String, FieldValue>()? {
            record.insert(k, v);
        }
        Ok(record)
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RecordVisitor)
    }
}
