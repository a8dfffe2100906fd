//! Extraction rules and their field descriptors
//!
//! Rules arrive as JSON from the rule store. They are decoded once into
//! typed descriptors: the `source`/`process` pair picks a [`Field`] variant,
//! selectors are compiled, and post-process directives are parsed. A rule
//! that cannot be interpreted at all is rejected with [`RuleError`]; a bad
//! selector is only recorded on the descriptor that owns it.

use crate::error::{Result, RuleError};
use crate::postprocess::PostProcess;
use crate::selector::FieldSelector;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A named extraction recipe
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Store identifier, if the rule came from a store
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display label
    pub name: String,

    /// Substring matched against subject or sender
    pub pattern: String,

    /// Field descriptors in declaration order
    pub fields: Vec<Field>,

    /// Output filename template with `{field}` placeholders
    #[serde(default)]
    pub output_template: String,

    /// Fields that must resolve for the record to count as a success
    #[serde(default, deserialize_with = "null_as_empty")]
    pub required_fields: Vec<String>,

    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Rule {
    /// Decode a single rule from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Whether this rule applies to an email with the given subject and sender
    #[must_use]
    pub fn matches(&self, subject: &str, sender: &str) -> bool {
        self.is_active && (subject.contains(&self.pattern) || sender.contains(&self.pattern))
    }

    /// Look up a descriptor by name
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == name)
    }

    /// Report authoring problems that extraction would otherwise absorb
    /// silently. Warnings come out in field declaration order.
    #[must_use]
    pub fn lint(&self) -> Vec<RuleWarning> {
        let mut warnings = Vec::new();
        let mut lifted: Vec<(&str, &str)> = Vec::new();

        for field in &self.fields {
            lint_field(field, &mut warnings);

            let Field::Items(items) = field else { continue };
            for special in &items.special_values {
                if self.field(&special.name).is_some() {
                    warnings.push(RuleWarning::SpecialValueShadowsField {
                        field: items.name.clone(),
                        name: special.name.clone(),
                    });
                }
                if let Some((_, first)) = lifted
                    .iter()
                    .find(|(name, owner)| *name == special.name && *owner != items.name)
                {
                    warnings.push(RuleWarning::DuplicateSpecialValue {
                        name: special.name.clone(),
                        first_field: (*first).to_string(),
                        second_field: items.name.clone(),
                    });
                }
                lifted.push((special.name.as_str(), items.name.as_str()));
            }
        }

        for required in &self.required_fields {
            let produced = self.field(required).is_some()
                || lifted.iter().any(|(name, _)| *name == required.as_str());
            if !produced {
                warnings.push(RuleWarning::UnreachableRequiredField {
                    name: required.clone(),
                });
            }
        }

        warnings
    }
}

fn lint_field(field: &Field, warnings: &mut Vec<RuleWarning>) {
    let name = field.name();
    let mut check_selector = |selector: &FieldSelector| {
        if let Some(error) = selector.error() {
            warnings.push(RuleWarning::InvalidSelector {
                field: name.to_string(),
                error: error.to_string(),
            });
        }
    };

    match field {
        Field::Header(_) => {}
        Field::Text(text) => check_selector(&text.selector),
        Field::Items(items) => {
            check_selector(&items.selector);
            for sub in &items.subfields {
                check_selector(&sub.selector);
            }
        }
    }

    let directives = field.post_process().into_iter().chain(match field {
        Field::Items(items) => items
            .special_values
            .iter()
            .filter_map(|sv| sv.post_process.as_ref())
            .collect(),
        _ => Vec::new(),
    });
    for directive in directives {
        if !directive.is_recognized() {
            warnings.push(RuleWarning::UnrecognizedDirective {
                field: name.to_string(),
                directive: directive.as_directive().to_string(),
            });
        }
    }

    if let Field::Items(items) = field {
        let referenced = items
            .subfield_order
            .iter()
            .flatten()
            .chain(
                items
                    .special_values
                    .iter()
                    .flat_map(|sv| [&sv.subfield, &sv.extract_subfield]),
            );
        let mut reported: Vec<&str> = Vec::new();
        for subfield in referenced {
            if items.subfield(subfield).is_none() && !reported.contains(&subfield.as_str()) {
                reported.push(subfield);
                warnings.push(RuleWarning::UndeclaredSubfield {
                    field: name.to_string(),
                    subfield: subfield.clone(),
                });
            }
        }
    }
}

/// Field descriptor, one variant per source/process combination
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawField", into = "RawField")]
pub enum Field {
    /// `source = "header"`
    Header(HeaderField),

    /// `source = "html"`, `process = "extract_text"`
    Text(TextField),

    /// `source = "html"`, `process = "extract_items"`
    Items(ItemsField),
}

impl Field {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Header(f) => &f.name,
            Self::Text(f) => &f.name,
            Self::Items(f) => &f.name,
        }
    }

    /// Directive applied to the scalar result, if any
    #[must_use]
    pub const fn post_process(&self) -> Option<&PostProcess> {
        match self {
            Self::Header(f) => f.post_process.as_ref(),
            Self::Text(f) => f.post_process.as_ref(),
            Self::Items(_) => None,
        }
    }
}

/// Value read from a named header
#[derive(Debug, Clone)]
pub struct HeaderField {
    pub name: String,
    pub key: String,
    pub post_process: Option<PostProcess>,
}

/// Text of the first element matching a selector
#[derive(Debug, Clone)]
pub struct TextField {
    pub name: String,
    pub selector: FieldSelector,
    pub post_process: Option<PostProcess>,
}

/// Repeated rows, one per element matching a selector
#[derive(Debug, Clone)]
pub struct ItemsField {
    pub name: String,
    pub selector: FieldSelector,
    pub subfields: Vec<Subfield>,
    /// Tuple order, and the subfields every kept row must resolve
    pub subfield_order: Option<Vec<String>>,
    pub special_values: Vec<SpecialValue>,
}

impl ItemsField {
    #[must_use]
    pub fn subfield(&self, name: &str) -> Option<&Subfield> {
        self.subfields.iter().find(|s| s.name == name)
    }
}

/// Named selector evaluated inside each row element
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subfield {
    pub name: String,
    pub selector: FieldSelector,
}

/// Lifts one subfield of a matching row into the top-level record.
///
/// A row matches when its `subfield` value equals `value`; the row's
/// `extract_subfield` value is then stored under `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecialValue {
    pub subfield: String,
    pub value: String,
    pub extract_subfield: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_process: Option<PostProcess>,
    pub name: String,
}

/// Field descriptor as stored: a flat bag of optional attributes
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawField {
    name: String,
    source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    selector: Option<FieldSelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    post_process: Option<PostProcess>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subfields: Option<Vec<Subfield>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subfield_order: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    special_values: Option<Vec<SpecialValue>>,
}

const EXTRACT_TEXT: &str = "extract_text";
const EXTRACT_ITEMS: &str = "extract_items";

impl TryFrom<RawField> for Field {
    type Error = RuleError;

    fn try_from(raw: RawField) -> Result<Self> {
        let missing = |attribute| RuleError::MissingAttribute {
            field: raw.name.clone(),
            attribute,
        };

        match raw.source.as_str() {
            "header" => Ok(Self::Header(HeaderField {
                key: raw.key.clone().ok_or_else(|| missing("key"))?,
                name: raw.name,
                post_process: raw.post_process,
            })),
            "html" => {
                let selector = raw.selector.clone().ok_or_else(|| missing("selector"))?;
                let process = raw.process.clone().ok_or_else(|| missing("process"))?;
                match process.as_str() {
                    EXTRACT_TEXT => Ok(Self::Text(TextField {
                        name: raw.name,
                        selector,
                        post_process: raw.post_process,
                    })),
                    EXTRACT_ITEMS => Ok(Self::Items(ItemsField {
                        name: raw.name,
                        selector,
                        subfields: raw.subfields.unwrap_or_default(),
                        subfield_order: raw.subfield_order,
                        special_values: raw.special_values.unwrap_or_default(),
                    })),
                    _ => Err(RuleError::UnknownProcess {
                        field: raw.name,
                        process,
                    }),
                }
            }
            _ => Err(RuleError::UnknownSource {
                field: raw.name,
                source_kind: raw.source,
            }),
        }
    }
}

impl From<Field> for RawField {
    fn from(field: Field) -> Self {
        let blank = |name: String, source: &str| Self {
            name,
            source: source.to_string(),
            key: None,
            selector: None,
            process: None,
            post_process: None,
            subfields: None,
            subfield_order: None,
            special_values: None,
        };

        match field {
            Field::Header(f) => Self {
                key: Some(f.key),
                post_process: f.post_process,
                ..blank(f.name, "header")
            },
            Field::Text(f) => Self {
                selector: Some(f.selector),
                process: Some(EXTRACT_TEXT.to_string()),
                post_process: f.post_process,
                ..blank(f.name, "html")
            },
            Field::Items(f) => Self {
                selector: Some(f.selector),
                process: Some(EXTRACT_ITEMS.to_string()),
                subfields: Some(f.subfields),
                subfield_order: f.subfield_order,
                special_values: (!f.special_values.is_empty()).then_some(f.special_values),
                ..blank(f.name, "html")
            },
        }
    }
}

/// Ordered collection of rules; the first match wins
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    #[must_use]
    pub const fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Decode a JSON array of rules
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Rules shipped with the engine: Uber trip receipts and Uber Eats
    /// orders. Used when no rule store is configured.
    #[must_use]
    pub fn builtin() -> Self {
        let uber = Rule {
            id: Some("uber-receipts".to_string()),
            name: "Uber Receipts".to_string(),
            pattern: "Your Uber receipt".to_string(),
            fields: vec![
                text_field("trip_date", ".trip-date"),
                text_field("amount", ".total-amount"),
                text_field("pickup_location", ".pickup-address"),
                text_field("dropoff_location", ".dropoff-address"),
            ],
            output_template: "uber_{trip_date}_{amount}.pdf".to_string(),
            required_fields: vec!["trip_date".to_string(), "amount".to_string()],
            is_active: true,
        };

        let uber_eats = Rule {
            id: Some("uber-eats".to_string()),
            name: "Uber Eats".to_string(),
            pattern: "Your Uber Eats order".to_string(),
            fields: vec![
                text_field("order_date", ".order-date"),
                text_field("total_amount", ".total"),
                text_field("restaurant", ".restaurant-name"),
                text_field("delivery_address", ".delivery-address"),
            ],
            output_template: "ubereats_{order_date}_{total_amount}.pdf".to_string(),
            required_fields: vec!["order_date".to_string(), "total_amount".to_string()],
            is_active: true,
        };

        Self::new(vec![uber, uber_eats])
    }

    /// First active rule whose pattern occurs in the subject or sender
    #[must_use]
    pub fn find_match(&self, subject: &str, sender: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.matches(subject, sender))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn text_field(name: &str, selector: &str) -> Field {
    Field::Text(TextField {
        name: name.to_string(),
        selector: FieldSelector::parse(selector),
        post_process: None,
    })
}

impl From<Vec<Rule>> for RuleSet {
    fn from(rules: Vec<Rule>) -> Self {
        Self::new(rules)
    }
}

/// Authoring problem reported by [`Rule::lint`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleWarning {
    /// Selector failed to compile; the field will always be `Unknown`
    InvalidSelector { field: String, error: String },

    /// Post-process directive is not understood and will be ignored
    UnrecognizedDirective { field: String, directive: String },

    /// `subfield_order` or a special value names a subfield that is not declared
    UndeclaredSubfield { field: String, subfield: String },

    /// Special value name overwrites a declared field's value
    SpecialValueShadowsField { field: String, name: String },

    /// Two list fields lift a special value under the same name; the later field wins
    DuplicateSpecialValue {
        name: String,
        first_field: String,
        second_field: String,
    },

    /// Required name is neither a field nor a special value
    UnreachableRequiredField { name: String },
}

impl fmt::Display for RuleWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSelector { field, error } => write!(f, "{field}: {error}"),
            Self::UnrecognizedDirective { field, directive } => {
                write!(f, "{field}: unrecognized post_process '{directive}'")
            }
            Self::UndeclaredSubfield { field, subfield } => {
                write!(f, "{field}: subfield '{subfield}' is not declared")
            }
            Self::SpecialValueShadowsField { field, name } => {
                write!(f, "{field}: special value '{name}' overwrites field '{name}'")
            }
            Self::DuplicateSpecialValue {
                name,
                first_field,
                second_field,
            } => write!(
                f,
                "special value '{name}' is lifted by both {first_field} and {second_field}"
            ),
            Self::UnreachableRequiredField { name } => {
                write!(f, "required field '{name}' is never produced")
            }
        }
    }
}
