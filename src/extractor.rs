//! Resolution of a single field descriptor against one email

use crate::error::ExtractError;
use crate::message::HeaderMap;
use crate::postprocess::post_process;
use crate::record::UNKNOWN;
use crate::rule::{Field, HeaderField, ItemsField, TextField};
use crate::selector::element_text;
use scraper::{ElementRef, Html};

/// Outcome of resolving one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Header or `extract_text` value, or [`UNKNOWN`]
    Scalar(String),

    /// `extract_items` rows plus values lifted out of matching rows
    Items {
        rows: Vec<Vec<String>>,
        special_values: Vec<(String, String)>,
    },
}

/// Resolve one field against a parsed HTML document and the email's headers.
///
/// Misses are not errors: they come back as [`UNKNOWN`] or as dropped rows.
/// An error means the descriptor itself is broken, e.g. a selector that
/// did not compile.
pub fn extract(
    field: &Field,
    document: &Html,
    headers: &HeaderMap,
) -> Result<Extraction, ExtractError> {
    match field {
        Field::Header(f) => Ok(Extraction::Scalar(extract_header(f, headers))),
        Field::Text(f) => extract_text(f, document).map(Extraction::Scalar),
        Field::Items(f) => extract_items(f, document),
    }
}

fn extract_header(field: &HeaderField, headers: &HeaderMap) -> String {
    headers.get(&field.key).map_or_else(
        || UNKNOWN.to_string(),
        |value| post_process(value, field.post_process.as_ref()),
    )
}

fn extract_text(field: &TextField, document: &Html) -> Result<String, ExtractError> {
    let query = field.selector.query()?;
    Ok(query.first_match(&document).map_or_else(
        || UNKNOWN.to_string(),
        |el| post_process(&element_text(el), field.post_process.as_ref()),
    ))
}

/// Subfield values of one candidate row, in declaration order
struct Row(Vec<(String, String)>);

impl Row {
    /// Value of a subfield, [`UNKNOWN`] when undeclared
    fn get(&self, name: &str) -> &str {
        self.0
            .iter()
            .rfind(|(n, _)| n == name)
            .map_or(UNKNOWN, |(_, v)| v.as_str())
    }

    fn resolves_all(&self, names: &[String]) -> bool {
        names.iter().all(|name| self.get(name) != UNKNOWN)
    }

    /// Cells in `order`, or one cell per distinct subfield name in
    /// declaration order, holding the same value [`Row::get`] returns
    fn to_tuple(&self, order: Option<&[String]>) -> Vec<String> {
        match order {
            Some(names) => names.iter().map(|n| self.get(n).to_string()).collect(),
            None => {
                let mut names: Vec<&str> = Vec::with_capacity(self.0.len());
                for (name, _) in &self.0 {
                    if !names.contains(&name.as_str()) {
                        names.push(name);
                    }
                }
                names.into_iter().map(|n| self.get(n).to_string()).collect()
            }
        }
    }
}

fn resolve_row(field: &ItemsField, element: ElementRef<'_>) -> Result<Row, ExtractError> {
    let mut values = Vec::with_capacity(field.subfields.len());
    for sub in &field.subfields {
        let value = sub
            .selector
            .query()?
            .first_match(&element)
            .map_or_else(|| UNKNOWN.to_string(), element_text);
        values.push((sub.name.clone(), value));
    }
    Ok(Row(values))
}

fn extract_items(field: &ItemsField, document: &Html) -> Result<Extraction, ExtractError> {
    let candidates = field.selector.query()?.all_matches(&document);
    let rows = candidates
        .into_iter()
        .map(|el| resolve_row(field, el))
        .collect::<Result<Vec<_>, _>>()?;

    let order = field.subfield_order.as_deref();
    let kept: Vec<Vec<String>> = rows
        .iter()
        .filter(|row| order.is_none_or(|names| row.resolves_all(names)))
        .map(|row| row.to_tuple(order))
        .collect();

    // Lifting looks at every candidate row, kept or not
    let mut special_values: Vec<(String, String)> = Vec::new();
    for special in &field.special_values {
        for row in &rows {
            if row.get(&special.subfield) != special.value {
                continue;
            }
            let raw = row.get(&special.extract_subfield);
            let value = if raw == UNKNOWN {
                raw.to_string()
            } else {
                post_process(raw, special.post_process.as_ref())
            };
            match special_values.iter_mut().find(|(n, _)| *n == special.name) {
                Some((_, existing)) => *existing = value,
                None => special_values.push((special.name.clone(), value)),
            }
        }
    }

    Ok(Extraction::Items {
        rows: kept,
        special_values,
    })
}
