//! Record assembly and required-field validation

use crate::extractor::{Extraction, extract};
use crate::message::{HeaderMap, Message};
use crate::record::{FieldValue, Record};
use crate::rule::Rule;
use scraper::Html;
use tracing::{debug, warn};

/// Apply a rule to an email and build its record.
///
/// Never fails: a field that cannot be resolved, or whose descriptor is
/// broken, is stored as `"Unknown"` and the remaining fields still run.
#[must_use]
pub fn assemble(rule: &Rule, message: &Message) -> Record {
    let headers = message.headers();
    let document = Html::parse_document(&message.html_body());
    assemble_document(rule, &document, &headers)
}

/// [`assemble`] for an already parsed document and header map
#[must_use]
pub fn assemble_document(rule: &Rule, document: &Html, headers: &HeaderMap) -> Record {
    let mut record = Record::new();

    for field in &rule.fields {
        match extract(field, document, headers) {
            Ok(Extraction::Scalar(value)) => record.insert(field.name(), value),
            Ok(Extraction::Items {
                rows,
                special_values,
            }) => {
                record.insert(field.name(), rows);
                for (name, value) in special_values {
                    record.insert(name, value);
                }
            }
            Err(e) => {
                warn!("Failed to extract field {} for rule {}: {e}", field.name(), rule.name);
                record.insert(field.name(), FieldValue::unknown());
            }
        }
    }

    debug!("Assembled {} keys with rule {}", record.len(), rule.name);
    record
}

/// Whether every required field is present and not `"Unknown"`.
///
/// An empty requirement list always passes, and a list-valued field passes
/// as soon as its key exists.
#[must_use]
pub fn is_valid<S: AsRef<str>>(record: &Record, required_fields: &[S]) -> bool {
    record.satisfies(required_fields)
}
