//! Helpers for the document renderer, the CSV exporter and the dashboard stats

use crate::batch::ProcessingResult;
use crate::record::{FieldValue, Record};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

static UNSAFE_FILENAME_CHARS: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9.-]").unwrap());

static NON_NUMERIC_CHARS: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"[^0-9.]").unwrap());

static LEADING_NUMBER: std::sync::LazyLock<Regex> =
    std::sync::LazyLock::new(|| Regex::new(r"^[0-9]*(?:\.[0-9]*)?").unwrap());

const DOCUMENT_EXTENSION: &str = ".pdf";

/// Keys tried, in order, when looking for an amount to export
const AMOUNT_KEYS: [&str; 3] = ["amount", "total_amount", "total"];

const CSV_HEADER: [&str; 6] = ["Date", "Subject", "Sender", "Service", "Amount", "Status"];

/// Build the document filename for a record.
///
/// Each `{name}` placeholder is replaced (first occurrence) by the record's
/// value for `name`, with every character outside `[a-zA-Z0-9.-]` turned
/// into `_`. If nothing was substituted, a timestamped name is used instead.
#[must_use]
pub fn output_filename(template: &str, record: &Record, now: DateTime<Utc>) -> String {
    let mut filename = template.to_string();
    let mut substituted = false;

    for (name, value) in record.iter() {
        let placeholder = format!("{{{name}}}");
        if filename.contains(&placeholder) {
            let safe = UNSAFE_FILENAME_CHARS.replace_all(&value.to_string(), "_").into_owned();
            filename = filename.replacen(&placeholder, &safe, 1);
            substituted = true;
        }
    }

    if !substituted {
        let timestamp = now
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace([':', '.'], "-");
        return format!("receipt_{timestamp}{DOCUMENT_EXTENSION}");
    }

    if !filename.ends_with(DOCUMENT_EXTENSION) {
        filename.push_str(DOCUMENT_EXTENSION);
    }
    filename
}

/// Human label for a field name: `total_amount` becomes `Total Amount`
#[must_use]
pub fn display_label(field_name: &str) -> String {
    let mut label = String::with_capacity(field_name.len());
    let mut word_start = true;
    for c in field_name.chars() {
        if c == '_' {
            label.push(' ');
            word_start = true;
        } else if word_start {
            label.extend(c.to_uppercase());
            word_start = !c.is_alphanumeric();
        } else {
            label.push(c);
            word_start = !c.is_alphanumeric();
        }
    }
    label
}

/// Service name guessed from a subject line
#[must_use]
pub fn service_from_subject(subject: &str) -> &'static str {
    let lower = subject.to_lowercase();
    if lower.contains("uber eats") {
        "Uber Eats"
    } else if lower.contains("uber") {
        "Uber"
    } else if lower.contains("instacart") {
        "Instacart"
    } else {
        "Unknown"
    }
}

/// Amount-shaped value of a record, or `N/A`
#[must_use]
pub fn record_amount(record: &Record) -> String {
    AMOUNT_KEYS
        .iter()
        .filter_map(|key| record.get(key))
        .find(|value| match value {
            FieldValue::Text(s) => !s.is_empty(),
            FieldValue::Rows(_) => true,
        })
        .map_or_else(|| "N/A".to_string(), ToString::to_string)
}

/// Render results as CSV, one row per result, every cell quoted
#[must_use]
pub fn export_csv(results: &[ProcessingResult]) -> String {
    let mut lines = vec![csv_line(CSV_HEADER.map(String::from))];

    for result in results {
        lines.push(csv_line([
            result.processed_at.format("%Y-%m-%d").to_string(),
            non_empty_or_unknown(&result.subject),
            non_empty_or_unknown(&result.sender),
            service_from_subject(&result.subject).to_string(),
            record_amount(&result.extracted_data),
            result.status.as_str().to_string(),
        ]));
    }

    lines.join("\n")
}

fn non_empty_or_unknown(value: &str) -> String {
    if value.is_empty() {
        "Unknown".to_string()
    } else {
        value.to_string()
    }
}

fn csv_line<const N: usize>(cells: [String; N]) -> String {
    cells
        .iter()
        .map(|cell| format!("\"{}\"", cell.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(",")
}

/// Totals over a set of processing results
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub total_processed: usize,
    /// Sum of every amount that parses as a number
    pub total_amount: f64,
    pub uber_trips: usize,
    pub uber_eats_orders: usize,
}

/// Aggregate results for the dashboard.
///
/// The amount of a result is its first non-empty `amount` or `total_amount`
/// value with everything but digits and dots removed; values that do not
/// start with a number are skipped. Subjects mentioning `Uber` without
/// `Eats` count as trips, subjects mentioning `Uber Eats` as orders.
#[must_use]
pub fn processing_stats(results: &[ProcessingResult]) -> ProcessingStats {
    let mut stats = ProcessingStats {
        total_processed: results.len(),
        ..ProcessingStats::default()
    };

    for result in results {
        if let Some(amount) = numeric_amount(&result.extracted_data) {
            stats.total_amount += amount;
        }

        if result.subject.contains("Uber") && !result.subject.contains("Eats") {
            stats.uber_trips += 1;
        } else if result.subject.contains("Uber Eats") {
            stats.uber_eats_orders += 1;
        }
    }

    stats
}

fn numeric_amount(record: &Record) -> Option<f64> {
    let value = ["amount", "total_amount"]
        .iter()
        .filter_map(|key| record.get(key))
        .find(|value| value.as_text().is_none_or(|s| !s.is_empty()))?;

    let digits = NON_NUMERIC_CHARS.replace_all(&value.to_string(), "").into_owned();
    LEADING_NUMBER
        .find(&digits)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
