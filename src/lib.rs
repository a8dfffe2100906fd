// Enforce at crate level
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Rule-driven Email Extraction
//!
//! Turns semi-structured HTML emails (receipts, invoices, order
//! confirmations) into flat, ordered records using user-authored rules.
//!
//! A [`Rule`] lists field descriptors. Each descriptor reads a header, the
//! text of a CSS-selected element, or a list of rows with sub-fields. The
//! engine resolves them in order against one [`Message`] and produces a
//! [`Record`]. Anything it cannot find becomes `"Unknown"`; a broken
//! descriptor only costs its own field.
//!
//! # Example
//!
//! ```rust
//! use email_rule_engine::{Message, Rule, assemble, is_valid};
//!
//! let rule = Rule::from_json(r#"{
//!     "name": "Receipt",
//!     "pattern": "Your receipt",
//!     "fields": [
//!         {"name": "amount", "source": "html", "selector": ".total-amount", "process": "extract_text"},
//!         {"name": "date", "source": "header", "key": "Date"}
//!     ],
//!     "outputTemplate": "receipt_{amount}",
//!     "requiredFields": ["amount"]
//! }"#).unwrap();
//!
//! let message: Message = serde_json::from_str(r#"{
//!     "id": "m1",
//!     "payload": {
//!         "mimeType": "text/html",
//!         "headers": [{"name": "Subject", "value": "Your receipt"}],
//!         "body": {"data": "PGRpdiBjbGFzcz0idG90YWwtYW1vdW50Ij4kMTIuMzQ8L2Rpdj4="}
//!     }
//! }"#).unwrap();
//!
//! let record = assemble(&rule, &message);
//! assert_eq!(record.text("amount"), Some("$12.34"));
//! assert_eq!(record.text("date"), Some("Unknown"));
//! assert!(is_valid(&record, &rule.required_fields));
//! ```

mod batch;
mod engine;
mod error;
mod extractor;
mod message;
mod output;
mod postprocess;
mod record;
mod rule;
mod selector;

pub use batch::{
    BatchReport, EmailOutcome, JobProgress, JobStatus, ProcessingResult, ResultStatus,
    process_batch, process_email,
};
pub use engine::{assemble, assemble_document, is_valid};
pub use error::{ExtractError, MessageError, Result, RuleError, SelectorError};
pub use extractor::{Extraction, extract};
pub use message::{Header, HeaderMap, Message, MessagePart, PartBody};
pub use output::{
    ProcessingStats, display_label, export_csv, output_filename, processing_stats, record_amount,
    service_from_subject,
};
pub use postprocess::{PostProcess, post_process};
pub use record::{FieldValue, Record, UNKNOWN};
pub use rule::{
    Field, HeaderField, ItemsField, Rule, RuleSet, RuleWarning, SpecialValue, Subfield, TextField,
};
pub use selector::{FieldSelector, SelectorQuery};

/// Re-exported so callers can parse documents for [`assemble_document`]
pub use scraper::Html;
