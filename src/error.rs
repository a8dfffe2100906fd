//! Error types for rule loading and field extraction

use thiserror::Error;

/// Errors that prevent a rule from being loaded at all
#[derive(Error, Debug)]
pub enum RuleError {
    /// Rule document is not valid JSON or has the wrong shape
    #[error("Failed to parse rule JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Field descriptor names a source other than `header` or `html`
    #[error("Unknown source '{source_kind}' for field {field}")]
    UnknownSource { field: String, source_kind: String },

    /// HTML field descriptor names a process other than `extract_text` or `extract_items`
    #[error("Unknown process '{process}' for field {field}")]
    UnknownProcess { field: String, process: String },

    /// Field descriptor lacks an attribute its kind requires
    #[error("Field {field} is missing required attribute '{attribute}'")]
    MissingAttribute { field: String, attribute: &'static str },
}

/// Selector problems found while compiling a rule.
///
/// These are kept on the descriptor instead of failing the whole rule, so a
/// single bad selector only costs the field that owns it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// CSS selector did not compile
    #[error("Invalid selector '{selector}': {reason}")]
    Invalid { selector: String, reason: String },

    /// `:contains(...)` clause could not be split into its parts
    #[error("Malformed :contains clause in '{selector}': {reason}")]
    MalformedContains { selector: String, reason: String },
}

/// Errors raised while resolving a single field against an email
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Field's selector was rejected when the rule was loaded
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Errors turning raw message bytes into a [`Message`](crate::Message)
#[derive(Error, Debug)]
pub enum MessageError {
    /// Failed to parse the MIME structure
    #[error("Failed to parse message structure: {0}")]
    Structure(String),
}

/// Result type for rule loading
pub type Result<T> = std::result::Result<T, RuleError>;
