use thiserror::Error;

/// Errors raised by the pure document-building steps.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ComprobanteError {
    /// Input that must be purely numeric (or fixed-width) was not.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required nested block of the document is missing or malformed.
    #[error("invalid document data: {0}")]
    InvalidDocumentData(String),

    /// An issue date could not be parsed.
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Sequence value out of range or malformed.
    #[error("sequence error: {0}")]
    Sequence(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "lines.0.taxes").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Join a list of validation errors into one message, `; `-separated.
pub fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
