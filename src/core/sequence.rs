use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;

/// Fixed width of a document sequence (secuencial).
pub const SEQUENCE_WIDTH: usize = 9;

const SEQUENCE_MAX: u32 = 999_999_999;

/// Document sequence number, rendered as a 9-digit zero-padded string.
///
/// Sequences are scoped to one issuing company and document type. Because all
/// values share the same width, lexicographic and numeric ordering agree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sequence(u32);

impl Sequence {
    /// The first sequence of a company: `000000001`.
    pub const FIRST: Sequence = Sequence(1);

    pub fn new(value: u32) -> Result<Self, ComprobanteError> {
        if value == 0 || value > SEQUENCE_MAX {
            return Err(ComprobanteError::Sequence(format!(
                "sequence {value} out of range 1..={SEQUENCE_MAX}"
            )));
        }
        Ok(Self(value))
    }

    /// Parse a 9-digit sequence string.
    pub fn parse(s: &str) -> Result<Self, ComprobanteError> {
        if s.len() != SEQUENCE_WIDTH || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ComprobanteError::Sequence(format!(
                "sequence must be {SEQUENCE_WIDTH} digits, got '{s}'"
            )));
        }
        let value = s
            .parse::<u32>()
            .map_err(|e| ComprobanteError::Sequence(e.to_string()))?;
        Self::new(value)
    }

    /// The sequence following this one.
    pub fn next(self) -> Result<Self, ComprobanteError> {
        Self::new(self.0 + 1)
    }

    /// Next value after the last assigned one, or `000000001` if none.
    pub fn after(last: Option<Sequence>) -> Result<Self, ComprobanteError> {
        match last {
            Some(seq) => seq.next(),
            None => Ok(Self::FIRST),
        }
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0>width$}", self.0, width = SEQUENCE_WIDTH)
    }
}

impl TryFrom<String> for Sequence {
    type Error = ComprobanteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Sequence> for String {
    fn from(seq: Sequence) -> Self {
        seq.to_string()
    }
}
