use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::error::ComprobanteError;
use super::sequence::Sequence;
use super::types::{DocumentType, EmissionType, Environment};

/// Length of a complete access key including the check digit.
pub const ACCESS_KEY_LEN: usize = 49;

const MODULO_11_COEFFICIENTS: [u32; 6] = [2, 3, 4, 5, 6, 7];

/// Modulo-11 check digit over a digit string.
///
/// Digits are weighted right to left with the repeating cycle `2..=7`.
/// A raw result of 11 maps to 0 and 10 maps to 1.
pub fn check_digit(digits: &str) -> Result<u8, ComprobanteError> {
    let mut sum = 0u32;
    for (i, c) in digits.chars().rev().enumerate() {
        let d = c.to_digit(10).ok_or_else(|| {
            ComprobanteError::InvalidInput(format!("'{c}' is not a digit in '{digits}'"))
        })?;
        sum = (sum + d * MODULO_11_COEFFICIENTS[i % MODULO_11_COEFFICIENTS.len()]) % 11;
    }
    let digit = match 11 - sum {
        11 => 0,
        10 => 1,
        n => n,
    };
    Ok(digit as u8)
}

/// A validated 49-digit access key (clave de acceso).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessKey(String);

impl AccessKey {
    /// Parse an existing key, checking length, digits and the trailing check digit.
    pub fn parse(key: &str) -> Result<Self, ComprobanteError> {
        if key.len() != ACCESS_KEY_LEN {
            return Err(ComprobanteError::InvalidInput(format!(
                "access key must have {ACCESS_KEY_LEN} digits, got {}",
                key.len()
            )));
        }
        if !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ComprobanteError::InvalidInput(format!(
                "access key must be numeric, got '{key}'"
            )));
        }
        let (base, last) = key.split_at(ACCESS_KEY_LEN - 1);
        let expected = check_digit(base)?;
        let actual = last
            .chars()
            .next()
            .and_then(|c| c.to_digit(10))
            .ok_or_else(|| ComprobanteError::InvalidInput("check digit is not numeric".into()))?;
        if actual as u8 != expected {
            return Err(ComprobanteError::InvalidInput(format!(
                "check digit mismatch: expected {expected}, found {actual}"
            )));
        }
        Ok(Self(key.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing check digit.
    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[ACCESS_KEY_LEN - 1] - b'0'
    }

    /// The 8-digit random segment.
    pub fn numeric_code(&self) -> &str {
        &self.0[39..47]
    }
}

impl fmt::Display for AccessKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AccessKey {
    type Error = ComprobanteError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AccessKey> for String {
    fn from(key: AccessKey) -> Self {
        key.0
    }
}

/// Assembles an access key from issuance metadata.
///
/// Field order: `DDMMYYYY docType ruc env series sequence numericCode emissionType`
/// followed by the check digit.
#[derive(Debug, Clone)]
pub struct AccessKeyBuilder {
    issue_date: NaiveDate,
    document_type: DocumentType,
    ruc: String,
    environment: Environment,
    series: String,
    sequence: Sequence,
    numeric_code: String,
    emission_type: EmissionType,
}

impl AccessKeyBuilder {
    pub fn new(issue_date: NaiveDate, document_type: DocumentType, ruc: impl Into<String>) -> Self {
        Self {
            issue_date,
            document_type,
            ruc: ruc.into(),
            environment: Environment::Test,
            series: String::new(),
            sequence: Sequence::FIRST,
            numeric_code: String::new(),
            emission_type: EmissionType::Normal,
        }
    }

    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Establishment code + emission point, 6 digits (e.g. "001001").
    pub fn series(mut self, series: impl Into<String>) -> Self {
        self.series = series.into();
        self
    }

    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = sequence;
        self
    }

    /// The caller-supplied 8-digit code.
    pub fn numeric_code(mut self, code: impl Into<String>) -> Self {
        self.numeric_code = code.into();
        self
    }

    pub fn emission_type(mut self, emission_type: EmissionType) -> Self {
        self.emission_type = emission_type;
        self
    }

    pub fn build(self) -> Result<AccessKey, ComprobanteError> {
        require_digits("ruc", &self.ruc, 13)?;
        require_digits("series", &self.series, 6)?;
        require_digits("numeric_code", &self.numeric_code, 8)?;

        let base = format!(
            "{}{}{}{}{}{}{}{}",
            self.issue_date.format("%d%m%Y"),
            self.document_type.code(),
            self.ruc,
            self.environment.code(),
            self.series,
            self.sequence,
            self.numeric_code,
            self.emission_type.code(),
        );
        debug_assert_eq!(base.len(), ACCESS_KEY_LEN - 1);

        let digit = check_digit(&base)?;
        Ok(AccessKey(format!("{base}{digit}")))
    }
}

fn require_digits(field: &str, value: &str, len: usize) -> Result<(), ComprobanteError> {
    if value.len() != len || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ComprobanteError::InvalidInput(format!(
            "{field} must be exactly {len} digits, got '{value}'"
        )));
    }
    Ok(())
}
