use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{
    AccessKey, AuthorityMessage, DocumentTotals, DocumentType, Environment, Sequence,
};

/// Lifecycle state of a tax document.
///
/// `Validating → Sequenced → XmlBuilt → (Signed | SignError) → Submitted →
/// (Accepted | Rejected | CommError)`. Documents are persisted from
/// `Sequenced` onwards and never deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    Validating,
    Sequenced,
    XmlBuilt,
    Signed,
    SignError,
    Submitted,
    Accepted,
    Rejected,
    CommError,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "VALIDATING",
            Self::Sequenced => "SEQUENCED",
            Self::XmlBuilt => "XML_BUILT",
            Self::Signed => "SIGNED",
            Self::SignError => "SIGN_ERROR",
            Self::Submitted => "SUBMITTED",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
            Self::CommError => "COMM_ERROR",
        }
    }

    /// Signed XML exists and the authority has not given a final verdict.
    pub fn can_submit(&self) -> bool {
        matches!(self, Self::Signed | Self::Submitted | Self::CommError)
    }

    /// XML is persisted but no signature has been produced yet.
    pub fn can_resume_signing(&self) -> bool {
        matches!(self, Self::XmlBuilt | Self::SignError)
    }

    /// The authority has answered with a verdict.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Accepted | Self::Rejected)
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted invoice or debit note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxDocument {
    pub id: Uuid,
    pub document_type: DocumentType,
    pub company_id: String,
    pub issuer_ruc: String,
    pub client_id: String,
    pub environment: Environment,
    /// Establishment + emission point, e.g. "001001".
    pub series: String,
    pub issue_date: NaiveDate,
    pub access_key: AccessKey,
    pub sequence: Sequence,
    pub totals: DocumentTotals,
    pub status: DocumentStatus,
    pub xml: Option<String>,
    pub signed_xml: Option<String>,
    /// Cause of the last signing failure.
    pub sign_error: Option<String>,
    /// Status code of the last authority reply (`RECIBIDA`, `ERROR_SOAP`, ...).
    pub authority_status: Option<String>,
    pub authority_messages: Vec<AuthorityMessage>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// The request the document was issued from.
    pub request: serde_json::Value,
}

impl TaxDocument {
    /// Printed document number, e.g. "001-001-000000123".
    pub fn number(&self) -> String {
        let (establishment, emission_point) = self.series.split_at(self.series.len().min(3));
        format!("{establishment}-{emission_point}-{}", self.sequence)
    }

    pub(crate) fn transition(&mut self, status: DocumentStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}
