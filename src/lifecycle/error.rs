use std::fmt;

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use super::document::DocumentStatus;
use super::ports::StoreError;
use crate::core::ComprobanteError;

/// Pipeline step a failure belongs to, so callers can resume there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStep {
    Validation,
    Resolution,
    Sequencing,
    XmlBuilding,
    Signing,
    Submission,
}

impl fmt::Display for LifecycleStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Validation => "validation",
            Self::Resolution => "reference resolution",
            Self::Sequencing => "sequencing",
            Self::XmlBuilding => "XML building",
            Self::Signing => "signing",
            Self::Submission => "submission",
        })
    }
}

/// Errors surfaced by [`super::DocumentLifecycle`].
///
/// Signing failures and unreachable authorities are not errors: they are
/// recorded on the document as `SIGN_ERROR` / `COMM_ERROR`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LifecycleError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("issuing company with RUC {0} not found")]
    CompanyNotFound(String),

    #[error("client with identification {0} not found")]
    ClientNotFound(String),

    #[error("product with code {0} not found")]
    ProductNotFound(String),

    #[error("identification type {0} not found")]
    IdentificationTypeNotFound(String),

    #[error("document {0} not found")]
    DocumentNotFound(Uuid),

    #[error("document {id} is {status}, cannot {action}")]
    InvalidState {
        id: Uuid,
        status: DocumentStatus,
        action: &'static str,
    },

    #[error("document {0} was already accepted by the authority")]
    AlreadyAccepted(Uuid),

    #[error("no free sequence after {attempts} conflicting attempts")]
    SequenceConflict { attempts: u32 },

    #[error("{step} failed: {source}")]
    Document {
        step: LifecycleStep,
        #[source]
        source: ComprobanteError,
    },

    #[error("storage failed during {step}: {source}")]
    Store {
        step: LifecycleStep,
        #[source]
        source: StoreError,
    },
}

impl LifecycleError {
    /// The step that failed.
    pub fn step(&self) -> LifecycleStep {
        match self {
            Self::InvalidRequest(_) => LifecycleStep::Validation,
            Self::CompanyNotFound(_)
            | Self::ClientNotFound(_)
            | Self::ProductNotFound(_)
            | Self::IdentificationTypeNotFound(_)
            | Self::DocumentNotFound(_) => LifecycleStep::Resolution,
            Self::InvalidState { action, .. } if *action == "sign" => LifecycleStep::Signing,
            Self::InvalidState { .. } | Self::AlreadyAccepted(_) => LifecycleStep::Submission,
            Self::SequenceConflict { .. } => LifecycleStep::Sequencing,
            Self::Document { step, .. } | Self::Store { step, .. } => *step,
        }
    }

    /// The caller can fix this by changing its input (4xx-equivalent).
    /// Everything else is a failure of this system or its collaborators.
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::InvalidRequest(_)
            | Self::CompanyNotFound(_)
            | Self::ClientNotFound(_)
            | Self::ProductNotFound(_)
            | Self::IdentificationTypeNotFound(_)
            | Self::DocumentNotFound(_)
            | Self::InvalidState { .. }
            | Self::AlreadyAccepted(_) => true,
            Self::Document { source, .. } => matches!(
                source,
                ComprobanteError::InvalidInput(_)
                    | ComprobanteError::InvalidDocumentData(_)
                    | ComprobanteError::InvalidDate(_)
            ),
            Self::SequenceConflict { .. } | Self::Store { .. } => false,
        }
    }
}
