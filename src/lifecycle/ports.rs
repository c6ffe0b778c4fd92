//! Collaborators the lifecycle depends on.
//!
//! Business entities, certificates and document persistence live outside
//! this crate; [`super::MemoryStore`] implements all of them in memory.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::document::TaxDocument;
use crate::core::{Client, DocumentType, IdentificationType, IssuingCompany, Product, Sequence};
use crate::signing::CertificateBundle;
use crate::sri::SriResponse;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Another document already holds this access key.
    #[error("access key {0} is already in use")]
    DuplicateAccessKey(String),

    /// Another document of the company already holds this sequence.
    #[error("sequence {sequence} already assigned for company {company_id} ({document_type:?})")]
    DuplicateSequence {
        company_id: String,
        document_type: DocumentType,
        sequence: Sequence,
    },

    #[error("document {0} not found")]
    DocumentNotFound(Uuid),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Uniqueness conflicts are resolved by allocating again.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::DuplicateAccessKey(_) | Self::DuplicateSequence { .. }
        )
    }
}

/// Durable storage of tax documents.
///
/// `create` must enforce uniqueness of the access key and of the sequence
/// per (company, document type).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Highest sequence assigned to the company for this document type.
    async fn max_sequence(
        &self,
        company_id: &str,
        document_type: DocumentType,
    ) -> Result<Option<Sequence>, StoreError>;

    async fn create(&self, document: &TaxDocument) -> Result<(), StoreError>;

    async fn update(&self, document: &TaxDocument) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<TaxDocument>, StoreError>;
}

/// Read-only lookup of business entities. A missing entity is `Ok(None)`.
#[async_trait]
pub trait EntityLookup: Send + Sync {
    async fn issuing_company_by_ruc(&self, ruc: &str)
    -> Result<Option<IssuingCompany>, StoreError>;

    async fn client_by_identification(
        &self,
        identification: &str,
    ) -> Result<Option<Client>, StoreError>;

    async fn product_by_code(&self, code: &str) -> Result<Option<Product>, StoreError>;

    async fn identification_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<IdentificationType>, StoreError>;
}

/// Certificate material per issuer. `Ok(None)` when none is configured.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    async fn certificate_for(
        &self,
        company: &IssuingCompany,
    ) -> Result<Option<CertificateBundle>, StoreError>;
}

/// Downstream consumer of accepted documents (PDF rendering, e-mail).
///
/// Invoked by the caller through [`super::SubmissionOutcome::notify`], never
/// by the lifecycle itself.
#[async_trait]
pub trait AcceptanceHook: Send + Sync {
    async fn on_accepted(&self, document: &TaxDocument, response: &SriResponse);
}
