use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::document::TaxDocument;
use super::ports::{CertificateStore, DocumentStore, EntityLookup, StoreError};
use crate::core::{Client, DocumentType, IdentificationType, IssuingCompany, Product, Sequence};
use crate::signing::CertificateBundle;

/// In-memory documents, business entities and certificates.
///
/// Enforces the same uniqueness rules a database would: one access key per
/// document and one sequence per (company, document type).
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<Uuid, TaxDocument>>,
    companies: RwLock<HashMap<String, IssuingCompany>>,
    clients: RwLock<HashMap<String, Client>>,
    products: RwLock<HashMap<String, Product>>,
    identification_types: RwLock<HashMap<String, IdentificationType>>,
    certificates: RwLock<HashMap<String, CertificateBundle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_company(&self, company: IssuingCompany) {
        self.companies.write().insert(company.ruc.clone(), company);
    }

    pub fn add_client(&self, client: Client) {
        self.clients
            .write()
            .insert(client.identification.clone(), client);
    }

    pub fn add_product(&self, product: Product) {
        self.products.write().insert(product.code.clone(), product);
    }

    pub fn add_identification_type(&self, code: impl Into<String>, description: impl Into<String>) {
        let code = code.into();
        self.identification_types.write().insert(
            code.clone(),
            IdentificationType {
                code,
                description: description.into(),
            },
        );
    }

    /// Configure certificate material for a company id.
    pub fn set_certificate(&self, company_id: impl Into<String>, bundle: CertificateBundle) {
        self.certificates.write().insert(company_id.into(), bundle);
    }

    /// All stored documents ordered by company, type and sequence.
    pub fn documents(&self) -> Vec<TaxDocument> {
        let mut docs: Vec<_> = self.documents.read().values().cloned().collect();
        docs.sort_by(|a, b| {
            (&a.company_id, a.document_type.code(), a.sequence)
                .cmp(&(&b.company_id, b.document_type.code(), b.sequence))
        });
        docs
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn max_sequence(
        &self,
        company_id: &str,
        document_type: DocumentType,
    ) -> Result<Option<Sequence>, StoreError> {
        Ok(self
            .documents
            .read()
            .values()
            .filter(|d| d.company_id == company_id && d.document_type == document_type)
            .map(|d| d.sequence)
            .max())
    }

    async fn create(&self, document: &TaxDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.write();
        if documents.contains_key(&document.id) {
            return Err(StoreError::Backend(format!(
                "document {} already exists",
                document.id
            )));
        }
        for existing in documents.values() {
            if existing.access_key == document.access_key {
                return Err(StoreError::DuplicateAccessKey(
                    document.access_key.to_string(),
                ));
            }
            if existing.company_id == document.company_id
                && existing.document_type == document.document_type
                && existing.sequence == document.sequence
            {
                return Err(StoreError::DuplicateSequence {
                    company_id: document.company_id.clone(),
                    document_type: document.document_type,
                    sequence: document.sequence,
                });
            }
        }
        debug!(id = %document.id, access_key = %document.access_key, "document created");
        documents.insert(document.id, document.clone());
        Ok(())
    }

    async fn update(&self, document: &TaxDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.write();
        let slot = documents
            .get_mut(&document.id)
            .ok_or(StoreError::DocumentNotFound(document.id))?;
        if slot.access_key != document.access_key || slot.sequence != document.sequence {
            return Err(StoreError::Backend(format!(
                "access key and sequence of document {} are immutable",
                document.id
            )));
        }
        *slot = document.clone();
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TaxDocument>, StoreError> {
        Ok(self.documents.read().get(&id).cloned())
    }
}

#[async_trait]
impl EntityLookup for MemoryStore {
    async fn issuing_company_by_ruc(
        &self,
        ruc: &str,
    ) -> Result<Option<IssuingCompany>, StoreError> {
        Ok(self.companies.read().get(ruc).cloned())
    }

    async fn client_by_identification(
        &self,
        identification: &str,
    ) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.read().get(identification).cloned())
    }

    async fn product_by_code(&self, code: &str) -> Result<Option<Product>, StoreError> {
        Ok(self.products.read().get(code).cloned())
    }

    async fn identification_type_by_code(
        &self,
        code: &str,
    ) -> Result<Option<IdentificationType>, StoreError> {
        Ok(self.identification_types.read().get(code).cloned())
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn certificate_for(
        &self,
        company: &IssuingCompany,
    ) -> Result<Option<CertificateBundle>, StoreError> {
        Ok(self.certificates.read().get(&company.id).cloned())
    }
}

/// Certificates read from PEM files on disk, keyed by company id.
#[derive(Debug, Default)]
pub struct PathCertificateStore {
    paths: RwLock<HashMap<String, (PathBuf, Option<String>)>>,
}

impl PathCertificateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &self,
        company_id: impl Into<String>,
        path: impl Into<PathBuf>,
        passphrase: Option<String>,
    ) {
        self.paths
            .write()
            .insert(company_id.into(), (path.into(), passphrase));
    }
}

#[async_trait]
impl CertificateStore for PathCertificateStore {
    async fn certificate_for(
        &self,
        company: &IssuingCompany,
    ) -> Result<Option<CertificateBundle>, StoreError> {
        let Some((path, passphrase)) = self.paths.read().get(&company.id).cloned() else {
            return Ok(None);
        };
        let exists = tokio::fs::try_exists(&path)
            .await
            .map_err(|e| StoreError::Backend(format!("{}: {e}", path.display())))?;
        if !exists {
            return Err(StoreError::Backend(format!(
                "certificate file {} does not exist",
                path.display()
            )));
        }
        CertificateBundle::from_path(&path, passphrase)
            .await
            .map(Some)
            .map_err(|e| StoreError::Backend(e.to_string()))
    }
}
