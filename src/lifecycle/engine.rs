use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde::Serialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::allocator::{AllocationPolicy, SequenceAllocator};
use super::document::{DocumentStatus, TaxDocument};
use super::error::{LifecycleError, LifecycleStep};
use super::ports::{AcceptanceHook, CertificateStore, DocumentStore, EntityLookup};
use crate::core::*;
use crate::signing::XmlSigner;
use crate::sri::{SriClient, SriResponse};
use crate::xml::{DocumentContext, XmlResult, to_debit_note_xml, to_invoice_xml};

/// Result of one submission attempt.
#[derive(Debug, Clone)]
pub struct SubmissionOutcome {
    /// The document as persisted after the attempt.
    pub document: TaxDocument,
    pub response: SriResponse,
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        self.document.status == DocumentStatus::Accepted
    }

    /// Hand an accepted document to `hook`. Returns whether the hook ran.
    pub async fn notify(&self, hook: &dyn AcceptanceHook) -> bool {
        if !self.is_accepted() {
            return false;
        }
        hook.on_accepted(&self.document, &self.response).await;
        true
    }
}

/// References a request resolves to.
struct Resolved {
    company: IssuingCompany,
    client: Client,
    issue_date: NaiveDate,
}

/// Drives documents from request to authority verdict.
///
/// Issuing validates the request, reserves a sequence and access key,
/// renders and persists the XML, then signs it when the issuer has a
/// certificate. Submission is a separate call and may be repeated until the
/// authority gives a verdict.
pub struct DocumentLifecycle {
    store: Arc<dyn DocumentStore>,
    entities: Arc<dyn EntityLookup>,
    certificates: Arc<dyn CertificateStore>,
    sri: SriClient,
    allocator: SequenceAllocator,
    document_locks: parking_lot::Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl DocumentLifecycle {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        entities: Arc<dyn EntityLookup>,
        certificates: Arc<dyn CertificateStore>,
        sri: SriClient,
    ) -> Self {
        Self {
            store,
            entities,
            certificates,
            sri,
            allocator: SequenceAllocator::default(),
            document_locks: parking_lot::Mutex::new(HashMap::new()),
        }
    }

    pub fn with_allocation_policy(mut self, policy: AllocationPolicy) -> Self {
        self.allocator = SequenceAllocator::new(policy);
        self
    }

    /// Issue an invoice (codDoc 01).
    #[instrument(skip_all, fields(ruc = %request.issuer_ruc))]
    pub async fn issue_invoice(
        &self,
        request: &InvoiceRequest,
    ) -> Result<TaxDocument, LifecycleError> {
        let errors = validate_invoice_request(request);
        if !errors.is_empty() {
            return Err(LifecycleError::InvalidRequest(join_errors(&errors)));
        }
        let resolved = self
            .resolve(&request.issuer_ruc, &request.issue_date, &request.buyer)
            .await?;

        let mut request = request.clone();
        for line in &mut request.lines {
            let product = self
                .entities
                .product_by_code(&line.main_code)
                .await
                .map_err(resolution_store_error)?
                .ok_or_else(|| LifecycleError::ProductNotFound(line.main_code.clone()))?;
            if line.description.as_deref().is_none_or(|d| d.trim().is_empty()) {
                line.description = Some(product.description);
            }
        }

        let snapshot = snapshot(&request)?;
        let totals = request.totals();
        self.issue(DocumentType::Invoice, resolved, totals, snapshot, |ctx| {
            to_invoice_xml(&request, ctx)
        })
        .await
    }

    /// Issue a debit note (codDoc 05).
    #[instrument(skip_all, fields(ruc = %request.issuer_ruc))]
    pub async fn issue_debit_note(
        &self,
        request: &DebitNoteRequest,
    ) -> Result<TaxDocument, LifecycleError> {
        let errors = validate_debit_note_request(request);
        if !errors.is_empty() {
            return Err(LifecycleError::InvalidRequest(join_errors(&errors)));
        }
        let resolved = self
            .resolve(&request.issuer_ruc, &request.issue_date, &request.buyer)
            .await?;

        let snapshot = snapshot(request)?;
        self.issue(
            DocumentType::DebitNote,
            resolved,
            request.totals(),
            snapshot,
            |ctx| to_debit_note_xml(request, ctx),
        )
        .await
    }

    /// Retry signing a document left in `XML_BUILT` or `SIGN_ERROR`.
    ///
    /// Access key, sequence and XML are reused as persisted.
    #[instrument(skip(self))]
    pub async fn resume_signing(&self, id: Uuid) -> Result<TaxDocument, LifecycleError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut document = self.document(id).await?;
        if !document.status.can_resume_signing() {
            return Err(LifecycleError::InvalidState {
                id,
                status: document.status,
                action: "sign",
            });
        }
        let company = self
            .entities
            .issuing_company_by_ruc(&document.issuer_ruc)
            .await
            .map_err(resolution_store_error)?
            .ok_or_else(|| LifecycleError::CompanyNotFound(document.issuer_ruc.clone()))?;

        self.sign(&mut document, &company).await?;
        Ok(document)
    }

    /// Submit a signed document to the authority.
    ///
    /// Allowed from `SIGNED`, `SUBMITTED` and `COMM_ERROR`; never re-allocates
    /// or re-signs. Unreachable authorities end in `COMM_ERROR`, not an error.
    /// Submissions of one document run one at a time; a caller that waited
    /// behind an accepted submission gets [`LifecycleError::AlreadyAccepted`].
    #[instrument(skip(self))]
    pub async fn submit(&self, id: Uuid) -> Result<SubmissionOutcome, LifecycleError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;
        let mut document = self.document(id).await?;
        if document.status == DocumentStatus::Accepted {
            return Err(LifecycleError::AlreadyAccepted(id));
        }
        let signed_xml = match (&document.signed_xml, document.status.can_submit()) {
            (Some(xml), true) => xml.clone(),
            _ => {
                return Err(LifecycleError::InvalidState {
                    id,
                    status: document.status,
                    action: "submit",
                });
            }
        };

        document.submitted_at = Some(Utc::now());
        document.transition(DocumentStatus::Submitted);
        self.persist(&document, LifecycleStep::Submission).await?;

        let response = self.sri.submit(&signed_xml, document.environment).await;

        document.responded_at = Some(Utc::now());
        document.authority_status = Some(response.status_code().to_string());
        document.authority_messages = response.messages();
        document.transition(match &response {
            SriResponse::Received { .. } => DocumentStatus::Accepted,
            SriResponse::Returned { .. } => DocumentStatus::Rejected,
            SriResponse::SoapFault { .. }
            | SriResponse::ParseError { .. }
            | SriResponse::CommunicationError { .. } => DocumentStatus::CommError,
        });
        self.persist(&document, LifecycleStep::Submission).await?;

        info!(
            access_key = %document.access_key,
            estado = response.status_code(),
            status = %document.status,
            "document submitted"
        );
        Ok(SubmissionOutcome { document, response })
    }

    /// Load a document by id.
    pub async fn document(&self, id: Uuid) -> Result<TaxDocument, LifecycleError> {
        self.store
            .get(id)
            .await
            .map_err(resolution_store_error)?
            .ok_or(LifecycleError::DocumentNotFound(id))
    }

    /// Lock serializing signing and submission of one document.
    fn lock_for(&self, id: Uuid) -> Arc<tokio::sync::Mutex<()>> {
        self.document_locks.lock().entry(id).or_default().clone()
    }

    async fn resolve(
        &self,
        ruc: &str,
        issue_date: &str,
        buyer: &BuyerRef,
    ) -> Result<Resolved, LifecycleError> {
        let issue_date = parse_issue_date(issue_date).map_err(|source| LifecycleError::Document {
            step: LifecycleStep::Validation,
            source,
        })?;
        let company = self
            .entities
            .issuing_company_by_ruc(ruc)
            .await
            .map_err(resolution_store_error)?
            .ok_or_else(|| LifecycleError::CompanyNotFound(ruc.to_string()))?;
        self.entities
            .identification_type_by_code(&buyer.identification_type)
            .await
            .map_err(resolution_store_error)?
            .ok_or_else(|| {
                LifecycleError::IdentificationTypeNotFound(buyer.identification_type.clone())
            })?;
        let client = self
            .entities
            .client_by_identification(&buyer.identification)
            .await
            .map_err(resolution_store_error)?
            .ok_or_else(|| LifecycleError::ClientNotFound(buyer.identification.clone()))?;
        Ok(Resolved {
            company,
            client,
            issue_date,
        })
    }

    async fn issue<R>(
        &self,
        document_type: DocumentType,
        resolved: Resolved,
        totals: DocumentTotals,
        request: serde_json::Value,
        render: R,
    ) -> Result<TaxDocument, LifecycleError>
    where
        R: FnOnce(&DocumentContext<'_>) -> XmlResult,
    {
        let Resolved {
            company,
            client,
            issue_date,
        } = resolved;

        let draft = |sequence: Sequence| -> Result<TaxDocument, ComprobanteError> {
            let access_key = AccessKeyBuilder::new(issue_date, document_type, &company.ruc)
                .environment(company.environment)
                .series(company.series())
                .sequence(sequence)
                .numeric_code(random_numeric_code())
                .emission_type(company.emission_type)
                .build()?;
            let now = Utc::now();
            Ok(TaxDocument {
                id: Uuid::new_v4(),
                document_type,
                company_id: company.id.clone(),
                issuer_ruc: company.ruc.clone(),
                client_id: client.id.clone(),
                environment: company.environment,
                series: company.series(),
                issue_date,
                access_key,
                sequence,
                totals,
                status: DocumentStatus::Sequenced,
                xml: None,
                signed_xml: None,
                sign_error: None,
                authority_status: None,
                authority_messages: Vec::new(),
                submitted_at: None,
                responded_at: None,
                created_at: now,
                updated_at: now,
                request: request.clone(),
            })
        };
        let mut document = self
            .allocator
            .allocate(self.store.as_ref(), &company.id, document_type, draft)
            .await?;
        info!(
            id = %document.id,
            access_key = %document.access_key,
            sequence = %document.sequence,
            "document sequenced"
        );

        let ctx = DocumentContext {
            issuer: &company,
            client: &client,
            access_key: &document.access_key,
            sequence: document.sequence,
            issue_date,
        };
        let xml = render(&ctx).map_err(|source| {
            warn!(id = %document.id, error = %source, "XML rendering failed");
            LifecycleError::Document {
                step: LifecycleStep::XmlBuilding,
                source,
            }
        })?;
        document.xml = Some(xml);
        document.transition(DocumentStatus::XmlBuilt);
        self.persist(&document, LifecycleStep::XmlBuilding).await?;

        self.sign(&mut document, &company).await?;
        Ok(document)
    }

    /// Sign the persisted XML and record `SIGNED` or `SIGN_ERROR`.
    async fn sign(
        &self,
        document: &mut TaxDocument,
        company: &IssuingCompany,
    ) -> Result<(), LifecycleError> {
        let Some(xml) = document.xml.clone() else {
            return Err(LifecycleError::InvalidState {
                id: document.id,
                status: document.status,
                action: "sign",
            });
        };

        let outcome = match self.certificates.certificate_for(company).await {
            Ok(Some(bundle)) => bundle
                .material()
                .and_then(|material| XmlSigner::new(material).sign(&xml))
                .map_err(|e| e.to_string()),
            Ok(None) => Err(format!("no certificate configured for company {}", company.id)),
            Err(e) => Err(format!("certificate unavailable: {e}")),
        };

        match outcome {
            Ok(signed) => {
                document.signed_xml = Some(signed);
                document.sign_error = None;
                document.transition(DocumentStatus::Signed);
                info!(id = %document.id, access_key = %document.access_key, "document signed");
            }
            Err(detail) => {
                warn!(id = %document.id, %detail, "document left unsigned");
                document.sign_error = Some(detail);
                document.transition(DocumentStatus::SignError);
            }
        }
        self.persist(document, LifecycleStep::Signing).await
    }

    async fn persist(
        &self,
        document: &TaxDocument,
        step: LifecycleStep,
    ) -> Result<(), LifecycleError> {
        self.store
            .update(document)
            .await
            .map_err(|source| LifecycleError::Store { step, source })
    }
}

fn resolution_store_error(source: super::ports::StoreError) -> LifecycleError {
    LifecycleError::Store {
        step: LifecycleStep::Resolution,
        source,
    }
}

fn snapshot<T: Serialize>(request: &T) -> Result<serde_json::Value, LifecycleError> {
    serde_json::to_value(request).map_err(|e| LifecycleError::InvalidRequest(e.to_string()))
}

/// Eight random digits for the access key.
fn random_numeric_code() -> String {
    format!("{:08}", rand::thread_rng().gen_range(0..100_000_000u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_code_is_eight_digits() {
        for _ in 0..100 {
            let code = random_numeric_code();
            assert_eq!(code.len(), 8);
            assert!(code.bytes().all(|b| b.is_ascii_digit()));
        }
    }
}
