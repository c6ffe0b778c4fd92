//! Document lifecycle: from request to authority verdict.
//!
//! ```text
//! VALIDATING → SEQUENCED → XML_BUILT → SIGNED | SIGN_ERROR
//!                                      SIGNED → SUBMITTED → ACCEPTED | REJECTED | COMM_ERROR
//! ```
//!
//! Collaborators are ports ([`DocumentStore`], [`EntityLookup`],
//! [`CertificateStore`]); [`MemoryStore`] implements them in memory.
//!
//! ```no_run
//! use std::sync::Arc;
//! use comprobantes::lifecycle::{DocumentLifecycle, MemoryStore};
//! use comprobantes::sri::{SriClient, SriConfig};
//!
//! # async fn run(request: comprobantes::core::InvoiceRequest) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(MemoryStore::new());
//! let lifecycle = DocumentLifecycle::new(
//!     store.clone(),
//!     store.clone(),
//!     store.clone(),
//!     SriClient::new(SriConfig::from_env())?,
//! );
//! let document = lifecycle.issue_invoice(&request).await?;
//! let outcome = lifecycle.submit(document.id).await?;
//! println!("{} -> {}", outcome.document.access_key, outcome.document.status);
//! # Ok(())
//! # }
//! ```

mod allocator;
mod document;
mod engine;
mod error;
mod memory;
mod ports;

pub use allocator::{AllocationPolicy, SequenceAllocator};
pub use document::{DocumentStatus, TaxDocument};
pub use engine::{DocumentLifecycle, SubmissionOutcome};
pub use error::{LifecycleError, LifecycleStep};
pub use memory::{MemoryStore, PathCertificateStore};
pub use ports::{AcceptanceHook, CertificateStore, DocumentStore, EntityLookup, StoreError};
