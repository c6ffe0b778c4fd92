use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::document::TaxDocument;
use super::error::{LifecycleError, LifecycleStep};
use super::ports::DocumentStore;
use crate::core::{ComprobanteError, DocumentType, Sequence};

/// Retry budget for uniqueness conflicts raised by the document store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    pub max_attempts: u32,
    /// Linear backoff unit: attempt `n` waits `n * backoff` before retrying.
    #[serde(with = "millis")]
    pub backoff: Duration,
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(20),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

type AllocationKey = (String, DocumentType);

/// Hands out sequences per (company, document type).
///
/// Allocations for the same key run one at a time: the lock is held across
/// reading the current maximum, drafting the document and creating it in the
/// store, so the sequence is durably reserved before the lock is released.
/// Different keys proceed concurrently.
#[derive(Debug, Default)]
pub struct SequenceAllocator {
    locks: parking_lot::Mutex<HashMap<AllocationKey, Arc<tokio::sync::Mutex<()>>>>,
    policy: AllocationPolicy,
}

impl SequenceAllocator {
    pub fn new(policy: AllocationPolicy) -> Self {
        Self {
            locks: parking_lot::Mutex::new(HashMap::new()),
            policy,
        }
    }

    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    fn lock_for(&self, company_id: &str, document_type: DocumentType) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry((company_id.to_string(), document_type))
            .or_default()
            .clone()
    }

    /// Reserve the next sequence by creating the document `draft` builds for it.
    ///
    /// `draft` runs once per attempt, so each retry gets a fresh access key.
    /// Conflicts reported by the store are retried with backoff; any other
    /// failure is returned at once.
    pub async fn allocate<S, F>(
        &self,
        store: &S,
        company_id: &str,
        document_type: DocumentType,
        mut draft: F,
    ) -> Result<TaxDocument, LifecycleError>
    where
        S: DocumentStore + ?Sized,
        F: FnMut(Sequence) -> Result<TaxDocument, ComprobanteError>,
    {
        let lock = self.lock_for(company_id, document_type);
        let _guard = lock.lock().await;

        let attempts = self.policy.max_attempts.max(1);
        for attempt in 1..=attempts {
            let last = store
                .max_sequence(company_id, document_type)
                .await
                .map_err(|source| LifecycleError::Store {
                    step: LifecycleStep::Sequencing,
                    source,
                })?;
            let sequence = Sequence::after(last).map_err(|source| LifecycleError::Document {
                step: LifecycleStep::Sequencing,
                source,
            })?;
            let document = draft(sequence).map_err(|source| LifecycleError::Document {
                step: LifecycleStep::Sequencing,
                source,
            })?;

            match store.create(&document).await {
                Ok(()) => {
                    debug!(company_id, %sequence, attempt, "sequence reserved");
                    return Ok(document);
                }
                Err(e) if e.is_conflict() => {
                    warn!(company_id, %sequence, attempt, error = %e, "sequence allocation conflict");
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.backoff * attempt).await;
                    }
                }
                Err(source) => {
                    return Err(LifecycleError::Store {
                        step: LifecycleStep::Sequencing,
                        source,
                    });
                }
            }
        }
        Err(LifecycleError::SequenceConflict { attempts })
    }
}
