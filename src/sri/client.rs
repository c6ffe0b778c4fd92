use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::config::SriConfig;
use super::envelope::reception_envelope;
use super::response::{SriResponse, parse_response};
use super::transport::{HttpTransport, SoapTransport, TransportError};
use crate::core::Environment;

/// Run `attempt` over `candidates` in order, stopping at the first success.
///
/// Returns every failure, in order, when no candidate succeeds.
pub async fn try_in_order<C, T, E, F, Fut>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> Result<T, Vec<E>>
where
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::new();
    for candidate in candidates {
        match attempt(candidate).await {
            Ok(value) => return Ok(value),
            Err(e) => failures.push(e),
        }
    }
    Err(failures)
}

/// Client for the SRI offline reception service (`validarComprobante`).
#[derive(Clone)]
pub struct SriClient {
    config: SriConfig,
    transport: Arc<dyn SoapTransport>,
}

impl std::fmt::Debug for SriClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SriClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SriClient {
    /// Client over HTTPS using the configured timeout.
    pub fn new(config: SriConfig) -> Result<Self, TransportError> {
        let transport = HttpTransport::new(config.timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: SriConfig, transport: Arc<dyn SoapTransport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &SriConfig {
        &self.config
    }

    /// Submit a signed document to the reception endpoint of `environment`.
    ///
    /// Each SOAPAction candidate is tried in order until one yields a
    /// `RECIBIDA` or `DEVUELTA` verdict. Faults, unparseable bodies and
    /// transport failures move on to the next candidate; when none succeeds
    /// the result is [`SriResponse::CommunicationError`]. Never fails.
    pub async fn submit(&self, signed_xml: &str, environment: Environment) -> SriResponse {
        let envelope = match reception_envelope(signed_xml) {
            Ok(envelope) => envelope,
            Err(e) => {
                return SriResponse::CommunicationError {
                    detail: format!("cannot build SOAP envelope: {e}"),
                };
            }
        };
        let endpoint = self.config.endpoint_for(environment);

        let outcome = try_in_order(&self.config.soap_actions, |action| {
            let envelope = envelope.as_str();
            async move {
                let header = Some(action.as_str()).filter(|a| !a.is_empty());
                debug!(endpoint, soap_action = header.unwrap_or("<none>"), "posting to SRI reception");
                let label = if action.is_empty() { "<none>" } else { action.as_str() };
                match self.transport.post(endpoint, header, envelope).await {
                    Ok(body) => {
                        let response = parse_response(&body);
                        if response.is_authority_verdict() {
                            Ok(response)
                        } else {
                            let reason = match &response {
                                SriResponse::SoapFault { fault } => format!("SOAP fault: {fault}"),
                                SriResponse::ParseError { detail } => {
                                    format!("unparseable response: {detail}")
                                }
                                other => other.status_code().to_string(),
                            };
                            warn!(soap_action = label, %reason, "SRI reception attempt failed");
                            Err(format!("[{label}] {reason}"))
                        }
                    }
                    Err(e) => {
                        warn!(soap_action = label, error = %e, "SRI reception attempt failed");
                        Err(format!("[{label}] {e}"))
                    }
                }
            }
        })
        .await;

        match outcome {
            Ok(response) => {
                info!(estado = response.status_code(), endpoint, "SRI reception answered");
                response
            }
            Err(failures) => {
                let detail = if failures.is_empty() {
                    "no SOAPAction candidates configured".to_string()
                } else {
                    format!(
                        "no SOAPAction candidate produced a valid response: {}",
                        failures.join("; ")
                    )
                };
                warn!(endpoint, %detail, "SRI reception unreachable");
                SriResponse::CommunicationError { detail }
            }
        }
    }
}
