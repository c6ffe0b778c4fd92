use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// HTTP-level failure of a single reception attempt.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransportError {
    /// The HTTP client could not be built.
    #[error("HTTP client setup failed: {0}")]
    Setup(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    /// Non-success status that did not carry a SOAP body.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Delivers a SOAP envelope and returns the raw reply body.
///
/// Implementations return `Ok` for any reply that may carry a SOAP body,
/// including HTTP 500 faults; interpreting it is the caller's job.
#[async_trait]
pub trait SoapTransport: Send + Sync {
    async fn post(
        &self,
        endpoint: &str,
        soap_action: Option<&str>,
        envelope: &str,
    ) -> Result<String, TransportError>;
}

/// reqwest-backed transport with a per-request timeout.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Setup(e.to_string()))?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl SoapTransport for HttpTransport {
    async fn post(
        &self,
        endpoint: &str,
        soap_action: Option<&str>,
        envelope: &str,
    ) -> Result<String, TransportError> {
        let mut request = self
            .client
            .post(endpoint)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(envelope.to_string());
        if let Some(action) = soap_action {
            request = request.header("SOAPAction", format!("\"{action}\""));
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(self.timeout)
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        // SOAP 1.1 reports faults with HTTP 500 and a fault envelope.
        if status.is_success() || status == reqwest::StatusCode::INTERNAL_SERVER_ERROR {
            Ok(body)
        } else {
            Err(TransportError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
