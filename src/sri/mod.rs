//! SOAP submission to the SRI reception web service.
//!
//! The signed document is base64-encoded into a `validarComprobante`
//! envelope and posted to the test or production endpoint. Because the
//! service is picky about the `SOAPAction` header, [`SriClient::submit`]
//! probes the configured candidates in order and always returns a closed
//! [`SriResponse`].
//!
//! ```no_run
//! use comprobantes::core::Environment;
//! use comprobantes::sri::{SriClient, SriConfig, SriResponse};
//!
//! # async fn run(signed_xml: &str) -> Result<(), comprobantes::sri::TransportError> {
//! let client = SriClient::new(SriConfig::from_env())?;
//! match client.submit(signed_xml, Environment::Test).await {
//!     SriResponse::Received { .. } => println!("recibida"),
//!     SriResponse::Returned { messages, .. } => println!("devuelta: {messages:?}"),
//!     other => println!("{}", other.status_code()),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod envelope;
mod response;
mod transport;

pub use client::{SriClient, try_in_order};
pub use config::{
    DEFAULT_PRODUCTION_ENDPOINT, DEFAULT_SOAP_ACTIONS, DEFAULT_TEST_ENDPOINT, DEFAULT_TIMEOUT_SECS,
    ENV_PRODUCTION_ENDPOINT, ENV_TEST_ENDPOINT, ENV_TIMEOUT_SECS, SriConfig,
};
pub use envelope::{RECEPTION_NS, SOAP_ENVELOPE_NS, reception_envelope};
pub use response::{SriResponse, parse_response};
pub use transport::{HttpTransport, SoapTransport, TransportError};
