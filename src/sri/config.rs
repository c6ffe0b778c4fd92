use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::Environment;

pub const DEFAULT_TEST_ENDPOINT: &str =
    "https://celcer.sri.gob.ec/comprobantes-electronicos-ws/RecepcionComprobantesOffline";
pub const DEFAULT_PRODUCTION_ENDPOINT: &str =
    "https://cel.sri.gob.ec/comprobantes-electronicos-ws/RecepcionComprobantesOffline";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// SOAPAction candidates in probing order. The empty action omits the header.
pub const DEFAULT_SOAP_ACTIONS: [&str; 3] = [
    "http://ec.gob.sri.ws.recepcion/validarComprobante",
    "validarComprobante",
    "",
];

pub const ENV_TEST_ENDPOINT: &str = "SRI_RECEPCION_URL_PRUEBAS";
pub const ENV_PRODUCTION_ENDPOINT: &str = "SRI_RECEPCION_URL_PRODUCCION";
pub const ENV_TIMEOUT_SECS: &str = "SRI_TIMEOUT_SECS";

/// Reception service configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SriConfig {
    pub test_endpoint: String,
    pub production_endpoint: String,
    /// Per-attempt timeout.
    pub timeout_secs: u64,
    pub soap_actions: Vec<String>,
}

impl Default for SriConfig {
    fn default() -> Self {
        Self {
            test_endpoint: DEFAULT_TEST_ENDPOINT.to_string(),
            production_endpoint: DEFAULT_PRODUCTION_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            soap_actions: DEFAULT_SOAP_ACTIONS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl SriConfig {
    /// Defaults overridden by `SRI_RECEPCION_URL_PRUEBAS`,
    /// `SRI_RECEPCION_URL_PRODUCCION` and `SRI_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`SriConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty(ENV_TEST_ENDPOINT) {
            config.test_endpoint = url.trim().to_string();
        }
        if let Some(url) = non_empty(ENV_PRODUCTION_ENDPOINT) {
            config.production_endpoint = url.trim().to_string();
        }
        if let Some(raw) = non_empty(ENV_TIMEOUT_SECS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.timeout_secs = secs,
                _ => tracing::warn!(
                    value = %raw,
                    "ignoring invalid {ENV_TIMEOUT_SECS}, using {DEFAULT_TIMEOUT_SECS}s"
                ),
            }
        }
        config
    }

    /// Reception endpoint for a document's environment flag.
    pub fn endpoint_for(&self, environment: Environment) -> &str {
        match environment {
            Environment::Test => &self.test_endpoint,
            Environment::Production => &self.production_endpoint,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let config = SriConfig::default();
        assert_eq!(config.endpoint_for(Environment::Test), DEFAULT_TEST_ENDPOINT);
        assert_eq!(
            config.endpoint_for(Environment::Production),
            DEFAULT_PRODUCTION_ENDPOINT
        );
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.soap_actions.len(), 3);
        assert_eq!(config.soap_actions[2], "");
    }

    #[test]
    fn lookup_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_TEST_ENDPOINT, "http://localhost:8080/recepcion"),
            (ENV_TIMEOUT_SECS, "5"),
        ]
        .into_iter()
        .collect();
        let config = SriConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.test_endpoint, "http://localhost:8080/recepcion");
        assert_eq!(config.production_endpoint, DEFAULT_PRODUCTION_ENDPOINT);
        assert_eq!(config.timeout_secs, 5);
    }

    #[test]
    fn invalid_timeout_keeps_default() {
        let config = SriConfig::from_lookup(|k| (k == ENV_TIMEOUT_SECS).then(|| "soon".to_string()));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        let config = SriConfig::from_lookup(|k| (k == ENV_TIMEOUT_SECS).then(|| "0".to_string()));
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: SriConfig = serde_json::from_str(r#"{"timeout_secs": 10}"#).unwrap();
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.test_endpoint, DEFAULT_TEST_ENDPOINT);
    }
}
