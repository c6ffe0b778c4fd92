#![cfg(feature = "sri")]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use comprobantes::core::{Environment, MessageKind};
use comprobantes::sri::*;

const FAULT: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><soap:Fault><faultcode>soap:Client</faultcode><faultstring>Unexpected SOAPAction</faultstring></soap:Fault></soap:Body></soap:Envelope>"#;

const RECIBIDA: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion"><RespuestaRecepcionComprobante><estado>RECIBIDA</estado><comprobantes/></RespuestaRecepcionComprobante></ns2:validarComprobanteResponse></soap:Body></soap:Envelope>"#;

const DEVUELTA: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion"><RespuestaRecepcionComprobante><estado>DEVUELTA</estado><comprobantes><comprobante><claveAcceso>1705202501010607978300110010010000000011234567815</claveAcceso><mensajes><mensaje><identificador>35</identificador><mensaje>ARCHIVO NO CUMPLE ESTRUCTURA XML</mensaje><informacionAdicional>Se encontró el siguiente error en la estructura del comprobante</informacionAdicional><tipo>ERROR</tipo></mensaje></mensajes></comprobante></comprobantes></RespuestaRecepcionComprobante></ns2:validarComprobanteResponse></soap:Body></soap:Envelope>"#;

#[derive(Debug, Clone, PartialEq)]
struct Call {
    endpoint: String,
    soap_action: Option<String>,
    envelope: String,
}

/// Replays scripted replies and records every request.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<String, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SoapTransport for ScriptedTransport {
    async fn post(
        &self,
        endpoint: &str,
        soap_action: Option<&str>,
        envelope: &str,
    ) -> Result<String, TransportError> {
        self.calls.lock().unwrap().push(Call {
            endpoint: endpoint.to_string(),
            soap_action: soap_action.map(str::to_string),
            envelope: envelope.to_string(),
        });
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Network("connection refused".into())))
    }
}

fn client(transport: Arc<ScriptedTransport>) -> SriClient {
    SriClient::with_transport(SriConfig::default(), transport)
}

#[tokio::test]
async fn all_candidates_faulting_is_communication_error() {
    let transport = ScriptedTransport::new(vec![
        Ok(FAULT.into()),
        Ok(FAULT.into()),
        Ok(FAULT.into()),
    ]);
    let response = client(transport.clone())
        .submit("<factura/>", Environment::Test)
        .await;

    let SriResponse::CommunicationError { detail } = &response else {
        panic!("expected communication error, got {response:?}");
    };
    assert!(detail.contains("Unexpected SOAPAction"));
    assert_eq!(response.status_code(), "ERROR_COMUNICACION");

    let actions: Vec<Option<String>> = transport.calls().into_iter().map(|c| c.soap_action).collect();
    assert_eq!(
        actions,
        vec![
            Some("http://ec.gob.sri.ws.recepcion/validarComprobante".to_string()),
            Some("validarComprobante".to_string()),
            None,
        ]
    );
}

#[tokio::test]
async fn stops_at_first_verdict() {
    let transport = ScriptedTransport::new(vec![Ok(FAULT.into()), Ok(RECIBIDA.into())]);
    let response = client(transport.clone())
        .submit("<factura/>", Environment::Test)
        .await;
    assert!(matches!(response, SriResponse::Received { .. }));
    assert_eq!(transport.calls().len(), 2);
}

#[tokio::test]
async fn transport_errors_move_to_next_candidate() {
    let transport = ScriptedTransport::new(vec![
        Err(TransportError::Timeout(std::time::Duration::from_secs(30))),
        Ok("<html>Service Unavailable</html>".into()),
        Ok(DEVUELTA.into()),
    ]);
    let response = client(transport.clone())
        .submit("<factura/>", Environment::Test)
        .await;

    let SriResponse::Returned {
        messages,
        access_keys,
    } = response
    else {
        panic!("expected DEVUELTA");
    };
    assert_eq!(transport.calls().len(), 3);
    assert_eq!(access_keys.len(), 1);
    assert_eq!(messages[0].identifier, "35");
    assert_eq!(messages[0].kind, MessageKind::Error);
    assert!(messages[0].extra_info.is_some());
}

#[tokio::test]
async fn unreachable_service_is_communication_error() {
    let transport = ScriptedTransport::new(vec![]);
    let response = client(transport.clone())
        .submit("<factura/>", Environment::Production)
        .await;
    assert!(matches!(response, SriResponse::CommunicationError { .. }));
    assert_eq!(transport.calls().len(), 3);
}

#[tokio::test]
async fn endpoint_follows_environment() {
    let transport = ScriptedTransport::new(vec![Ok(RECIBIDA.into()), Ok(RECIBIDA.into())]);
    let sri = client(transport.clone());
    sri.submit("<factura/>", Environment::Test).await;
    sri.submit("<factura/>", Environment::Production).await;

    let calls = transport.calls();
    assert_eq!(calls[0].endpoint, DEFAULT_TEST_ENDPOINT);
    assert_eq!(calls[1].endpoint, DEFAULT_PRODUCTION_ENDPOINT);
}

#[tokio::test]
async fn posts_base64_payload() {
    let signed = "<factura id=\"comprobante\">Teléfono</factura>";
    let transport = ScriptedTransport::new(vec![Ok(RECIBIDA.into())]);
    client(transport.clone())
        .submit(signed, Environment::Test)
        .await;

    let envelope = &transport.calls()[0].envelope;
    assert!(envelope.contains("<ec:validarComprobante><xml>"));
    let start = envelope.find("<xml>").unwrap() + "<xml>".len();
    let end = envelope.find("</xml>").unwrap();
    let payload = STANDARD.decode(&envelope[start..end]).unwrap();
    assert_eq!(payload, signed.as_bytes());
}

#[tokio::test]
async fn custom_candidates_are_used_in_order() {
    let config = SriConfig {
        soap_actions: vec!["".into(), "validarComprobante".into()],
        ..SriConfig::default()
    };
    let transport = ScriptedTransport::new(vec![Ok(FAULT.into()), Ok(RECIBIDA.into())]);
    let sri = SriClient::with_transport(config, transport.clone());
    assert!(matches!(
        sri.submit("<factura/>", Environment::Test).await,
        SriResponse::Received { .. }
    ));
    let actions: Vec<Option<String>> = transport.calls().into_iter().map(|c| c.soap_action).collect();
    assert_eq!(actions, vec![None, Some("validarComprobante".to_string())]);
}

#[tokio::test]
async fn no_candidates_is_communication_error() {
    let config = SriConfig {
        soap_actions: vec![],
        ..SriConfig::default()
    };
    let transport = ScriptedTransport::new(vec![Ok(RECIBIDA.into())]);
    let response = SriClient::with_transport(config, transport.clone())
        .submit("<factura/>", Environment::Test)
        .await;
    assert!(matches!(response, SriResponse::CommunicationError { .. }));
    assert!(transport.calls().is_empty());
}

#[test]
fn parse_response_handles_every_shape() {
    assert_eq!(parse_response(RECIBIDA).status_code(), "RECIBIDA");
    assert_eq!(parse_response(DEVUELTA).status_code(), "DEVUELTA");
    assert_eq!(parse_response(FAULT).status_code(), "ERROR_SOAP");
    assert_eq!(parse_response("not xml at all <").status_code(), "ERROR_PARSING");
}
