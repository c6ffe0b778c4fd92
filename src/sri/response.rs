use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

use crate::core::{AuthorityMessage, MessageKind};

/// Outcome of a reception call. Closed: every reply maps to exactly one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "estado", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SriResponse {
    /// `RECIBIDA`: the authority accepted the document for processing.
    #[serde(rename = "RECIBIDA")]
    Received {
        messages: Vec<AuthorityMessage>,
        access_keys: Vec<String>,
    },
    /// `DEVUELTA`: the document was returned with errors.
    #[serde(rename = "DEVUELTA")]
    Returned {
        messages: Vec<AuthorityMessage>,
        access_keys: Vec<String>,
    },
    #[serde(rename = "ERROR_SOAP")]
    SoapFault { fault: String },
    #[serde(rename = "ERROR_PARSING")]
    ParseError { detail: String },
    #[serde(rename = "ERROR_COMUNICACION")]
    CommunicationError { detail: String },
}

impl SriResponse {
    /// Status string as reported to callers.
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Received { .. } => "RECIBIDA",
            Self::Returned { .. } => "DEVUELTA",
            Self::SoapFault { .. } => "ERROR_SOAP",
            Self::ParseError { .. } => "ERROR_PARSING",
            Self::CommunicationError { .. } => "ERROR_COMUNICACION",
        }
    }

    /// Authority messages; failures are summarized as a single error entry.
    pub fn messages(&self) -> Vec<AuthorityMessage> {
        let failure = |identifier: &str, message: String| {
            vec![AuthorityMessage {
                identifier: identifier.to_string(),
                message,
                kind: MessageKind::Error,
                extra_info: None,
            }]
        };
        match self {
            Self::Received { messages, .. } | Self::Returned { messages, .. } => messages.clone(),
            Self::SoapFault { fault } => failure("001", format!("SOAP fault: {fault}")),
            Self::ParseError { detail } => failure("001", format!("unparseable response: {detail}")),
            Self::CommunicationError { detail } => {
                failure("000", format!("communication error: {detail}"))
            }
        }
    }

    /// The authority answered with an `estado`, accepting or returning the document.
    pub fn is_authority_verdict(&self) -> bool {
        matches!(self, Self::Received { .. } | Self::Returned { .. })
    }
}

#[derive(Default)]
struct MessageDraft {
    identifier: String,
    message: String,
    kind: String,
    extra_info: Option<String>,
}

impl MessageDraft {
    fn finish(self) -> AuthorityMessage {
        AuthorityMessage {
            identifier: self.identifier,
            message: self.message,
            kind: MessageKind::parse(&self.kind),
            extra_info: self.extra_info.filter(|s| !s.is_empty()),
        }
    }
}

/// Interpret a raw reception reply. Element prefixes are ignored.
pub fn parse_response(body: &str) -> SriResponse {
    match scan(body) {
        Ok(response) => response,
        Err(detail) => SriResponse::ParseError { detail },
    }
}

fn scan(body: &str) -> Result<SriResponse, String> {
    if body.trim().is_empty() {
        return Err("empty response body".into());
    }

    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut fault: Option<String> = None;
    let mut in_fault = false;
    let mut estado: Option<String> = None;
    let mut messages = Vec::new();
    let mut draft: Option<MessageDraft> = None;
    let mut access_keys = Vec::new();

    loop {
        let event = reader
            .read_event()
            .map_err(|e| format!("malformed XML at {}: {e}", reader.buffer_position()))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if name == "Fault" {
                    in_fault = true;
                }
                if name == "mensaje" && parent_is(&stack, 0, "mensajes") {
                    draft = Some(MessageDraft::default());
                }
                stack.push(name);
            }
            Event::End(_) => {
                if let Some(name) = stack.pop() {
                    if name == "mensaje" && parent_is(&stack, 0, "mensajes") {
                        if let Some(done) = draft.take() {
                            messages.push(done.finish());
                        }
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(|e| e.to_string())?;
                absorb(&stack, &text, in_fault, &mut fault, &mut estado, &mut draft, &mut access_keys);
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                absorb(&stack, &text, in_fault, &mut fault, &mut estado, &mut draft, &mut access_keys);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(format!("unclosed element <{}>", stack.join("/")));
    }
    if in_fault {
        return Ok(SriResponse::SoapFault {
            fault: fault.unwrap_or_else(|| "unknown SOAP fault".into()),
        });
    }
    match estado.as_deref().map(str::trim) {
        Some("RECIBIDA") => Ok(SriResponse::Received {
            messages,
            access_keys,
        }),
        Some("DEVUELTA") => Ok(SriResponse::Returned {
            messages,
            access_keys,
        }),
        Some(other) => Err(format!("unknown estado '{other}'")),
        None => Err("response has no estado element".into()),
    }
}

/// `stack[len - 1 - depth] == name`, i.e. the ancestor `depth` levels above the top.
fn parent_is(stack: &[String], depth: usize, name: &str) -> bool {
    stack
        .len()
        .checked_sub(1 + depth)
        .and_then(|i| stack.get(i))
        .is_some_and(|n| n == name)
}

fn absorb(
    stack: &[String],
    text: &str,
    in_fault: bool,
    fault: &mut Option<String>,
    estado: &mut Option<String>,
    draft: &mut Option<MessageDraft>,
    access_keys: &mut Vec<String>,
) {
    let Some(current) = stack.last().map(String::as_str) else {
        return;
    };
    if in_fault {
        if current == "faultstring" {
            fault.get_or_insert_with(String::new).push_str(text);
        }
        return;
    }
    match current {
        "estado" if estado.is_none() => *estado = Some(text.to_string()),
        "claveAcceso" if parent_is(stack, 1, "comprobante") => access_keys.push(text.to_string()),
        _ => {}
    }
    // Fields of the message currently open under <mensajes>.
    if let Some(draft) = draft.as_mut() {
        if !parent_is(stack, 1, "mensaje") {
            return;
        }
        match current {
            "identificador" => draft.identifier.push_str(text),
            "mensaje" => draft.message.push_str(text),
            "tipo" => draft.kind.push_str(text),
            "informacionAdicional" => draft
                .extra_info
                .get_or_insert_with(String::new)
                .push_str(text),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIBIDA: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion">
      <RespuestaRecepcionComprobante>
        <estado>RECIBIDA</estado>
        <comprobantes/>
      </RespuestaRecepcionComprobante>
    </ns2:validarComprobanteResponse>
  </soap:Body>
</soap:Envelope>"#;

    const DEVUELTA: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:validarComprobanteResponse xmlns:ns2="http://ec.gob.sri.ws.recepcion">
      <RespuestaRecepcionComprobante>
        <estado>DEVUELTA</estado>
        <comprobantes>
          <comprobante>
            <claveAcceso>1705202501010607978300110010010000000011234567815</claveAcceso>
            <mensajes>
              <mensaje>
                <identificador>43</identificador>
                <mensaje>CLAVE ACCESO REGISTRADA</mensaje>
                <informacionAdicional>La clave de acceso ya esta registrada</informacionAdicional>
                <tipo>ERROR</tipo>
              </mensaje>
              <mensaje>
                <identificador>60</identificador>
                <mensaje>ESTE PROCESO FUE REALIZADO EN EL AMBIENTE DE PRUEBAS</mensaje>
                <tipo>INFORMATIVO</tipo>
              </mensaje>
            </mensajes>
          </comprobante>
        </comprobantes>
      </RespuestaRecepcionComprobante>
    </ns2:validarComprobanteResponse>
  </soap:Body>
</soap:Envelope>"#;

    const FAULT: &str = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <soap:Fault>
      <faultcode>soap:Client</faultcode>
      <faultstring>Cannot find dispatch method for {}validar</faultstring>
    </soap:Fault>
  </soap:Body>
</soap:Envelope>"#;

    #[test]
    fn parses_recibida() {
        let response = parse_response(RECIBIDA);
        assert_eq!(
            response,
            SriResponse::Received {
                messages: vec![],
                access_keys: vec![]
            }
        );
        assert_eq!(response.status_code(), "RECIBIDA");
    }

    #[test]
    fn parses_devuelta_with_messages() {
        let SriResponse::Returned {
            messages,
            access_keys,
        } = parse_response(DEVUELTA)
        else {
            panic!("expected DEVUELTA");
        };
        assert_eq!(
            access_keys,
            vec!["1705202501010607978300110010010000000011234567815"]
        );
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].identifier, "43");
        assert_eq!(messages[0].message, "CLAVE ACCESO REGISTRADA");
        assert_eq!(messages[0].kind, MessageKind::Error);
        assert_eq!(
            messages[0].extra_info.as_deref(),
            Some("La clave de acceso ya esta registrada")
        );
        assert_eq!(messages[1].kind, MessageKind::Info);
        assert!(messages[1].extra_info.is_none());
    }

    #[test]
    fn parses_fault() {
        let response = parse_response(FAULT);
        assert_eq!(
            response,
            SriResponse::SoapFault {
                fault: "Cannot find dispatch method for {}validar".into()
            }
        );
        assert_eq!(response.status_code(), "ERROR_SOAP");
        assert!(!response.is_authority_verdict());
    }

    #[test]
    fn garbage_is_parse_error() {
        assert!(matches!(
            parse_response("<html><body>502 Bad Gateway"),
            SriResponse::ParseError { .. }
        ));
        assert!(matches!(parse_response(""), SriResponse::ParseError { .. }));
        assert!(matches!(
            parse_response("<a><b>no estado</b></a>"),
            SriResponse::ParseError { .. }
        ));
    }

    #[test]
    fn unknown_estado_is_parse_error() {
        let body = "<r><estado>PENDIENTE</estado></r>";
        let SriResponse::ParseError { detail } = parse_response(body) else {
            panic!("expected parse error");
        };
        assert!(detail.contains("PENDIENTE"));
    }

    #[test]
    fn failure_messages_are_synthesized() {
        let response = SriResponse::CommunicationError {
            detail: "timeout".into(),
        };
        let messages = response.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].identifier, "000");
        assert_eq!(messages[0].kind, MessageKind::Error);
    }

    #[test]
    fn serializes_with_status_tag() {
        let json = serde_json::to_value(SriResponse::SoapFault { fault: "x".into() }).unwrap();
        assert_eq!(json["estado"], "ERROR_SOAP");
    }
}
