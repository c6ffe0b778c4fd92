use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::xml::XmlResult;
use crate::xml::writer::XmlWriter;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const RECEPTION_NS: &str = "http://ec.gob.sri.ws.recepcion";

/// Wrap signed XML in a `validarComprobante` SOAP 1.1 request.
///
/// The document travels base64-encoded inside the unqualified `xml` element.
pub fn reception_envelope(signed_xml: &str) -> XmlResult {
    let payload = STANDARD.encode(signed_xml.as_bytes());

    let mut w = XmlWriter::compact()?;
    w.start_element_with_attrs(
        "soap:Envelope",
        &[("xmlns:soap", SOAP_ENVELOPE_NS), ("xmlns:ec", RECEPTION_NS)],
    )?;
    w.text_element("soap:Header", "")?;
    w.start_element("soap:Body")?;
    w.start_element("ec:validarComprobante")?;
    w.text_element("xml", &payload)?;
    w.end_element("ec:validarComprobante")?;
    w.end_element("soap:Body")?;
    w.end_element("soap:Envelope")?;
    w.into_string()
}
