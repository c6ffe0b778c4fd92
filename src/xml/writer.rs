use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use rust_decimal::Decimal;
use std::io::Cursor;

use crate::core::ComprobanteError;

pub type XmlResult = Result<String, ComprobanteError>;

fn xml_io(e: std::io::Error) -> ComprobanteError {
    ComprobanteError::Xml(format!("XML write error: {e}"))
}

pub struct XmlWriter {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlWriter {
    /// Indented document with an XML declaration.
    pub fn new() -> Result<Self, ComprobanteError> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    /// Compact document with an XML declaration (SOAP envelopes).
    pub fn compact() -> Result<Self, ComprobanteError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;
        Ok(Self { writer })
    }

    /// Compact fragment without a declaration, for splicing into a document.
    pub fn fragment() -> Self {
        Self {
            writer: Writer::new(Cursor::new(Vec::new())),
        }
    }

    pub fn into_string(self) -> XmlResult {
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| ComprobanteError::Xml(format!("XML UTF-8 error: {e}")))
    }

    pub fn start_element(&mut self, name: &str) -> Result<&mut Self, ComprobanteError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn start_element_with_attrs(
        &mut self,
        name: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ComprobanteError> {
        let mut elem = BytesStart::new(name);
        for (k, v) in attrs {
            elem.push_attribute((*k, *v));
        }
        self.writer
            .write_event(Event::Start(elem))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn end_element(&mut self, name: &str) -> Result<&mut Self, ComprobanteError> {
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, ComprobanteError> {
        self.start_element(name)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    pub fn text_element_with_attrs(
        &mut self,
        name: &str,
        text: &str,
        attrs: &[(&str, &str)],
    ) -> Result<&mut Self, ComprobanteError> {
        self.start_element_with_attrs(name, attrs)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.end_element(name)
    }

    /// Write an element only when the value is present.
    pub fn opt_text_element(
        &mut self,
        name: &str,
        text: Option<&str>,
    ) -> Result<&mut Self, ComprobanteError> {
        if let Some(text) = text {
            self.text_element(name, text)?;
        }
        Ok(self)
    }

    /// Write a decimal exactly as supplied by the caller.
    pub fn decimal_element(
        &mut self,
        name: &str,
        value: Decimal,
    ) -> Result<&mut Self, ComprobanteError> {
        self.text_element(name, &value.to_string())
    }

    /// Write a computed amount with exactly two decimals.
    pub fn amount_element(
        &mut self,
        name: &str,
        value: Decimal,
    ) -> Result<&mut Self, ComprobanteError> {
        self.text_element(name, &format_amount(value))
    }
}

/// Round half away from zero to two decimals and render both places.
pub fn format_amount(d: Decimal) -> String {
    let rounded = d.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero);
    format!("{rounded:.2}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn format_amount_cases() {
        assert_eq!(format_amount(dec!(100)), "100.00");
        assert_eq!(format_amount(dec!(1.5)), "1.50");
        assert_eq!(format_amount(dec!(49.905)), "49.91");
        assert_eq!(format_amount(dec!(0.004)), "0.00");
        assert_eq!(format_amount(dec!(12.345678)), "12.35");
    }

    #[test]
    fn decimals_keep_caller_scale() {
        let mut w = XmlWriter::fragment();
        w.decimal_element("cantidad", dec!(2.500)).unwrap();
        assert_eq!(w.into_string().unwrap(), "<cantidad>2.500</cantidad>");
    }
}
