//! SRI document XML: `factura` and `notaDebito` rendering plus inclusive
//! canonicalization for signing.
//!
//! Rendering is a pure function of the request, the resolved issuer and
//! client, the access key and the sequence. Element order follows the SRI
//! XSD; caller-supplied amounts are rendered verbatim and computed tax totals
//! with exactly two decimals.
//!
//! # Example
//!
//! ```no_run
//! use comprobantes::core::*;
//! use comprobantes::xml::{self, DocumentContext};
//!
//! # let (request, issuer, client, key, sequence, date): (InvoiceRequest, IssuingCompany, Client, AccessKey, Sequence, chrono::NaiveDate) = todo!();
//! let ctx = DocumentContext {
//!     issuer: &issuer,
//!     client: &client,
//!     access_key: &key,
//!     sequence,
//!     issue_date: date,
//! };
//! let xml = xml::to_invoice_xml(&request, &ctx).unwrap();
//! ```

pub mod c14n;
mod factura;
mod nota_debito;
pub(crate) mod writer;

use chrono::NaiveDate;

pub use c14n::{C14nOptions, Subset, canonicalize, canonicalize_with};
pub use factura::to_invoice_xml;
pub use nota_debito::to_debit_note_xml;
pub use writer::{XmlResult, format_amount};

use crate::core::*;
use writer::XmlWriter;

/// Fallback used by the SRI documents when no address is on record.
pub const UNSPECIFIED_ADDRESS: &str = "Dirección no especificada";

/// Everything the renderers need besides the request itself.
#[derive(Debug, Clone, Copy)]
pub struct DocumentContext<'a> {
    pub issuer: &'a IssuingCompany,
    pub client: &'a Client,
    pub access_key: &'a AccessKey,
    pub sequence: Sequence,
    pub issue_date: NaiveDate,
}

impl DocumentContext<'_> {
    fn head_office_address(&self) -> &str {
        self.issuer
            .head_office_address
            .as_deref()
            .or(self.issuer.address.as_deref())
            .unwrap_or(UNSPECIFIED_ADDRESS)
    }

    fn establishment_address(&self) -> &str {
        self.issuer
            .establishment_address
            .as_deref()
            .or(self.issuer.address.as_deref())
            .unwrap_or(UNSPECIFIED_ADDRESS)
    }
}

/// infoTributaria, shared by every document type.
fn write_tax_info(
    w: &mut XmlWriter,
    ctx: &DocumentContext<'_>,
    document_type: DocumentType,
) -> Result<(), ComprobanteError> {
    let issuer = ctx.issuer;
    w.start_element("infoTributaria")?;
    w.text_element("ambiente", issuer.environment.code())?;
    w.text_element("tipoEmision", issuer.emission_type.code())?;
    w.text_element("razonSocial", &issuer.legal_name)?;
    w.opt_text_element("nombreComercial", issuer.trade_name.as_deref())?;
    w.text_element("ruc", &issuer.ruc)?;
    w.text_element("claveAcceso", ctx.access_key.as_str())?;
    w.text_element("codDoc", document_type.code())?;
    w.text_element("estab", &issuer.establishment)?;
    w.text_element("ptoEmi", &issuer.emission_point)?;
    w.text_element("secuencial", &ctx.sequence.to_string())?;
    w.text_element("dirMatriz", ctx.head_office_address())?;
    w.end_element("infoTributaria")?;
    Ok(())
}

fn write_tax_block(w: &mut XmlWriter, tax: &LineTax) -> Result<(), ComprobanteError> {
    w.start_element("impuesto")?;
    w.text_element("codigo", &tax.code)?;
    w.text_element("codigoPorcentaje", &tax.percentage_code)?;
    w.decimal_element("tarifa", tax.rate)?;
    w.decimal_element("baseImponible", tax.taxable_base)?;
    w.decimal_element("valor", tax.amount)?;
    w.end_element("impuesto")?;
    Ok(())
}

/// infoAdicional; omitted entirely when there are no fields.
fn write_additional_info(
    w: &mut XmlWriter,
    fields: &[AdditionalField],
) -> Result<(), ComprobanteError> {
    if fields.is_empty() {
        return Ok(());
    }
    w.start_element("infoAdicional")?;
    for field in fields {
        w.text_element_with_attrs("campoAdicional", &field.value, &[("nombre", field.name.as_str())])?;
    }
    w.end_element("infoAdicional")?;
    Ok(())
}
