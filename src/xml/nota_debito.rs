use super::writer::{XmlResult, XmlWriter};
use super::{DocumentContext, write_additional_info, write_tax_block, write_tax_info};
use crate::core::*;

/// Render a debit note as SRI `notaDebito` XML (version 1.0.0).
pub fn to_debit_note_xml(req: &DebitNoteRequest, ctx: &DocumentContext<'_>) -> XmlResult {
    if req.reasons.is_empty() {
        return Err(ComprobanteError::InvalidDocumentData(
            "debit note has no reasons".into(),
        ));
    }

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs(
        "notaDebito",
        &[("id", "comprobante"), ("version", "1.0.0")],
    )?;

    write_tax_info(&mut w, ctx, DocumentType::DebitNote)?;

    // --- infoNotaDebito ---
    w.start_element("infoNotaDebito")?;
    w.text_element("fechaEmision", &ctx.issue_date.format("%d/%m/%Y").to_string())?;
    w.text_element("dirEstablecimiento", ctx.establishment_address())?;
    w.text_element("tipoIdentificacionComprador", &req.buyer.identification_type)?;
    w.text_element("razonSocialComprador", &ctx.client.legal_name)?;
    w.text_element("identificacionComprador", &ctx.client.identification)?;
    w.text_element(
        "obligadoContabilidad",
        if ctx.issuer.keeps_accounting { "SI" } else { "NO" },
    )?;
    if let Some(doc) = &req.modified_document {
        w.text_element("codDocModificado", doc.document_type.code())?;
        w.text_element("numDocModificado", &doc.number)?;
        w.text_element("fechaEmisionDocSustento", &doc.issue_date)?;
    }
    w.decimal_element("totalSinImpuestos", req.total_without_taxes)?;
    if !req.taxes.is_empty() {
        w.start_element("impuestos")?;
        for tax in &req.taxes {
            write_tax_block(&mut w, tax)?;
        }
        w.end_element("impuestos")?;
    }
    w.decimal_element("valorTotal", req.total_value)?;
    w.end_element("infoNotaDebito")?;

    // --- motivos ---
    w.start_element("motivos")?;
    for reason in &req.reasons {
        w.start_element("motivo")?;
        w.text_element("razon", &reason.reason)?;
        w.decimal_element("valor", reason.value)?;
        w.end_element("motivo")?;
    }
    w.end_element("motivos")?;

    write_additional_info(&mut w, &req.additional_info)?;

    w.end_element("notaDebito")?;
    w.into_string()
}
