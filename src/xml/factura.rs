use super::writer::{XmlResult, XmlWriter};
use super::{DocumentContext, write_additional_info, write_tax_block, write_tax_info};
use crate::core::*;

/// Render an invoice as SRI `factura` XML (version 1.0.0).
///
/// Line items must already carry resolved descriptions; a line without
/// taxes is rejected with [`ComprobanteError::InvalidDocumentData`].
pub fn to_invoice_xml(req: &InvoiceRequest, ctx: &DocumentContext<'_>) -> XmlResult {
    if req.lines.is_empty() {
        return Err(ComprobanteError::InvalidDocumentData(
            "invoice has no detail lines".into(),
        ));
    }
    for (i, line) in req.lines.iter().enumerate() {
        if line.taxes.is_empty() {
            return Err(ComprobanteError::InvalidDocumentData(format!(
                "line {i} ({}) has no tax block",
                line.main_code
            )));
        }
    }

    let mut w = XmlWriter::new()?;
    w.start_element_with_attrs("factura", &[("id", "comprobante"), ("version", "1.0.0")])?;

    write_tax_info(&mut w, ctx, DocumentType::Invoice)?;

    // --- infoFactura ---
    w.start_element("infoFactura")?;
    w.text_element("fechaEmision", &ctx.issue_date.format("%d/%m/%Y").to_string())?;
    w.text_element("dirEstablecimiento", ctx.establishment_address())?;
    w.text_element(
        "obligadoContabilidad",
        if ctx.issuer.keeps_accounting { "SI" } else { "NO" },
    )?;
    w.text_element("tipoIdentificacionComprador", &req.buyer.identification_type)?;
    w.text_element("razonSocialComprador", &ctx.client.legal_name)?;
    w.text_element("identificacionComprador", &ctx.client.identification)?;
    w.opt_text_element("direccionComprador", ctx.client.address.as_deref())?;
    w.decimal_element("totalSinImpuestos", req.total_without_taxes)?;
    w.decimal_element("totalDescuento", req.total_discount)?;

    w.start_element("totalConImpuestos")?;
    for total in tax_totals(&req.lines) {
        w.start_element("totalImpuesto")?;
        w.text_element("codigo", &total.code)?;
        w.text_element("codigoPorcentaje", &total.percentage_code)?;
        w.amount_element("baseImponible", total.taxable_base)?;
        w.amount_element("valor", total.amount)?;
        w.end_element("totalImpuesto")?;
    }
    w.end_element("totalConImpuestos")?;

    w.decimal_element("propina", req.tip)?;
    w.decimal_element("importeTotal", req.total_amount)?;
    w.text_element("moneda", &req.currency)?;

    if !req.payments.is_empty() {
        w.start_element("pagos")?;
        for payment in &req.payments {
            w.start_element("pago")?;
            w.text_element("formaPago", &payment.method)?;
            w.decimal_element("total", payment.total)?;
            if let Some(term) = payment.term {
                w.text_element("plazo", &term.to_string())?;
            }
            w.opt_text_element("unidadTiempo", payment.time_unit.as_deref())?;
            w.end_element("pago")?;
        }
        w.end_element("pagos")?;
    }
    w.end_element("infoFactura")?;

    // --- detalles ---
    w.start_element("detalles")?;
    for line in &req.lines {
        let description = line.description.as_deref().ok_or_else(|| {
            ComprobanteError::InvalidDocumentData(format!(
                "line {} has no description",
                line.main_code
            ))
        })?;
        w.start_element("detalle")?;
        w.text_element("codigoPrincipal", &line.main_code)?;
        w.opt_text_element("codigoAuxiliar", line.auxiliary_code.as_deref())?;
        w.text_element("descripcion", description)?;
        w.decimal_element("cantidad", line.quantity)?;
        w.decimal_element("precioUnitario", line.unit_price)?;
        w.decimal_element("descuento", line.discount)?;
        w.decimal_element("precioTotalSinImpuesto", line.total_without_tax)?;
        w.start_element("impuestos")?;
        for tax in &line.taxes {
            write_tax_block(&mut w, tax)?;
        }
        w.end_element("impuestos")?;
        w.end_element("detalle")?;
    }
    w.end_element("detalles")?;

    let mut fields = Vec::new();
    if let Some(email) = &ctx.client.email {
        fields.push(AdditionalField::new("Email", email));
    }
    if let Some(phone) = &ctx.client.phone {
        fields.push(AdditionalField::new("Teléfono", phone));
    }
    fields.extend(req.additional_info.iter().cloned());
    write_additional_info(&mut w, &fields)?;

    w.end_element("factura")?;
    w.into_string()
}
