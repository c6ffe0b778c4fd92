use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::error::{ComprobanteError, ValidationError};
use super::types::*;

/// Buyer reference carried by a request; resolved against the client records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerRef {
    /// tipoIdentificacionComprador.
    pub identification_type: String,
    /// identificacionComprador.
    pub identification: String,
}

/// Request to issue an invoice (factura).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub issuer_ruc: String,
    /// DD/MM/YYYY (ISO YYYY-MM-DD also accepted).
    pub issue_date: String,
    pub buyer: BuyerRef,
    pub total_without_taxes: Decimal,
    #[serde(default = "zero_amount")]
    pub total_discount: Decimal,
    #[serde(default = "zero_amount")]
    pub tip: Decimal,
    pub total_amount: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub lines: Vec<LineItem>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub additional_info: Vec<AdditionalField>,
}

/// Request to issue a debit note (nota de débito).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitNoteRequest {
    pub issuer_ruc: String,
    pub issue_date: String,
    pub buyer: BuyerRef,
    pub modified_document: Option<ModifiedDocument>,
    pub total_without_taxes: Decimal,
    #[serde(default)]
    pub taxes: Vec<LineTax>,
    pub total_value: Decimal,
    pub reasons: Vec<DebitReason>,
    #[serde(default)]
    pub additional_info: Vec<AdditionalField>,
}

fn default_currency() -> String {
    "DOLAR".to_string()
}

/// Zero with the two decimals amounts are written with, e.g. `0.00`.
pub fn zero_amount() -> Decimal {
    Decimal::new(0, 2)
}

/// Aggregated tax per (codigo, codigoPorcentaje), as rendered in totalConImpuestos.
#[derive(Debug, Clone, PartialEq)]
pub struct TaxTotal {
    pub code: String,
    pub percentage_code: String,
    pub taxable_base: Decimal,
    pub amount: Decimal,
}

/// Group line taxes by code and percentage code, keeping first-seen order.
pub fn tax_totals(lines: &[LineItem]) -> Vec<TaxTotal> {
    let mut totals: Vec<TaxTotal> = Vec::new();
    for tax in lines.iter().flat_map(|l| &l.taxes) {
        match totals
            .iter_mut()
            .find(|t| t.code == tax.code && t.percentage_code == tax.percentage_code)
        {
            Some(t) => {
                t.taxable_base += tax.taxable_base;
                t.amount += tax.amount;
            }
            None => totals.push(TaxTotal {
                code: tax.code.clone(),
                percentage_code: tax.percentage_code.clone(),
                taxable_base: tax.taxable_base,
                amount: tax.amount,
            }),
        }
    }
    totals
}

impl InvoiceRequest {
    /// Totals stored on the document; tax is the rounded sum of line taxes.
    pub fn totals(&self) -> DocumentTotals {
        let tax: Decimal = tax_totals(&self.lines).iter().map(|t| t.amount).sum();
        DocumentTotals {
            subtotal: self.total_without_taxes,
            tax: tax.round_dp(2),
            total: self.total_amount,
        }
    }
}

impl DebitNoteRequest {
    pub fn totals(&self) -> DocumentTotals {
        let tax: Decimal = self.taxes.iter().map(|t| t.amount).sum();
        DocumentTotals {
            subtotal: self.total_without_taxes,
            tax: tax.round_dp(2),
            total: self.total_value,
        }
    }
}

/// Parse an issue date in `DD/MM/YYYY`, falling back to ISO `YYYY-MM-DD`.
pub fn parse_issue_date(s: &str) -> Result<NaiveDate, ComprobanteError> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%d/%m/%Y")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .map_err(|_| ComprobanteError::InvalidDate(format!("'{s}' is not DD/MM/YYYY")))
}

/// Check an invoice request for missing or inconsistent fields.
/// Returns all errors found (not just the first).
pub fn validate_invoice_request(req: &InvoiceRequest) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_header(&req.issuer_ruc, &req.issue_date, &req.buyer, &mut errors);

    if req.lines.is_empty() {
        errors.push(ValidationError::new(
            "lines",
            "at least one line item is required",
        ));
    }
    for (i, line) in req.lines.iter().enumerate() {
        if line.main_code.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("lines.{i}.main_code"),
                "main code must not be empty",
            ));
        }
        if line.quantity <= Decimal::ZERO {
            errors.push(ValidationError::new(
                format!("lines.{i}.quantity"),
                "quantity must be positive",
            ));
        }
        if line.taxes.is_empty() {
            errors.push(ValidationError::new(
                format!("lines.{i}.taxes"),
                "each line requires at least one tax block",
            ));
        }
    }
    if req.total_amount < Decimal::ZERO || req.total_without_taxes < Decimal::ZERO {
        errors.push(ValidationError::new("totals", "totals must not be negative"));
    }
    errors
}

/// Check a debit note request for missing or inconsistent fields.
pub fn validate_debit_note_request(req: &DebitNoteRequest) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    validate_header(&req.issuer_ruc, &req.issue_date, &req.buyer, &mut errors);

    if req.reasons.is_empty() {
        errors.push(ValidationError::new(
            "reasons",
            "at least one reason is required",
        ));
    }
    for (i, reason) in req.reasons.iter().enumerate() {
        if reason.reason.trim().is_empty() {
            errors.push(ValidationError::new(
                format!("reasons.{i}.reason"),
                "reason text must not be empty",
            ));
        }
    }
    if let Some(doc) = &req.modified_document {
        if parse_issue_date(&doc.issue_date).is_err() {
            errors.push(ValidationError::new(
                "modified_document.issue_date",
                "expected DD/MM/YYYY",
            ));
        }
    }
    errors
}

fn validate_header(
    ruc: &str,
    issue_date: &str,
    buyer: &BuyerRef,
    errors: &mut Vec<ValidationError>,
) {
    if ruc.len() != 13 || !ruc.bytes().all(|b| b.is_ascii_digit()) {
        errors.push(ValidationError::new(
            "issuer_ruc",
            "RUC must be 13 digits",
        ));
    }
    if parse_issue_date(issue_date).is_err() {
        errors.push(ValidationError::new("issue_date", "expected DD/MM/YYYY"));
    }
    if buyer.identification.trim().is_empty() {
        errors.push(ValidationError::new(
            "buyer.identification",
            "buyer identification must not be empty",
        ));
    }
    if buyer.identification_type.trim().is_empty() {
        errors.push(ValidationError::new(
            "buyer.identification_type",
            "identification type must not be empty",
        ));
    }
}
