use rust_decimal::Decimal;

use super::error::{ComprobanteError, join_errors};
use super::request::*;
use super::types::*;

/// Builder for invoice requests.
///
/// ```
/// use comprobantes::core::*;
/// use rust_decimal_macros::dec;
///
/// let request = InvoiceRequestBuilder::new("0106079783001", "17/05/2025")
///     .buyer("05", "0102030405")
///     .add_line(LineItemBuilder::new("P001", dec!(2), dec!(10.00))
///         .vat("4", dec!(15))
///         .build())
///     .build()
///     .unwrap();
/// assert_eq!(request.total_amount, dec!(23.00));
/// ```
pub struct InvoiceRequestBuilder {
    issuer_ruc: String,
    issue_date: String,
    buyer: Option<BuyerRef>,
    total_discount: Decimal,
    tip: Decimal,
    currency: String,
    lines: Vec<LineItem>,
    payments: Vec<Payment>,
    additional_info: Vec<AdditionalField>,
}

impl InvoiceRequestBuilder {
    pub fn new(issuer_ruc: impl Into<String>, issue_date: impl Into<String>) -> Self {
        Self {
            issuer_ruc: issuer_ruc.into(),
            issue_date: issue_date.into(),
            buyer: None,
            total_discount: zero_amount(),
            tip: zero_amount(),
            currency: "DOLAR".to_string(),
            lines: Vec::new(),
            payments: Vec::new(),
            additional_info: Vec::new(),
        }
    }

    pub fn buyer(
        mut self,
        identification_type: impl Into<String>,
        identification: impl Into<String>,
    ) -> Self {
        self.buyer = Some(BuyerRef {
            identification_type: identification_type.into(),
            identification: identification.into(),
        });
        self
    }

    pub fn add_line(mut self, line: LineItem) -> Self {
        self.lines.push(line);
        self
    }

    pub fn tip(mut self, tip: Decimal) -> Self {
        self.tip = tip;
        self
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn add_payment(mut self, method: impl Into<String>, total: Decimal) -> Self {
        self.payments.push(Payment {
            method: method.into(),
            total,
            term: None,
            time_unit: None,
        });
        self
    }

    pub fn additional(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_info.push(AdditionalField::new(name, value));
        self
    }

    /// Build the request, deriving totals from the lines and validating it.
    pub fn build(self) -> Result<InvoiceRequest, ComprobanteError> {
        let buyer = self
            .buyer
            .ok_or_else(|| ComprobanteError::InvalidDocumentData("buyer is required".into()))?;

        let total_without_taxes: Decimal = self.lines.iter().map(|l| l.total_without_tax).sum();
        let total_discount: Decimal =
            self.total_discount + self.lines.iter().map(|l| l.discount).sum::<Decimal>();
        let tax: Decimal = tax_totals(&self.lines).iter().map(|t| t.amount).sum();

        let request = InvoiceRequest {
            issuer_ruc: self.issuer_ruc,
            issue_date: self.issue_date,
            buyer,
            total_without_taxes,
            total_discount,
            tip: self.tip,
            total_amount: (total_without_taxes + tax.round_dp(2) + self.tip).round_dp(2),
            currency: self.currency,
            lines: self.lines,
            payments: self.payments,
            additional_info: self.additional_info,
        };

        let errors = validate_invoice_request(&request);
        if !errors.is_empty() {
            return Err(ComprobanteError::InvalidDocumentData(join_errors(&errors)));
        }
        Ok(request)
    }
}

/// Builder for invoice lines.
pub struct LineItemBuilder {
    main_code: String,
    auxiliary_code: Option<String>,
    description: Option<String>,
    quantity: Decimal,
    unit_price: Decimal,
    discount: Decimal,
    taxes: Vec<LineTax>,
}

impl LineItemBuilder {
    pub fn new(main_code: impl Into<String>, quantity: Decimal, unit_price: Decimal) -> Self {
        Self {
            main_code: main_code.into(),
            auxiliary_code: None,
            description: None,
            quantity,
            unit_price,
            discount: zero_amount(),
            taxes: Vec::new(),
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn auxiliary_code(mut self, code: impl Into<String>) -> Self {
        self.auxiliary_code = Some(code.into());
        self
    }

    pub fn discount(mut self, discount: Decimal) -> Self {
        self.discount = discount;
        self
    }

    fn net(&self) -> Decimal {
        (self.quantity * self.unit_price - self.discount).round_dp(2)
    }

    /// Add IVA (tax code 2) with the given percentage code and rate,
    /// computing base and amount from the line net.
    pub fn vat(mut self, percentage_code: impl Into<String>, rate: Decimal) -> Self {
        let base = self.net();
        self.taxes.push(LineTax {
            code: "2".into(),
            percentage_code: percentage_code.into(),
            rate,
            taxable_base: base,
            amount: (base * rate / Decimal::ONE_HUNDRED).round_dp(2),
        });
        self
    }

    /// Add an explicit tax block.
    pub fn tax(mut self, tax: LineTax) -> Self {
        self.taxes.push(tax);
        self
    }

    pub fn build(self) -> LineItem {
        let total_without_tax = self.net();
        LineItem {
            main_code: self.main_code,
            auxiliary_code: self.auxiliary_code,
            description: self.description,
            quantity: self.quantity,
            unit_price: self.unit_price,
            discount: self.discount,
            total_without_tax,
            taxes: self.taxes,
        }
    }
}

/// Builder for debit note requests.
pub struct DebitNoteRequestBuilder {
    issuer_ruc: String,
    issue_date: String,
    buyer: Option<BuyerRef>,
    modified_document: Option<ModifiedDocument>,
    taxes: Vec<LineTax>,
    reasons: Vec<DebitReason>,
    additional_info: Vec<AdditionalField>,
}

impl DebitNoteRequestBuilder {
    pub fn new(issuer_ruc: impl Into<String>, issue_date: impl Into<String>) -> Self {
        Self {
            issuer_ruc: issuer_ruc.into(),
            issue_date: issue_date.into(),
            buyer: None,
            modified_document: None,
            taxes: Vec::new(),
            reasons: Vec::new(),
            additional_info: Vec::new(),
        }
    }

    pub fn buyer(
        mut self,
        identification_type: impl Into<String>,
        identification: impl Into<String>,
    ) -> Self {
        self.buyer = Some(BuyerRef {
            identification_type: identification_type.into(),
            identification: identification.into(),
        });
        self
    }

    pub fn modifies(
        mut self,
        document_type: DocumentType,
        number: impl Into<String>,
        issue_date: impl Into<String>,
    ) -> Self {
        self.modified_document = Some(ModifiedDocument {
            document_type,
            number: number.into(),
            issue_date: issue_date.into(),
        });
        self
    }

    pub fn add_reason(mut self, reason: impl Into<String>, value: Decimal) -> Self {
        self.reasons.push(DebitReason {
            reason: reason.into(),
            value,
        });
        self
    }

    /// Apply IVA over the sum of the reasons.
    pub fn vat(mut self, percentage_code: impl Into<String>, rate: Decimal) -> Self {
        let base: Decimal = self.reasons.iter().map(|r| r.value).sum();
        self.taxes.push(LineTax {
            code: "2".into(),
            percentage_code: percentage_code.into(),
            rate,
            taxable_base: base,
            amount: (base * rate / Decimal::ONE_HUNDRED).round_dp(2),
        });
        self
    }

    pub fn additional(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.additional_info.push(AdditionalField::new(name, value));
        self
    }

    pub fn build(self) -> Result<DebitNoteRequest, ComprobanteError> {
        let buyer = self
            .buyer
            .ok_or_else(|| ComprobanteError::InvalidDocumentData("buyer is required".into()))?;
        let total_without_taxes: Decimal = self.reasons.iter().map(|r| r.value).sum();
        let tax: Decimal = self.taxes.iter().map(|t| t.amount).sum();

        let request = DebitNoteRequest {
            issuer_ruc: self.issuer_ruc,
            issue_date: self.issue_date,
            buyer,
            modified_document: self.modified_document,
            total_without_taxes,
            taxes: self.taxes,
            total_value: (total_without_taxes + tax).round_dp(2),
            reasons: self.reasons,
            additional_info: self.additional_info,
        };

        let errors = validate_debit_note_request(&request);
        if !errors.is_empty() {
            return Err(ComprobanteError::InvalidDocumentData(join_errors(&errors)));
        }
        Ok(request)
    }
}
