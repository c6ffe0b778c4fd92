use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tax authority environment (ambiente).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    /// 1: Pruebas.
    Test,
    /// 2: Producción.
    Production,
}

impl Environment {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Test => "1",
            Self::Production => "2",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Test),
            "2" => Some(Self::Production),
            _ => None,
        }
    }
}

/// Emission type (tipoEmision). Only normal emission is in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmissionType {
    /// 1: Emisión normal.
    Normal,
}

impl EmissionType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Normal => "1",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "1" => Some(Self::Normal),
            _ => None,
        }
    }
}

/// Document type code (codDoc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// 01: Factura.
    Invoice,
    /// 05: Nota de débito.
    DebitNote,
}

impl DocumentType {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Invoice => "01",
            Self::DebitNote => "05",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(Self::Invoice),
            "05" => Some(Self::DebitNote),
            _ => None,
        }
    }

    /// Name of the XML root element.
    pub fn root_element(&self) -> &'static str {
        match self {
            Self::Invoice => "factura",
            Self::DebitNote => "notaDebito",
        }
    }
}

/// The legal entity emitting documents. Read-only to the lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuingCompany {
    pub id: String,
    /// 13-digit RUC.
    pub ruc: String,
    /// Establishment code, 3 digits (estab).
    pub establishment: String,
    /// Emission point, 3 digits (ptoEmi).
    pub emission_point: String,
    pub environment: Environment,
    pub emission_type: EmissionType,
    pub legal_name: String,
    pub trade_name: Option<String>,
    /// dirMatriz.
    pub head_office_address: Option<String>,
    /// dirEstablecimiento.
    pub establishment_address: Option<String>,
    /// General address, used when the specific ones are absent.
    pub address: Option<String>,
    /// obligadoContabilidad.
    pub keeps_accounting: bool,
}

impl IssuingCompany {
    /// Establishment + emission point, e.g. "001001".
    pub fn series(&self) -> String {
        format!("{}{}", self.establishment, self.emission_point)
    }
}

/// Buyer / recipient of a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    /// Identification-type code (e.g. "04" RUC, "05" cédula).
    pub identification_type: String,
    pub identification: String,
    pub legal_name: String,
    pub address: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// Buyer identification type catalogue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentificationType {
    pub code: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub code: String,
    pub description: String,
    pub unit_price: Decimal,
    pub has_vat: bool,
    pub extra_description: Option<String>,
}

/// One tax applied to a line or to a debit note (impuesto).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineTax {
    /// codigo (2 = IVA).
    pub code: String,
    /// codigoPorcentaje.
    pub percentage_code: String,
    /// tarifa.
    pub rate: Decimal,
    /// baseImponible.
    pub taxable_base: Decimal,
    /// valor.
    pub amount: Decimal,
}

/// Invoice detail line. Order is preserved in the rendered XML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// codigoPrincipal, resolves the product.
    pub main_code: String,
    pub auxiliary_code: Option<String>,
    /// Falls back to the product description when absent.
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default = "super::request::zero_amount")]
    pub discount: Decimal,
    /// precioTotalSinImpuesto.
    pub total_without_tax: Decimal,
    pub taxes: Vec<LineTax>,
}

/// Free-form campoAdicional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalField {
    pub name: String,
    pub value: String,
}

impl AdditionalField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Payment entry (pago).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    /// formaPago code, e.g. "01" (cash) or "20" (financial system).
    pub method: String,
    pub total: Decimal,
    pub term: Option<u32>,
    pub time_unit: Option<String>,
}

/// Document referenced by a debit note.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModifiedDocument {
    pub document_type: DocumentType,
    /// Number as "001-001-000000123".
    pub number: String,
    /// DD/MM/YYYY.
    pub issue_date: String,
}

/// Debit note reason (motivo).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebitReason {
    pub reason: String,
    pub value: Decimal,
}

/// Message returned by the tax authority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorityMessage {
    pub identifier: String,
    pub message: String,
    pub kind: MessageKind,
    pub extra_info: Option<String>,
}

/// Severity of an authority message (tipo).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Error,
    Warning,
    Info,
    Other(String),
}

impl MessageKind {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "ERROR" => Self::Error,
            "ADVERTENCIA" | "WARNING" => Self::Warning,
            "" | "INFO" | "INFORMATIVO" => Self::Info,
            _ => Self::Other(s.trim().to_string()),
        }
    }
}

/// Monetary totals stored on a document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}
