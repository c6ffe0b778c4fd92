//! # comprobantes
//!
//! Electronic invoices and debit notes for Ecuador's tax authority (SRI),
//! covering the full issuing lifecycle: access keys, per-company sequences,
//! XML rendering, XMLDSig signing and SOAP submission.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use comprobantes::core::*;
//!
//! let key = AccessKeyBuilder::new(
//!     NaiveDate::from_ymd_opt(2025, 5, 17).unwrap(),
//!     DocumentType::Invoice,
//!     "0106079783001",
//! )
//! .environment(Environment::Test)
//! .series("001001")
//! .sequence(Sequence::FIRST)
//! .numeric_code("12345678")
//! .build()
//! .unwrap();
//!
//! assert_eq!(key.as_str(), "1705202501010607978300110010010000000011234567815");
//! assert_eq!(key.check_digit(), check_digit(&key.as_str()[..48]).unwrap());
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document types, check digit, access key, sequences, request validation |
//! | `xml` | `factura` / `notaDebito` rendering, inclusive C14N |
//! | `signing` | PEM certificate bundles, enveloped RSA-SHA1 XMLDSig |
//! | `sri` | SOAP reception client with SOAPAction probing |
//! | `lifecycle` | Sequence allocation and the issuing state machine |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "xml")]
pub mod xml;

#[cfg(feature = "signing")]
pub mod signing;

#[cfg(feature = "sri")]
pub mod sri;

#[cfg(feature = "lifecycle")]
pub mod lifecycle;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
