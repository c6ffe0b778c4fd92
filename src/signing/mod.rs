//! Enveloped XML digital signatures for SRI documents.
//!
//! The authority still requires the legacy profile: inclusive C14N 1.0,
//! SHA-1 reference digest and RSA-SHA1 signature, with the signer's X.509
//! certificate embedded in `KeyInfo`.
//!
//! ```no_run
//! use comprobantes::signing::{CertificateBundle, XmlSigner, verify_signed_xml};
//!
//! # async fn run(xml: &str) -> Result<(), comprobantes::signing::SigningError> {
//! let bundle = CertificateBundle::from_path("firma.pem", Some("clave".into())).await?;
//! let signer = XmlSigner::new(bundle.material()?);
//! let signed = signer.sign(xml)?;
//! verify_signed_xml(&signed, None)?;
//! # Ok(())
//! # }
//! ```

mod error;
mod material;
mod signer;

pub use error::SigningError;
pub use material::{CertificateBundle, SigningMaterial, public_key_from_certificate};
pub use signer::{
    ENVELOPED_TRANSFORM, RSA_SHA1_ALGORITHM, SHA1_DIGEST_ALGORITHM, XmlSigner, sign_xml,
    verify_signed_xml,
};
