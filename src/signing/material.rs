use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use x509_cert::Certificate;
use x509_cert::der::{Decode, Encode};

use super::error::SigningError;

const CERTIFICATE_TAG: &str = "CERTIFICATE";
const RSA_KEY_TAG: &str = "RSA PRIVATE KEY";
const PKCS8_KEY_TAG: &str = "PRIVATE KEY";
const ENCRYPTED_KEY_TAG: &str = "ENCRYPTED PRIVATE KEY";

/// Raw certificate material of an issuer: PEM bytes plus optional passphrase.
#[derive(Clone, Serialize, Deserialize)]
pub struct CertificateBundle {
    pub pem: Vec<u8>,
    pub passphrase: Option<String>,
}

impl std::fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("pem_len", &self.pem.len())
            .field("passphrase", &self.passphrase.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl CertificateBundle {
    pub fn new(pem: impl Into<Vec<u8>>, passphrase: Option<String>) -> Self {
        Self {
            pem: pem.into(),
            passphrase,
        }
    }

    /// Read PEM material from disk. Callers check that the path exists first.
    pub async fn from_path(
        path: impl AsRef<Path>,
        passphrase: Option<String>,
    ) -> Result<Self, SigningError> {
        let path = path.as_ref();
        let pem = tokio::fs::read(path)
            .await
            .map_err(|e| SigningError::Io(format!("{}: {e}", path.display())))?;
        Ok(Self { pem, passphrase })
    }

    /// Decode certificate and key from the bundle.
    pub fn material(&self) -> Result<SigningMaterial, SigningError> {
        SigningMaterial::from_pem(&self.pem, self.passphrase.as_deref())
    }
}

/// Decoded certificate and private key, ready for signing.
pub struct SigningMaterial {
    certificate_der: Vec<u8>,
    private_key: RsaPrivateKey,
}

impl std::fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("certificate_len", &self.certificate_der.len())
            .finish_non_exhaustive()
    }
}

impl SigningMaterial {
    /// Extract the certificate and, in priority order, an `RSA PRIVATE KEY`,
    /// a `PRIVATE KEY` or an `ENCRYPTED PRIVATE KEY` block from PEM text.
    ///
    /// The passphrase is only consulted for encrypted PKCS#8 keys.
    pub fn from_pem(pem: &[u8], passphrase: Option<&str>) -> Result<Self, SigningError> {
        let text = std::str::from_utf8(pem)
            .map_err(|e| SigningError::InvalidCertificate(format!("PEM is not UTF-8: {e}")))?;

        let certificate_der = find_block(text, CERTIFICATE_TAG)
            .ok_or(SigningError::CertificateNotFound)?
            .map_err(SigningError::InvalidCertificate)?;
        let certificate = Certificate::from_der(&certificate_der)
            .map_err(|e| SigningError::InvalidCertificate(e.to_string()))?;

        let private_key = if let Some(der) = find_block(text, RSA_KEY_TAG) {
            let der = der.map_err(SigningError::InvalidPrivateKey)?;
            RsaPrivateKey::from_pkcs1_der(&der)
                .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?
        } else if let Some(der) = find_block(text, PKCS8_KEY_TAG) {
            let der = der.map_err(SigningError::InvalidPrivateKey)?;
            RsaPrivateKey::from_pkcs8_der(&der)
                .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?
        } else if let Some(der) = find_block(text, ENCRYPTED_KEY_TAG) {
            let der = der.map_err(SigningError::InvalidPrivateKey)?;
            let passphrase = passphrase
                .filter(|p| !p.is_empty())
                .ok_or(SigningError::PassphraseRequired)?;
            RsaPrivateKey::from_pkcs8_encrypted_der(&der, passphrase)
                .map_err(|e| SigningError::InvalidPrivateKey(e.to_string()))?
        } else {
            return Err(SigningError::PrivateKeyNotFound);
        };

        let certificate_key = certificate_public_key(&certificate)?;
        if RsaPublicKey::from(&private_key) != certificate_key {
            return Err(SigningError::InvalidPrivateKey(
                "private key does not match certificate".into(),
            ));
        }

        Ok(Self {
            certificate_der,
            private_key,
        })
    }

    pub fn private_key(&self) -> &RsaPrivateKey {
        &self.private_key
    }

    pub fn public_key(&self) -> RsaPublicKey {
        RsaPublicKey::from(&self.private_key)
    }

    /// Certificate DER, base64 on one line, as embedded in `X509Certificate`.
    pub fn certificate_base64(&self) -> String {
        STANDARD.encode(&self.certificate_der)
    }
}

/// Public key of a DER certificate.
pub fn public_key_from_certificate(der: &[u8]) -> Result<RsaPublicKey, SigningError> {
    let certificate =
        Certificate::from_der(der).map_err(|e| SigningError::InvalidCertificate(e.to_string()))?;
    certificate_public_key(&certificate)
}

fn certificate_public_key(certificate: &Certificate) -> Result<RsaPublicKey, SigningError> {
    let spki = certificate
        .tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| SigningError::InvalidCertificate(e.to_string()))?;
    RsaPublicKey::from_public_key_der(&spki)
        .map_err(|e| SigningError::InvalidCertificate(format!("not an RSA certificate: {e}")))
}

/// Locate `-----BEGIN {tag}-----` .. `-----END {tag}-----` and decode it.
///
/// `None` when the block is absent; `Some(Err)` when present but malformed.
fn find_block(text: &str, tag: &str) -> Option<Result<Vec<u8>, String>> {
    let begin = format!("-----BEGIN {tag}-----");
    let end = format!("-----END {tag}-----");
    let start = text.find(&begin)?;
    let Some(stop) = text[start..].find(&end) else {
        return Some(Err(format!("unterminated {tag} block")));
    };
    let block = &text[start..start + stop + end.len()];
    Some(
        pem::parse(block)
            .map(|p| p.contents().to_vec())
            .map_err(|e| e.to_string()),
    )
}
