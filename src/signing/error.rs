use thiserror::Error;

/// Every way signing (or verifying) a document can fail.
///
/// The signer never falls back to returning unsigned XML.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SigningError {
    /// The PEM bundle contains no `CERTIFICATE` block.
    #[error("no certificate found in PEM bundle")]
    CertificateNotFound,

    /// The PEM bundle contains no usable private key block.
    #[error("no private key found in PEM bundle")]
    PrivateKeyNotFound,

    /// The certificate block is present but cannot be decoded.
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// The key block is present but cannot be decoded or does not match the certificate.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The key is encrypted and no passphrase was supplied.
    #[error("private key is encrypted and no passphrase was supplied")]
    PassphraseRequired,

    /// The document could not be canonicalized or spliced.
    #[error("cannot prepare document for signing: {0}")]
    Document(String),

    /// RSA or digest failure.
    #[error("signature computation failed: {0}")]
    Crypto(String),

    /// The certificate file could not be read.
    #[error("cannot read certificate material: {0}")]
    Io(String),

    /// A signed document did not verify.
    #[error("signature verification failed: {0}")]
    Verification(String),
}
