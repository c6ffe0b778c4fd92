#![cfg(feature = "signing")]

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use comprobantes::signing::{
    CertificateBundle, SigningError, SigningMaterial, XmlSigner, sign_xml, verify_signed_xml,
};
use comprobantes::xml::{C14nOptions, Subset, canonicalize_with};
use sha1::{Digest, Sha1};

const PKCS1: &[u8] = include_bytes!("fixtures/bundle_pkcs1.pem");
const PKCS8: &[u8] = include_bytes!("fixtures/bundle_pkcs8.pem");
const ENCRYPTED: &[u8] = include_bytes!("fixtures/bundle_encrypted.pem");
const CERT_ONLY: &[u8] = include_bytes!("fixtures/cert_only.pem");
const OTHER_KEY: &[u8] = include_bytes!("fixtures/other_key.pem");
const PASSPHRASE: &str = "clave-firma";

const DOCUMENT: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>
<factura id=\"comprobante\" version=\"1.0.0\">
  <infoTributaria>
    <ambiente>1</ambiente>
    <razonSocial>Comercial Andina S.A.</razonSocial>
    <claveAcceso>1705202501010607978300110010010000000011234567815</claveAcceso>
  </infoTributaria>
  <detalles>
    <detalle>
      <descripcion>Café &amp; azúcar</descripcion>
      <precioTotalSinImpuesto>20.00</precioTotalSinImpuesto>
    </detalle>
  </detalles>
</factura>";

fn text_of<'a>(xml: &'a str, element: &str) -> &'a str {
    let open = format!("<{element}>");
    let close = format!("</{element}>");
    let start = xml.find(&open).expect("element present") + open.len();
    let end = xml[start..].find(&close).expect("element closed") + start;
    &xml[start..end]
}

// --- Material ---

#[test]
fn loads_pkcs1_and_pkcs8_keys() {
    let a = SigningMaterial::from_pem(PKCS1, None).unwrap();
    let b = SigningMaterial::from_pem(PKCS8, None).unwrap();
    assert_eq!(a.public_key(), b.public_key());
    assert_eq!(a.certificate_base64(), b.certificate_base64());
}

#[test]
fn encrypted_key_needs_passphrase() {
    assert!(matches!(
        SigningMaterial::from_pem(ENCRYPTED, None),
        Err(SigningError::PassphraseRequired)
    ));
    assert!(matches!(
        SigningMaterial::from_pem(ENCRYPTED, Some("")),
        Err(SigningError::PassphraseRequired)
    ));
    assert!(matches!(
        SigningMaterial::from_pem(ENCRYPTED, Some("incorrecta")),
        Err(SigningError::InvalidPrivateKey(_))
    ));
    let material = SigningMaterial::from_pem(ENCRYPTED, Some(PASSPHRASE)).unwrap();
    let plain = SigningMaterial::from_pem(PKCS1, None).unwrap();
    assert_eq!(material.public_key(), plain.public_key());
}

#[test]
fn certificate_only_bundle_has_no_key() {
    assert!(matches!(
        SigningMaterial::from_pem(CERT_ONLY, None),
        Err(SigningError::PrivateKeyNotFound)
    ));
}

#[test]
fn key_only_bundle_has_no_certificate() {
    assert!(matches!(
        SigningMaterial::from_pem(OTHER_KEY, None),
        Err(SigningError::CertificateNotFound)
    ));
}

#[test]
fn key_must_match_certificate() {
    let mut mixed = CERT_ONLY.to_vec();
    mixed.extend_from_slice(OTHER_KEY);
    assert!(matches!(
        SigningMaterial::from_pem(&mixed, None),
        Err(SigningError::InvalidPrivateKey(_))
    ));
}

#[test]
fn garbage_certificate_is_invalid() {
    let pem = b"-----BEGIN CERTIFICATE-----\nAAECAwQ=\n-----END CERTIFICATE-----\n";
    assert!(matches!(
        SigningMaterial::from_pem(pem, None),
        Err(SigningError::InvalidCertificate(_))
    ));
}

#[tokio::test]
async fn bundle_from_path() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bundle_encrypted.pem");
    let bundle = CertificateBundle::from_path(path, Some(PASSPHRASE.into()))
        .await
        .unwrap();
    assert!(bundle.material().is_ok());

    let missing = CertificateBundle::from_path("/nonexistent/firma.pem", None).await;
    assert!(matches!(missing, Err(SigningError::Io(_))));
}

// --- Signing ---

#[test]
fn certificate_without_key_fails() {
    let err = sign_xml(DOCUMENT, CERT_ONLY, None).unwrap_err();
    assert!(matches!(err, SigningError::PrivateKeyNotFound));
}

#[test]
fn signature_is_enveloped_in_root() {
    let signed = sign_xml(DOCUMENT, PKCS1, None).unwrap();
    let before_signature = signed
        .find("<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\">")
        .unwrap();
    assert_eq!(&signed[..before_signature], &DOCUMENT[..before_signature]);
    assert!(signed.ends_with("</ds:Signature></factura>"));
    assert!(signed.contains("<ds:Reference URI=\"#comprobante\">"));
    assert!(signed.contains(
        "<ds:SignatureMethod Algorithm=\"http://www.w3.org/2000/09/xmldsig#rsa-sha1\"></ds:SignatureMethod>"
    ));
    assert!(signed.contains(
        "<ds:Transform Algorithm=\"http://www.w3.org/2000/09/xmldsig#enveloped-signature\"></ds:Transform>"
    ));

    let material = SigningMaterial::from_pem(PKCS1, None).unwrap();
    assert_eq!(
        text_of(&signed, "ds:X509Certificate"),
        material.certificate_base64()
    );
}

#[test]
fn digest_matches_canonical_document() {
    let signed = sign_xml(DOCUMENT, PKCS8, None).unwrap();
    let canonical = canonicalize_with(
        &signed,
        &C14nOptions {
            subset: Subset::Document,
            exclude_signature: true,
        },
    )
    .unwrap();
    assert!(!canonical.contains("Signature"));
    let digest = STANDARD.encode(Sha1::digest(canonical.as_bytes()));
    assert_eq!(text_of(&signed, "ds:DigestValue"), digest);
}

#[test]
fn sign_then_verify_round_trip() {
    let signer = XmlSigner::from_pem(PKCS1, None).unwrap();
    let signed = signer.sign(DOCUMENT).unwrap();
    verify_signed_xml(&signed, None).unwrap();

    let material = SigningMaterial::from_pem(PKCS1, None).unwrap();
    verify_signed_xml(&signed, Some(&material.public_key())).unwrap();
}

#[test]
fn signature_value_is_deterministic() {
    // PKCS#1 v1.5 signatures carry no randomness.
    let a = sign_xml(DOCUMENT, PKCS1, None).unwrap();
    let b = sign_xml(DOCUMENT, PKCS8, None).unwrap();
    assert_eq!(a, b);
    let raw = STANDARD.decode(text_of(&a, "ds:SignatureValue")).unwrap();
    assert_eq!(raw.len(), 256);
}

#[test]
fn tampered_document_fails_verification() {
    let signed = sign_xml(DOCUMENT, PKCS1, None).unwrap();
    let tampered = signed.replace("20.00", "2.00");
    assert!(matches!(
        verify_signed_xml(&tampered, None),
        Err(SigningError::Verification(_))
    ));
}

#[test]
fn tampered_signed_info_fails_verification() {
    let signed = sign_xml(DOCUMENT, PKCS1, None).unwrap();
    let tampered = signed.replace("URI=\"#comprobante\"", "URI=\"\"");
    assert!(verify_signed_xml(&tampered, None).is_err());
}

#[test]
fn unsigned_document_fails_verification() {
    assert!(matches!(
        verify_signed_xml(DOCUMENT, None),
        Err(SigningError::Verification(_))
    ));
}

#[test]
fn malformed_document_is_not_signed() {
    let err = sign_xml("<factura id=\"comprobante\"><a></factura>", PKCS1, None).unwrap_err();
    assert!(matches!(err, SigningError::Document(_)));
}
