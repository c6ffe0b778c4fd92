use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quick_xml::Reader;
use quick_xml::events::Event;
use rsa::RsaPublicKey;
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha1::{Digest, Sha1};

use super::error::SigningError;
use super::material::{SigningMaterial, public_key_from_certificate};
use crate::xml::c14n::{C14N_ALGORITHM, C14nOptions, DSIG_NS, Subset, canonicalize_with};
use crate::xml::writer::XmlWriter;

pub const RSA_SHA1_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
pub const SHA1_DIGEST_ALGORITHM: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
pub const ENVELOPED_TRANSFORM: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

/// Enveloped XMLDSig signer (C14N 1.0, SHA-1 digest, RSA-SHA1 signature).
#[derive(Debug)]
pub struct XmlSigner {
    material: SigningMaterial,
}

impl XmlSigner {
    pub fn new(material: SigningMaterial) -> Self {
        Self { material }
    }

    /// Parse PEM material and build a signer.
    pub fn from_pem(pem: &[u8], passphrase: Option<&str>) -> Result<Self, SigningError> {
        SigningMaterial::from_pem(pem, passphrase).map(Self::new)
    }

    /// Sign the document element, appending `ds:Signature` as its last child.
    ///
    /// The reference points at the root `id` attribute (`#comprobante` for SRI
    /// documents), or at the whole document when the root has no id.
    pub fn sign(&self, xml: &str) -> Result<String, SigningError> {
        let root = RootInfo::scan(xml)?;
        let reference_uri = root
            .id
            .as_ref()
            .map(|id| format!("#{id}"))
            .unwrap_or_default();

        let canonical = canonicalize_with(
            xml,
            &C14nOptions {
                subset: Subset::Document,
                exclude_signature: true,
            },
        )
        .map_err(|e| SigningError::Document(e.to_string()))?;
        let digest = STANDARD.encode(Sha1::digest(canonical.as_bytes()));
        let certificate = self.material.certificate_base64();

        // SignedInfo is canonicalized in its final position so that inherited
        // namespaces match what a verifier sees.
        let unsigned = splice(
            xml,
            root.close_at,
            &signature_element(&reference_uri, &digest, "", &certificate)?,
        );
        let signed_info = canonical_signed_info(&unsigned)?;

        let signing_key = SigningKey::<Sha1>::new(self.material.private_key().clone());
        let signature = signing_key
            .try_sign(signed_info.as_bytes())
            .map_err(|e| SigningError::Crypto(e.to_string()))?;
        let signature_value = STANDARD.encode(signature.to_bytes());

        Ok(splice(
            xml,
            root.close_at,
            &signature_element(&reference_uri, &digest, &signature_value, &certificate)?,
        ))
    }
}

/// Sign raw XML with a PEM bundle. See [`XmlSigner::sign`].
pub fn sign_xml(xml: &str, pem: &[u8], passphrase: Option<&str>) -> Result<String, SigningError> {
    XmlSigner::from_pem(pem, passphrase)?.sign(xml)
}

/// Check an enveloped signature: recompute the reference digest over the
/// document without its signature, then verify `SignatureValue` over the
/// canonical `SignedInfo` with `public_key`, or with the embedded
/// certificate when no key is given.
pub fn verify_signed_xml(
    signed_xml: &str,
    public_key: Option<&RsaPublicKey>,
) -> Result<(), SigningError> {
    let parts = SignatureParts::extract(signed_xml)?;

    let canonical = canonicalize_with(
        signed_xml,
        &C14nOptions {
            subset: Subset::Document,
            exclude_signature: true,
        },
    )
    .map_err(|e| SigningError::Verification(e.to_string()))?;
    let digest = STANDARD.encode(Sha1::digest(canonical.as_bytes()));
    if digest != parts.digest_value {
        return Err(SigningError::Verification(format!(
            "digest mismatch: computed {digest}, embedded {}",
            parts.digest_value
        )));
    }

    let embedded_key;
    let key = match public_key {
        Some(key) => key,
        None => {
            let der = STANDARD
                .decode(&parts.certificate)
                .map_err(|e| SigningError::InvalidCertificate(e.to_string()))?;
            embedded_key = public_key_from_certificate(&der)?;
            &embedded_key
        }
    };

    let signed_info = canonical_signed_info(signed_xml)?;
    let raw = STANDARD
        .decode(&parts.signature_value)
        .map_err(|e| SigningError::Verification(format!("signature value: {e}")))?;
    let signature = Signature::try_from(raw.as_slice())
        .map_err(|e| SigningError::Verification(e.to_string()))?;
    VerifyingKey::<Sha1>::new(key.clone())
        .verify(signed_info.as_bytes(), &signature)
        .map_err(|e| SigningError::Verification(e.to_string()))
}

fn canonical_signed_info(xml: &str) -> Result<String, SigningError> {
    canonicalize_with(
        xml,
        &C14nOptions {
            subset: Subset::Element {
                local_name: "SignedInfo",
                namespace: DSIG_NS,
            },
            exclude_signature: false,
        },
    )
    .map_err(|e| SigningError::Document(e.to_string()))
}

fn signature_element(
    reference_uri: &str,
    digest: &str,
    signature_value: &str,
    certificate: &str,
) -> Result<String, SigningError> {
    let xml_err = |e: crate::core::ComprobanteError| SigningError::Document(e.to_string());
    let mut w = XmlWriter::fragment();
    w.start_element_with_attrs("ds:Signature", &[("xmlns:ds", DSIG_NS)])
        .map_err(xml_err)?;
    w.start_element("ds:SignedInfo").map_err(xml_err)?;
    w.text_element_with_attrs("ds:CanonicalizationMethod", "", &[("Algorithm", C14N_ALGORITHM)])
        .map_err(xml_err)?;
    w.text_element_with_attrs("ds:SignatureMethod", "", &[("Algorithm", RSA_SHA1_ALGORITHM)])
        .map_err(xml_err)?;
    w.start_element_with_attrs("ds:Reference", &[("URI", reference_uri)])
        .map_err(xml_err)?;
    w.start_element("ds:Transforms").map_err(xml_err)?;
    w.text_element_with_attrs("ds:Transform", "", &[("Algorithm", ENVELOPED_TRANSFORM)])
        .map_err(xml_err)?;
    w.end_element("ds:Transforms").map_err(xml_err)?;
    w.text_element_with_attrs("ds:DigestMethod", "", &[("Algorithm", SHA1_DIGEST_ALGORITHM)])
        .map_err(xml_err)?;
    w.text_element("ds:DigestValue", digest).map_err(xml_err)?;
    w.end_element("ds:Reference").map_err(xml_err)?;
    w.end_element("ds:SignedInfo").map_err(xml_err)?;
    w.text_element("ds:SignatureValue", signature_value)
        .map_err(xml_err)?;
    w.start_element("ds:KeyInfo").map_err(xml_err)?;
    w.start_element("ds:X509Data").map_err(xml_err)?;
    w.text_element("ds:X509Certificate", certificate)
        .map_err(xml_err)?;
    w.end_element("ds:X509Data").map_err(xml_err)?;
    w.end_element("ds:KeyInfo").map_err(xml_err)?;
    w.end_element("ds:Signature").map_err(xml_err)?;
    w.into_string().map_err(xml_err)
}

fn splice(xml: &str, at: usize, fragment: &str) -> String {
    let mut out = String::with_capacity(xml.len() + fragment.len());
    out.push_str(&xml[..at]);
    out.push_str(fragment);
    out.push_str(&xml[at..]);
    out
}

/// Root element facts needed for signing.
struct RootInfo {
    id: Option<String>,
    /// Byte offset of the root's closing tag.
    close_at: usize,
}

impl RootInfo {
    fn scan(xml: &str) -> Result<Self, SigningError> {
        let mut reader = Reader::from_str(xml);
        let mut depth = 0usize;
        let mut id = None;
        let mut qname = None;
        loop {
            match reader
                .read_event()
                .map_err(|e| SigningError::Document(e.to_string()))?
            {
                Event::Start(e) => {
                    if depth == 0 {
                        qname = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                        for attr in e.attributes().flatten() {
                            let key = attr.key.as_ref();
                            if key == b"id" || key == b"Id" || key == b"ID" {
                                id = Some(String::from_utf8_lossy(&attr.value).into_owned());
                            }
                        }
                    }
                    depth += 1;
                }
                Event::End(_) => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        break;
                    }
                }
                Event::Empty(_) if depth == 0 => {
                    return Err(SigningError::Document("document element is empty".into()));
                }
                Event::Eof => {
                    let detail = match qname {
                        Some(name) => format!("<{name}> is never closed"),
                        None => "no document element".into(),
                    };
                    return Err(SigningError::Document(detail));
                }
                _ => {}
            }
        }
        let qname = qname.unwrap_or_default();
        let close_at = xml
            .rfind(&format!("</{qname}"))
            .ok_or_else(|| SigningError::Document(format!("no closing tag for <{qname}>")))?;
        Ok(Self { id, close_at })
    }
}

/// Values read back from an embedded `ds:Signature`.
struct SignatureParts {
    digest_value: String,
    signature_value: String,
    certificate: String,
}

impl SignatureParts {
    fn extract(xml: &str) -> Result<Self, SigningError> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);
        let mut current: Option<&'static str> = None;
        let mut digest_value = None;
        let mut signature_value = None;
        let mut certificate = None;
        loop {
            match reader
                .read_event()
                .map_err(|e| SigningError::Verification(e.to_string()))?
            {
                Event::Start(e) => {
                    current = match e.local_name().as_ref() {
                        b"DigestValue" => Some("digest"),
                        b"SignatureValue" => Some("signature"),
                        b"X509Certificate" => Some("certificate"),
                        _ => None,
                    };
                }
                Event::Text(t) => {
                    let text = t
                        .unescape()
                        .map_err(|e| SigningError::Verification(e.to_string()))?
                        .split_whitespace()
                        .collect::<String>();
                    match current {
                        Some("digest") if digest_value.is_none() => digest_value = Some(text),
                        Some("signature") if signature_value.is_none() => {
                            signature_value = Some(text)
                        }
                        Some("certificate") if certificate.is_none() => certificate = Some(text),
                        _ => {}
                    }
                }
                Event::End(_) => current = None,
                Event::Eof => break,
                _ => {}
            }
        }
        let missing = |what: &str| SigningError::Verification(format!("no {what} in document"));
        Ok(Self {
            digest_value: digest_value.ok_or_else(|| missing("DigestValue"))?,
            signature_value: signature_value.ok_or_else(|| missing("SignatureValue"))?,
            certificate: certificate.ok_or_else(|| missing("X509Certificate"))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_close_offset_points_at_end_tag() {
        let xml = "<?xml version=\"1.0\"?>\n<factura id=\"comprobante\">\n  <a>1</a>\n</factura>";
        let root = RootInfo::scan(xml).unwrap();
        assert_eq!(root.id.as_deref(), Some("comprobante"));
        assert_eq!(&xml[root.close_at..], "</factura>");
    }

    #[test]
    fn splice_inserts_before_closing_tag() {
        let xml = "<r><a/></r>";
        let root = RootInfo::scan(xml).unwrap();
        assert_eq!(splice(xml, root.close_at, "<s/>"), "<r><a/><s/></r>");
        assert!(root.id.is_none());
    }

    #[test]
    fn unclosed_root_is_rejected() {
        assert!(RootInfo::scan("<r><a></a>").is_err());
    }

    #[test]
    fn signature_element_layout() {
        let sig = signature_element("#comprobante", "DIGEST", "", "CERT").unwrap();
        assert!(sig.starts_with(
            "<ds:Signature xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\"><ds:SignedInfo>"
        ));
        assert!(sig.contains("<ds:Reference URI=\"#comprobante\">"));
        assert!(sig.contains("<ds:DigestValue>DIGEST</ds:DigestValue>"));
        assert!(sig.ends_with("</ds:X509Data></ds:KeyInfo></ds:Signature>"));
    }
}
