//! Inclusive Canonical XML 1.0 without comments
//! (`http://www.w3.org/TR/2001/REC-xml-c14n-20010315`).
//!
//! Supports whole documents and single-element subsets. The
//! enveloped-signature transform is available as an option that drops every
//! `Signature` element in the XMLDSig namespace.

use std::collections::BTreeMap;

use quick_xml::Reader;
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};

use crate::core::ComprobanteError;

pub const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Which part of the input to canonicalize.
#[derive(Debug, Clone, Copy, Default)]
pub enum Subset<'a> {
    /// The document element and everything below it.
    #[default]
    Document,
    /// The first element with this local name in this namespace URI.
    Element {
        local_name: &'a str,
        namespace: &'a str,
    },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct C14nOptions<'a> {
    pub subset: Subset<'a>,
    /// Apply the enveloped-signature transform.
    pub exclude_signature: bool,
}

struct Frame {
    qname: String,
    scope: BTreeMap<String, String>,
    rendered: BTreeMap<String, String>,
    emit: bool,
    apex: bool,
}

fn c14n_err(e: impl std::fmt::Display) -> ComprobanteError {
    ComprobanteError::Xml(format!("canonicalization failed: {e}"))
}

/// Canonicalize a whole document.
pub fn canonicalize(xml: &str) -> Result<String, ComprobanteError> {
    canonicalize_with(xml, &C14nOptions::default())
}

pub fn canonicalize_with(xml: &str, opts: &C14nOptions<'_>) -> Result<String, ComprobanteError> {
    let normalized = xml.replace("\r\n", "\n").replace('\r', "\n");
    let mut reader = Reader::from_str(&normalized);
    reader.config_mut().expand_empty_elements = true;

    let mut out = String::with_capacity(normalized.len());
    let mut stack: Vec<Frame> = Vec::new();
    let mut skip_depth: Option<usize> = None;
    let mut found = false;

    loop {
        match reader.read_event().map_err(c14n_err)? {
            Event::Start(e) => {
                let parent = stack.last();
                let mut scope = parent.map(|f| f.scope.clone()).unwrap_or_default();
                let (ns_decls, attrs) = split_attributes(&e)?;
                for (prefix, uri) in &ns_decls {
                    scope.insert(prefix.clone(), uri.clone());
                }
                let qname = std::str::from_utf8(e.name().as_ref())
                    .map_err(c14n_err)?
                    .to_string();
                let (prefix, local) = split_qname(&qname);
                let element_ns = scope.get(prefix).cloned().unwrap_or_default();

                let parent_emit = parent.map(|f| f.emit).unwrap_or(false);
                let excluded = skip_depth.is_some()
                    || (opts.exclude_signature && local == "Signature" && element_ns == DSIG_NS);
                if excluded && skip_depth.is_none() {
                    skip_depth = Some(stack.len());
                }

                let emit = !excluded
                    && match opts.subset {
                        Subset::Document => true,
                        Subset::Element {
                            local_name,
                            namespace,
                        } => {
                            parent_emit
                                || (!found && local == local_name && element_ns == namespace)
                        }
                    };
                let apex = emit && !parent_emit;
                if apex {
                    found = true;
                }

                let mut rendered = if apex {
                    BTreeMap::new()
                } else {
                    parent.map(|f| f.rendered.clone()).unwrap_or_default()
                };

                if emit {
                    // The apex renders every namespace in scope; descendants
                    // only those that change the rendered context.
                    let candidates: Vec<(String, String)> = if apex {
                        scope.iter().map(|(p, u)| (p.clone(), u.clone())).collect()
                    } else {
                        ns_decls.clone()
                    };
                    let mut to_render: Vec<(String, String)> = Vec::new();
                    for (p, u) in candidates {
                        let current = rendered.get(&p).map(String::as_str).unwrap_or("");
                        let unchanged = current == u
                            && (rendered.contains_key(&p) || (p.is_empty() && u.is_empty()));
                        if !unchanged {
                            to_render.push((p, u));
                        }
                    }
                    to_render.sort_by(|a, b| a.0.cmp(&b.0));
                    to_render.dedup_by(|a, b| a.0 == b.0);

                    let mut sorted_attrs: Vec<(String, String, String, String)> = attrs
                        .into_iter()
                        .map(|(name, value)| {
                            let (ap, al) = split_qname(&name);
                            let ans = match ap {
                                "" => String::new(),
                                "xml" => XML_NS.to_string(),
                                p => scope.get(p).cloned().unwrap_or_default(),
                            };
                            let al = al.to_string();
                            (ans, al, name, value)
                        })
                        .collect();
                    sorted_attrs.sort_by(|a, b| (&a.0, &a.1).cmp(&(&b.0, &b.1)));

                    out.push('<');
                    out.push_str(&qname);
                    for (p, u) in &to_render {
                        if p.is_empty() {
                            out.push_str(" xmlns=\"");
                        } else {
                            out.push_str(" xmlns:");
                            out.push_str(p);
                            out.push_str("=\"");
                        }
                        out.push_str(&escape_attr(u));
                        out.push('"');
                        rendered.insert(p.clone(), u.clone());
                    }
                    for (_, _, name, value) in &sorted_attrs {
                        out.push(' ');
                        out.push_str(name);
                        out.push_str("=\"");
                        out.push_str(&escape_attr(value));
                        out.push('"');
                    }
                    out.push('>');
                }

                stack.push(Frame {
                    qname,
                    scope,
                    rendered,
                    emit,
                    apex,
                });
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| c14n_err("unbalanced end tag"))?;
                if frame.emit {
                    out.push_str("</");
                    out.push_str(&frame.qname);
                    out.push('>');
                }
                if skip_depth == Some(stack.len()) {
                    skip_depth = None;
                }
                if frame.apex && matches!(opts.subset, Subset::Element { .. }) {
                    break;
                }
            }
            Event::Text(e) => {
                if stack.last().is_some_and(|f| f.emit) {
                    let text = e.unescape().map_err(c14n_err)?;
                    out.push_str(&escape_text(&text));
                }
            }
            Event::CData(e) => {
                if stack.last().is_some_and(|f| f.emit) {
                    let raw = e.into_inner();
                    let text = std::str::from_utf8(&raw).map_err(c14n_err)?;
                    out.push_str(&escape_text(text));
                }
            }
            Event::PI(e) => {
                if stack.last().is_some_and(|f| f.emit) {
                    let raw = std::str::from_utf8(&e).map_err(c14n_err)?;
                    out.push_str("<?");
                    out.push_str(raw);
                    out.push_str("?>");
                }
            }
            Event::Eof => break,
            // Declarations, doctypes and comments are not part of the canonical form.
            _ => {}
        }
    }

    if !found {
        return Err(c14n_err("subset element not found"));
    }
    Ok(out)
}

type Pairs = Vec<(String, String)>;

fn split_attributes(e: &BytesStart<'_>) -> Result<(Pairs, Pairs), ComprobanteError> {
    let mut ns_decls = Vec::new();
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(c14n_err)?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(c14n_err)?
            .to_string();
        let value = normalize_attribute(&attr.value)?;
        if key == "xmlns" {
            ns_decls.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            ns_decls.push((prefix.to_string(), value));
        } else {
            attrs.push((key, value));
        }
    }
    Ok((ns_decls, attrs))
}

/// Attribute-value normalization for CDATA attributes: literal whitespace
/// characters become spaces, character references keep their value.
fn normalize_attribute(raw: &[u8]) -> Result<String, ComprobanteError> {
    let raw = std::str::from_utf8(raw).map_err(c14n_err)?;
    let spaced = raw.replace(['\t', '\n', '\r'], " ");
    Ok(unescape(&spaced).map_err(c14n_err)?.into_owned())
}

fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix, local),
        None => ("", qname),
    }
}

fn escape_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_declaration_and_expands_empty_elements() {
        let xml = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<a><b/></a>";
        assert_eq!(canonicalize(xml).unwrap(), "<a><b></b></a>");
    }

    #[test]
    fn sorts_attributes_and_namespaces() {
        let xml = r#"<a z="1" xmlns:y="urn:y" b="2" xmlns="urn:d" y:c="3"></a>"#;
        assert_eq!(
            canonicalize(xml).unwrap(),
            r#"<a xmlns="urn:d" xmlns:y="urn:y" b="2" z="1" y:c="3"></a>"#
        );
    }

    #[test]
    fn escapes_text_and_attributes() {
        let xml = "<a t=\"x&apos;&quot;\">1 &lt; 2 &amp; 3 &gt; 2 'q' \"d\"</a>";
        assert_eq!(
            canonicalize(xml).unwrap(),
            "<a t=\"x'&quot;\">1 &lt; 2 &amp; 3 &gt; 2 'q' \"d\"</a>"
        );
    }

    #[test]
    fn normalizes_whitespace_in_attribute_values() {
        assert_eq!(
            canonicalize("<a n=\"x\ny\tz\"><b/></a>").unwrap(),
            "<a n=\"x y z\"><b></b></a>"
        );
        assert_eq!(
            canonicalize("<a n=\"x\r\ny\"></a>").unwrap(),
            "<a n=\"x y\"></a>"
        );
        assert_eq!(
            canonicalize("<a n=\"x&#xA;y&#x9;z&#xD;\"></a>").unwrap(),
            "<a n=\"x&#xA;y&#x9;z&#xD;\"></a>"
        );
    }

    #[test]
    fn drops_comments_keeps_whitespace() {
        let xml = "<a>\n  <!-- note -->\n  <b>x</b>\n</a>";
        assert_eq!(canonicalize(xml).unwrap(), "<a>\n  \n  <b>x</b>\n</a>");
    }

    #[test]
    fn removes_superfluous_namespace_declarations() {
        let xml = r#"<a xmlns:p="urn:p"><p:b xmlns:p="urn:p"></p:b></a>"#;
        assert_eq!(
            canonicalize(xml).unwrap(),
            r#"<a xmlns:p="urn:p"><p:b></p:b></a>"#
        );
    }

    #[test]
    fn subset_inherits_ancestor_namespaces() {
        let xml = r#"<r xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:S><ds:SignedInfo><ds:X/></ds:SignedInfo></ds:S></r>"#;
        let opts = C14nOptions {
            subset: Subset::Element {
                local_name: "SignedInfo",
                namespace: DSIG_NS,
            },
            exclude_signature: false,
        };
        assert_eq!(
            canonicalize_with(xml, &opts).unwrap(),
            r#"<ds:SignedInfo xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:X></ds:X></ds:SignedInfo>"#
        );
    }

    #[test]
    fn enveloped_signature_transform() {
        let xml = r#"<r id="c"><v>1</v><ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo/></ds:Signature></r>"#;
        let opts = C14nOptions {
            subset: Subset::Document,
            exclude_signature: true,
        };
        assert_eq!(
            canonicalize_with(xml, &opts).unwrap(),
            r#"<r id="c"><v>1</v></r>"#
        );
    }

    #[test]
    fn missing_subset_is_an_error() {
        let opts = C14nOptions {
            subset: Subset::Element {
                local_name: "SignedInfo",
                namespace: DSIG_NS,
            },
            exclude_signature: false,
        };
        assert!(canonicalize_with("<a/>", &opts).is_err());
    }
}
