//! XML text to [`Element`] using quick-xml's namespace-aware reader.

use std::borrow::Cow;

use quick_xml::escape::{escape, unescape};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::reader::NsReader;

use super::{Attribute, Element, Namespace, Node};
use crate::error::DomError;
use crate::name::QName;
use crate::ns;

const FRAGMENT_WRAPPER: &str = "kc-fragment";

/// Parses a complete document and returns its document element.
///
/// # Errors
///
/// Fails on malformed input, unbound prefixes and any DOCTYPE declaration.
pub fn parse(xml: &str) -> Result<Element, DomError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut roots: Vec<Element> = Vec::new();

    loop {
        let event = reader.read_event().map_err(|e| malformed(&reader, e))?;
        match event {
            Event::Start(start) => {
                let element = open_element(&reader, &start)?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&reader, &start)?;
                close_element(element, &mut stack, &mut roots);
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| DomError::Malformed {
                    position: reader.buffer_position() as usize,
                    message: "unbalanced end tag".to_string(),
                })?;
                close_element(element, &mut stack, &mut roots);
            }
            Event::Text(text) => {
                let raw = utf8(&text)?;
                let text = unescape(&normalize_line_endings(&raw))
                    .map_err(|e| malformed(&reader, e))?
                    .into_owned();
                append_text(&mut stack, &text)?;
            }
            Event::CData(data) => {
                let text = utf8(&data.into_inner())?;
                append_text(&mut stack, &normalize_line_endings(&text))?;
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(Node::Comment(utf8(&comment)?));
                }
            }
            Event::DocType(_) => return Err(DomError::DoctypeNotAllowed),
            Event::Decl(_) | Event::PI(_) => {}
            Event::Eof => break,
        }
    }

    if !stack.is_empty() {
        return Err(DomError::Malformed {
            position: reader.buffer_position() as usize,
            message: "unclosed element at end of input".to_string(),
        });
    }

    let mut roots = roots.into_iter();
    let root = roots.next().ok_or(DomError::NoRootElement)?;
    if roots.next().is_some() {
        return Err(DomError::MultipleRoots);
    }
    Ok(root)
}

/// Parses a single-element fragment as if it appeared where `in_scope`
/// namespace bindings are visible.
///
/// Decrypted XML-Enc content is such a fragment: it may use prefixes that
/// were declared on ancestors of the `EncryptedData` it came from.
///
/// # Errors
///
/// Fails like [`parse`], and when the fragment holds more than one element.
pub fn parse_fragment(xml: &str, in_scope: &[Namespace]) -> Result<Element, DomError> {
    let mut wrapped = format!("<{FRAGMENT_WRAPPER}");
    for namespace in in_scope {
        let uri = escape(namespace.uri.as_str());
        match &namespace.prefix {
            Some(prefix) => wrapped.push_str(&format!(" xmlns:{prefix}=\"{uri}\"")),
            None => wrapped.push_str(&format!(" xmlns=\"{uri}\"")),
        }
    }
    wrapped.push('>');
    wrapped.push_str(strip_declaration(xml));
    wrapped.push_str(&format!("</{FRAGMENT_WRAPPER}>"));

    let wrapper = parse(&wrapped)?;
    let mut root = None;
    for node in wrapper.children {
        match node {
            Node::Element(element) if root.is_none() => root = Some(element),
            Node::Element(_) => return Err(DomError::MultipleRoots),
            Node::Text(text) if !text.trim().is_empty() => return Err(DomError::TextOutsideRoot),
            Node::Text(_) | Node::Comment(_) => {}
        }
    }
    root.ok_or(DomError::NoRootElement)
}

fn strip_declaration(xml: &str) -> &str {
    let trimmed = xml.trim_start();
    if trimmed.starts_with("<?xml") {
        if let Some(end) = trimmed.find("?>") {
            return &trimmed[end + 2..];
        }
    }
    xml
}

fn open_element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<Element, DomError> {
    let (resolved, local) = reader.resolve_element(start.name());
    let mut name = QName::new(namespace_uri(resolved)?, utf8(local.as_ref())?);
    if let Some(prefix) = start.name().prefix() {
        name = name.with_prefix(utf8(prefix.as_ref())?);
    }

    let mut element = Element::new(name);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(reader, e))?;
        let value = normalize_attribute(&utf8(&attr.value)?).map_err(|e| malformed(reader, e))?;

        if let Some(binding) = attr.key.as_namespace_binding() {
            let prefix = match binding {
                PrefixDeclaration::Default => None,
                PrefixDeclaration::Named(p) => Some(utf8(p)?),
            };
            element.namespaces.push(Namespace { prefix, uri: value });
            continue;
        }

        let prefix = attr.key.prefix().map(|p| utf8(p.as_ref())).transpose()?;
        let local = utf8(attr.key.local_name().as_ref())?;
        let namespace = if prefix.as_deref() == Some("xml") {
            ns::XML_NS.to_string()
        } else {
            namespace_uri(reader.resolve_attribute(attr.key).0)?
        };

        let mut name = QName::new(namespace, local);
        if let Some(prefix) = prefix {
            name = name.with_prefix(prefix);
        }
        element.attributes.push(Attribute { name, value });
    }
    Ok(element)
}

/// Line-end handling of XML 1.0 section 2.11: `\r\n` and a lone `\r`
/// become `\n`. Applies to literal text only, so `&#xD;` survives.
fn normalize_line_endings(raw: &str) -> Cow<'_, str> {
    if !raw.contains('\r') {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace("\r\n", "\n").replace('\r', "\n"))
}

/// Attribute-value normalization of XML 1.0 section 3.3.3 for CDATA
/// attributes: literal whitespace becomes a space before references are
/// expanded.
fn normalize_attribute(raw: &str) -> Result<String, quick_xml::escape::EscapeError> {
    let spaced: String = normalize_line_endings(raw)
        .chars()
        .map(|c| if matches!(c, '\t' | '\n') { ' ' } else { c })
        .collect();
    unescape(&spaced).map(Cow::into_owned)
}

fn close_element(element: Element, stack: &mut [Element], roots: &mut Vec<Element>) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None => roots.push(element),
    }
}

fn append_text(stack: &mut [Element], text: &str) -> Result<(), DomError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.push_text(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(DomError::TextOutsideRoot),
    }
}

fn namespace_uri(resolved: ResolveResult<'_>) -> Result<String, DomError> {
    match resolved {
        ResolveResult::Bound(namespace) => utf8(namespace.as_ref()),
        ResolveResult::Unbound => Ok(String::new()),
        ResolveResult::Unknown(prefix) => Err(DomError::UnboundPrefix(
            String::from_utf8_lossy(&prefix).into_owned(),
        )),
    }
}

fn utf8(bytes: &[u8]) -> Result<String, DomError> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|e| DomError::Encoding(e.to_string()))
}

fn malformed(reader: &NsReader<&[u8]>, err: impl std::fmt::Display) -> DomError {
    DomError::Malformed {
        position: reader.buffer_position() as usize,
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_prefixes_and_default_namespace() {
        let xml = r#"<p:Root xmlns:p="urn:p" xmlns="urn:d" p:a="1" b="2"><Child>text</Child></p:Root>"#;
        let root = parse(xml).unwrap();

        assert!(root.name.is("urn:p", "Root"));
        assert_eq!(root.name.prefix(), Some("p"));
        assert_eq!(root.namespaces.len(), 2);
        assert_eq!(root.attribute_ns(&QName::new("urn:p", "a")), Some("1"));
        assert_eq!(root.attribute("b"), Some("2"));

        let child = root.child_elements().next().unwrap();
        assert!(child.name.is("urn:d", "Child"));
        assert_eq!(child.text(), "text");
    }

    #[test]
    fn unescapes_text_and_attributes() {
        let root = parse(r#"<a v="x &amp; y">1 &lt; 2<![CDATA[ & 3]]></a>"#).unwrap();
        assert_eq!(root.attribute("v"), Some("x & y"));
        assert_eq!(root.text(), "1 < 2 & 3");
    }

    #[test]
    fn normalizes_line_endings_and_attribute_whitespace() {
        let root = parse("<a v=\"x\ny\r\nz\tw\">line1\r\nline2\rline3<![CDATA[\r\n]]></a>").unwrap();
        assert_eq!(root.attribute("v"), Some("x y z w"));
        assert_eq!(root.text(), "line1\nline2\nline3\n");
    }

    #[test]
    fn character_references_escape_normalization() {
        let root = parse("<a v=\"x&#xA;y&#9;z\">p&#xD;\r\nq</a>").unwrap();
        assert_eq!(root.attribute("v"), Some("x\ny\tz"));
        assert_eq!(root.text(), "p\r\nq");
    }

    #[test]
    fn rejects_unbound_prefix() {
        assert!(matches!(
            parse("<x:a/>"),
            Err(DomError::UnboundPrefix(p)) if p == "x"
        ));
    }

    #[test]
    fn rejects_doctype() {
        let xml = r#"<!DOCTYPE a [<!ENTITY e "boom">]><a>&e;</a>"#;
        assert!(matches!(parse(xml), Err(DomError::DoctypeNotAllowed)));
    }

    #[test]
    fn rejects_empty_and_unbalanced_input() {
        assert!(matches!(parse("  "), Err(DomError::NoRootElement)));
        assert!(parse("<a><b></a>").is_err());
    }

    #[test]
    fn fragment_sees_context_namespaces() {
        let context = vec![Namespace::new("saml", "urn:oasis:names:tc:SAML:2.0:assertion")];
        let el = parse_fragment(r#"<saml:Assertion ID="a1"/>"#, &context).unwrap();
        assert!(el.name.is("urn:oasis:names:tc:SAML:2.0:assertion", "Assertion"));

        assert!(matches!(
            parse_fragment(r#"<saml:Assertion ID="a1"/>"#, &[]),
            Err(DomError::UnboundPrefix(_))
        ));
    }

    #[test]
    fn fragment_must_have_single_element() {
        assert!(matches!(
            parse_fragment("<a/><b/>", &[]),
            Err(DomError::MultipleRoots)
        ));
        assert!(parse_fragment("<?xml version=\"1.0\"?><a/>", &[]).is_ok());
    }
}
