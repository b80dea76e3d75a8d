//! [`Element`] to XML text.
//!
//! Namespace declarations are emitted where a binding is first needed and
//! not already in scope, so a DOM built programmatically without any
//! explicit declarations still serializes to well-formed, re-parseable XML.

use quick_xml::escape::{escape, partial_escape};

use super::{Element, Namespace, Node};
use crate::ns::XML_NS;

type Scope = Vec<Vec<Namespace>>;

impl Element {
    /// Serializes the element and its content.
    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        let mut scope = Scope::new();
        write_element(self, &mut out, &mut scope);
        out
    }

    /// Serializes the element as a standalone UTF-8 document.
    #[must_use]
    pub fn to_document(&self) -> String {
        format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>{}", self.to_xml())
    }
}

fn write_element(element: &Element, out: &mut String, scope: &mut Scope) {
    let mut frame: Vec<Namespace> = Vec::new();

    for declared in &element.namespaces {
        let prefix = declared.prefix.as_deref();
        if frame.iter().any(|n| n.prefix.as_deref() == prefix) {
            continue;
        }
        if lookup(scope, prefix).unwrap_or("") != declared.uri {
            frame.push(declared.clone());
        }
    }

    let element_prefix = element
        .name
        .has_namespace()
        .then(|| element.name.prefix())
        .flatten();
    bind(&mut frame, scope, element_prefix, element.name.namespace());

    let mut attributes = Vec::with_capacity(element.attributes.len());
    for attr in &element.attributes {
        if !attr.name.has_namespace() {
            attributes.push((attr.name.local_name().to_string(), &attr.value));
            continue;
        }
        let prefix = match attr.name.prefix() {
            _ if attr.name.namespace() == XML_NS => "xml".to_string(),
            Some(p) => p.to_string(),
            None => prefix_for(&frame, scope, attr.name.namespace()),
        };
        bind(&mut frame, scope, Some(prefix.as_str()), attr.name.namespace());
        attributes.push((format!("{prefix}:{}", attr.name.local_name()), &attr.value));
    }

    let tag = match element_prefix {
        Some(prefix) => format!("{prefix}:{}", element.name.local_name()),
        None => element.name.local_name().to_string(),
    };

    out.push('<');
    out.push_str(&tag);
    for namespace in &frame {
        match &namespace.prefix {
            Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"")),
            None => out.push_str(" xmlns=\""),
        }
        out.push_str(&escape_attribute(&namespace.uri));
        out.push('"');
    }
    for (name, value) in attributes {
        out.push_str(&format!(" {name}=\""));
        out.push_str(&escape_attribute(value));
        out.push('"');
    }

    if element.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');

    scope.push(frame);
    for child in &element.children {
        match child {
            Node::Element(e) => write_element(e, out, scope),
            Node::Text(t) => out.push_str(&partial_escape(t.as_str()).replace('\r', "&#13;")),
            Node::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
        }
    }
    scope.pop();

    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn lookup<'a>(scope: &'a Scope, prefix: Option<&str>) -> Option<&'a str> {
    scope
        .iter()
        .rev()
        .flat_map(|frame| frame.iter())
        .find(|n| n.prefix.as_deref() == prefix)
        .map(|n| n.uri.as_str())
}

/// Ensures `prefix` resolves to `uri` on the element being written.
fn bind(frame: &mut Vec<Namespace>, scope: &Scope, prefix: Option<&str>, uri: &str) {
    if prefix == Some("xml") {
        return;
    }
    if let Some(existing) = frame.iter_mut().find(|n| n.prefix.as_deref() == prefix) {
        existing.uri = uri.to_string();
        return;
    }
    if lookup(scope, prefix).unwrap_or("") != uri {
        frame.push(Namespace {
            prefix: prefix.map(str::to_string),
            uri: uri.to_string(),
        });
    }
}

/// Finds a prefix already bound to `uri`, or invents an unused one.
fn prefix_for(frame: &[Namespace], scope: &Scope, uri: &str) -> String {
    if let Some(prefix) = frame
        .iter()
        .find(|n| n.uri == uri)
        .and_then(|n| n.prefix.clone())
    {
        return prefix;
    }
    let inherited = scope
        .iter()
        .rev()
        .flat_map(|f| f.iter())
        .filter(|n| n.uri == uri)
        .filter_map(|n| n.prefix.as_deref())
        .find(|p| {
            lookup(scope, Some(*p)) == Some(uri)
                && !frame.iter().any(|n| n.prefix.as_deref() == Some(*p))
        });
    if let Some(prefix) = inherited {
        return prefix.to_string();
    }

    let mut n = 1;
    loop {
        let candidate = format!("ns{n}");
        let taken = frame.iter().any(|ns| ns.prefix.as_deref() == Some(candidate.as_str()))
            || lookup(scope, Some(candidate.as_str())).is_some();
        if !taken {
            return candidate;
        }
        n += 1;
    }
}

fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}
