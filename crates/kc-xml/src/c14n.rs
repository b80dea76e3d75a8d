//! Exclusive XML Canonicalization 1.0.
//!
//! Operates on [`Element`] subtrees. Namespace declarations are rendered
//! only where visibly utilized (or listed in `InclusiveNamespaces`) and not
//! already rendered by an output ancestor. The enveloped-signature transform
//! is applied by removing the signature child before canonicalizing, see
//! [`enveloped`].

use crate::dom::{Element, Namespace, Node};
use crate::name::QName;
use crate::ns::XML_NS;

/// `http://www.w3.org/2001/10/xml-exc-c14n#`
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
/// `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";

/// Canonicalization parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct C14nOptions {
    /// Keep comment nodes.
    pub with_comments: bool,
    /// `InclusiveNamespaces PrefixList`; `#default` names the default
    /// namespace.
    pub inclusive_prefixes: Vec<String>,
}

impl C14nOptions {
    /// Options for an exclusive canonicalization algorithm URI.
    #[must_use]
    pub fn from_algorithm(uri: &str) -> Option<Self> {
        match uri {
            EXC_C14N => Some(Self::default()),
            EXC_C14N_WITH_COMMENTS => Some(Self {
                with_comments: true,
                ..Self::default()
            }),
            _ => None,
        }
    }

    /// Sets the inclusive prefix list.
    #[must_use]
    pub fn with_inclusive_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inclusive_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }
}

/// Canonicalizes `element` as an apex node with no inherited bindings.
#[must_use]
pub fn canonicalize(element: &Element, options: &C14nOptions) -> String {
    canonicalize_in_context(element, &[], options)
}

/// Canonicalizes `element` where `inherited` are the namespace bindings in
/// scope at its position in the enclosing document. Only inclusive prefixes
/// can pull inherited bindings into the output.
#[must_use]
pub fn canonicalize_in_context(
    element: &Element,
    inherited: &[Namespace],
    options: &C14nOptions,
) -> String {
    let mut out = String::new();
    write_element(element, inherited.to_vec(), &[], options, &mut out);
    out
}

/// Returns a copy of `element` without its direct children named
/// `signature`.
#[must_use]
pub fn enveloped(element: &Element, signature: &QName) -> Element {
    let mut copy = element.clone();
    copy.remove_children_named(signature);
    copy
}

fn lookup<'a>(bindings: &'a [Namespace], prefix: Option<&str>) -> Option<&'a str> {
    bindings
        .iter()
        .rev()
        .find(|n| n.prefix.as_deref() == prefix)
        .map(|n| n.uri.as_str())
}

fn bind(bindings: &mut Vec<Namespace>, prefix: Option<&str>, uri: &str) {
    if lookup(bindings, prefix) != Some(uri) {
        bindings.push(Namespace {
            prefix: prefix.map(str::to_string),
            uri: uri.to_string(),
        });
    }
}

fn attribute_prefix(name: &QName, in_scope: &[Namespace]) -> String {
    if name.namespace() == XML_NS {
        return "xml".to_string();
    }
    if let Some(prefix) = name.prefix() {
        return prefix.to_string();
    }
    in_scope
        .iter()
        .rev()
        .find(|n| n.uri == name.namespace() && n.prefix.is_some())
        .and_then(|n| n.prefix.clone())
        .unwrap_or_else(|| "ns1".to_string())
}

fn write_element(
    element: &Element,
    mut in_scope: Vec<Namespace>,
    rendered: &[Namespace],
    options: &C14nOptions,
    out: &mut String,
) {
    in_scope.extend(element.namespaces.iter().cloned());

    let element_prefix = element
        .name
        .has_namespace()
        .then(|| element.name.prefix())
        .flatten();
    bind(&mut in_scope, element_prefix, element.name.namespace());

    let mut utilized: Vec<Namespace> = vec![Namespace {
        prefix: element_prefix.map(str::to_string),
        uri: element.name.namespace().to_string(),
    }];

    let mut attributes: Vec<(&QName, String, &str)> = Vec::with_capacity(element.attributes.len());
    for attr in &element.attributes {
        if attr.name.has_namespace() {
            let prefix = attribute_prefix(&attr.name, &in_scope);
            if prefix != "xml" {
                bind(&mut in_scope, Some(prefix.as_str()), attr.name.namespace());
                utilized.push(Namespace::new(prefix.clone(), attr.name.namespace()));
            }
            attributes.push((
                &attr.name,
                format!("{prefix}:{}", attr.name.local_name()),
                attr.value.as_str(),
            ));
        } else {
            attributes.push((&attr.name, attr.name.local_name().to_string(), attr.value.as_str()));
        }
    }

    for listed in &options.inclusive_prefixes {
        let prefix = (listed != "#default").then_some(listed.as_str());
        if let Some(uri) = lookup(&in_scope, prefix) {
            utilized.push(Namespace {
                prefix: prefix.map(str::to_string),
                uri: uri.to_string(),
            });
        }
    }

    let mut output_ns: Vec<Namespace> = Vec::new();
    for ns in utilized {
        if output_ns.iter().any(|n| n.prefix == ns.prefix) {
            continue;
        }
        let already = lookup(rendered, ns.prefix.as_deref());
        let needed = match ns.prefix {
            None => already.unwrap_or("") != ns.uri,
            Some(_) => already != Some(ns.uri.as_str()),
        };
        if needed {
            output_ns.push(ns);
        }
    }
    output_ns.sort_by(|a, b| a.prefix.cmp(&b.prefix));
    attributes.sort_by(|a, b| {
        (a.0.namespace(), a.0.local_name()).cmp(&(b.0.namespace(), b.0.local_name()))
    });

    let tag = match element_prefix {
        Some(prefix) => format!("{prefix}:{}", element.name.local_name()),
        None => element.name.local_name().to_string(),
    };

    out.push('<');
    out.push_str(&tag);
    for ns in &output_ns {
        match &ns.prefix {
            Some(prefix) => out.push_str(&format!(" xmlns:{prefix}=\"")),
            None => out.push_str(" xmlns=\""),
        }
        out.push_str(&escape_attribute(&ns.uri));
        out.push('"');
    }
    for (_, name, value) in &attributes {
        out.push_str(&format!(" {name}=\""));
        out.push_str(&escape_attribute(value));
        out.push('"');
    }
    out.push('>');

    let mut child_rendered = rendered.to_vec();
    child_rendered.extend(output_ns);

    for child in &element.children {
        match child {
            Node::Element(e) => write_element(e, in_scope.clone(), &child_rendered, options, out),
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::Comment(c) if options.with_comments => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            Node::Comment(_) => {}
        }
    }

    out.push_str("</");
    out.push_str(&tag);
    out.push('>');
}

fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\r' => escaped.push_str("&#xD;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '"' => escaped.push_str("&quot;"),
            '\t' => escaped.push_str("&#x9;"),
            '\n' => escaped.push_str("&#xA;"),
            '\r' => escaped.push_str("&#xD;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
