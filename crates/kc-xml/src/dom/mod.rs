//! A small namespace-aware DOM.
//!
//! This is the external XML node representation the marshaller and
//! unmarshaller exchange with the outside world. Names are stored resolved
//! (namespace URI plus the prefix the author used), so canonicalization and
//! re-serialization never need to re-resolve prefixes.

mod parse;
mod write;

pub use parse::{parse, parse_fragment};

use crate::name::QName;

/// A namespace declaration (`xmlns` or `xmlns:prefix`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    /// Declared prefix, `None` for the default namespace.
    pub prefix: Option<String>,
    /// Bound URI, empty to undeclare the default namespace.
    pub uri: String,
}

impl Namespace {
    /// Creates a prefixed declaration.
    pub fn new(prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            uri: uri.into(),
        }
    }

    /// Creates a default namespace declaration.
    pub fn default_ns(uri: impl Into<String>) -> Self {
        Self {
            prefix: None,
            uri: uri.into(),
        }
    }
}

/// An attribute with its resolved name and unescaped value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Attribute name; unprefixed attributes have no namespace.
    pub name: QName,
    /// Unescaped value.
    pub value: String,
}

/// A child of an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Nested element.
    Element(Element),
    /// Character data, already unescaped.
    Text(String),
    /// Comment body.
    Comment(String),
}

/// An element and its content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Element name.
    pub name: QName,
    /// Attributes in document order, excluding namespace declarations.
    pub attributes: Vec<Attribute>,
    /// Namespace declarations made on this element.
    pub namespaces: Vec<Namespace>,
    /// Content in document order.
    pub children: Vec<Node>,
}

impl Element {
    /// Creates an empty element.
    #[must_use]
    pub fn new(name: QName) -> Self {
        Self {
            name,
            attributes: Vec::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Looks up an unqualified attribute.
    #[must_use]
    pub fn attribute(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| !a.name.has_namespace() && a.name.local_name() == local)
            .map(|a| a.value.as_str())
    }

    /// Looks up an attribute by qualified name.
    #[must_use]
    pub fn attribute_ns(&self, name: &QName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Sets an attribute, replacing any existing value.
    pub fn set_attribute(&mut self, name: QName, value: impl Into<String>) {
        let value = value.into();
        if let Some(existing) = self.attributes.iter_mut().find(|a| a.name == name) {
            existing.value = value;
        } else {
            self.attributes.push(Attribute { name, value });
        }
    }

    /// Builder form of [`Element::set_attribute`].
    #[must_use]
    pub fn with_attribute(mut self, name: QName, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Adds a namespace declaration unless the prefix is already declared
    /// here.
    pub fn declare_namespace(&mut self, namespace: Namespace) {
        if !self.namespaces.iter().any(|n| n.prefix == namespace.prefix) {
            self.namespaces.push(namespace);
        }
    }

    /// Appends a child element.
    pub fn push_element(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Builder form of [`Element::push_element`].
    #[must_use]
    pub fn with_child(mut self, child: Element) -> Self {
        self.push_element(child);
        self
    }

    /// Appends character data, merging with a preceding text node.
    pub fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Node::Text(last)) = self.children.last_mut() {
            last.push_str(text);
        } else {
            self.children.push(Node::Text(text.to_string()));
        }
    }

    /// Builder form of [`Element::push_text`].
    #[must_use]
    pub fn with_text(mut self, text: &str) -> Self {
        self.push_text(text);
        self
    }

    /// Iterates over child elements, skipping text and comments.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Returns the first child element named `name`.
    #[must_use]
    pub fn first_child(&self, name: &QName) -> Option<&Element> {
        self.child_elements().find(|e| &e.name == name)
    }

    /// Returns all child elements named `name`.
    pub fn children_named<'a>(&'a self, name: &'a QName) -> impl Iterator<Item = &'a Element> + 'a {
        self.child_elements().filter(move |e| &e.name == name)
    }

    /// Concatenates the direct text children.
    #[must_use]
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Removes every direct child element named `name`, returning how many
    /// were removed.
    pub fn remove_children_named(&mut self, name: &QName) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if &e.name == name));
        before - self.children.len()
    }

    /// Returns true if the element has no element children and only
    /// whitespace text.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.children.iter().all(|n| match n {
            Node::Element(_) => false,
            Node::Text(t) => t.trim().is_empty(),
            Node::Comment(_) => true,
        })
    }
}
