//! The arena-backed object tree.
//!
//! Nodes live in a `Vec` owned by [`XmlObjectTree`] and refer to each other
//! by [`NodeId`]. A node's parent link is a plain index, so there is no
//! ownership cycle and detaching is just clearing an index. Every mutation
//! goes through the tree, which drops the cached DOM of the touched node
//! and all of its ancestors.

use std::fmt;
use std::ops::Index;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;

use crate::dom::{Element, Namespace};
use crate::error::TreeError;
use crate::name::QName;
use crate::schema::ElementSchema;
use crate::signature::Signature;

/// Index of a node inside its [`XmlObjectTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in the arena.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A SAML protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProtocolVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl ProtocolVersion {
    /// SAML 1.0.
    pub const SAML_10: Self = Self::new(1, 0);
    /// SAML 1.1.
    pub const SAML_11: Self = Self::new(1, 1);
    /// SAML 2.0.
    pub const SAML_20: Self = Self::new(2, 0);

    /// Creates a version.
    #[must_use]
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parses the `"2.0"` form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let (major, minor) = value.trim().split_once('.')?;
        Some(Self::new(major.parse().ok()?, minor.parse().ok()?))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// String or ID.
    String(String),
    /// `xs:boolean`.
    Boolean(bool),
    /// `xs:integer`.
    Integer(i64),
    /// `xs:dateTime` in UTC.
    DateTime(DateTime<Utc>),
}

impl AttributeValue {
    /// The string, if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The boolean, if this is a boolean value.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// The integer, if this is an integer value.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// The instant, if this is a date-time value.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::DateTime(d) => Some(d),
            _ => None,
        }
    }

    /// XML Schema lexical form.
    #[must_use]
    pub fn to_lexical(&self) -> String {
        match self {
            Self::String(s) => s.clone(),
            Self::Boolean(b) => b.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::DateTime(d) => d.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

/// Content of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    /// A child object.
    Element(NodeId),
    /// Character data.
    Text(String),
}

/// One XML object.
#[derive(Debug, Clone)]
pub struct XmlObjectNode {
    element_name: QName,
    schema_type: Option<QName>,
    schema: Arc<ElementSchema>,
    attributes: IndexMap<QName, AttributeValue>,
    namespaces: Vec<Namespace>,
    children: Vec<XmlChild>,
    parent: Option<NodeId>,
    version: Option<ProtocolVersion>,
    signature: Option<Signature>,
    cached_dom: Option<Element>,
}

impl XmlObjectNode {
    /// Creates a detached node described by `schema`. It starts at the
    /// schema's default version.
    #[must_use]
    pub fn new(element_name: QName, schema: Arc<ElementSchema>) -> Self {
        Self {
            element_name,
            schema_type: None,
            version: schema.default_version,
            schema,
            attributes: IndexMap::new(),
            namespaces: Vec::new(),
            children: Vec::new(),
            parent: None,
            signature: None,
            cached_dom: None,
        }
    }

    /// Sets the `xsi:type` before the node is inserted.
    #[must_use]
    pub fn with_schema_type(mut self, schema_type: Option<QName>) -> Self {
        self.schema_type = schema_type;
        self
    }

    /// Element name.
    #[must_use]
    pub fn element_name(&self) -> &QName {
        &self.element_name
    }

    /// Explicit `xsi:type`, if any.
    #[must_use]
    pub fn schema_type(&self) -> Option<&QName> {
        self.schema_type.as_ref()
    }

    /// Type descriptor.
    #[must_use]
    pub fn schema(&self) -> &ElementSchema {
        &self.schema
    }

    /// Attributes in insertion order.
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<QName, AttributeValue> {
        &self.attributes
    }

    /// Looks up an attribute.
    #[must_use]
    pub fn attribute(&self, name: &QName) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Looks up an unqualified string attribute.
    #[must_use]
    pub fn attribute_str(&self, local: &str) -> Option<&str> {
        self.attributes
            .get(&QName::local(local))
            .and_then(AttributeValue::as_str)
    }

    /// Value of the `xs:ID` attribute.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.schema
            .id_attribute
            .as_ref()
            .and_then(|name| self.attributes.get(name))
            .and_then(AttributeValue::as_str)
    }

    /// Namespace declarations recorded on this node.
    #[must_use]
    pub fn namespaces(&self) -> &[Namespace] {
        &self.namespaces
    }

    /// Content in order.
    #[must_use]
    pub fn children(&self) -> &[XmlChild] {
        &self.children
    }

    /// Parent, if attached.
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Version declared on or assigned to this node.
    #[must_use]
    pub const fn version(&self) -> Option<ProtocolVersion> {
        self.version
    }

    /// Attached signature.
    #[must_use]
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// DOM produced by the last marshalling or unmarshalling, if still valid.
    #[must_use]
    pub fn cached_dom(&self) -> Option<&Element> {
        self.cached_dom.as_ref()
    }

    /// Concatenated text children.
    #[must_use]
    pub fn text_content(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlChild::Text(t) => Some(t.as_str()),
                XmlChild::Element(_) => None,
            })
            .collect()
    }
}

/// An arena of [`XmlObjectNode`]s with one designated root.
#[derive(Debug, Clone, Default)]
pub struct XmlObjectTree {
    nodes: Vec<XmlObjectNode>,
    root: Option<NodeId>,
}

impl XmlObjectTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a detached node.
    pub fn insert(&mut self, mut node: XmlObjectNode) -> NodeId {
        node.parent = None;
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Root node.
    #[must_use]
    pub const fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Designates the root.
    ///
    /// # Errors
    ///
    /// Fails if the node has a parent.
    pub fn set_root(&mut self, id: NodeId) -> Result<(), TreeError> {
        if self.nodes[id.0].parent.is_some() {
            return Err(TreeError::AlreadyAttached(id));
        }
        self.root = Some(id);
        Ok(())
    }

    /// Looks up a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&XmlObjectNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes in the arena, attached or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parent of `id`.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    /// Element children of `id` in order.
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes[id.0].children.iter().filter_map(|c| match c {
            XmlChild::Element(child) => Some(*child),
            XmlChild::Text(_) => None,
        })
    }

    /// Element children of `id` named `name`.
    #[must_use]
    pub fn children_named(&self, id: NodeId, name: &QName) -> Vec<NodeId> {
        self.element_children(id)
            .filter(|c| &self.nodes[c.0].element_name == name)
            .collect()
    }

    /// First element child of `id` named `name`.
    #[must_use]
    pub fn first_child_named(&self, id: NodeId, name: &QName) -> Option<NodeId> {
        self.element_children(id)
            .find(|c| &self.nodes[c.0].element_name == name)
    }

    /// Attaches `child` under `parent` at the position its name takes in
    /// the parent's content model.
    ///
    /// # Errors
    ///
    /// Rejects the root, nodes that already have a parent, and attachments
    /// that would make a node its own ancestor.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        if self.root == Some(child) {
            return Err(TreeError::IsRoot(child));
        }
        if parent == child || self.ancestors(parent).contains(&child) {
            return Err(TreeError::Cycle { parent, child });
        }
        if self.nodes[child.0].parent.is_some() {
            return Err(TreeError::AlreadyAttached(child));
        }

        let schema = &self.nodes[parent.0].schema;
        let rank = schema.child_rank(&self.nodes[child.0].element_name);
        let position = self.nodes[parent.0].children.iter().position(|c| match c {
            XmlChild::Element(existing) => {
                schema.child_rank(&self.nodes[existing.0].element_name) > rank
            }
            XmlChild::Text(_) => false,
        });

        let children = &mut self.nodes[parent.0].children;
        match position {
            Some(index) => children.insert(index, XmlChild::Element(child)),
            None => children.push(XmlChild::Element(child)),
        }
        self.nodes[child.0].parent = Some(parent);
        self.invalidate(parent);
        Ok(())
    }

    /// Detaches `child` from its parent, returning the former parent.
    pub fn detach(&mut self, child: NodeId) -> Option<NodeId> {
        let parent = self.nodes[child.0].parent.take()?;
        self.nodes[parent.0]
            .children
            .retain(|c| *c != XmlChild::Element(child));
        self.invalidate(parent);
        Some(parent)
    }

    /// Sets an attribute, keeping its position if it already exists.
    pub fn set_attribute(&mut self, id: NodeId, name: QName, value: impl Into<AttributeValue>) {
        self.nodes[id.0].attributes.insert(name, value.into());
        self.invalidate(id);
    }

    /// Removes an attribute.
    pub fn remove_attribute(&mut self, id: NodeId, name: &QName) -> Option<AttributeValue> {
        let removed = self.nodes[id.0].attributes.shift_remove(name);
        self.invalidate(id);
        removed
    }

    /// Replaces all text content of `id`.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        let node = &mut self.nodes[id.0];
        node.children.retain(|c| matches!(c, XmlChild::Element(_)));
        node.children.push(XmlChild::Text(text.into()));
        self.invalidate(id);
    }

    /// Appends text, merging with a trailing text child.
    pub fn push_text(&mut self, id: NodeId, text: &str) {
        let children = &mut self.nodes[id.0].children;
        if let Some(XmlChild::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(XmlChild::Text(text.to_string()));
        }
        self.invalidate(id);
    }

    /// Sets or clears the explicit `xsi:type`.
    pub fn set_schema_type(&mut self, id: NodeId, schema_type: Option<QName>) {
        self.nodes[id.0].schema_type = schema_type;
        self.invalidate(id);
    }

    /// Sets the node's protocol version.
    pub fn set_version(&mut self, id: NodeId, version: Option<ProtocolVersion>) {
        self.nodes[id.0].version = version;
        self.invalidate(id);
    }

    /// Records a namespace declaration on the node.
    pub fn declare_namespace(&mut self, id: NodeId, namespace: Namespace) {
        let namespaces = &mut self.nodes[id.0].namespaces;
        if let Some(existing) = namespaces.iter_mut().find(|n| n.prefix == namespace.prefix) {
            *existing = namespace;
        } else {
            namespaces.push(namespace);
        }
        self.invalidate(id);
    }

    /// Attaches a signature.
    ///
    /// # Errors
    ///
    /// Fails if the node's type is not signable.
    pub fn set_signature(&mut self, id: NodeId, signature: Signature) -> Result<(), TreeError> {
        let node = &mut self.nodes[id.0];
        if !node.schema.signable {
            return Err(TreeError::NotSignable(node.element_name.clone()));
        }
        node.signature = Some(signature);
        self.invalidate(id);
        Ok(())
    }

    /// Removes and returns the signature.
    pub fn take_signature(&mut self, id: NodeId) -> Option<Signature> {
        let signature = self.nodes[id.0].signature.take();
        if signature.is_some() {
            self.invalidate(id);
        }
        signature
    }

    /// Copies the subtree at `from` in `other` into this tree as a detached
    /// node, returning its new ID.
    pub fn import_subtree(&mut self, other: &Self, from: NodeId) -> NodeId {
        let mut node = other.nodes[from.0].clone();
        let children = std::mem::take(&mut node.children);
        let id = self.insert(node);
        for child in children {
            let child = match child {
                XmlChild::Element(c) => {
                    let imported = self.import_subtree(other, c);
                    self.nodes[imported.0].parent = Some(id);
                    XmlChild::Element(imported)
                }
                text @ XmlChild::Text(_) => text,
            };
            self.nodes[id.0].children.push(child);
        }
        id
    }

    pub(crate) fn cache_dom(&mut self, id: NodeId, element: Element) {
        self.nodes[id.0].cached_dom = Some(element);
    }

    /// Drops the cached DOM of `id` and every ancestor.
    pub fn invalidate(&mut self, id: NodeId) {
        let mut current = Some(id);
        while let Some(node) = current {
            self.nodes[node.0].cached_dom = None;
            current = self.nodes[node.0].parent;
        }
    }

    /// Ancestors of `id`, nearest first.
    #[must_use]
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes[id.0].parent;
        while let Some(node) = current {
            out.push(node);
            current = self.nodes[node.0].parent;
        }
        out
    }

    /// Version of `id` or of its nearest versioned ancestor.
    #[must_use]
    pub fn effective_version(&self, id: NodeId) -> Option<ProtocolVersion> {
        std::iter::once(id)
            .chain(self.ancestors(id))
            .find_map(|n| self.nodes[n.0].version)
    }

    /// Namespace bindings in scope at `id`, from recorded declarations and
    /// element names. Nearer bindings shadow outer ones.
    #[must_use]
    pub fn in_scope_namespaces(&self, id: NodeId) -> Vec<Namespace> {
        let mut chain = self.ancestors(id);
        chain.reverse();
        chain.push(id);

        let mut scope: Vec<Namespace> = Vec::new();
        let mut bind = |ns: Namespace| {
            scope.retain(|n| n.prefix != ns.prefix);
            scope.push(ns);
        };
        for node in chain {
            let node = &self.nodes[node.0];
            for ns in &node.namespaces {
                bind(ns.clone());
            }
            if let Some(prefix) = node.element_name.prefix() {
                bind(Namespace::new(prefix, node.element_name.namespace()));
            }
        }
        scope
    }

    /// `id` and all its descendants in document order.
    #[must_use]
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            let children: Vec<NodeId> = self.element_children(node).collect();
            stack.extend(children.into_iter().rev());
        }
        out
    }

    /// Nodes under the root whose `xs:ID` equals `value`.
    #[must_use]
    pub fn find_by_xml_id(&self, value: &str) -> Vec<NodeId> {
        self.root
            .map(|root| {
                self.descendants(root)
                    .into_iter()
                    .filter(|n| self.nodes[n.0].id() == Some(value))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Structural equality of two subtrees, ignoring caches, namespace
    /// declarations and the retained source of signatures.
    #[must_use]
    pub fn subtree_eq(&self, a: NodeId, other: &Self, b: NodeId) -> bool {
        let (x, y) = (&self.nodes[a.0], &other.nodes[b.0]);
        x.element_name == y.element_name
            && x.schema_type == y.schema_type
            && x.attributes.len() == y.attributes.len()
            && x.attributes.iter().zip(y.attributes.iter()).all(|(p, q)| p == q)
            && self.effective_version(a) == other.effective_version(b)
            && x.signature == y.signature
            && x.children.len() == y.children.len()
            && x.children.iter().zip(&y.children).all(|pair| match pair {
                (XmlChild::Element(c), XmlChild::Element(d)) => self.subtree_eq(*c, other, *d),
                (XmlChild::Text(s), XmlChild::Text(t)) => s == t,
                _ => false,
            })
    }
}

impl Index<NodeId> for XmlObjectTree {
    type Output = XmlObjectNode;

    fn index(&self, id: NodeId) -> &XmlObjectNode {
        &self.nodes[id.0]
    }
}

impl PartialEq for XmlObjectTree {
    fn eq(&self, other: &Self) -> bool {
        match (self.root, other.root) {
            (Some(a), Some(b)) => self.subtree_eq(a, other, b),
            (None, None) => true,
            _ => false,
        }
    }
}
