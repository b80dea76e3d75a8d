//! DOM to object tree.

use tracing::{debug, trace};

use crate::dom::{self, Element, Namespace, Node};
use crate::error::{UnmarshallingError, XmlError};
use crate::name::QName;
use crate::object::{NodeId, XmlObjectTree};
use crate::registry::{ObjectProvider, XmlObjectRegistry};
use crate::schema::VersionEncoding;
use crate::signature::Signature;
use crate::validator::validate_tree;

/// Unmarshalling switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmarshallingOptions {
    /// Accept unregistered elements anywhere as generic passthrough nodes.
    pub allow_unknown: bool,
    /// Run validator chains over the finished tree.
    pub validate: bool,
}

impl Default for UnmarshallingOptions {
    fn default() -> Self {
        Self {
            allow_unknown: false,
            validate: true,
        }
    }
}

/// Builds object trees from DOM elements using the providers of a registry.
#[derive(Debug, Clone, Copy)]
pub struct Unmarshalling<'r> {
    registry: &'r XmlObjectRegistry,
    options: UnmarshallingOptions,
}

impl<'r> Unmarshalling<'r> {
    /// Creates an unmarshalling engine with default options.
    #[must_use]
    pub fn new(registry: &'r XmlObjectRegistry) -> Self {
        Self::with_options(registry, UnmarshallingOptions::default())
    }

    /// Creates an unmarshalling engine with explicit options.
    #[must_use]
    pub const fn with_options(registry: &'r XmlObjectRegistry, options: UnmarshallingOptions) -> Self {
        Self { registry, options }
    }

    /// Parses and unmarshalls XML text.
    ///
    /// # Errors
    ///
    /// See [`Self::unmarshall`]; parse failures are reported as
    /// [`XmlError::Dom`].
    pub fn unmarshall_str(&self, xml: &str) -> Result<XmlObjectTree, XmlError> {
        let element = dom::parse(xml)?;
        self.unmarshall(&element)
    }

    /// Unmarshalls `element` into a new tree and validates it.
    ///
    /// Either the whole tree is returned or nothing is: the first
    /// unmarshalling or validation failure aborts the operation.
    ///
    /// # Errors
    ///
    /// [`XmlError::Unmarshalling`] for unknown or malformed content and
    /// [`XmlError::Validation`] for the first validator failure.
    pub fn unmarshall(&self, element: &Element) -> Result<XmlObjectTree, XmlError> {
        let mut tree = XmlObjectTree::new();
        let root = self.unmarshall_element(&mut tree, element, None, &[])?;
        tree.set_root(root)?;
        if self.options.validate {
            validate_tree(self.registry, &tree, root)?;
        }
        debug!(root = %element.name, nodes = tree.len(), "unmarshalled XML object tree");
        Ok(tree)
    }

    fn resolve_type(&self, element: &Element, scope: &[Namespace]) -> Result<Option<QName>, UnmarshallingError> {
        let Some(raw) = element.attribute_ns(&QName::xsi_type()) else {
            return Ok(None);
        };
        let raw = raw.trim();
        let (prefix, local) = match raw.split_once(':') {
            Some((p, l)) => (Some(p), l),
            None => (None, raw),
        };
        let namespace = scope
            .iter()
            .rev()
            .find(|n| n.prefix.as_deref() == prefix)
            .map(|n| n.uri.as_str());
        match (prefix, namespace) {
            (Some(_), None) => Err(UnmarshallingError::InvalidSchemaType(raw.to_string())),
            (_, ns) if local.is_empty() => Err(UnmarshallingError::InvalidSchemaType(
                format!("{raw} (namespace {})", ns.unwrap_or_default()),
            )),
            (Some(p), Some(ns)) => Ok(Some(QName::new(ns, local).with_prefix(p))),
            (None, ns) => Ok(Some(QName::new(ns.unwrap_or_default(), local))),
        }
    }

    fn provider_for(
        &self,
        tree: &XmlObjectTree,
        element: &Element,
        schema_type: Option<&QName>,
        parent: Option<NodeId>,
    ) -> Result<ObjectProvider, UnmarshallingError> {
        if let Some(provider) = schema_type.and_then(|t| self.registry.lookup(t)) {
            return Ok(provider);
        }
        if let Some(provider) = self.registry.lookup(&element.name) {
            return Ok(provider);
        }
        let extension_point = parent.is_some_and(|p| tree[p].schema().allows_unknown_children());
        if self.options.allow_unknown || extension_point {
            trace!(element = %element.name, "unmarshalling unknown element as passthrough");
            return Ok(self.registry.passthrough(&element.name));
        }
        Err(UnmarshallingError::UnknownElement(element.name.clone()))
    }

    fn unmarshall_element(
        &self,
        tree: &mut XmlObjectTree,
        element: &Element,
        parent: Option<NodeId>,
        inherited: &[Namespace],
    ) -> Result<NodeId, UnmarshallingError> {
        let mut scope = inherited.to_vec();
        scope.extend(element.namespaces.iter().cloned());

        let schema_type = self.resolve_type(element, &scope)?;
        let provider = self.provider_for(tree, element, schema_type.as_ref(), parent)?;
        let id = tree.insert(provider.builder.build(element.name.clone(), schema_type));

        if provider.schema.version_encoding == VersionEncoding::None {
            let inherited_version = parent.and_then(|p| tree.effective_version(p));
            tree.set_version(id, inherited_version.or(provider.schema.default_version));
        }
        for ns in &element.namespaces {
            tree.declare_namespace(id, ns.clone());
        }
        let xsi_type = QName::xsi_type();
        for attribute in element.attributes.iter().filter(|a| a.name != xsi_type) {
            provider.unmarshaller.process_attribute(tree, id, attribute)?;
        }

        let signature_name = Signature::element_name();
        for child in &element.children {
            match child {
                Node::Element(e) if e.name == signature_name && provider.schema.signable => {
                    if tree[id].signature().is_some() {
                        return Err(UnmarshallingError::InvalidSignature(format!(
                            "{} carries more than one Signature",
                            element.name
                        )));
                    }
                    tree.set_signature(id, Signature::from_element(e)?)?;
                }
                Node::Element(e) => {
                    let child_id = self.unmarshall_element(tree, e, Some(id), &scope)?;
                    tree.append_child(id, child_id)?;
                }
                Node::Text(text) if provider.schema.allows_text() => tree.push_text(id, text),
                Node::Text(text) if text.trim().is_empty() => {}
                Node::Text(_) => return Err(UnmarshallingError::UnexpectedText(element.name.clone())),
                Node::Comment(_) => {}
            }
        }

        tree.cache_dom(id, element.clone());
        Ok(id)
    }
}
