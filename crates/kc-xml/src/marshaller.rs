//! Object tree to DOM.

use std::sync::Arc;

use tracing::trace;

use crate::dom::{Element, Namespace, Node};
use crate::error::MarshallingError;
use crate::name::QName;
use crate::object::{NodeId, XmlChild, XmlObjectTree};
use crate::registry::{DefaultMarshaller, Marshaller, XmlObjectRegistry};
use crate::schema::ContentModel;

/// Renders object trees using the marshallers of a registry.
#[derive(Debug, Clone, Copy)]
pub struct Marshalling<'r> {
    registry: &'r XmlObjectRegistry,
}

impl<'r> Marshalling<'r> {
    /// Creates a marshalling engine over `registry`.
    #[must_use]
    pub const fn new(registry: &'r XmlObjectRegistry) -> Self {
        Self { registry }
    }

    /// Renders `id` with its signature. A still-valid cached DOM is returned
    /// as is; otherwise the result is cached on the node.
    ///
    /// # Errors
    ///
    /// Fails when a node in the subtree has no marshaller or carries a
    /// signature that has not been computed.
    pub fn marshall(&self, tree: &mut XmlObjectTree, id: NodeId) -> Result<Element, MarshallingError> {
        if let Some(cached) = tree[id].cached_dom() {
            return Ok(cached.clone());
        }
        let element = self.render(tree, id, true)?;
        tree.cache_dom(id, element.clone());
        Ok(element)
    }

    /// Renders `id` without its own signature. Used to produce the content a
    /// signature is computed over; the result is not cached.
    ///
    /// # Errors
    ///
    /// Fails when a node in the subtree has no marshaller or a descendant
    /// carries a signature that has not been computed.
    pub fn marshall_unsigned(
        &self,
        tree: &mut XmlObjectTree,
        id: NodeId,
    ) -> Result<Element, MarshallingError> {
        self.render(tree, id, false)
    }

    fn marshaller_for(&self, tree: &XmlObjectTree, id: NodeId) -> Result<Arc<dyn Marshaller>, MarshallingError> {
        let node = &tree[id];
        let by_type = node
            .schema_type()
            .and_then(|t| self.registry.lookup_marshaller(t));
        by_type
            .or_else(|| self.registry.lookup_marshaller(node.element_name()))
            .or_else(|| {
                matches!(node.schema().content, ContentModel::Any)
                    .then(|| Arc::new(DefaultMarshaller) as Arc<dyn Marshaller>)
            })
            .ok_or_else(|| MarshallingError::NoMarshaller(node.element_name().clone()))
    }

    fn render(
        &self,
        tree: &mut XmlObjectTree,
        id: NodeId,
        with_signature: bool,
    ) -> Result<Element, MarshallingError> {
        let mut content = Vec::with_capacity(tree[id].children().len());
        for child in tree[id].children().to_vec() {
            match child {
                XmlChild::Element(c) => content.push(Node::Element(self.marshall(tree, c)?)),
                XmlChild::Text(t) => content.push(Node::Text(t)),
            }
        }

        let marshaller = self.marshaller_for(tree, id)?;
        let node = &tree[id];
        trace!(element = %node.element_name(), "marshalling");

        let mut element = Element::new(node.element_name().clone());
        for ns in node.namespaces() {
            element.declare_namespace(ns.clone());
        }
        if let Some(schema_type) = node.schema_type() {
            let value = type_reference(&mut element, schema_type);
            element.set_attribute(QName::xsi_type(), value);
        }
        marshaller.marshall_attributes(tree, id, &mut element)?;

        if with_signature {
            if let Some(signature) = node.signature() {
                if !signature.is_computed() {
                    return Err(MarshallingError::SignatureNotComputed(node.element_name().clone()));
                }
                let schema = node.schema();
                let position = match schema.signature_rank() {
                    Some(rank) => content
                        .iter()
                        .position(|n| matches!(n, Node::Element(e) if schema.child_rank(&e.name) > rank))
                        .unwrap_or(content.len()),
                    None => 0,
                };
                content.insert(position, Node::Element(signature.to_element()));
            }
        }

        element.children = content;
        Ok(element)
    }
}

/// Lexical `prefix:local` value for an `xsi:type`, declaring the prefix on
/// `element` when needed.
fn type_reference(element: &mut Element, schema_type: &QName) -> String {
    if !schema_type.has_namespace() {
        return schema_type.local_name().to_string();
    }
    let prefix = match (schema_type.prefix(), element.name.prefix()) {
        (Some(p), _) => p.to_string(),
        (None, Some(p)) if element.name.namespace() == schema_type.namespace() => p.to_string(),
        _ => "xst".to_string(),
    };
    element.declare_namespace(Namespace::new(prefix.clone(), schema_type.namespace()));
    format!("{prefix}:{}", schema_type.local_name())
}
