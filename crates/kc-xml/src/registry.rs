//! Type registry mapping qualified names to object providers.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::dom::{Attribute, Element};
use crate::error::{MarshallingError, TreeError, UnmarshallingError};
use crate::name::QName;
use crate::object::{AttributeValue, NodeId, ProtocolVersion, XmlObjectNode, XmlObjectTree};
use crate::schema::{AttributeKind, ElementSchema};
use crate::validator::{Validator, ValidatorChain};

/// Creates empty nodes of one type.
pub trait XmlObjectBuilder: Send + Sync {
    /// Builds a detached node named `element_name`.
    fn build(&self, element_name: QName, schema_type: Option<QName>) -> XmlObjectNode;
}

/// Writes a node's attributes onto its DOM element.
///
/// Child elements, `xsi:type` and the signature are handled by
/// [`crate::Marshalling`]; implementations only deal with attributes.
pub trait Marshaller: Send + Sync {
    /// Renders the attributes of `id` onto `element`.
    ///
    /// # Errors
    ///
    /// Implementations fail when a value cannot be rendered.
    fn marshall_attributes(
        &self,
        tree: &XmlObjectTree,
        id: NodeId,
        element: &mut Element,
    ) -> Result<(), MarshallingError> {
        for (name, value) in tree[id].attributes() {
            element.set_attribute(name.clone(), value.to_lexical());
        }
        Ok(())
    }
}

/// Reads attributes from a DOM element into a node.
pub trait Unmarshaller: Send + Sync {
    /// Stores one attribute of the source element on `id`.
    ///
    /// # Errors
    ///
    /// Fails when the value does not match the declared attribute type.
    fn process_attribute(
        &self,
        tree: &mut XmlObjectTree,
        id: NodeId,
        attribute: &Attribute,
    ) -> Result<(), UnmarshallingError> {
        let value = parse_attribute(&tree[id], attribute)?;
        tree.set_attribute(id, attribute.name.clone(), value);
        Ok(())
    }
}

/// Converts an attribute to the type its schema declares.
///
/// # Errors
///
/// Returns [`UnmarshallingError::InvalidAttribute`] for values outside the
/// lexical space of the declared type.
pub fn parse_attribute(
    node: &XmlObjectNode,
    attribute: &Attribute,
) -> Result<AttributeValue, UnmarshallingError> {
    let raw = attribute.value.as_str();
    let invalid = |reason: &str| UnmarshallingError::InvalidAttribute {
        element: node.element_name().clone(),
        attribute: attribute.name.clone(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    Ok(match node.schema().attribute_kind(&attribute.name) {
        AttributeKind::String | AttributeKind::Id => AttributeValue::String(raw.to_string()),
        AttributeKind::Boolean => match raw.trim() {
            "true" | "1" => AttributeValue::Boolean(true),
            "false" | "0" => AttributeValue::Boolean(false),
            _ => return Err(invalid("expected xs:boolean")),
        },
        AttributeKind::Integer => raw
            .trim()
            .parse()
            .map(AttributeValue::Integer)
            .map_err(|_| invalid("expected xs:integer"))?,
        AttributeKind::DateTime => DateTime::parse_from_rfc3339(raw.trim())
            .map(|d| AttributeValue::DateTime(d.with_timezone(&Utc)))
            .map_err(|_| invalid("expected xs:dateTime"))?,
    })
}

/// Builds nodes from an [`ElementSchema`].
#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    schema: Arc<ElementSchema>,
}

impl SchemaBuilder {
    /// Creates a builder for `schema`.
    #[must_use]
    pub fn new(schema: Arc<ElementSchema>) -> Self {
        Self { schema }
    }
}

impl XmlObjectBuilder for SchemaBuilder {
    fn build(&self, element_name: QName, schema_type: Option<QName>) -> XmlObjectNode {
        XmlObjectNode::new(element_name, Arc::clone(&self.schema)).with_schema_type(schema_type)
    }
}

/// Marshaller that renders typed attributes in insertion order.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultMarshaller;

impl Marshaller for DefaultMarshaller {}

/// Unmarshaller that parses attributes by their declared type.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUnmarshaller;

impl Unmarshaller for DefaultUnmarshaller {}

/// Builder, marshaller and unmarshaller for one element type.
#[derive(Clone)]
pub struct ObjectProvider {
    /// Type descriptor.
    pub schema: Arc<ElementSchema>,
    /// Node factory.
    pub builder: Arc<dyn XmlObjectBuilder>,
    /// Attribute renderer.
    pub marshaller: Arc<dyn Marshaller>,
    /// Attribute reader.
    pub unmarshaller: Arc<dyn Unmarshaller>,
}

impl ObjectProvider {
    /// Provider using the default builder, marshaller and unmarshaller.
    #[must_use]
    pub fn from_schema(schema: ElementSchema) -> Self {
        Self::with_codecs(schema, Arc::new(DefaultMarshaller), Arc::new(DefaultUnmarshaller))
    }

    /// Provider with custom attribute handling.
    #[must_use]
    pub fn with_codecs(
        schema: ElementSchema,
        marshaller: Arc<dyn Marshaller>,
        unmarshaller: Arc<dyn Unmarshaller>,
    ) -> Self {
        let schema = Arc::new(schema);
        Self {
            builder: Arc::new(SchemaBuilder::new(Arc::clone(&schema))),
            schema,
            marshaller,
            unmarshaller,
        }
    }
}

impl fmt::Debug for ObjectProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectProvider")
            .field("element", &self.schema.element_name)
            .field("type", &self.schema.type_name)
            .finish_non_exhaustive()
    }
}

/// Registry of element providers and validator chains.
///
/// Callers build one registry, populate it, and share it by reference.
/// Lookups take `&self`, so a populated registry can be read from many
/// threads while another registers additional types.
#[derive(Default)]
pub struct XmlObjectRegistry {
    /// Providers keyed by element name and by schema type name.
    providers: DashMap<QName, ObjectProvider>,

    /// Validator chains keyed the same way.
    validators: RwLock<HashMap<QName, ValidatorChain>>,
}

impl XmlObjectRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `provider` under `name`, replacing any previous entry.
    pub fn register(&self, name: QName, provider: ObjectProvider) {
        debug!(name = %name, "registering XML object provider");
        self.providers.insert(name, provider);
    }

    /// Registers a provider under the schema's element name and, when
    /// present, its type name.
    pub fn register_provider(&self, provider: ObjectProvider) {
        if let Some(type_name) = provider.schema.type_name.clone() {
            self.register(type_name, provider.clone());
        }
        self.register(provider.schema.element_name.clone(), provider);
    }

    /// Shorthand for [`ObjectProvider::from_schema`] plus
    /// [`Self::register_provider`].
    pub fn register_schema(&self, schema: ElementSchema) {
        self.register_provider(ObjectProvider::from_schema(schema));
    }

    /// Provider for `name`.
    #[must_use]
    pub fn lookup(&self, name: &QName) -> Option<ObjectProvider> {
        self.providers.get(name).map(|p| p.clone())
    }

    /// Builder for `name`.
    #[must_use]
    pub fn lookup_builder(&self, name: &QName) -> Option<Arc<dyn XmlObjectBuilder>> {
        self.providers.get(name).map(|p| Arc::clone(&p.builder))
    }

    /// Marshaller for `name`.
    #[must_use]
    pub fn lookup_marshaller(&self, name: &QName) -> Option<Arc<dyn Marshaller>> {
        self.providers.get(name).map(|p| Arc::clone(&p.marshaller))
    }

    /// Unmarshaller for `name`.
    #[must_use]
    pub fn lookup_unmarshaller(&self, name: &QName) -> Option<Arc<dyn Unmarshaller>> {
        self.providers.get(name).map(|p| Arc::clone(&p.unmarshaller))
    }

    /// Checks if `name` has a provider.
    #[must_use]
    pub fn is_registered(&self, name: &QName) -> bool {
        self.providers.contains_key(name)
    }

    /// Number of registered names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Provider for names nobody registered.
    #[must_use]
    pub fn passthrough(&self, name: &QName) -> ObjectProvider {
        ObjectProvider::from_schema(ElementSchema::passthrough(name.clone()))
    }

    /// Appends `validator` to the chain for `name`.
    pub fn register_validator(&self, name: QName, validator: Arc<dyn Validator>) {
        self.validators.write().entry(name).or_default().push(validator);
    }

    /// Chain registered for `name`.
    #[must_use]
    pub fn validators_for(&self, name: &QName) -> Option<ValidatorChain> {
        self.validators.read().get(name).cloned()
    }

    /// Builds and inserts a detached node for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnregisteredType`] when no builder exists.
    pub fn build(&self, tree: &mut XmlObjectTree, name: &QName) -> Result<NodeId, TreeError> {
        let provider = self
            .lookup(name)
            .ok_or_else(|| TreeError::UnregisteredType(name.clone()))?;
        let element_name = if &provider.schema.element_name == name {
            provider.schema.element_name.clone()
        } else {
            name.clone()
        };
        Ok(tree.insert(provider.builder.build(element_name, None)))
    }

    /// Builds a node named `element_name` whose type is given by
    /// `schema_type`, as an `xsi:type` override.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnregisteredType`] when the type is unknown.
    pub fn build_typed(
        &self,
        tree: &mut XmlObjectTree,
        element_name: QName,
        schema_type: &QName,
    ) -> Result<NodeId, TreeError> {
        let provider = self
            .lookup(schema_type)
            .ok_or_else(|| TreeError::UnregisteredType(schema_type.clone()))?;
        let type_name = provider
            .schema
            .type_name
            .clone()
            .unwrap_or_else(|| schema_type.clone());
        Ok(tree.insert(provider.builder.build(element_name, Some(type_name))))
    }

    /// Builds a node with an explicit protocol version.
    ///
    /// # Errors
    ///
    /// Returns [`TreeError::UnregisteredType`] when no builder exists.
    pub fn build_with_version(
        &self,
        tree: &mut XmlObjectTree,
        name: &QName,
        version: ProtocolVersion,
    ) -> Result<NodeId, TreeError> {
        let id = self.build(tree, name)?;
        tree.set_version(id, Some(version));
        Ok(id)
    }
}

impl fmt::Debug for XmlObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlObjectRegistry")
            .field("providers", &self.providers.len())
            .field("validators", &self.validators.read().len())
            .finish()
    }
}
