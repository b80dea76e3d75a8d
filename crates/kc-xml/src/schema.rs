//! Per-type element descriptors.
//!
//! An [`ElementSchema`] is what the generic engines know about an element
//! type: the order its children appear in, the types of its attributes,
//! which attribute is its XML ID, whether it may carry an enveloped
//! signature and how its protocol version is encoded.

use crate::name::QName;
use crate::ns;
use crate::object::ProtocolVersion;

/// How an element's children are constrained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentModel {
    /// Children appear in the listed order; unlisted names sort last.
    Sequence(Vec<QName>),
    /// Children keep insertion order.
    FreeOrder,
    /// Text only.
    SimpleContent,
    /// Extension point: any element or text, unknown names allowed.
    Any,
}

/// Lexical type of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeKind {
    /// Plain string.
    #[default]
    String,
    /// `xs:ID`; stored as a string and used as a signature reference target.
    Id,
    /// `xs:boolean`.
    Boolean,
    /// `xs:integer`.
    Integer,
    /// `xs:dateTime`, normalized to UTC.
    DateTime,
}

/// A declared attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeSpec {
    /// Attribute name.
    pub name: QName,
    /// Value type.
    pub kind: AttributeKind,
    /// Whether validation requires it.
    pub required: bool,
}

/// Where an element records its protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionEncoding {
    /// Not recorded on this element; inherited from an ancestor.
    #[default]
    None,
    /// `Version="2.0"`.
    Single,
    /// `MajorVersion="1" MinorVersion="1"`.
    MajorMinor,
}

/// Request or response, for bindings that name the form parameter after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `SAMLRequest`.
    Request,
    /// `SAMLResponse`.
    Response,
}

/// Descriptor for one element type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSchema {
    /// Default element name.
    pub element_name: QName,
    /// Schema type name, used for `xsi:type` lookup.
    pub type_name: Option<QName>,
    /// Children constraint.
    pub content: ContentModel,
    /// Declared attributes.
    pub attributes: Vec<AttributeSpec>,
    /// Name of the `xs:ID` attribute.
    pub id_attribute: Option<QName>,
    /// Whether a `ds:Signature` may be attached.
    pub signable: bool,
    /// Version attribute encoding.
    pub version_encoding: VersionEncoding,
    /// Version assigned by builders.
    pub default_version: Option<ProtocolVersion>,
    /// Message kind for top-level protocol messages.
    pub message_kind: Option<MessageKind>,
}

impl ElementSchema {
    /// An element-only type with free child order and no attributes.
    #[must_use]
    pub fn new(element_name: QName) -> Self {
        Self {
            element_name,
            type_name: None,
            content: ContentModel::FreeOrder,
            attributes: Vec::new(),
            id_attribute: None,
            signable: false,
            version_encoding: VersionEncoding::None,
            default_version: None,
            message_kind: None,
        }
    }

    /// Descriptor for elements nobody registered.
    #[must_use]
    pub fn passthrough(element_name: QName) -> Self {
        Self::new(element_name).any_content()
    }

    /// Sets the schema type name.
    #[must_use]
    pub fn with_type(mut self, type_name: QName) -> Self {
        self.type_name = Some(type_name);
        self
    }

    /// Declares ordered children.
    #[must_use]
    pub fn sequence<I: IntoIterator<Item = QName>>(mut self, children: I) -> Self {
        self.content = ContentModel::Sequence(children.into_iter().collect());
        self
    }

    /// Declares unordered children.
    #[must_use]
    pub fn free_order(mut self) -> Self {
        self.content = ContentModel::FreeOrder;
        self
    }

    /// Declares text-only content.
    #[must_use]
    pub fn simple_content(mut self) -> Self {
        self.content = ContentModel::SimpleContent;
        self
    }

    /// Declares an extension point.
    #[must_use]
    pub fn any_content(mut self) -> Self {
        self.content = ContentModel::Any;
        self
    }

    /// Declares an optional unqualified attribute.
    #[must_use]
    pub fn attribute(mut self, local: &str, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeSpec {
            name: QName::local(local),
            kind,
            required: false,
        });
        self
    }

    /// Declares a required unqualified attribute.
    #[must_use]
    pub fn required_attribute(mut self, local: &str, kind: AttributeKind) -> Self {
        self.attributes.push(AttributeSpec {
            name: QName::local(local),
            kind,
            required: true,
        });
        self
    }

    /// Declares the `xs:ID` attribute.
    #[must_use]
    pub fn id_attribute(mut self, local: &str) -> Self {
        self.id_attribute = Some(QName::local(local));
        self.attribute(local, AttributeKind::Id)
    }

    /// Allows an enveloped `ds:Signature` child. Its position comes from
    /// the sequence when listed there, otherwise it goes first.
    #[must_use]
    pub fn signable(mut self) -> Self {
        self.signable = true;
        self
    }

    /// Declares how the element records its protocol version and the
    /// version newly built nodes start with.
    #[must_use]
    pub fn versioned(mut self, encoding: VersionEncoding, default: ProtocolVersion) -> Self {
        self.version_encoding = encoding;
        self.default_version = Some(default);
        self
    }

    /// Marks a top-level protocol message.
    #[must_use]
    pub fn message(mut self, kind: MessageKind) -> Self {
        self.message_kind = Some(kind);
        self
    }

    /// Type of `name`; undeclared attributes are strings.
    #[must_use]
    pub fn attribute_kind(&self, name: &QName) -> AttributeKind {
        self.attributes
            .iter()
            .find(|a| &a.name == name)
            .map(|a| a.kind)
            .unwrap_or_default()
    }

    /// Sort key of a child element under this content model.
    #[must_use]
    pub fn child_rank(&self, child: &QName) -> usize {
        match &self.content {
            ContentModel::Sequence(order) => order
                .iter()
                .position(|n| n == child)
                .unwrap_or(order.len()),
            _ => 0,
        }
    }

    /// Sort key of the enveloped signature, `None` when the content model
    /// does not list it and it goes first.
    #[must_use]
    pub fn signature_rank(&self) -> Option<usize> {
        let signature = QName::new(ns::XMLDSIG_NS, "Signature");
        match &self.content {
            ContentModel::Sequence(order) => order.iter().position(|n| n == &signature),
            _ => None,
        }
    }

    /// Whether character data is allowed.
    #[must_use]
    pub fn allows_text(&self) -> bool {
        matches!(self.content, ContentModel::SimpleContent | ContentModel::Any)
    }

    /// Whether unregistered child elements are allowed.
    #[must_use]
    pub fn allows_unknown_children(&self) -> bool {
        matches!(self.content, ContentModel::Any)
    }
}
