//! # kc-xml
//!
//! The generic XML layer SAML objects are built from.
//!
//! Every protocol element is an [`object::XmlObjectNode`] in an arena-backed
//! [`object::XmlObjectTree`]. What a node may contain is described by an
//! [`schema::ElementSchema`], and the mapping from qualified names to
//! builders, marshallers and unmarshallers lives in an explicit
//! [`registry::XmlObjectRegistry`] that callers construct once and share.
//!
//! ```text
//!  XML text ──parse──▶ dom::Element ──Unmarshalling──▶ XmlObjectTree
//!  XML text ◀─to_xml── dom::Element ◀──Marshalling──── XmlObjectTree
//! ```
//!
//! The [`c14n`] module implements exclusive canonicalization over
//! [`dom::Element`], and [`signature`] holds the XML-DSig model attached to
//! signable nodes.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod c14n;
pub mod dom;
pub mod error;
pub mod marshaller;
pub mod name;
pub mod ns;
pub mod object;
pub mod registry;
pub mod schema;
pub mod signature;
pub mod unmarshaller;
pub mod validator;

pub use error::{
    DomError, MarshallingError, TreeError, UnmarshallingError, ValidationError, XmlError,
};
pub use marshaller::Marshalling;
pub use name::QName;
pub use object::{AttributeValue, NodeId, ProtocolVersion, XmlChild, XmlObjectNode, XmlObjectTree};
pub use registry::{ObjectProvider, XmlObjectRegistry};
pub use schema::{AttributeKind, ContentModel, ElementSchema, MessageKind, VersionEncoding};
pub use unmarshaller::{Unmarshalling, UnmarshallingOptions};
pub use validator::{validate_tree, Validator, ValidatorChain};
