//! Error types for the XML layer.
//!
//! Each stage has its own error so callers can tell a malformed document
//! (`UnmarshallingError`) from a well-formed one that breaks a semantic rule
//! (`ValidationError`). [`XmlError`] is the union returned by operations that
//! span several stages.

use thiserror::Error;

use crate::name::QName;
use crate::object::{NodeId, ProtocolVersion};

/// Failure to parse XML text into a DOM.
#[derive(Debug, Error)]
pub enum DomError {
    /// The text is not well-formed XML.
    #[error("malformed XML at byte {position}: {message}")]
    Malformed {
        /// Byte offset reported by the reader.
        position: usize,
        /// Reader message.
        message: String,
    },

    /// A prefix was used without a declaration in scope.
    #[error("unbound namespace prefix: {0}")]
    UnboundPrefix(String),

    /// Document type declarations are never accepted.
    #[error("DOCTYPE declarations are not allowed")]
    DoctypeNotAllowed,

    /// The input had no document element.
    #[error("no root element")]
    NoRootElement,

    /// More than one element at the top level of a fragment.
    #[error("fragment has more than one root element")]
    MultipleRoots,

    /// Non-whitespace text outside the document element.
    #[error("text content outside the document element")]
    TextOutsideRoot,

    /// Names or text were not valid UTF-8.
    #[error("invalid UTF-8: {0}")]
    Encoding(String),
}

/// Illegal structural change to an object tree.
#[derive(Debug, Error)]
pub enum TreeError {
    /// The node is already attached to a parent.
    #[error("node {0:?} already has a parent")]
    AlreadyAttached(NodeId),

    /// Attaching would make a node its own ancestor.
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// Intended parent.
        parent: NodeId,
        /// Intended child.
        child: NodeId,
    },

    /// The root of a tree cannot become a child.
    #[error("node {0:?} is the tree root")]
    IsRoot(NodeId),

    /// A signature was attached to an element type that cannot carry one.
    #[error("{0} is not signable")]
    NotSignable(QName),

    /// The registry has no builder for this name.
    #[error("no builder registered for {0}")]
    UnregisteredType(QName),
}

/// Failure to turn an object tree into a DOM.
#[derive(Debug, Error)]
pub enum MarshallingError {
    /// The registry has no marshaller for this element or type.
    #[error("no marshaller registered for {0}")]
    NoMarshaller(QName),

    /// A signature is attached but its value has not been computed.
    #[error("signature on {0} has not been computed")]
    SignatureNotComputed(QName),

    /// An attribute value could not be rendered.
    #[error("attribute {attribute} on {element}: {reason}")]
    InvalidAttribute {
        /// Owning element.
        element: QName,
        /// Attribute name.
        attribute: QName,
        /// Why it failed.
        reason: String,
    },
}

/// Malformed or unrecognized content where a known type was required.
#[derive(Debug, Error)]
pub enum UnmarshallingError {
    /// No registered type for this element or its `xsi:type`.
    #[error("unknown element {0}")]
    UnknownElement(QName),

    /// An attribute value does not match its declared type.
    #[error("invalid value {value:?} for attribute {attribute} on {element}: {reason}")]
    InvalidAttribute {
        /// Owning element.
        element: QName,
        /// Attribute name.
        attribute: QName,
        /// Raw value.
        value: String,
        /// Why it failed.
        reason: String,
    },

    /// Character data inside element-only content.
    #[error("unexpected text content in {0}")]
    UnexpectedText(QName),

    /// An `xsi:type` value could not be resolved.
    #[error("invalid xsi:type {0:?}")]
    InvalidSchemaType(String),

    /// A `ds:Signature` block was structurally invalid.
    #[error("invalid signature element: {0}")]
    InvalidSignature(String),

    /// The text did not parse.
    #[error(transparent)]
    Dom(#[from] DomError),

    /// The tree rejected the reconstructed structure.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// A semantic rule violated by an otherwise well-formed object.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required child element is absent.
    #[error("{element} requires a {child} child")]
    MissingChild {
        /// Element being validated.
        element: QName,
        /// Missing child.
        child: QName,
    },

    /// A child element occurs too few or too many times.
    #[error("{element} has {found} {child} children, allowed {min}..{}", upper_bound(.max))]
    Cardinality {
        /// Element being validated.
        element: QName,
        /// Counted child.
        child: QName,
        /// Minimum occurrences.
        min: usize,
        /// Maximum occurrences, `None` for unbounded.
        max: Option<usize>,
        /// Actual occurrences.
        found: usize,
    },

    /// A required attribute is absent.
    #[error("{element} requires attribute {attribute}")]
    MissingAttribute {
        /// Element being validated.
        element: QName,
        /// Missing attribute.
        attribute: QName,
    },

    /// A nested element was declared against another protocol version.
    #[error("{child} declares version {found} inside {element} version {expected}")]
    VersionMismatch {
        /// Container element.
        element: QName,
        /// Offending child.
        child: QName,
        /// Container version.
        expected: ProtocolVersion,
        /// Child version.
        found: ProtocolVersion,
    },

    /// Any other element-specific rule.
    #[error("{element}: {reason}")]
    Rule {
        /// Element being validated.
        element: QName,
        /// Description of the violation.
        reason: String,
    },
}

fn upper_bound(max: &Option<usize>) -> String {
    max.map_or_else(|| "unbounded".to_string(), |m| m.to_string())
}

/// Union of the XML layer's errors.
#[derive(Debug, Error)]
pub enum XmlError {
    /// Parse failure.
    #[error(transparent)]
    Dom(#[from] DomError),

    /// Tree manipulation failure.
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Marshalling failure.
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),

    /// Unmarshalling failure.
    #[error(transparent)]
    Unmarshalling(#[from] UnmarshallingError),

    /// Validation failure.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
