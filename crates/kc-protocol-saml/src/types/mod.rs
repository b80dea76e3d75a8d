//! SAML element types.
//!
//! Elements are not modelled as one Rust struct each. They are generic
//! [`kc_xml::XmlObjectNode`]s described by the schemas registered in
//! [`registration`], checked by the rules in [`validators`].

pub mod constants;
pub mod registration;
pub mod validators;
pub mod versioning;

pub use constants::{NameIdFormat, SamlBinding};
pub use registration::default_registry;
