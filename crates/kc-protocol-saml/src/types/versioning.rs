//! Protocol version attributes.
//!
//! SAML 2.0 messages carry `Version="2.0"`; SAML 1.x messages carry
//! `MajorVersion` and `MinorVersion`. The version lives on the node rather
//! than in its attribute map so nested elements can inherit it.

use kc_xml::dom::{Attribute, Element};
use kc_xml::registry::{parse_attribute, DefaultMarshaller, Marshaller, Unmarshaller};
use kc_xml::{
    MarshallingError, NodeId, ProtocolVersion, QName, UnmarshallingError, VersionEncoding,
    XmlObjectTree,
};

const VERSION: &str = "Version";
const MAJOR_VERSION: &str = "MajorVersion";
const MINOR_VERSION: &str = "MinorVersion";

/// Marshaller that writes the node's protocol version ahead of its other
/// attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedMarshaller;

impl Marshaller for VersionedMarshaller {
    fn marshall_attributes(
        &self,
        tree: &XmlObjectTree,
        id: NodeId,
        element: &mut Element,
    ) -> Result<(), MarshallingError> {
        let node = &tree[id];
        if let Some(version) = node.version() {
            match node.schema().version_encoding {
                VersionEncoding::Single => {
                    element.set_attribute(QName::local(VERSION), version.to_string());
                }
                VersionEncoding::MajorMinor => {
                    element.set_attribute(QName::local(MAJOR_VERSION), version.major.to_string());
                    element.set_attribute(QName::local(MINOR_VERSION), version.minor.to_string());
                }
                VersionEncoding::None => {}
            }
        }
        DefaultMarshaller.marshall_attributes(tree, id, element)
    }
}

/// Unmarshaller that reads version attributes into the node's protocol
/// version and every other attribute by its declared type.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionedUnmarshaller;

impl Unmarshaller for VersionedUnmarshaller {
    fn process_attribute(
        &self,
        tree: &mut XmlObjectTree,
        id: NodeId,
        attribute: &Attribute,
    ) -> Result<(), UnmarshallingError> {
        let version = {
            let node = &tree[id];
            let invalid = |reason: &str| UnmarshallingError::InvalidAttribute {
                element: node.element_name().clone(),
                attribute: attribute.name.clone(),
                value: attribute.value.clone(),
                reason: reason.to_string(),
            };
            let current = node.version().unwrap_or(ProtocolVersion::new(0, 0));
            let local = (!attribute.name.has_namespace()).then(|| attribute.name.local_name());

            match (node.schema().version_encoding, local) {
                (VersionEncoding::Single, Some(VERSION)) => Some(
                    ProtocolVersion::parse(&attribute.value)
                        .ok_or_else(|| invalid("expected a major.minor version"))?,
                ),
                (VersionEncoding::MajorMinor, Some(MAJOR_VERSION)) => Some(ProtocolVersion::new(
                    parse_component(&attribute.value)
                        .ok_or_else(|| invalid("expected a version number"))?,
                    current.minor,
                )),
                (VersionEncoding::MajorMinor, Some(MINOR_VERSION)) => Some(ProtocolVersion::new(
                    current.major,
                    parse_component(&attribute.value)
                        .ok_or_else(|| invalid("expected a version number"))?,
                )),
                _ => None,
            }
        };

        match version {
            Some(version) => tree.set_version(id, Some(version)),
            None => {
                let value = parse_attribute(&tree[id], attribute)?;
                tree.set_attribute(id, attribute.name.clone(), value);
            }
        }
        Ok(())
    }
}

fn parse_component(value: &str) -> Option<u8> {
    value.trim().parse().ok()
}
