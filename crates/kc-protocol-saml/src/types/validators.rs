//! SAML validation rules.
//!
//! Each rule is registered against the element or type it constrains, so a
//! new rule never touches the chains of unrelated elements.

use std::sync::Arc;

use kc_xml::validator::{ChildCardinality, RequiredAttribute, RequiredChild, VersionConsistency};
use kc_xml::{NodeId, ProtocolVersion, QName, ValidationError, Validator, XmlObjectRegistry, XmlObjectTree};

use super::constants::{saml, saml1, samlp, xenc};

/// Requires SAML 2.0 messages and assertions to declare `Version="2.0"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Saml20Version;

impl Validator for Saml20Version {
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        match tree[id].version() {
            Some(ProtocolVersion::SAML_20) => Ok(()),
            Some(other) => Err(ValidationError::Rule {
                element: tree[id].element_name().clone(),
                reason: format!("version {other} is not SAML 2.0"),
            }),
            None => Err(ValidationError::Rule {
                element: tree[id].element_name().clone(),
                reason: "Version is required".to_string(),
            }),
        }
    }
}

/// SAML 1.0 has no `DoNotCacheCondition`; it was introduced in 1.1.
#[derive(Debug, Clone, Copy, Default)]
pub struct DoNotCacheRequiresSaml11;

impl Validator for DoNotCacheRequiresSaml11 {
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        let do_not_cache = saml1("DoNotCacheCondition");
        if tree.effective_version(id) == Some(ProtocolVersion::SAML_10)
            && tree.first_child_named(id, &do_not_cache).is_some()
        {
            return Err(ValidationError::Rule {
                element: tree[id].element_name().clone(),
                reason: "DoNotCacheCondition is not allowed in SAML 1.0".to_string(),
            });
        }
        Ok(())
    }
}

/// Registers the default SAML rules on `registry`.
pub fn register_default_validators(registry: &XmlObjectRegistry) {
    let id = || Arc::new(RequiredAttribute::new(QName::local("ID")));

    for message in [
        saml("Assertion"),
        samlp("AuthnRequest"),
        samlp("LogoutRequest"),
        samlp("Response"),
        samlp("LogoutResponse"),
    ] {
        registry.register_validator(message.clone(), Arc::new(Saml20Version));
        registry.register_validator(message, id());
    }

    registry.register_validator(samlp("Response"), Arc::new(RequiredChild::new(samlp("Status"))));
    registry.register_validator(
        samlp("LogoutResponse"),
        Arc::new(RequiredChild::new(samlp("Status"))),
    );
    registry.register_validator(samlp("Status"), Arc::new(RequiredChild::new(samlp("StatusCode"))));
    registry.register_validator(
        samlp("StatusCode"),
        Arc::new(ChildCardinality::new(samlp("StatusCode"), 0, Some(1))),
    );
    registry.register_validator(saml("Assertion"), Arc::new(RequiredChild::new(saml("Issuer"))));
    registry.register_validator(
        saml("AudienceRestriction"),
        Arc::new(ChildCardinality::new(saml("Audience"), 1, None)),
    );

    for wrapper in [
        saml("EncryptedAssertion"),
        saml("EncryptedAttribute"),
        saml("EncryptedID"),
        samlp("NewEncryptedID"),
    ] {
        registry.register_validator(
            wrapper,
            Arc::new(ChildCardinality::new(xenc("EncryptedData"), 1, Some(1))),
        );
    }

    registry.register_validator(saml1("Conditions"), Arc::new(VersionConsistency));
    registry.register_validator(saml1("Conditions"), Arc::new(DoNotCacheRequiresSaml11));
    registry.register_validator(
        saml1("AudienceRestrictionCondition"),
        Arc::new(ChildCardinality::new(saml1("Audience"), 1, None)),
    );
}
