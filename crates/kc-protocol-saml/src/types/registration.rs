//! Default element registrations.
//!
//! [`default_registry`] is the one-time initialization step: it returns a
//! registry populated with every supported SAML, metadata and structural
//! XML-DSig/XML-Enc element plus the default validators. Callers share the
//! result (it is read-mostly) and may register further providers or
//! validators on it before use.

use std::sync::Arc;

use kc_xml::{
    AttributeKind, ElementSchema, MessageKind, ObjectProvider, ProtocolVersion, QName,
    VersionEncoding, XmlObjectRegistry,
};
use kc_xml::AttributeKind::{Boolean, DateTime, Integer};
use tracing::debug;

use super::constants::{ds, md, mdquery, mdui, saml, saml1, saml1p, samlp, xenc};
use super::validators::register_default_validators;
use super::versioning::{VersionedMarshaller, VersionedUnmarshaller};

/// Builds a registry with the default SAML element set and validators.
#[must_use]
pub fn default_registry() -> XmlObjectRegistry {
    let registry = XmlObjectRegistry::new();
    register_saml2_assertion(&registry);
    register_saml2_protocol(&registry);
    register_saml1(&registry);
    register_metadata(&registry);
    register_structural(&registry);
    register_default_validators(&registry);
    debug!(providers = registry.len(), "default SAML registry initialized");
    registry
}

fn versioned(registry: &XmlObjectRegistry, schema: ElementSchema) {
    registry.register_provider(ObjectProvider::with_codecs(
        schema,
        Arc::new(VersionedMarshaller),
        Arc::new(VersionedUnmarshaller),
    ));
}

fn simple(name: QName) -> ElementSchema {
    ElementSchema::new(name).simple_content()
}

fn name_id_type(name: QName) -> ElementSchema {
    simple(name)
        .attribute("NameQualifier", AttributeKind::String)
        .attribute("SPNameQualifier", AttributeKind::String)
        .attribute("Format", AttributeKind::String)
        .attribute("SPProvidedID", AttributeKind::String)
}

fn encrypted_element_type(name: QName) -> ElementSchema {
    ElementSchema::new(name).sequence([xenc("EncryptedData"), xenc("EncryptedKey")])
}

fn saml2_message(name: QName, kind: MessageKind, content: Vec<QName>) -> ElementSchema {
    ElementSchema::new(name)
        .sequence(content)
        .id_attribute("ID")
        .required_attribute("IssueInstant", DateTime)
        .attribute("Destination", AttributeKind::String)
        .attribute("Consent", AttributeKind::String)
        .signable()
        .versioned(VersionEncoding::Single, ProtocolVersion::SAML_20)
        .message(kind)
}

fn register_saml2_assertion(registry: &XmlObjectRegistry) {
    versioned(
        registry,
        ElementSchema::new(saml("Assertion"))
            .sequence([
                saml("Issuer"),
                ds("Signature"),
                saml("Subject"),
                saml("Conditions"),
                saml("Advice"),
                saml("Statement"),
                saml("AuthnStatement"),
                saml("AttributeStatement"),
            ])
            .id_attribute("ID")
            .required_attribute("IssueInstant", DateTime)
            .signable()
            .versioned(VersionEncoding::Single, ProtocolVersion::SAML_20),
    );

    for schema in [
        name_id_type(saml("Issuer")),
        name_id_type(saml("NameID")),
        ElementSchema::new(saml("BaseID"))
            .any_content()
            .attribute("NameQualifier", AttributeKind::String)
            .attribute("SPNameQualifier", AttributeKind::String),
        encrypted_element_type(saml("EncryptedID")),
        encrypted_element_type(saml("EncryptedAssertion")),
        encrypted_element_type(saml("EncryptedAttribute")),
        ElementSchema::new(saml("Subject")).sequence([
            saml("BaseID"),
            saml("NameID"),
            saml("EncryptedID"),
            saml("SubjectConfirmation"),
        ]),
        ElementSchema::new(saml("SubjectConfirmation"))
            .sequence([
                saml("BaseID"),
                saml("NameID"),
                saml("EncryptedID"),
                saml("SubjectConfirmationData"),
            ])
            .required_attribute("Method", AttributeKind::String),
        ElementSchema::new(saml("SubjectConfirmationData"))
            .any_content()
            .attribute("NotBefore", DateTime)
            .attribute("NotOnOrAfter", DateTime)
            .attribute("Recipient", AttributeKind::String)
            .attribute("InResponseTo", AttributeKind::String)
            .attribute("Address", AttributeKind::String),
        ElementSchema::new(saml("Conditions"))
            .sequence([saml("Condition"), saml("AudienceRestriction"), saml("OneTimeUse")])
            .attribute("NotBefore", DateTime)
            .attribute("NotOnOrAfter", DateTime),
        ElementSchema::new(saml("AudienceRestriction")).sequence([saml("Audience")]),
        simple(saml("Audience")),
        ElementSchema::new(saml("OneTimeUse")),
        ElementSchema::new(saml("AuthnStatement"))
            .sequence([saml("SubjectLocality"), saml("AuthnContext")])
            .required_attribute("AuthnInstant", DateTime)
            .attribute("SessionIndex", AttributeKind::String)
            .attribute("SessionNotOnOrAfter", DateTime),
        ElementSchema::new(saml("AuthnContext")).sequence([
            saml("AuthnContextClassRef"),
            saml("AuthnContextDecl"),
            saml("AuthnContextDeclRef"),
            saml("AuthenticatingAuthority"),
        ]),
        simple(saml("AuthnContextClassRef")),
        simple(saml("AuthnContextDeclRef")),
        simple(saml("AuthenticatingAuthority")),
        ElementSchema::new(saml("AuthnContextDecl")).any_content(),
        ElementSchema::new(saml("AttributeStatement")),
        ElementSchema::new(saml("Attribute"))
            .sequence([saml("AttributeValue")])
            .required_attribute("Name", AttributeKind::String)
            .attribute("NameFormat", AttributeKind::String)
            .attribute("FriendlyName", AttributeKind::String),
        ElementSchema::new(saml("AttributeValue")).any_content(),
    ] {
        registry.register_schema(schema);
    }
}

fn register_saml2_protocol(registry: &XmlObjectRegistry) {
    let preamble = || vec![saml("Issuer"), ds("Signature"), samlp("Extensions")];

    versioned(
        registry,
        saml2_message(
            samlp("AuthnRequest"),
            MessageKind::Request,
            [
                preamble(),
                vec![
                    saml("Subject"),
                    samlp("NameIDPolicy"),
                    saml("Conditions"),
                    samlp("RequestedAuthnContext"),
                    samlp("Scoping"),
                ],
            ]
            .concat(),
        )
        .attribute("ForceAuthn", Boolean)
        .attribute("IsPassive", Boolean)
        .attribute("ProtocolBinding", AttributeKind::String)
        .attribute("AssertionConsumerServiceIndex", Integer)
        .attribute("AssertionConsumerServiceURL", AttributeKind::String)
        .attribute("AttributeConsumingServiceIndex", Integer)
        .attribute("ProviderName", AttributeKind::String),
    );
    versioned(
        registry,
        saml2_message(
            samlp("LogoutRequest"),
            MessageKind::Request,
            [
                preamble(),
                vec![
                    saml("BaseID"),
                    saml("NameID"),
                    saml("EncryptedID"),
                    samlp("SessionIndex"),
                ],
            ]
            .concat(),
        )
        .attribute("Reason", AttributeKind::String)
        .attribute("NotOnOrAfter", DateTime),
    );
    versioned(
        registry,
        saml2_message(
            samlp("Response"),
            MessageKind::Response,
            [
                preamble(),
                vec![samlp("Status"), saml("Assertion"), saml("EncryptedAssertion")],
            ]
            .concat(),
        )
        .attribute("InResponseTo", AttributeKind::String),
    );
    versioned(
        registry,
        saml2_message(
            samlp("LogoutResponse"),
            MessageKind::Response,
            [preamble(), vec![samlp("Status")]].concat(),
        )
        .attribute("InResponseTo", AttributeKind::String),
    );

    for schema in [
        ElementSchema::new(samlp("NameIDPolicy"))
            .attribute("Format", AttributeKind::String)
            .attribute("SPNameQualifier", AttributeKind::String)
            .attribute("AllowCreate", Boolean),
        simple(samlp("NewID")),
        encrypted_element_type(samlp("NewEncryptedID")),
        simple(samlp("SessionIndex")),
        ElementSchema::new(samlp("Status")).sequence([
            samlp("StatusCode"),
            samlp("StatusMessage"),
            samlp("StatusDetail"),
        ]),
        ElementSchema::new(samlp("StatusCode"))
            .sequence([samlp("StatusCode")])
            .required_attribute("Value", AttributeKind::String),
        simple(samlp("StatusMessage")),
        ElementSchema::new(samlp("StatusDetail")).any_content(),
        ElementSchema::new(samlp("Extensions")).any_content(),
    ] {
        registry.register_schema(schema);
    }
}

fn register_saml1(registry: &XmlObjectRegistry) {
    versioned(
        registry,
        ElementSchema::new(saml1p("Response"))
            .sequence([ds("Signature"), saml1p("Status"), saml1("Assertion")])
            .id_attribute("ResponseID")
            .required_attribute("IssueInstant", DateTime)
            .attribute("InResponseTo", AttributeKind::String)
            .attribute("Recipient", AttributeKind::String)
            .signable()
            .versioned(VersionEncoding::MajorMinor, ProtocolVersion::SAML_11)
            .message(MessageKind::Response),
    );
    versioned(
        registry,
        ElementSchema::new(saml1("Assertion"))
            .sequence([
                saml1("Conditions"),
                saml1("Advice"),
                saml1("Statement"),
                saml1("AuthenticationStatement"),
                saml1("AttributeStatement"),
                saml1("AuthorizationDecisionStatement"),
                ds("Signature"),
            ])
            .id_attribute("AssertionID")
            .required_attribute("Issuer", AttributeKind::String)
            .required_attribute("IssueInstant", DateTime)
            .signable()
            .versioned(VersionEncoding::MajorMinor, ProtocolVersion::SAML_11),
    );

    for schema in [
        ElementSchema::new(saml1p("Status")).sequence([
            saml1p("StatusCode"),
            saml1p("StatusMessage"),
            saml1p("StatusDetail"),
        ]),
        ElementSchema::new(saml1p("StatusCode"))
            .sequence([saml1p("StatusCode")])
            .required_attribute("Value", AttributeKind::String),
        simple(saml1p("StatusMessage")),
        ElementSchema::new(saml1p("StatusDetail")).any_content(),
        ElementSchema::new(saml1("Conditions"))
            .attribute("NotBefore", DateTime)
            .attribute("NotOnOrAfter", DateTime),
        ElementSchema::new(saml1("AudienceRestrictionCondition")).sequence([saml1("Audience")]),
        simple(saml1("Audience")),
        ElementSchema::new(saml1("DoNotCacheCondition")),
        simple(saml1("Action")).attribute("Namespace", AttributeKind::String),
    ] {
        registry.register_schema(schema);
    }
}

fn register_metadata(registry: &XmlObjectRegistry) {
    for schema in [
        simple(md("AttributeProfile")),
        simple(md("NameIDFormat")),
        ElementSchema::new(md("Extensions")).any_content(),
        ElementSchema::new(md("KeyDescriptor"))
            .any_content()
            .attribute("use", AttributeKind::String),
        ElementSchema::new(md("AttributeConsumingService"))
            .sequence([
                md("ServiceName"),
                md("ServiceDescription"),
                md("RequestedAttribute"),
            ])
            .required_attribute("index", Integer)
            .attribute("isDefault", Boolean),
        simple(md("ServiceName")),
        simple(md("ServiceDescription")),
        ElementSchema::new(md("RequestedAttribute"))
            .sequence([saml("AttributeValue")])
            .required_attribute("Name", AttributeKind::String)
            .attribute("NameFormat", AttributeKind::String)
            .attribute("FriendlyName", AttributeKind::String)
            .attribute("isRequired", Boolean),
        ElementSchema::new(md("RoleDescriptor"))
            .with_type(mdquery("AttributeQueryDescriptorType"))
            .sequence([
                ds("Signature"),
                md("Extensions"),
                md("KeyDescriptor"),
                md("Organization"),
                md("ContactPerson"),
                md("NameIDFormat"),
                md("AttributeConsumingService"),
            ])
            .id_attribute("ID")
            .attribute("validUntil", DateTime)
            .attribute("cacheDuration", AttributeKind::String)
            .required_attribute("protocolSupportEnumeration", AttributeKind::String)
            .attribute("errorURL", AttributeKind::String)
            .attribute("WantAssertionsSigned", Boolean)
            .signable(),
        ElementSchema::new(mdui("DiscoHints")),
        simple(mdui("IPHint")),
        simple(mdui("DomainHint")),
        simple(mdui("GeolocationHint")),
    ] {
        registry.register_schema(schema);
    }
}

fn register_structural(registry: &XmlObjectRegistry) {
    for schema in [
        ElementSchema::new(xenc("EncryptedData"))
            .any_content()
            .attribute("Id", AttributeKind::String)
            .attribute("Type", AttributeKind::String)
            .attribute("MimeType", AttributeKind::String)
            .attribute("Encoding", AttributeKind::String),
        ElementSchema::new(xenc("EncryptedKey"))
            .any_content()
            .attribute("Id", AttributeKind::String)
            .attribute("Type", AttributeKind::String)
            .attribute("Recipient", AttributeKind::String),
        ElementSchema::new(ds("KeyInfo")).any_content(),
    ] {
        registry.register_schema(schema);
    }
}
