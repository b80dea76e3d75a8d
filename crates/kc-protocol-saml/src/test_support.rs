//! Fixtures shared by unit tests.

use chrono::{DateTime, TimeZone, Utc};
use kc_xml::{NodeId, QName, XmlObjectRegistry, XmlObjectTree};

use crate::security::Credential;
use crate::types::constants::{saml, samlp, status_codes};
use crate::types::NameIdFormat;

pub(crate) const IDP_KEY: &str = include_str!("../../../tests/fixtures/idp_key.pem");
pub(crate) const IDP_CERT: &str = include_str!("../../../tests/fixtures/idp_cert.pem");
pub(crate) const SP_KEY: &str = include_str!("../../../tests/fixtures/sp_key.pem");
pub(crate) const SP_CERT: &str = include_str!("../../../tests/fixtures/sp_cert.pem");
pub(crate) const ROGUE_CERT: &str = include_str!("../../../tests/fixtures/rogue_cert.pem");
pub(crate) const EC_KEY: &str = include_str!("../../../tests/fixtures/ec_key.pem");
pub(crate) const EC_CERT: &str = include_str!("../../../tests/fixtures/ec_cert.pem");

pub(crate) fn idp_credential() -> Credential {
    Credential::from_private_key_pem(IDP_KEY, Some(IDP_CERT))
        .unwrap()
        .with_entity_id("https://idp.example.org")
}

pub(crate) fn sp_credential() -> Credential {
    Credential::from_private_key_pem(SP_KEY, Some(SP_CERT))
        .unwrap()
        .with_entity_id("https://sp.example.org")
}

pub(crate) fn instant() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn text_element(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, name: &QName, text: &str) -> NodeId {
    let id = registry.build(tree, name).unwrap();
    tree.set_text(id, text);
    id
}

/// `saml:NameID` in email format.
pub(crate) fn build_name_id(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, value: &str) -> NodeId {
    let name_id = text_element(registry, tree, &saml("NameID"), value);
    tree.set_attribute(name_id, QName::local("Format"), NameIdFormat::Email.uri());
    name_id
}

/// `saml:Assertion` with an issuer and a subject NameID.
pub(crate) fn build_assertion(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, id: &str) -> NodeId {
    let assertion = registry.build(tree, &saml("Assertion")).unwrap();
    tree.set_attribute(assertion, QName::local("ID"), id);
    tree.set_attribute(assertion, QName::local("IssueInstant"), instant());

    let issuer = text_element(registry, tree, &saml("Issuer"), "https://idp.example.org");
    let subject = registry.build(tree, &saml("Subject")).unwrap();
    let name_id = build_name_id(registry, tree, "alice@example.org");
    tree.append_child(subject, name_id).unwrap();
    tree.append_child(assertion, subject).unwrap();
    tree.append_child(assertion, issuer).unwrap();
    assertion
}

/// Successful `samlp:Response` without assertions.
pub(crate) fn build_response(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, id: &str) -> NodeId {
    let response = registry.build(tree, &samlp("Response")).unwrap();
    tree.set_attribute(response, QName::local("ID"), id);
    tree.set_attribute(response, QName::local("IssueInstant"), instant());

    let issuer = text_element(registry, tree, &saml("Issuer"), "https://idp.example.org");
    let status = registry.build(tree, &samlp("Status")).unwrap();
    let code = registry.build(tree, &samlp("StatusCode")).unwrap();
    tree.set_attribute(code, QName::local("Value"), status_codes::SUCCESS);
    tree.append_child(status, code).unwrap();
    tree.append_child(response, issuer).unwrap();
    tree.append_child(response, status).unwrap();
    response
}

/// `samlp:AuthnRequest` from the service provider.
pub(crate) fn build_authn_request(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, id: &str) -> NodeId {
    let request = registry.build(tree, &samlp("AuthnRequest")).unwrap();
    tree.set_attribute(request, QName::local("ID"), id);
    tree.set_attribute(request, QName::local("IssueInstant"), instant());
    tree.set_attribute(
        request,
        QName::local("AssertionConsumerServiceURL"),
        "https://sp.example.org/acs",
    );
    let issuer = text_element(registry, tree, &saml("Issuer"), "https://sp.example.org");
    tree.append_child(request, issuer).unwrap();
    request
}
