//! Common test utilities and fixtures.

use std::sync::Arc;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kc_protocol_saml::security::{Credential, StaticCredentialResolver};
use kc_protocol_saml::signature::{SignatureConfig, SignatureValidator};
use kc_protocol_saml::types::constants::{saml, samlp, status_codes};
use kc_protocol_saml::NameIdFormat;
use kc_xml::{Marshalling, NodeId, QName, XmlObjectRegistry, XmlObjectTree};

pub const IDP_KEY: &str = include_str!("../../fixtures/idp_key.pem");
pub const IDP_CERT: &str = include_str!("../../fixtures/idp_cert.pem");
pub const SP_KEY: &str = include_str!("../../fixtures/sp_key.pem");
pub const SP_CERT: &str = include_str!("../../fixtures/sp_cert.pem");
pub const ROGUE_KEY: &str = include_str!("../../fixtures/rogue_key.pem");
pub const ROGUE_CERT: &str = include_str!("../../fixtures/rogue_cert.pem");

pub const IDP_ENTITY: &str = "https://idp.example.org";
pub const SP_ENTITY: &str = "https://sp.example.org";
pub const ACS_URL: &str = "https://sp.example.org/acs";
pub const SSO_URL: &str = "https://idp.example.org/sso";
pub const ISSUE_INSTANT: &str = "2024-01-01T12:00:00Z";

/// Installs a test subscriber once per process; `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kc_protocol_saml=debug,kc_xml=info".into()),
        )
        .with_test_writer()
        .try_init();
}

pub fn idp_credential() -> anyhow::Result<Credential> {
    Ok(Credential::from_private_key_pem(IDP_KEY, Some(IDP_CERT))?.with_entity_id(IDP_ENTITY))
}

pub fn sp_credential() -> anyhow::Result<Credential> {
    Ok(Credential::from_private_key_pem(SP_KEY, Some(SP_CERT))?.with_entity_id(SP_ENTITY))
}

pub fn rogue_credential() -> anyhow::Result<Credential> {
    Ok(Credential::from_private_key_pem(ROGUE_KEY, Some(ROGUE_CERT))?)
}

/// Resolver trusting the certificates in `pems`.
pub fn trust(pems: &[&str]) -> anyhow::Result<Arc<StaticCredentialResolver>> {
    let credentials = pems
        .iter()
        .map(|pem| Credential::from_certificate_pem(pem))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Arc::new(StaticCredentialResolver::new(credentials)))
}

/// Verifier trusting the identity provider certificate.
pub fn idp_verifier() -> anyhow::Result<SignatureValidator> {
    Ok(SignatureValidator::new(trust(&[IDP_CERT])?, SignatureConfig::default()))
}

/// Resolver holding the service provider's private key.
pub fn sp_keys() -> anyhow::Result<Arc<StaticCredentialResolver>> {
    Ok(Arc::new(StaticCredentialResolver::new(vec![sp_credential()?])))
}

fn text_element(
    registry: &XmlObjectRegistry,
    tree: &mut XmlObjectTree,
    name: &QName,
    text: &str,
) -> anyhow::Result<NodeId> {
    let id = registry.build(tree, name)?;
    tree.set_text(id, text);
    Ok(id)
}

fn issuer(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, entity: &str) -> anyhow::Result<NodeId> {
    text_element(registry, tree, &saml("Issuer"), entity)
}

/// `saml:NameID` in email format.
pub fn build_name_id(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, email: &str) -> anyhow::Result<NodeId> {
    let id = text_element(registry, tree, &saml("NameID"), email)?;
    tree.set_attribute(id, QName::local("Format"), NameIdFormat::Email.uri());
    Ok(id)
}

/// Assertion about `email` with a subject and an audience restriction.
pub fn build_assertion(
    registry: &XmlObjectRegistry,
    tree: &mut XmlObjectTree,
    id: &str,
    email: &str,
) -> anyhow::Result<NodeId> {
    let assertion = registry.build(tree, &saml("Assertion"))?;
    tree.set_attribute(assertion, QName::local("ID"), id);
    tree.set_attribute(assertion, QName::local("IssueInstant"), ISSUE_INSTANT);

    let issuer = issuer(registry, tree, IDP_ENTITY)?;
    tree.append_child(assertion, issuer)?;

    let subject = registry.build(tree, &saml("Subject"))?;
    let name_id = build_name_id(registry, tree, email)?;
    tree.append_child(subject, name_id)?;
    tree.append_child(assertion, subject)?;

    let conditions = registry.build(tree, &saml("Conditions"))?;
    let restriction = registry.build(tree, &saml("AudienceRestriction"))?;
    let audience = text_element(registry, tree, &saml("Audience"), SP_ENTITY)?;
    tree.append_child(restriction, audience)?;
    tree.append_child(conditions, restriction)?;
    tree.append_child(assertion, conditions)?;
    Ok(assertion)
}

/// Successful response addressed to the assertion consumer service.
pub fn build_response(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, id: &str) -> anyhow::Result<NodeId> {
    let response = registry.build(tree, &samlp("Response"))?;
    tree.set_attribute(response, QName::local("ID"), id);
    tree.set_attribute(response, QName::local("IssueInstant"), ISSUE_INSTANT);
    tree.set_attribute(response, QName::local("Destination"), ACS_URL);

    let issuer = issuer(registry, tree, IDP_ENTITY)?;
    let status = registry.build(tree, &samlp("Status"))?;
    let code = registry.build(tree, &samlp("StatusCode"))?;
    tree.set_attribute(code, QName::local("Value"), status_codes::SUCCESS);
    tree.append_child(status, code)?;
    tree.append_child(response, issuer)?;
    tree.append_child(response, status)?;
    tree.set_root(response)?;
    Ok(response)
}

/// Authentication request from the service provider.
pub fn build_authn_request(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, id: &str) -> anyhow::Result<NodeId> {
    let request = registry.build(tree, &samlp("AuthnRequest"))?;
    tree.set_attribute(request, QName::local("ID"), id);
    tree.set_attribute(request, QName::local("IssueInstant"), ISSUE_INSTANT);
    tree.set_attribute(request, QName::local("AssertionConsumerServiceURL"), ACS_URL);
    let issuer = issuer(registry, tree, SP_ENTITY)?;
    tree.append_child(request, issuer)?;
    tree.set_root(request)?;
    Ok(request)
}

/// Serializes the subtree at `id`.
pub fn to_xml(registry: &XmlObjectRegistry, tree: &mut XmlObjectTree, id: NodeId) -> anyhow::Result<String> {
    Ok(Marshalling::new(registry).marshall(tree, id)?.to_xml())
}

/// POST form body carrying `xml` under `parameter`.
pub fn post_body(parameter: &str, xml: &str, relay_state: Option<&str>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer.append_pair(parameter, &STANDARD.encode(xml));
    if let Some(relay_state) = relay_state {
        serializer.append_pair("RelayState", relay_state);
    }
    serializer.finish()
}

/// Reads a hidden input of an auto-submit form, undoing HTML escaping.
pub fn form_value(html: &str, name: &str) -> anyhow::Result<String> {
    let marker = format!(r#"name="{name}" value=""#);
    let start = html.find(&marker).context("input not found")? + marker.len();
    let end = html[start..].find('"').context("unterminated value")?;
    Ok(html[start..start + end]
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&"))
}

/// Turns an encoded POST page back into the form body a browser submits.
pub fn submit(html: &str, parameter: &str) -> anyhow::Result<String> {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    serializer.append_pair(parameter, &form_value(html, parameter)?);
    if let Ok(relay_state) = form_value(html, "RelayState") {
        serializer.append_pair("RelayState", &relay_state);
    }
    Ok(serializer.finish())
}

/// Decoded XML of a POST form field.
pub fn posted_xml(html: &str, parameter: &str) -> anyhow::Result<String> {
    let bytes = STANDARD.decode(form_value(html, parameter)?)?;
    Ok(String::from_utf8(bytes)?)
}
