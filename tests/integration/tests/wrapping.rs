//! Signature wrapping and tampering on the wire.

use std::sync::Arc;

use anyhow::Context;
use kc_protocol_saml::bindings::{HttpPostDecoder, SAML_RESPONSE};
use kc_protocol_saml::signature::SignatureFailure;
use kc_protocol_saml::{default_registry, SamlConfig, SamlError};
use kc_xml::{XmlObjectRegistry, XmlObjectTree};

use crate::common::*;

/// Unsigned response wrapping an assertion signed by the identity provider.
fn signed_assertion_response(registry: &XmlObjectRegistry) -> anyhow::Result<String> {
    let config = SamlConfig::default();
    let mut tree = XmlObjectTree::new();
    let response = build_response(registry, &mut tree, "_resp-5")?;
    let assertion = build_assertion(registry, &mut tree, "_assert-5", "alice@example.org")?;
    tree.append_child(response, assertion)?;
    config.signer().sign_object(registry, &mut tree, assertion, &idp_credential()?)?;
    to_xml(registry, &mut tree, response)
}

fn receive(registry: &Arc<XmlObjectRegistry>, xml: &str) -> anyhow::Result<Result<(), SamlError>> {
    let decoder = HttpPostDecoder::new(registry.clone(), SamlConfig::default().binding).with_verifier(idp_verifier()?);
    Ok(decoder.decode(&post_body(SAML_RESPONSE, xml, None), Some(ACS_URL)).map(|_| ()))
}

#[test]
fn untouched_response_verifies() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let xml = signed_assertion_response(&registry)?;
    receive(&registry, &xml)??;
    Ok(())
}

#[test]
fn duplicated_assertion_id_is_a_profile_violation() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let xml = signed_assertion_response(&registry)?;

    let start = xml.find("<saml:Assertion").context("assertion start")?;
    let close = "</saml:Assertion>";
    let end = xml.find(close).context("assertion end")? + close.len();
    let evil = xml[start..end].replace("alice@example.org", "mallory@example.org");
    let wrapped = format!("{}{evil}{}", &xml[..end], &xml[end..]);

    let err = receive(&registry, &wrapped)?.expect_err("ambiguous ID");
    assert!(matches!(err, SamlError::Signature(SignatureFailure::Profile(_))));
    Ok(())
}

#[test]
fn edited_assertion_content_breaks_the_digest() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let xml = signed_assertion_response(&registry)?;

    let tampered = xml.replace("alice@example.org", "mallory@example.org");
    let err = receive(&registry, &tampered)?.expect_err("digest mismatch");
    assert!(matches!(err, SamlError::Signature(SignatureFailure::Verification(_))));
    Ok(())
}

#[test]
fn reference_to_another_element_is_rejected() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let xml = signed_assertion_response(&registry)?;
    assert!(xml.contains(r##"URI="#_assert-5""##));

    let redirected = xml.replace(r##"URI="#_assert-5""##, r##"URI="#_resp-5""##);
    let err = receive(&registry, &redirected)?.expect_err("reference must target its parent");
    assert!(matches!(err, SamlError::Signature(SignatureFailure::Profile(_))));
    Ok(())
}
