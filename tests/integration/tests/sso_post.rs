//! Web browser SSO over the POST binding: the identity provider signs and
//! encrypts an assertion, signs the response and posts it to the service
//! provider.

use std::sync::Arc;

use anyhow::Context;
use http::{header, StatusCode};
use kc_protocol_saml::bindings::{
    BindingContext, BindingError, HttpPostDecoder, HttpPostEncoder, POST_CONTENT_TYPE, SAML_RESPONSE,
};
use kc_protocol_saml::encryption::{DecryptionError, EncryptedElementKind};
use kc_protocol_saml::security::{Credential, StaticCredentialResolver};
use kc_protocol_saml::signature::SignatureFailure;
use kc_protocol_saml::types::constants::saml;
use kc_protocol_saml::{default_registry, SamlConfig, SamlError};
use kc_xml::{NodeId, XmlObjectRegistry, XmlObjectTree};

use crate::common::*;

/// Signed response carrying a signed and encrypted assertion for `email`,
/// rendered as an auto-submit page.
fn idp_post_page(
    registry: &Arc<XmlObjectRegistry>,
    config: &SamlConfig,
    signing: Credential,
    email: &str,
) -> anyhow::Result<String> {
    let mut tree = XmlObjectTree::new();
    let response = build_response(registry, &mut tree, "_resp-1")?;
    let assertion = build_assertion(registry, &mut tree, "_assert-1", email)?;
    tree.append_child(response, assertion)?;

    config.signer().sign_object(registry, &mut tree, assertion, &signing)?;
    let recipient = Credential::from_certificate_pem(SP_CERT)?;
    config
        .encrypter()
        .encrypt(registry, &mut tree, assertion, EncryptedElementKind::Assertion, &recipient)?;

    let encoder = HttpPostEncoder::new(registry.clone(), config.signer(), config.binding.clone());
    let mut context = BindingContext::new(tree, response)
        .with_endpoint(ACS_URL)
        .with_relay_state("/app/home?tab=1&lang=en")
        .with_signing_credential(signing);
    let http_response = encoder.encode(&mut context)?;

    assert_eq!(http_response.status(), StatusCode::OK);
    assert_eq!(
        http_response.headers().get(header::CONTENT_TYPE).context("content type")?,
        POST_CONTENT_TYPE
    );
    Ok(http_response.into_body())
}

fn sp_decoder(registry: &Arc<XmlObjectRegistry>, config: &SamlConfig) -> anyhow::Result<HttpPostDecoder> {
    Ok(HttpPostDecoder::new(registry.clone(), config.binding.clone())
        .with_verifier(idp_verifier()?)
        .with_decrypter(config.decrypter(sp_keys()?)))
}

fn subject_name(tree: &XmlObjectTree, assertion: NodeId) -> Option<String> {
    let subject = tree.first_child_named(assertion, &saml("Subject"))?;
    let name_id = tree.first_child_named(subject, &saml("NameID"))?;
    Some(tree[name_id].text_content())
}

#[test]
fn encrypted_signed_assertion_reaches_service_provider() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();

    let page = idp_post_page(&registry, &config, idp_credential()?, "alice@example.org")?;
    assert!(posted_xml(&page, SAML_RESPONSE)?.contains("EncryptedAssertion"));
    assert!(!posted_xml(&page, SAML_RESPONSE)?.contains("alice@example.org"));

    let decoded = sp_decoder(&registry, &config)?.decode(&submit(&page, SAML_RESPONSE)?, Some(ACS_URL))?;

    assert!(decoded.signature_verified);
    assert_eq!(decoded.relay_state.as_deref(), Some("/app/home?tab=1&lang=en"));
    assert_eq!(decoded.decrypted_assertions.len(), 1);
    assert_eq!(decoded.verified_assertions, decoded.decrypted_assertions);
    assert!(decoded
        .tree
        .children_named(decoded.message, &saml("EncryptedAssertion"))
        .is_empty());

    let assertion = decoded.decrypted_assertions[0];
    assert_eq!(decoded.tree[assertion].id(), Some("_assert-1"));
    assert_eq!(
        subject_name(&decoded.tree, assertion).as_deref(),
        Some("alice@example.org")
    );
    Ok(())
}

#[test]
fn service_provider_without_the_key_cannot_read_the_assertion() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();
    let page = idp_post_page(&registry, &config, idp_credential()?, "alice@example.org")?;

    let wrong_keys = Arc::new(StaticCredentialResolver::new(vec![rogue_credential()?]));
    let decoder = HttpPostDecoder::new(registry.clone(), config.binding.clone())
        .with_verifier(idp_verifier()?)
        .with_decrypter(config.decrypter(wrong_keys));

    let err = decoder
        .decode(&submit(&page, SAML_RESPONSE)?, Some(ACS_URL))
        .expect_err("decryption must fail");
    assert!(matches!(err, SamlError::Decryption(DecryptionError::KeyResolution(_))));
    Ok(())
}

#[test]
fn response_signed_by_unknown_party_is_rejected() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();
    let page = idp_post_page(&registry, &config, rogue_credential()?, "mallory@example.org")?;

    let err = sp_decoder(&registry, &config)?
        .decode(&submit(&page, SAML_RESPONSE)?, Some(ACS_URL))
        .expect_err("untrusted signer");
    assert!(matches!(
        err,
        SamlError::Signature(SignatureFailure::Verification(_) | SignatureFailure::NoTrustedKey)
    ));
    assert_eq!(err.http_status(), 401);
    Ok(())
}

#[test]
fn signed_assertion_satisfies_signature_requirement() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let mut config = SamlConfig::default();
    config.binding.require_signature = true;

    let mut tree = XmlObjectTree::new();
    let response = build_response(&registry, &mut tree, "_resp-2")?;
    let assertion = build_assertion(&registry, &mut tree, "_assert-2", "bob@example.org")?;
    tree.append_child(response, assertion)?;
    config.signer().sign_object(&registry, &mut tree, assertion, &idp_credential()?)?;
    let xml = to_xml(&registry, &mut tree, response)?;

    let decoded = sp_decoder(&registry, &config)?.decode(&post_body(SAML_RESPONSE, &xml, None), Some(ACS_URL))?;
    assert!(!decoded.signature_verified);
    assert_eq!(decoded.verified_assertions.len(), 1);
    assert!(decoded.decrypted_assertions.is_empty());

    let mut unsigned = XmlObjectTree::new();
    let response = build_response(&registry, &mut unsigned, "_resp-3")?;
    let xml = to_xml(&registry, &mut unsigned, response)?;
    let err = sp_decoder(&registry, &config)?
        .decode(&post_body(SAML_RESPONSE, &xml, None), Some(ACS_URL))
        .expect_err("unsigned message");
    assert!(matches!(err, SamlError::Signature(SignatureFailure::Unsigned(_))));
    Ok(())
}

#[test]
fn response_posted_to_the_wrong_endpoint_is_denied() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();
    let page = idp_post_page(&registry, &config, idp_credential()?, "alice@example.org")?;

    let err = sp_decoder(&registry, &config)?
        .decode(&submit(&page, SAML_RESPONSE)?, Some("https://other.example.org/acs"))
        .expect_err("destination mismatch");
    assert!(matches!(err, SamlError::Binding(BindingError::DestinationMismatch { .. })));
    assert_eq!(err.status_code(), kc_protocol_saml::types::constants::status_codes::REQUEST_DENIED);
    Ok(())
}

#[test]
fn unsigned_assertion_beside_a_signed_one_is_refused() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let mut config = SamlConfig::default();
    config.binding.require_signature = true;

    let mut tree = XmlObjectTree::new();
    let response = build_response(&registry, &mut tree, "_resp-7")?;
    let injected = build_assertion(&registry, &mut tree, "_evil", "mallory@example.org")?;
    let genuine = build_assertion(&registry, &mut tree, "_good", "alice@example.org")?;
    tree.append_child(response, injected)?;
    tree.append_child(response, genuine)?;
    config.signer().sign_object(&registry, &mut tree, genuine, &idp_credential()?)?;
    let xml = to_xml(&registry, &mut tree, response)?;

    let err = sp_decoder(&registry, &config)?
        .decode(&post_body(SAML_RESPONSE, &xml, None), Some(ACS_URL))
        .expect_err("injected assertion is unsigned");
    assert!(matches!(
        err,
        SamlError::Signature(SignatureFailure::Unsigned(ref name)) if *name == saml("Assertion")
    ));

    config.binding.require_signature = false;
    let lenient = sp_decoder(&registry, &config)?.decode(&post_body(SAML_RESPONSE, &xml, None), Some(ACS_URL))?;
    assert_eq!(lenient.verified_assertions.len(), 1);
    assert_eq!(lenient.tree[lenient.verified_assertions[0]].id(), Some("_good"));
    Ok(())
}
