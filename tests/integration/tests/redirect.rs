//! Service provider initiated login over the Redirect binding.

use std::sync::Arc;

use anyhow::Context;
use http::{header, StatusCode};
use kc_protocol_saml::bindings::{
    BindingConfig, BindingContext, BindingError, HttpRedirectDecoder, HttpRedirectEncoder, RelayStatePolicy,
};
use kc_protocol_saml::signature::{SignatureConfig, SignatureFailure, SignatureValidator};
use kc_protocol_saml::types::constants::saml;
use kc_protocol_saml::{default_registry, SamlConfig, SamlError};
use kc_xml::{MessageKind, XmlObjectRegistry, XmlObjectTree};

use crate::common::*;

fn authn_request_context(registry: &XmlObjectRegistry, relay_state: &str) -> anyhow::Result<BindingContext> {
    let mut tree = XmlObjectTree::new();
    let request = build_authn_request(registry, &mut tree, "_req-1")?;
    Ok(BindingContext::new(tree, request)
        .with_endpoint(SSO_URL)
        .with_relay_state(relay_state))
}

fn location(response: &http::Response<String>) -> anyhow::Result<String> {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert!(response.body().is_empty());
    Ok(response
        .headers()
        .get(header::LOCATION)
        .context("no Location header")?
        .to_str()?
        .to_string())
}

fn idp_decoder(registry: &Arc<XmlObjectRegistry>, config: BindingConfig) -> anyhow::Result<HttpRedirectDecoder> {
    let verifier = SignatureValidator::new(trust(&[SP_CERT])?, SignatureConfig::default());
    Ok(HttpRedirectDecoder::new(registry.clone(), config).with_verifier(verifier))
}

#[test]
fn signed_authn_request_round_trips() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();
    let encoder = HttpRedirectEncoder::new(registry.clone(), config.signer(), config.binding.clone());

    let mut context = authn_request_context(&registry, "session-7f3a")?.with_signing_credential(sp_credential()?);
    let url = location(&encoder.encode(&mut context)?)?;
    assert!(url.starts_with(&format!("{SSO_URL}?SAMLRequest=")));
    assert!(url.contains("&RelayState=session-7f3a&SigAlg="));
    assert!(url.contains("&Signature="));

    let decoded = idp_decoder(&registry, config.binding.clone())?.decode_url(&url)?;
    assert!(decoded.signature_verified);
    assert_eq!(decoded.message_kind(), Some(MessageKind::Request));
    assert_eq!(decoded.relay_state.as_deref(), Some("session-7f3a"));
    assert_eq!(decoded.endpoint.as_deref(), Some(SSO_URL));
    assert_eq!(decoded.tree[decoded.message].id(), Some("_req-1"));
    assert!(decoded.tree[decoded.message].signature().is_none());

    let issuer = decoded
        .tree
        .first_child_named(decoded.message, &saml("Issuer"))
        .context("no issuer")?;
    assert_eq!(decoded.tree[issuer].text_content(), SP_ENTITY);
    Ok(())
}

#[test]
fn relay_state_past_the_limit_is_carried_unchanged() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();
    let encoder = HttpRedirectEncoder::new(registry.clone(), config.signer(), config.binding.clone());
    let decoder = idp_decoder(&registry, config.binding.clone())?;

    for length in [80, 81, 200] {
        let relay_state = "r".repeat(length);
        let mut context = authn_request_context(&registry, &relay_state)?.with_signing_credential(sp_credential()?);
        let decoded = decoder.decode_url(&location(&encoder.encode(&mut context)?)?)?;
        assert_eq!(decoded.relay_state.as_deref(), Some(relay_state.as_str()));
    }

    let strict = BindingConfig {
        relay_state_policy: RelayStatePolicy::Reject,
        ..BindingConfig::default()
    };
    let encoder = HttpRedirectEncoder::new(registry.clone(), config.signer(), strict);
    let mut context = authn_request_context(&registry, &"r".repeat(81))?;
    let err = encoder.encode(&mut context).expect_err("relay state too long");
    assert!(matches!(err, SamlError::Binding(BindingError::RelayStateTooLong(81))));
    Ok(())
}

#[test]
fn altered_query_fails_verification() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();
    let encoder = HttpRedirectEncoder::new(registry.clone(), config.signer(), config.binding.clone());
    let mut context = authn_request_context(&registry, "original")?.with_signing_credential(sp_credential()?);
    let url = location(&encoder.encode(&mut context)?)?;
    let decoder = idp_decoder(&registry, config.binding.clone())?;

    let tampered = url.replace("RelayState=original", "RelayState=replaced");
    let err = decoder.decode_url(&tampered).expect_err("tampered relay state");
    assert!(matches!(
        err,
        SamlError::Signature(SignatureFailure::Verification(_) | SignatureFailure::NoTrustedKey)
    ));

    let mut context = authn_request_context(&registry, "original")?.with_signing_credential(rogue_credential()?);
    let forged = location(&encoder.encode(&mut context)?)?;
    assert!(decoder.decode_url(&forged).is_err());
    Ok(())
}

#[test]
fn unsigned_query_is_refused_when_signatures_are_required() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();
    let encoder = HttpRedirectEncoder::new(registry.clone(), config.signer(), config.binding.clone());
    let mut context = authn_request_context(&registry, "")?;
    let url = location(&encoder.encode(&mut context)?)?;
    assert!(!url.contains("RelayState="));
    assert!(!url.contains("SigAlg="));

    let lenient = idp_decoder(&registry, config.binding.clone())?.decode_url(&url)?;
    assert!(!lenient.signature_verified);
    assert_eq!(lenient.relay_state, None);

    let strict = BindingConfig {
        require_signature: true,
        ..BindingConfig::default()
    };
    let err = idp_decoder(&registry, strict)?.decode_url(&url).expect_err("unsigned request");
    assert!(matches!(err, SamlError::Signature(SignatureFailure::Unsigned(_))));
    Ok(())
}
