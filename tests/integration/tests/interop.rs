//! Messages produced and signed by other SAML implementations.

use std::sync::Arc;

use anyhow::Context;
use kc_protocol_saml::bindings::{HttpPostDecoder, SAML_RESPONSE};
use kc_protocol_saml::types::constants::samlp;
use kc_protocol_saml::{default_registry, SamlConfig};

use crate::common::*;

/// Response signed with the identity provider key by an external tool,
/// stored with CRLF line endings.
const EXTERNAL_RESPONSE: &str = include_str!("../../fixtures/external_signed_response.xml");

#[test]
fn externally_signed_response_with_crlf_line_endings_verifies() -> anyhow::Result<()> {
    init_tracing();
    assert!(EXTERNAL_RESPONSE.contains("\r\n"));
    let registry = Arc::new(default_registry());
    let decoder = HttpPostDecoder::new(registry.clone(), SamlConfig::default().binding).with_verifier(idp_verifier()?);

    let decoded = decoder.decode(&post_body(SAML_RESPONSE, EXTERNAL_RESPONSE, None), Some(ACS_URL))?;
    assert!(decoded.signature_verified);
    assert_eq!(decoded.tree[decoded.message].id(), Some("_ext-1"));

    let status = decoded
        .tree
        .first_child_named(decoded.message, &samlp("Status"))
        .context("status")?;
    let message = decoded
        .tree
        .first_child_named(status, &samlp("StatusMessage"))
        .context("status message")?;
    assert_eq!(decoded.tree[message].text_content(), "Signed by\nan external tool");
    Ok(())
}

#[test]
fn externally_signed_response_detects_edits() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let decoder = HttpPostDecoder::new(registry.clone(), SamlConfig::default().binding).with_verifier(idp_verifier()?);

    let edited = EXTERNAL_RESPONSE.replace("an external tool", "another tool");
    assert!(decoder
        .decode(&post_body(SAML_RESPONSE, &edited, None), Some(ACS_URL))
        .is_err());
    Ok(())
}
