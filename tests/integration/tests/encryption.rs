//! Encrypted attributes and identifiers carried through marshalled XML.

use std::sync::Arc;

use anyhow::Context;
use http::header;
use kc_crypto::{DataEncryptionAlgorithm, KeyTransportAlgorithm};
use kc_protocol_saml::bindings::{BindingContext, HttpRedirectDecoder, HttpRedirectEncoder};
use kc_protocol_saml::encryption::{
    DecryptedIdentifier, Decrypter, EncryptedElementKind, EncryptionParameters, KeyPlacement,
};
use kc_protocol_saml::security::{Credential, StaticCredentialResolver};
use kc_protocol_saml::signature::{SignatureConfig, SignatureValidator};
use kc_protocol_saml::types::constants::{saml, samlp, xenc};
use kc_protocol_saml::{default_registry, SamlConfig};
use kc_xml::{QName, Unmarshalling, XmlObjectTree};

use crate::common::*;

const SLO_URL: &str = "https://idp.example.org/slo";

fn sp_config() -> SamlConfig {
    let mut config = SamlConfig::default();
    config.encryption = EncryptionParameters {
        data_algorithm: DataEncryptionAlgorithm::Aes128Gcm,
        key_transport: KeyTransportAlgorithm::RsaOaepSha256,
        key_placement: KeyPlacement::Peer,
        recipient: Some(SP_ENTITY.to_string()),
    };
    config.decryption.recipients = vec![SP_ENTITY.to_string()];
    config
}

#[test]
fn encrypted_attribute_survives_the_wire() -> anyhow::Result<()> {
    init_tracing();
    let registry = default_registry();
    let config = sp_config();

    let mut tree = XmlObjectTree::new();
    let response = build_response(&registry, &mut tree, "_resp-6")?;
    let assertion = build_assertion(&registry, &mut tree, "_assert-6", "alice@example.org")?;
    let statement = registry.build(&mut tree, &saml("AttributeStatement"))?;
    let attribute = registry.build(&mut tree, &saml("Attribute"))?;
    tree.set_attribute(attribute, QName::local("Name"), "mail");
    let value = registry.build(&mut tree, &saml("AttributeValue"))?;
    tree.set_text(value, "alice@example.org");
    tree.append_child(attribute, value)?;
    tree.append_child(statement, attribute)?;
    tree.append_child(assertion, statement)?;
    tree.append_child(response, assertion)?;

    let recipient = Credential::from_certificate_pem(SP_CERT)?;
    let wrapper = config
        .encrypter()
        .encrypt(&registry, &mut tree, attribute, EncryptedElementKind::Attribute, &recipient)?;
    assert_eq!(tree.parent(wrapper), Some(statement));
    assert_eq!(tree.children_named(wrapper, &xenc("EncryptedKey")).len(), 1);

    let xml = to_xml(&registry, &mut tree, response)?;
    assert!(xml.contains(r#"Recipient="https://sp.example.org""#));
    assert!(!xml.contains(r#"Name="mail""#));

    let mut received = Unmarshalling::new(&registry).unmarshall_str(&xml)?;
    let root = received.root().context("no root")?;
    let assertion = received.first_child_named(root, &saml("Assertion")).context("assertion")?;
    let statement = received
        .first_child_named(assertion, &saml("AttributeStatement"))
        .context("statement")?;
    let wrapper = received
        .first_child_named(statement, &saml("EncryptedAttribute"))
        .context("encrypted attribute")?;

    let plaintext = config
        .decrypter(sp_keys()?)
        .decrypt_attribute(&registry, &mut received, wrapper)?;
    let attribute = plaintext.root().context("no plaintext root")?;
    assert_eq!(plaintext[attribute].attribute_str("Name"), Some("mail"));
    let value = plaintext
        .first_child_named(attribute, &saml("AttributeValue"))
        .context("value")?;
    assert_eq!(plaintext[value].text_content(), "alice@example.org");

    let elsewhere = Decrypter::with_kek_resolver(sp_keys()?, vec!["https://other.example.org".to_string()]);
    assert!(elsewhere.decrypt_attribute(&registry, &mut received, wrapper).is_err());
    Ok(())
}

#[test]
fn encrypted_name_id_in_logout_request_over_redirect() -> anyhow::Result<()> {
    init_tracing();
    let registry = Arc::new(default_registry());
    let config = SamlConfig::default();

    let mut tree = XmlObjectTree::new();
    let request = registry.build(&mut tree, &samlp("LogoutRequest"))?;
    tree.set_attribute(request, QName::local("ID"), "_logout-1");
    tree.set_attribute(request, QName::local("IssueInstant"), ISSUE_INSTANT);
    let issuer = registry.build(&mut tree, &saml("Issuer"))?;
    tree.set_text(issuer, SP_ENTITY);
    tree.append_child(request, issuer)?;
    let name_id = build_name_id(&registry, &mut tree, "alice@example.org")?;
    tree.append_child(request, name_id)?;
    tree.set_root(request)?;

    let idp_public = Credential::from_certificate_pem(IDP_CERT)?;
    config
        .encrypter()
        .encrypt(&registry, &mut tree, name_id, EncryptedElementKind::Id, &idp_public)?;

    let encoder = HttpRedirectEncoder::new(registry.clone(), config.signer(), config.binding.clone());
    let mut context = BindingContext::new(tree, request)
        .with_endpoint(SLO_URL)
        .with_signing_credential(sp_credential()?);
    let http_response = encoder.encode(&mut context)?;
    let url = http_response
        .headers()
        .get(header::LOCATION)
        .context("no Location")?
        .to_str()?
        .to_string();

    let verifier = SignatureValidator::new(trust(&[SP_CERT])?, SignatureConfig::default());
    let mut decoded = HttpRedirectDecoder::new(registry.clone(), config.binding.clone())
        .with_verifier(verifier)
        .decode_url(&url)?;
    assert!(decoded.signature_verified);
    assert!(decoded
        .tree
        .first_child_named(decoded.message, &saml("NameID"))
        .is_none());
    let wrapper = decoded
        .tree
        .first_child_named(decoded.message, &saml("EncryptedID"))
        .context("encrypted id")?;

    let idp_keys = Arc::new(StaticCredentialResolver::new(vec![idp_credential()?]));
    let identifier = config
        .decrypter(idp_keys)
        .decrypt_id(&registry, &mut decoded.tree, wrapper)?;
    let DecryptedIdentifier::NameId(plaintext) = identifier else {
        panic!("expected a NameID");
    };
    let root = plaintext.root().context("no plaintext root")?;
    assert_eq!(plaintext[root].text_content(), "alice@example.org");

    let sp_only = config.decrypter(sp_keys()?);
    assert!(sp_only.decrypt_id(&registry, &mut decoded.tree, wrapper).is_err());
    Ok(())
}

#[test]
fn new_encrypted_id_round_trips_as_a_document() -> anyhow::Result<()> {
    init_tracing();
    let registry = default_registry();
    let mut config = sp_config();
    config.encryption.key_placement = KeyPlacement::Inline;
    config.decryption.root_in_new_document = true;

    let mut tree = XmlObjectTree::new();
    let new_id = registry.build(&mut tree, &samlp("NewID"))?;
    tree.set_text(new_id, "pseudonym-1f9e");
    let recipient = Credential::from_certificate_pem(SP_CERT)?;
    let wrapper = config
        .encrypter()
        .encrypt(&registry, &mut tree, new_id, EncryptedElementKind::NewId, &recipient)?;
    let xml = to_xml(&registry, &mut tree, wrapper)?;
    assert!(!xml.contains("pseudonym-1f9e"));

    let mut received = Unmarshalling::new(&registry).unmarshall_str(&xml)?;
    let wrapper = received.root().context("no root")?;
    assert_eq!(received[wrapper].element_name(), &samlp("NewEncryptedID"));

    let plaintext = config
        .decrypter(sp_keys()?)
        .decrypt_new_id(&registry, &mut received, wrapper)?;
    let root = plaintext.root().context("no plaintext root")?;
    assert_eq!(plaintext[root].element_name(), &samlp("NewID"));
    assert_eq!(plaintext[root].text_content(), "pseudonym-1f9e");
    Ok(())
}
