//! Parsing, validation and re-rendering of received XML.

use kc_protocol_saml::config::UnmarshallingConfig;
use kc_protocol_saml::types::constants::{saml, samlp};
use kc_protocol_saml::{default_registry, SamlError};
use kc_xml::{ProtocolVersion, Unmarshalling, UnmarshallingError, ValidationError, XmlError};

use crate::common::*;

const RESPONSE_OPEN: &str = r#"<samlp:Response xmlns:samlp="urn:oasis:names:tc:SAML:2.0:protocol" xmlns:saml="urn:oasis:names:tc:SAML:2.0:assertion" ID="_resp-x" Version="2.0" IssueInstant="2024-01-01T12:00:00Z">"#;
const ISSUER: &str = "<saml:Issuer>https://idp.example.org</saml:Issuer>";
const STATUS: &str = r#"<samlp:Status><samlp:StatusCode Value="urn:oasis:names:tc:SAML:2.0:status:Success"/></samlp:Status>"#;

#[test]
fn response_without_status_fails_validation() -> anyhow::Result<()> {
    init_tracing();
    let registry = default_registry();
    let xml = format!("{RESPONSE_OPEN}{ISSUER}</samlp:Response>");

    let err = Unmarshalling::new(&registry)
        .unmarshall_str(&xml)
        .expect_err("Status is required");
    let XmlError::Validation(validation) = err else {
        panic!("expected a validation error, got {err:?}");
    };
    assert_eq!(
        validation,
        ValidationError::MissingChild {
            element: samlp("Response"),
            child: samlp("Status"),
        }
    );

    let lenient = UnmarshallingConfig {
        validate: false,
        ..UnmarshallingConfig::default()
    };
    let tree = Unmarshalling::with_options(&registry, lenient.into()).unmarshall_str(&xml)?;
    let root = tree.root().expect("root");
    assert_eq!(tree[root].id(), Some("_resp-x"));
    Ok(())
}

#[test]
fn unregistered_elements_are_rejected_outside_extension_points() -> anyhow::Result<()> {
    init_tracing();
    let registry = default_registry();

    let with_extension = format!(
        r#"{RESPONSE_OPEN}{ISSUER}<samlp:Extensions><ext:Hint xmlns:ext="urn:example:ext">login</ext:Hint></samlp:Extensions>{STATUS}</samlp:Response>"#
    );
    let tree = Unmarshalling::new(&registry).unmarshall_str(&with_extension)?;
    let root = tree.root().expect("root");
    let extensions = tree.first_child_named(root, &samlp("Extensions")).expect("extensions");
    assert_eq!(tree.element_children(extensions).count(), 1);

    let with_evidence = format!(
        r#"{RESPONSE_OPEN}{ISSUER}{STATUS}<saml:Assertion ID="_a" Version="2.0" IssueInstant="2024-01-01T12:00:00Z">{ISSUER}<saml:Evidence/></saml:Assertion></samlp:Response>"#
    );
    let err = Unmarshalling::new(&registry)
        .unmarshall_str(&with_evidence)
        .expect_err("Evidence is not registered");
    assert!(matches!(
        &err,
        XmlError::Unmarshalling(UnmarshallingError::UnknownElement(name)) if *name == saml("Evidence")
    ));
    assert_eq!(SamlError::from(err).http_status(), 400);
    Ok(())
}

#[test]
fn non_saml20_version_is_rejected() {
    init_tracing();
    let registry = default_registry();
    let xml = format!("{RESPONSE_OPEN}{ISSUER}{STATUS}</samlp:Response>")
        .replace(r#"Version="2.0""#, r#"Version="1.1""#);

    let err = Unmarshalling::new(&registry)
        .unmarshall_str(&xml)
        .expect_err("SAML 1.1 version on a 2.0 message");
    assert!(matches!(err, XmlError::Validation(ValidationError::Rule { .. })));
}

#[test]
fn edited_tree_renders_the_edit() -> anyhow::Result<()> {
    init_tracing();
    let registry = default_registry();
    let mut tree = kc_xml::XmlObjectTree::new();
    let response = build_response(&registry, &mut tree, "_resp-4")?;
    let assertion = build_assertion(&registry, &mut tree, "_assert-4", "alice@example.org")?;
    tree.append_child(response, assertion)?;
    let first = to_xml(&registry, &mut tree, response)?;

    let mut received = Unmarshalling::new(&registry).unmarshall_str(&first)?;
    let root = received.root().expect("root");
    assert_eq!(received[root].version(), Some(ProtocolVersion::SAML_20));

    let assertion = received.first_child_named(root, &saml("Assertion")).expect("assertion");
    let subject = received.first_child_named(assertion, &saml("Subject")).expect("subject");
    let name_id = received.first_child_named(subject, &saml("NameID")).expect("name id");
    received.set_text(name_id, "carol@example.org");

    let second = to_xml(&registry, &mut received, root)?;
    assert_ne!(second, first);
    assert!(second.contains("carol@example.org"));
    assert!(!second.contains("alice@example.org"));

    let reparsed = Unmarshalling::new(&registry).unmarshall_str(&second)?;
    let root = reparsed.root().expect("root");
    let issuer = reparsed.first_child_named(root, &saml("Issuer")).expect("issuer");
    assert_eq!(reparsed[issuer].text_content(), IDP_ENTITY);
    Ok(())
}
