//! HTTP-POST Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-POST binding for sending SAML messages
//! via HTML form POST.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http::header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA};
use http::{Response, StatusCode};
use kc_xml::{UnmarshallingOptions, XmlObjectRegistry};
use tracing::debug;

use super::{
    message_parameter, prepare_outbound, BindingConfig, BindingContext, BindingError, Inbound,
    InboundPipeline, POST_CONTENT_TYPE, RELAY_STATE, SAML_REQUEST, SAML_RESPONSE,
};
use crate::encryption::Decrypter;
use crate::error::SamlResult;
use crate::signature::{SignatureValidator, Signer};

/// HTTP-POST binding encoder.
#[derive(Debug, Clone)]
pub struct HttpPostEncoder {
    registry: Arc<XmlObjectRegistry>,
    signer: Signer,
    config: BindingConfig,
}

impl HttpPostEncoder {
    /// Creates an encoder.
    #[must_use]
    pub fn new(registry: Arc<XmlObjectRegistry>, signer: Signer, config: BindingConfig) -> Self {
        Self {
            registry,
            signer,
            config,
        }
    }

    /// Encodes the context message into an auto-submitting HTML form
    /// addressed to the context endpoint.
    ///
    /// # Errors
    ///
    /// Fails without producing a response when the context has no endpoint,
    /// the message is neither request nor response, the relay state is
    /// rejected, or signing or marshalling fails.
    pub fn encode(&self, context: &mut BindingContext) -> SamlResult<Response<String>> {
        let (kind, endpoint, element) =
            prepare_outbound(&self.registry, &self.signer, &self.config, context, true)?;
        let encoded = STANDARD.encode(element.to_xml());
        let body = post_form(
            &endpoint,
            message_parameter(kind),
            &encoded,
            context.outbound_relay_state(),
        );
        debug!(endpoint = %endpoint, parameter = message_parameter(kind), "encoded POST binding form");

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, POST_CONTENT_TYPE)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .body(body)
            .map_err(BindingError::from)?;
        Ok(response)
    }
}

/// HTTP-POST binding decoder.
#[derive(Debug, Clone)]
pub struct HttpPostDecoder {
    registry: Arc<XmlObjectRegistry>,
    pipeline: InboundPipeline,
}

impl HttpPostDecoder {
    /// Creates a decoder that neither verifies nor decrypts.
    #[must_use]
    pub fn new(registry: Arc<XmlObjectRegistry>, config: BindingConfig) -> Self {
        Self {
            registry,
            pipeline: InboundPipeline::new(config),
        }
    }

    /// Verifies message and assertion signatures with `verifier`.
    #[must_use]
    pub fn with_verifier(mut self, verifier: SignatureValidator) -> Self {
        self.pipeline.verifier = Some(verifier);
        self
    }

    /// Decrypts `EncryptedAssertion`s with `decrypter`.
    #[must_use]
    pub fn with_decrypter(mut self, decrypter: Decrypter) -> Self {
        self.pipeline.decrypter = Some(decrypter);
        self
    }

    /// Unmarshalling options for received messages.
    #[must_use]
    pub const fn with_unmarshalling(mut self, options: UnmarshallingOptions) -> Self {
        self.pipeline.unmarshalling = options;
        self
    }

    /// Decodes an `application/x-www-form-urlencoded` body received at
    /// `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails when the body carries neither or both of `SAMLRequest` and
    /// `SAMLResponse`, the value is not base64 UTF-8, and on any
    /// unmarshalling, destination, signature or decryption failure.
    pub fn decode(&self, form_body: &str, endpoint: Option<&str>) -> SamlResult<BindingContext> {
        let mut request = None;
        let mut response = None;
        let mut relay_state = None;
        for (key, value) in url::form_urlencoded::parse(form_body.as_bytes()) {
            let slot = match key.as_ref() {
                SAML_REQUEST => &mut request,
                SAML_RESPONSE => &mut response,
                RELAY_STATE => &mut relay_state,
                _ => continue,
            };
            if slot.replace(value.into_owned()).is_some() {
                return Err(BindingError::InvalidEncoding(format!("duplicate {key} parameter")).into());
            }
        }

        let (parameter, encoded) = match (request, response) {
            (Some(request), None) => (SAML_REQUEST, request),
            (None, Some(response)) => (SAML_RESPONSE, response),
            (Some(_), Some(_)) => {
                return Err(BindingError::InvalidEncoding(
                    "both SAMLRequest and SAMLResponse present".to_string(),
                )
                .into())
            }
            (None, None) => {
                return Err(BindingError::MissingParameter("SAMLRequest or SAMLResponse".to_string()).into())
            }
        };

        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let decoded = STANDARD
            .decode(compact)
            .map_err(|e| BindingError::InvalidEncoding(format!("{parameter} is not base64: {e}")))?;
        let xml = String::from_utf8(decoded)
            .map_err(|e| BindingError::InvalidEncoding(format!("{parameter} is not UTF-8: {e}")))?;
        debug!(parameter, length = xml.len(), "decoded POST binding parameter");

        self.pipeline.process(
            &self.registry,
            Inbound {
                xml: &xml,
                parameter,
                relay_state,
                endpoint,
                verify_xml: true,
                query_verified: false,
            },
        )
    }
}

fn post_form(action: &str, parameter: &str, value: &str, relay_state: Option<&str>) -> String {
    let relay_state_input = relay_state
        .map(|rs| {
            format!(
                r#"
            <input type="hidden" name="RelayState" value="{}"/>"#,
                html_escape(rs)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en">
    <head>
        <meta http-equiv="Content-Type" content="application/xhtml+xml; charset=UTF-8"/>
        <title>SAML POST Binding</title>
    </head>
    <body onload="document.forms[0].submit()">
        <noscript>
            <p>JavaScript is disabled. Click the button below to continue.</p>
        </noscript>
        <form method="post" action="{}">
            <input type="hidden" name="{}" value="{}"/>{}
            <noscript>
                <input type="submit" value="Continue"/>
            </noscript>
        </form>
    </body>
</html>"#,
        html_escape(action),
        parameter,
        value,
        relay_state_input
    )
}

/// Escapes HTML special characters.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::StaticCredentialResolver;
    use crate::signature::{SignatureConfig, SignatureFailure};
    use crate::test_support::{build_authn_request, build_response, idp_credential, ROGUE_CERT, IDP_CERT};
    use crate::security::Credential;
    use crate::types::default_registry;
    use crate::SamlError;
    use kc_xml::XmlObjectTree;

    /// Pulls `name`'s value out of a rendered form.
    fn form_value(html: &str, name: &str) -> Option<String> {
        let marker = format!(r#"name="{name}" value=""#);
        let start = html.find(&marker)? + marker.len();
        let end = html[start..].find('"')?;
        Some(html[start..start + end].to_string())
    }

    fn form_body(html: &str, parameter: &str) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        if let Some(value) = form_value(html, parameter) {
            serializer.append_pair(parameter, &value);
        }
        if let Some(relay_state) = form_value(html, RELAY_STATE) {
            serializer.append_pair(RELAY_STATE, &relay_state.replace("&amp;", "&"));
        }
        serializer.finish()
    }

    fn response_context(registry: &XmlObjectRegistry) -> BindingContext {
        let mut tree = XmlObjectTree::new();
        let response = build_response(registry, &mut tree, "_r1");
        tree.set_root(response).unwrap();
        BindingContext::new(tree, response).with_endpoint("https://sp.example.org/acs")
    }

    fn verifier(cert: &str) -> SignatureValidator {
        let trusted = Credential::from_certificate_pem(cert).unwrap();
        SignatureValidator::new(
            Arc::new(StaticCredentialResolver::new(vec![trusted])),
            SignatureConfig::default(),
        )
    }

    #[test]
    fn encodes_form_with_headers() {
        let registry = Arc::new(default_registry());
        let mut context = response_context(&registry).with_relay_state("state&123");
        let encoder = HttpPostEncoder::new(registry, Signer::default(), BindingConfig::default());
        let response = encoder.encode(&mut context).unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], POST_CONTENT_TYPE);
        assert_eq!(response.headers()[CACHE_CONTROL], "no-cache, no-store");
        assert_eq!(response.headers()[PRAGMA], "no-cache");

        let html = response.body();
        assert!(html.contains(r#"action="https://sp.example.org/acs""#));
        assert_eq!(form_value(html, RELAY_STATE).as_deref(), Some("state&amp;123"));
        let xml = String::from_utf8(STANDARD.decode(form_value(html, SAML_RESPONSE).unwrap()).unwrap()).unwrap();
        assert!(xml.contains(r#"Destination="https://sp.example.org/acs""#));
        assert!(!xml.contains("Signature"));
    }

    #[test]
    fn empty_relay_state_is_omitted() {
        let registry = Arc::new(default_registry());
        let mut tree = XmlObjectTree::new();
        let request = build_authn_request(&registry, &mut tree, "_q1");
        tree.set_root(request).unwrap();
        let mut context = BindingContext::new(tree, request)
            .with_endpoint("https://idp.example.org/sso")
            .with_relay_state("");

        let encoder = HttpPostEncoder::new(registry, Signer::default(), BindingConfig::default());
        let html = encoder.encode(&mut context).unwrap().into_body();
        assert!(form_value(&html, SAML_REQUEST).is_some());
        assert!(!html.contains(RELAY_STATE));
    }

    #[test]
    fn missing_endpoint_produces_nothing() {
        let registry = Arc::new(default_registry());
        let mut context = response_context(&registry);
        context.endpoint = None;
        let encoder = HttpPostEncoder::new(registry, Signer::default(), BindingConfig::default());
        let err = encoder.encode(&mut context).unwrap_err();
        assert!(matches!(err, SamlError::Binding(BindingError::MissingEndpoint)));
    }

    #[test]
    fn signed_round_trip_verifies() {
        let registry = Arc::new(default_registry());
        let mut context = response_context(&registry)
            .with_relay_state("abc")
            .with_signing_credential(idp_credential());
        let encoder = HttpPostEncoder::new(registry.clone(), Signer::default(), BindingConfig::default());
        let html = encoder.encode(&mut context).unwrap().into_body();

        let decoder = HttpPostDecoder::new(registry, BindingConfig::default()).with_verifier(verifier(IDP_CERT));
        let decoded = decoder
            .decode(&form_body(&html, SAML_RESPONSE), Some("https://sp.example.org/acs"))
            .unwrap();
        assert!(decoded.signature_verified);
        assert_eq!(decoded.relay_state.as_deref(), Some("abc"));
        assert!(decoded.tree.subtree_eq(decoded.message, &context.tree, context.message));
    }

    #[test]
    fn untrusted_key_fails_verification() {
        let registry = Arc::new(default_registry());
        let mut context = response_context(&registry).with_signing_credential(idp_credential());
        let encoder = HttpPostEncoder::new(registry.clone(), Signer::default(), BindingConfig::default());
        let html = encoder.encode(&mut context).unwrap().into_body();

        let decoder = HttpPostDecoder::new(registry, BindingConfig::default()).with_verifier(verifier(ROGUE_CERT));
        let err = decoder.decode(&form_body(&html, SAML_RESPONSE), None).unwrap_err();
        assert!(matches!(
            err,
            SamlError::Signature(SignatureFailure::Verification(_) | SignatureFailure::NoTrustedKey)
        ));
    }

    #[test]
    fn destination_must_match_endpoint() {
        let registry = Arc::new(default_registry());
        let mut context = response_context(&registry);
        let encoder = HttpPostEncoder::new(registry.clone(), Signer::default(), BindingConfig::default());
        let html = encoder.encode(&mut context).unwrap().into_body();

        let decoder = HttpPostDecoder::new(registry, BindingConfig::default());
        let err = decoder
            .decode(&form_body(&html, SAML_RESPONSE), Some("https://other.example.org/acs"))
            .unwrap_err();
        assert!(matches!(err, SamlError::Binding(BindingError::DestinationMismatch { .. })));
    }

    #[test]
    fn unsigned_message_rejected_when_signature_required() {
        let registry = Arc::new(default_registry());
        let mut context = response_context(&registry);
        let encoder = HttpPostEncoder::new(registry.clone(), Signer::default(), BindingConfig::default());
        let html = encoder.encode(&mut context).unwrap().into_body();

        let config = BindingConfig {
            require_signature: true,
            ..BindingConfig::default()
        };
        let decoder = HttpPostDecoder::new(registry, config).with_verifier(verifier(IDP_CERT));
        let err = decoder.decode(&form_body(&html, SAML_RESPONSE), None).unwrap_err();
        assert!(matches!(err, SamlError::Signature(SignatureFailure::Unsigned(_))));
    }

    #[test]
    fn malformed_forms_are_rejected() {
        let decoder = HttpPostDecoder::new(Arc::new(default_registry()), BindingConfig::default());
        assert!(matches!(
            decoder.decode("RelayState=x", None),
            Err(SamlError::Binding(BindingError::MissingParameter(_)))
        ));
        assert!(matches!(
            decoder.decode("SAMLResponse=%%%", None),
            Err(SamlError::Binding(BindingError::InvalidEncoding(_)))
        ));
        assert!(matches!(
            decoder.decode("SAMLRequest=PHg%2B&SAMLResponse=PHg%2B", None),
            Err(SamlError::Binding(BindingError::InvalidEncoding(_)))
        ));
    }

    #[test]
    fn request_sent_as_response_is_rejected() {
        let registry = Arc::new(default_registry());
        let mut tree = XmlObjectTree::new();
        let request = build_authn_request(&registry, &mut tree, "_q1");
        tree.set_root(request).unwrap();
        let mut context = BindingContext::new(tree, request).with_endpoint("https://idp.example.org/sso");
        let encoder = HttpPostEncoder::new(registry.clone(), Signer::default(), BindingConfig::default());
        let html = encoder.encode(&mut context).unwrap().into_body();

        let value = form_value(&html, SAML_REQUEST).unwrap();
        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair(SAML_RESPONSE, &value)
            .finish();
        let err = HttpPostDecoder::new(registry, BindingConfig::default())
            .decode(&body, None)
            .unwrap_err();
        assert!(matches!(err, SamlError::Binding(BindingError::UnexpectedMessage(_))));
    }
}
