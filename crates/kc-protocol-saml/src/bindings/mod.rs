//! SAML bindings implementation.
//!
//! This module implements the SAML 2.0 bindings for message transport:
//!
//! - **HTTP-POST Binding** - Messages are base64-encoded and sent in HTML forms
//! - **HTTP-Redirect Binding** - Messages are deflated, base64-encoded, and URL-encoded
//!
//! Encoders take a [`BindingContext`] holding the message tree, sign it when
//! a signing credential is present, marshal it and only then build the HTTP
//! response. A failure in any of these steps produces no output. Decoders run
//! the inverse pipeline: transport decoding, unmarshalling (with validation),
//! signature verification, then decryption of encrypted assertions.
//!
//! # Usage
//!
//! ```rust,ignore
//! use kc_protocol_saml::bindings::{BindingContext, HttpPostEncoder};
//!
//! let mut context = BindingContext::new(tree, response)
//!     .with_endpoint("https://sp.example.org/acs")
//!     .with_relay_state("token")
//!     .with_signing_credential(idp_credential);
//! let http_response = HttpPostEncoder::new(registry, signer, config).encode(&mut context)?;
//! ```

mod post;
mod redirect;

pub use post::{HttpPostDecoder, HttpPostEncoder};
pub use redirect::{HttpRedirectDecoder, HttpRedirectEncoder};

use kc_xml::dom::Element;
use kc_xml::{
    Marshalling, MessageKind, NodeId, QName, Unmarshalling, UnmarshallingOptions, XmlObjectRegistry,
    XmlObjectTree,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::encryption::Decrypter;
use crate::error::SamlResult;
use crate::security::Credential;
use crate::signature::{SignatureFailure, SignatureValidator, Signer};
use crate::types::constants::saml;

/// `SAMLRequest` form and query parameter.
pub const SAML_REQUEST: &str = "SAMLRequest";
/// `SAMLResponse` form and query parameter.
pub const SAML_RESPONSE: &str = "SAMLResponse";
/// `RelayState` form and query parameter.
pub const RELAY_STATE: &str = "RelayState";
/// `SigAlg` query parameter.
pub const SIG_ALG: &str = "SigAlg";
/// `Signature` query parameter.
pub const SIGNATURE: &str = "Signature";
/// `SAMLEncoding` query parameter.
pub const SAML_ENCODING: &str = "SAMLEncoding";

/// Content type of POST binding responses.
pub const POST_CONTENT_TYPE: &str = "application/xhtml+xml; charset=UTF-8";

/// Transport-level failures.
#[derive(Debug, Error)]
pub enum BindingError {
    /// A required parameter is absent.
    #[error("missing parameter: {0}")]
    MissingParameter(String),

    /// A parameter could not be decoded.
    #[error("invalid encoding: {0}")]
    InvalidEncoding(String),

    /// `SAMLEncoding` names something other than DEFLATE.
    #[error("unsupported SAMLEncoding: {0}")]
    UnsupportedEncoding(String),

    /// The relay state exceeds the configured limit.
    #[error("RelayState is {0} bytes long")]
    RelayStateTooLong(usize),

    /// The message `Destination` is not the endpoint it arrived at.
    #[error("Destination {actual} does not match endpoint {expected}")]
    DestinationMismatch {
        /// Endpoint the message was received at.
        expected: String,
        /// `Destination` carried by the message.
        actual: String,
    },

    /// The message is not a request or response, or was sent under the
    /// wrong parameter.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),

    /// No endpoint to send the message to.
    #[error("no endpoint URL in binding context")]
    MissingEndpoint,

    /// Compressing the message failed.
    #[error("write failure: {0}")]
    Write(String),

    /// The HTTP response could not be built.
    #[error("http: {0}")]
    Http(String),
}

impl From<http::Error> for BindingError {
    fn from(err: http::Error) -> Self {
        Self::Http(err.to_string())
    }
}

/// What to do with a relay state longer than the limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayStatePolicy {
    /// Log a warning and carry it unchanged.
    #[default]
    Warn,
    /// Fail with [`BindingError::RelayStateTooLong`].
    Reject,
}

/// Binding behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Relay state length, in bytes, above which the policy applies.
    pub relay_state_limit: usize,
    /// Oversized relay state handling.
    pub relay_state_policy: RelayStatePolicy,
    /// Compare a received `Destination` with the receiving endpoint.
    pub check_destination: bool,
    /// Reject messages that carry no verified signature.
    pub require_signature: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            relay_state_limit: 80,
            relay_state_policy: RelayStatePolicy::Warn,
            check_destination: true,
            require_signature: false,
        }
    }
}

/// State of one encode or decode exchange.
///
/// For encoding, the caller fills in the message and the outbound
/// parameters. Decoders return a context describing what was received.
#[derive(Debug)]
pub struct BindingContext {
    /// Message tree.
    pub tree: XmlObjectTree,
    /// Top-level protocol message.
    pub message: NodeId,
    /// Opaque state round-tripped with the message.
    pub relay_state: Option<String>,
    /// Endpoint URL the message is sent to, or was received at.
    pub endpoint: Option<String>,
    /// Credential to sign outbound messages with.
    pub signing_credential: Option<Credential>,
    /// Whether the message signature was verified on decode.
    pub signature_verified: bool,
    /// Assertions whose XML signatures were verified on decode.
    pub verified_assertions: Vec<NodeId>,
    /// Assertions decrypted into the tree on decode.
    pub decrypted_assertions: Vec<NodeId>,
}

impl BindingContext {
    /// Context for `message` in `tree`.
    #[must_use]
    pub fn new(tree: XmlObjectTree, message: NodeId) -> Self {
        Self {
            tree,
            message,
            relay_state: None,
            endpoint: None,
            signing_credential: None,
            signature_verified: false,
            verified_assertions: Vec::new(),
            decrypted_assertions: Vec::new(),
        }
    }

    /// Sets the relay state.
    #[must_use]
    pub fn with_relay_state(mut self, relay_state: impl Into<String>) -> Self {
        self.relay_state = Some(relay_state.into());
        self
    }

    /// Sets the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Sets the signing credential.
    #[must_use]
    pub fn with_signing_credential(mut self, credential: Credential) -> Self {
        self.signing_credential = Some(credential);
        self
    }

    /// Request or response, from the message schema.
    #[must_use]
    pub fn message_kind(&self) -> Option<MessageKind> {
        self.tree[self.message].schema().message_kind
    }

    /// The message `Destination` attribute.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        self.tree[self.message].attribute_str("Destination")
    }

    /// Non-empty relay state.
    fn outbound_relay_state(&self) -> Option<&str> {
        self.relay_state.as_deref().filter(|rs| !rs.is_empty())
    }
}

/// Form or query parameter carrying messages of `kind`.
#[must_use]
pub const fn message_parameter(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::Request => SAML_REQUEST,
        MessageKind::Response => SAML_RESPONSE,
    }
}

fn check_relay_state(config: &BindingConfig, relay_state: Option<&str>) -> Result<(), BindingError> {
    let Some(relay_state) = relay_state else {
        return Ok(());
    };
    if relay_state.len() <= config.relay_state_limit {
        return Ok(());
    }
    match config.relay_state_policy {
        RelayStatePolicy::Warn => {
            warn!(
                length = relay_state.len(),
                limit = config.relay_state_limit,
                "RelayState exceeds recommended length"
            );
            Ok(())
        }
        RelayStatePolicy::Reject => Err(BindingError::RelayStateTooLong(relay_state.len())),
    }
}

/// Outbound pipeline shared by both encoders up to the marshalled DOM.
///
/// Sets `Destination` from the endpoint when absent and, with `sign_xml`,
/// signs a signable message that carries no computed signature yet.
fn prepare_outbound(
    registry: &XmlObjectRegistry,
    signer: &Signer,
    config: &BindingConfig,
    context: &mut BindingContext,
    sign_xml: bool,
) -> SamlResult<(MessageKind, String, Element)> {
    let endpoint = context.endpoint.clone().ok_or(BindingError::MissingEndpoint)?;
    let kind = context.message_kind().ok_or_else(|| {
        BindingError::UnexpectedMessage(context.tree[context.message].element_name().to_string())
    })?;
    check_relay_state(config, context.outbound_relay_state())?;

    let message = context.message;
    if context.destination().is_none() {
        context
            .tree
            .set_attribute(message, QName::local("Destination"), endpoint.as_str());
    }

    if sign_xml {
        let node = &context.tree[message];
        let already_signed = node.signature().is_some_and(|s| s.is_computed());
        if node.schema().signable && !already_signed {
            if let Some(credential) = &context.signing_credential {
                signer.sign_object(registry, &mut context.tree, message, credential)?;
                debug!(message = %context.tree[message].element_name(), "signed outbound message");
            }
        }
    } else if context.tree.take_signature(message).is_some() {
        debug!("dropped XML signature, the query string is signed instead");
    }

    let element = Marshalling::new(registry).marshall(&mut context.tree, message)?;
    debug!(message = %element.name, endpoint = %endpoint, "marshalled outbound message");
    Ok((kind, endpoint, element))
}

/// A transport-decoded message handed to [`InboundPipeline::process`].
struct Inbound<'a> {
    xml: &'a str,
    parameter: &'a str,
    relay_state: Option<String>,
    endpoint: Option<&'a str>,
    verify_xml: bool,
    /// A signature already checked over the query string.
    query_verified: bool,
}

/// Inbound components shared by both decoders.
#[derive(Debug, Clone)]
struct InboundPipeline {
    config: BindingConfig,
    unmarshalling: UnmarshallingOptions,
    verifier: Option<SignatureValidator>,
    decrypter: Option<Decrypter>,
}

impl InboundPipeline {
    fn new(config: BindingConfig) -> Self {
        Self {
            config,
            unmarshalling: UnmarshallingOptions::default(),
            verifier: None,
            decrypter: None,
        }
    }

    /// Unmarshals the message, checks kind and destination, verifies XML
    /// signatures when asked to, and decrypts assertions.
    fn process(&self, registry: &XmlObjectRegistry, inbound: Inbound<'_>) -> SamlResult<BindingContext> {
        let Inbound {
            xml,
            parameter,
            relay_state,
            endpoint,
            verify_xml,
            query_verified,
        } = inbound;
        let tree = Unmarshalling::with_options(registry, self.unmarshalling).unmarshall_str(xml)?;
        let message = tree
            .root()
            .ok_or_else(|| BindingError::UnexpectedMessage("empty document".to_string()))?;
        let mut context = BindingContext::new(tree, message);
        context.relay_state = relay_state;
        context.endpoint = endpoint.map(str::to_string);

        match context.message_kind() {
            Some(kind) if message_parameter(kind) == parameter => {}
            _ => {
                return Err(BindingError::UnexpectedMessage(format!(
                    "{} sent as {parameter}",
                    context.tree[message].element_name()
                ))
                .into())
            }
        }
        self.check_destination(&context)?;

        context.signature_verified = query_verified;
        if verify_xml {
            if let Some(verifier) = &self.verifier {
                if context.tree[message].signature().is_some() {
                    verifier.verify(registry, &mut context.tree, message)?;
                    context.signature_verified = true;
                }
            }
        }

        if let Some(decrypter) = &self.decrypter {
            let wrappers = context.tree.children_named(message, &saml("EncryptedAssertion"));
            for wrapper in wrappers {
                let plaintext = decrypter.decrypt_assertion(registry, &mut context.tree, wrapper)?;
                let Some(root) = plaintext.root() else {
                    continue;
                };
                let assertion = context.tree.import_subtree(&plaintext, root);
                context.tree.detach(wrapper);
                context.tree.append_child(message, assertion)?;
                context.decrypted_assertions.push(assertion);
            }
        }

        if verify_xml {
            if let Some(verifier) = &self.verifier {
                for assertion in context.tree.children_named(message, &saml("Assertion")) {
                    if context.tree[assertion].signature().is_some() {
                        verifier.verify(registry, &mut context.tree, assertion)?;
                        context.verified_assertions.push(assertion);
                    }
                }
            }
        }

        if self.config.require_signature && !context.signature_verified {
            // an unsigned message vouches for none of its assertions
            let assertions = context.tree.children_named(message, &saml("Assertion"));
            let unsigned = if assertions.is_empty() {
                Some(message)
            } else {
                assertions
                    .into_iter()
                    .find(|a| !context.verified_assertions.contains(a))
            };
            if let Some(unsigned) = unsigned {
                return Err(SignatureFailure::Unsigned(context.tree[unsigned].element_name().clone()).into());
            }
        }

        debug!(
            message = %context.tree[message].element_name(),
            signed = context.signature_verified,
            decrypted = context.decrypted_assertions.len(),
            "decoded inbound message"
        );
        Ok(context)
    }

    fn check_destination(&self, context: &BindingContext) -> Result<(), BindingError> {
        if !self.config.check_destination {
            return Ok(());
        }
        let (Some(expected), Some(actual)) = (context.endpoint.as_deref(), context.destination()) else {
            return Ok(());
        };
        if same_endpoint(expected, actual) {
            Ok(())
        } else {
            Err(BindingError::DestinationMismatch {
                expected: expected.to_string(),
                actual: actual.to_string(),
            })
        }
    }
}

/// Compares two endpoint URLs, ignoring query and fragment.
fn same_endpoint(a: &str, b: &str) -> bool {
    match (url::Url::parse(a), url::Url::parse(b)) {
        (Ok(mut a), Ok(mut b)) => {
            for u in [&mut a, &mut b] {
                u.set_query(None);
                u.set_fragment(None);
            }
            a == b
        }
        _ => a == b,
    }
}
