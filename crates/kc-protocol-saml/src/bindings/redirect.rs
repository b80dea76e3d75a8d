//! HTTP-Redirect Binding implementation.
//!
//! Implements the SAML 2.0 HTTP-Redirect binding for sending SAML messages
//! via URL query parameters with DEFLATE compression.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use http::header::{CACHE_CONTROL, LOCATION, PRAGMA};
use http::{Response, StatusCode};
use kc_xml::{UnmarshallingOptions, XmlObjectRegistry};
use tracing::debug;

use super::{
    message_parameter, prepare_outbound, BindingConfig, BindingContext, BindingError, Inbound,
    InboundPipeline, RELAY_STATE, SAML_ENCODING, SAML_REQUEST, SAML_RESPONSE, SIGNATURE, SIG_ALG,
};
use crate::encryption::Decrypter;
use crate::error::SamlResult;
use crate::signature::{SignatureValidator, Signer};
use crate::types::constants::DEFLATE_ENCODING;

/// Upper bound on an inflated Redirect binding message.
const MAX_INFLATED_SIZE: u64 = 1024 * 1024;

/// HTTP-Redirect binding encoder.
#[derive(Debug, Clone)]
pub struct HttpRedirectEncoder {
    registry: Arc<XmlObjectRegistry>,
    signer: Signer,
    config: BindingConfig,
}

impl HttpRedirectEncoder {
    /// Creates an encoder.
    #[must_use]
    pub fn new(registry: Arc<XmlObjectRegistry>, signer: Signer, config: BindingConfig) -> Self {
        Self {
            registry,
            signer,
            config,
        }
    }

    /// Encodes the context message into a `302 Found` redirect to the
    /// context endpoint.
    ///
    /// Any XML signature on the message is dropped. With a signing
    /// credential, `SigAlg` and `Signature` are computed over
    /// `SAMLRequest|SAMLResponse=..[&RelayState=..]&SigAlg=..` exactly as it
    /// appears in the URL.
    ///
    /// # Errors
    ///
    /// Fails without producing a response when the context has no endpoint,
    /// the message is neither request nor response, the relay state is
    /// rejected, or marshalling, compression or signing fails.
    pub fn encode(&self, context: &mut BindingContext) -> SamlResult<Response<String>> {
        let (kind, endpoint, element) =
            prepare_outbound(&self.registry, &self.signer, &self.config, context, false)?;

        let deflated = deflate_compress(element.to_xml().as_bytes())?;
        let mut query = format!(
            "{}={}",
            message_parameter(kind),
            urlencoding::encode(&STANDARD.encode(deflated))
        );
        if let Some(relay_state) = context.outbound_relay_state() {
            query.push_str(&format!("&{RELAY_STATE}={}", urlencoding::encode(relay_state)));
        }
        if let Some(credential) = &context.signing_credential {
            let algorithm = self.signer.config().algorithm;
            query.push_str(&format!("&{SIG_ALG}={}", urlencoding::encode(algorithm.uri())));
            let signature = self.signer.sign_query(&query, credential)?;
            query.push_str(&format!(
                "&{SIGNATURE}={}",
                urlencoding::encode(&STANDARD.encode(signature))
            ));
            debug!(algorithm = ?algorithm, "signed redirect query");
        }

        let separator = if endpoint.contains('?') { '&' } else { '?' };
        let location = format!("{endpoint}{separator}{query}");
        debug!(endpoint = %endpoint, length = location.len(), "encoded redirect binding URL");

        let response = Response::builder()
            .status(StatusCode::FOUND)
            .header(LOCATION, location)
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .body(String::new())
            .map_err(BindingError::from)?;
        Ok(response)
    }
}

/// HTTP-Redirect binding decoder.
#[derive(Debug, Clone)]
pub struct HttpRedirectDecoder {
    registry: Arc<XmlObjectRegistry>,
    pipeline: InboundPipeline,
}

/// A query parameter as received and decoded.
struct QueryParameter<'a> {
    raw: &'a str,
    value: String,
}

impl HttpRedirectDecoder {
    /// Creates a decoder that neither verifies nor decrypts.
    #[must_use]
    pub fn new(registry: Arc<XmlObjectRegistry>, config: BindingConfig) -> Self {
        Self {
            registry,
            pipeline: InboundPipeline::new(config),
        }
    }

    /// Verifies query string signatures with `verifier`.
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

    /// Decodes a full request URL; the part before `?` is the endpoint.
    ///
    /// # Errors
    ///
    /// See [`Self::decode`].
    pub fn decode_url(&self, url: &str) -> SamlResult<BindingContext> {
        let (endpoint, query) = url
            .split_once('?')
            .ok_or_else(|| BindingError::MissingParameter("query string".to_string()))?;
        let query = query.split_once('#').map_or(query, |(query, _)| query);
        self.decode(query, Some(endpoint))
    }

    /// Decodes a raw (still URL-encoded) query string received at
    /// `endpoint`.
    ///
    /// # Errors
    ///
    /// Fails on missing or duplicated parameters, a `SAMLEncoding` other
    /// than DEFLATE, undecodable content, a `Signature` without `SigAlg`, a
    /// query signature that does not verify, and on any unmarshalling,
    /// destination or decryption failure.
    pub fn decode(&self, query: &str, endpoint: Option<&str>) -> SamlResult<BindingContext> {
        let mut parameters = parse_query(query)?;

        if let Some(encoding) = parameters.get(SAML_ENCODING) {
            if encoding.value != DEFLATE_ENCODING {
                return Err(BindingError::UnsupportedEncoding(encoding.value.clone()).into());
            }
        }

        let (parameter, message) = match (
            parameters.remove(SAML_REQUEST),
            parameters.remove(SAML_RESPONSE),
        ) {
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
        let relay_state = parameters.remove(RELAY_STATE);

        let query_verified = match (parameters.get(SIGNATURE), parameters.get(SIG_ALG)) {
            (Some(_), None) => return Err(BindingError::MissingParameter(SIG_ALG.to_string()).into()),
            (Some(signature), Some(sig_alg)) => match &self.pipeline.verifier {
                Some(verifier) => {
                    let mut signed = format!("{parameter}={}", message.raw);
                    if let Some(relay_state) = &relay_state {
                        signed.push_str(&format!("&{RELAY_STATE}={}", relay_state.raw));
                    }
                    signed.push_str(&format!("&{SIG_ALG}={}", sig_alg.raw));
                    let compact: String = signature.value.chars().filter(|c| !c.is_whitespace()).collect();
                    let bytes = STANDARD
                        .decode(compact)
                        .map_err(|e| BindingError::InvalidEncoding(format!("Signature is not base64: {e}")))?;
                    verifier.verify_query(&signed, &sig_alg.value, &bytes)?;
                    true
                }
                None => {
                    debug!("no verifier configured, query signature not checked");
                    false
                }
            },
            (None, _) => false,
        };

        let compact: String = message.value.chars().filter(|c| !c.is_whitespace()).collect();
        let deflated = STANDARD
            .decode(compact)
            .map_err(|e| BindingError::InvalidEncoding(format!("{parameter} is not base64: {e}")))?;
        let inflated = deflate_decompress(&deflated)?;
        let xml = String::from_utf8(inflated)
            .map_err(|e| BindingError::InvalidEncoding(format!("{parameter} is not UTF-8: {e}")))?;
        debug!(parameter, length = xml.len(), signed = query_verified, "decoded redirect binding query");

        self.pipeline.process(
            &self.registry,
            Inbound {
                xml: &xml,
                parameter,
                relay_state: relay_state.map(|rs| rs.value),
                endpoint,
                verify_xml: false,
                query_verified,
            },
        )
    }
}

/// Splits a raw query into the binding parameters, keeping each value as
/// received for signature verification.
fn parse_query(query: &str) -> Result<HashMap<&'static str, QueryParameter<'_>>, BindingError> {
    const KNOWN: [&str; 6] = [SAML_REQUEST, SAML_RESPONSE, RELAY_STATE, SIG_ALG, SIGNATURE, SAML_ENCODING];

    let mut parameters = HashMap::new();
    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let raw = pair.split_once('=').map_or("", |(_, raw)| raw);
        let Some((key, value)) = url::form_urlencoded::parse(pair.as_bytes()).next() else {
            continue;
        };
        let Some(name) = KNOWN.into_iter().find(|known| *known == key) else {
            continue;
        };
        let parameter = QueryParameter {
            raw,
            value: value.into_owned(),
        };
        if parameters.insert(name, parameter).is_some() {
            return Err(BindingError::InvalidEncoding(format!("duplicate {name} parameter")));
        }
    }
    Ok(parameters)
}

/// Compresses data using DEFLATE (raw, no zlib header).
fn deflate_compress(data: &[u8]) -> Result<Vec<u8>, BindingError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| BindingError::Write(format!("compression error: {e}")))?;
    encoder
        .finish()
        .map_err(|e| BindingError::Write(format!("compression finish error: {e}")))
}

/// Decompresses DEFLATE data of at most [`MAX_INFLATED_SIZE`] bytes.
fn deflate_decompress(data: &[u8]) -> Result<Vec<u8>, BindingError> {
    let mut decompressed = Vec::new();
    DeflateDecoder::new(data)
        .take(MAX_INFLATED_SIZE + 1)
        .read_to_end(&mut decompressed)
        .map_err(|e| BindingError::InvalidEncoding(format!("decompression error: {e}")))?;
    if decompressed.len() as u64 > MAX_INFLATED_SIZE {
        return Err(BindingError::InvalidEncoding(format!(
            "inflated message exceeds {MAX_INFLATED_SIZE} bytes"
        )));
    }
    Ok(decompressed)
}
