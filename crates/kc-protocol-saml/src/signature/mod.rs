//! XML Signature support for SAML.
//!
//! Signing is an explicit step: [`Signer::sign_object`] computes an enveloped
//! signature over the canonical form of a signable node and attaches it, and
//! only then can the node be marshalled. Verification
//! ([`SignatureValidator::verify`]) always digests the node the caller
//! designates and never follows the reference URI to some other element
//! carrying a matching ID.
//!
//! # Signing Algorithms
//!
//! - RSA-SHA256 (default)
//! - RSA-SHA384
//! - RSA-SHA512
//! - ECDSA-SHA256
//! - ECDSA-SHA384
//! - ECDSA-SHA512
//!
//! RSA-SHA1 is accepted for verification only, and only when
//! [`SignatureConfig::allow_legacy_sha1`] is set. HMAC signature methods are
//! always rejected.

mod signer;
mod validator;

pub use signer::Signer;
pub use validator::{SignatureProfileValidator, SignatureValidator};

use kc_crypto::algorithm::uris;
use kc_crypto::{DigestAlgorithm, SignatureAlgorithm, SignatureError};
use kc_xml::c14n::{self, C14nOptions};
use kc_xml::dom::{self, Element, Namespace};
use kc_xml::{DomError, MarshallingError, QName};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Signature and verification failures.
#[derive(Debug, Error)]
pub enum SignatureFailure {
    /// The key could not be loaded or used.
    #[error(transparent)]
    Key(#[from] SignatureError),

    /// An algorithm URI this toolkit cannot execute.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// An algorithm the verifier is configured not to trust.
    #[error("algorithm not trusted: {0}")]
    UntrustedAlgorithm(String),

    /// The node's type cannot carry a signature.
    #[error("{0} is not signable")]
    NotSignable(QName),

    /// The node has no ID to reference.
    #[error("{0} has no ID attribute")]
    MissingId(QName),

    /// The signature does not follow the SAML signature profile.
    #[error("signature profile violation: {0}")]
    Profile(String),

    /// Digest or signature value mismatch.
    #[error("signature verification failed: {0}")]
    Verification(String),

    /// No trusted key could be resolved.
    #[error("no trusted verification key")]
    NoTrustedKey,

    /// The designated node carries no signature.
    #[error("{0} is not signed")]
    Unsigned(QName),

    /// The signing credential has no private key.
    #[error("credential has no signing key")]
    MissingSigningKey,

    /// Signed content could not be rendered.
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),

    /// Signed content could not be re-read for canonicalization.
    #[error("signed content is not well-formed: {0}")]
    Dom(#[from] DomError),
}

/// Signature creation and verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Algorithm used when signing.
    pub algorithm: SignatureAlgorithm,
    /// Digest used for references; the algorithm's own digest when unset.
    pub digest: Option<DigestAlgorithm>,
    /// Canonicalization method URI.
    pub canonicalization: String,
    /// `InclusiveNamespaces` prefixes for the reference transform.
    pub inclusive_prefixes: Vec<String>,
    /// Whether to embed the signing certificate in `KeyInfo`.
    pub include_certificate: bool,
    /// Whether to embed the credential's key names in `KeyInfo`.
    pub include_key_name: bool,
    /// Whether RSA-SHA1 signatures and SHA-1 digests verify.
    pub allow_legacy_sha1: bool,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            algorithm: SignatureAlgorithm::RsaSha256,
            digest: None,
            canonicalization: uris::EXC_C14N.to_string(),
            inclusive_prefixes: Vec::new(),
            include_certificate: true,
            include_key_name: false,
            allow_legacy_sha1: false,
        }
    }
}

impl SignatureConfig {
    /// Creates a configuration signing with `algorithm`.
    #[must_use]
    pub fn with_algorithm(algorithm: SignatureAlgorithm) -> Self {
        Self {
            algorithm,
            ..Self::default()
        }
    }

    /// Effective reference digest.
    #[must_use]
    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest.unwrap_or_else(|| self.algorithm.digest_algorithm())
    }
}

/// Canonical form of `element` after a serialize/parse cycle.
///
/// Both sides of a signature re-read the DOM they canonicalize, so an
/// element built in memory and the same element received on the wire
/// normalize to identical text.
pub(crate) fn canonical_form(
    element: &Element,
    inherited: &[Namespace],
    method: &str,
    inclusive_prefixes: &[String],
) -> Result<String, SignatureFailure> {
    let options = C14nOptions::from_algorithm(method)
        .ok_or_else(|| SignatureFailure::UnsupportedAlgorithm(method.to_string()))?
        .with_inclusive_prefixes(inclusive_prefixes.iter().cloned());
    let reparsed = dom::parse(&element.to_xml())?;
    Ok(c14n::canonicalize_in_context(&reparsed, inherited, &options))
}

/// Exclusive canonicalization transform URIs.
pub(crate) fn is_exclusive_c14n(uri: &str) -> bool {
    uri == c14n::EXC_C14N || uri == c14n::EXC_C14N_WITH_COMMENTS
}
