//! XML Signature validation.
//!
//! Verification digests the node the caller names, never a node located by
//! following the reference URI, and keys come only from the trust store.

use std::sync::Arc;

use kc_crypto::algorithm::uris;
use kc_crypto::{digest, DigestAlgorithm, SignatureAlgorithm};
use kc_xml::c14n;
use kc_xml::signature::{Signature, ENVELOPED_SIGNATURE};
use kc_xml::{Marshalling, NodeId, XmlObjectRegistry, XmlObjectTree};
use tracing::{debug, warn};

use super::{canonical_form, is_exclusive_c14n, SignatureConfig, SignatureFailure};
use crate::security::{CredentialCriteria, CredentialResolver, UsageType};

/// Checks that a signature follows the SAML XML-DSig profile: one
/// same-document reference to the signed element's own ID, transformed only
/// by the enveloped-signature transform and exclusive canonicalization.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignatureProfileValidator;

impl SignatureProfileValidator {
    /// Validates `signature` as the signature of node `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureFailure::Profile`] on any deviation, and
    /// [`SignatureFailure::MissingId`] when the node has no ID.
    pub fn validate(
        &self,
        tree: &XmlObjectTree,
        id: NodeId,
        signature: &Signature,
    ) -> Result<(), SignatureFailure> {
        let node = &tree[id];
        let xml_id = node
            .id()
            .ok_or_else(|| SignatureFailure::MissingId(node.element_name().clone()))?;

        let [reference] = signature.references.as_slice() else {
            return Err(SignatureFailure::Profile(format!(
                "expected exactly one Reference, found {}",
                signature.references.len()
            )));
        };

        if reference.uri.strip_prefix('#') != Some(xml_id) {
            return Err(SignatureFailure::Profile(format!(
                "Reference URI {:?} does not name {} {xml_id:?}",
                reference.uri,
                node.element_name()
            )));
        }

        if let Some(transform) = reference
            .transforms
            .iter()
            .find(|t| t.algorithm != ENVELOPED_SIGNATURE && !is_exclusive_c14n(&t.algorithm))
        {
            return Err(SignatureFailure::Profile(format!(
                "transform {} is not permitted",
                transform.algorithm
            )));
        }
        if reference.transforms.len() > 2 {
            return Err(SignatureFailure::Profile("too many transforms".to_string()));
        }

        if !is_exclusive_c14n(&signature.canonicalization_method) {
            return Err(SignatureFailure::UnsupportedAlgorithm(
                signature.canonicalization_method.clone(),
            ));
        }

        if tree.find_by_xml_id(xml_id).len() > 1 {
            return Err(SignatureFailure::Profile(format!("ID {xml_id:?} is not unique")));
        }
        Ok(())
    }
}

/// Verifies enveloped signatures and Redirect binding query signatures
/// against keys from a trust store.
#[derive(Clone)]
pub struct SignatureValidator {
    resolver: Arc<dyn CredentialResolver>,
    config: SignatureConfig,
    profile: SignatureProfileValidator,
}

impl std::fmt::Debug for SignatureValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureValidator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SignatureValidator {
    /// Creates a validator trusting the keys `resolver` returns.
    #[must_use]
    pub fn new(resolver: Arc<dyn CredentialResolver>, config: SignatureConfig) -> Self {
        Self {
            resolver,
            config,
            profile: SignatureProfileValidator,
        }
    }

    /// Verifies the signature carried by node `id`.
    ///
    /// # Errors
    ///
    /// Returns a [`SignatureFailure`] when the node is unsigned, the
    /// signature breaks the profile, an algorithm is not trusted, the digest
    /// does not match the node's content, or no trusted key verifies the
    /// signature value.
    pub fn verify(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        id: NodeId,
    ) -> Result<(), SignatureFailure> {
        let result = self.verify_node(registry, tree, id);
        match &result {
            Ok(()) => debug!(element = %tree[id].element_name(), "signature verified"),
            Err(e) => warn!(element = %tree[id].element_name(), error = %e, "signature rejected"),
        }
        result
    }

    /// Verifies a Redirect binding signature over `signed_query`, the
    /// `SAMLRequest`/`SAMLResponse`, `RelayState` and `SigAlg` parameters
    /// exactly as received.
    ///
    /// # Errors
    ///
    /// Fails on an untrusted algorithm or when no trusted key verifies.
    pub fn verify_query(
        &self,
        signed_query: &str,
        sig_alg: &str,
        signature: &[u8],
    ) -> Result<(), SignatureFailure> {
        let result = self.signature_algorithm(sig_alg, None).and_then(|algorithm| {
            self.verify_value(
                &CredentialCriteria::for_usage(UsageType::Signing),
                algorithm,
                signed_query.as_bytes(),
                signature,
            )
        });
        if let Err(e) = &result {
            warn!(error = %e, "query signature rejected");
        }
        result
    }

    fn verify_node(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        id: NodeId,
    ) -> Result<(), SignatureFailure> {
        let signature = tree[id]
            .signature()
            .cloned()
            .ok_or_else(|| SignatureFailure::Unsigned(tree[id].element_name().clone()))?;
        self.profile.validate(tree, id, &signature)?;

        let algorithm =
            self.signature_algorithm(&signature.signature_method, signature.hmac_output_length)?;
        let reference = &signature.references[0];
        let digest_algorithm = self.digest_algorithm(&reference.digest_method)?;
        let (c14n_method, inclusive_prefixes) = reference
            .transforms
            .iter()
            .find(|t| is_exclusive_c14n(&t.algorithm))
            .map_or((c14n::EXC_C14N, &[][..]), |t| {
                (t.algorithm.as_str(), t.inclusive_prefixes.as_slice())
            });

        let inherited = tree.in_scope_namespaces(id);
        let content = Marshalling::new(registry).marshall(tree, id)?;
        let content = c14n::enveloped(&content, &Signature::element_name());
        let canonical = canonical_form(&content, &inherited, c14n_method, inclusive_prefixes)?;
        let computed = digest(digest_algorithm, canonical.as_bytes());
        if reference.digest_value.as_deref() != Some(computed.as_slice()) {
            return Err(SignatureFailure::Verification("digest mismatch".to_string()));
        }

        let signed_info = canonical_form(
            &signature.signed_info_element(),
            &inherited,
            &signature.canonicalization_method,
            &signature.inclusive_prefixes,
        )?;
        let value = signature
            .signature_value
            .as_deref()
            .ok_or_else(|| SignatureFailure::Profile("missing SignatureValue".to_string()))?;

        let mut criteria = CredentialCriteria::for_usage(UsageType::Signing);
        if let Some(key_info) = &signature.key_info {
            criteria = criteria.with_key_info(key_info);
        }
        self.verify_value(&criteria, algorithm, signed_info.as_bytes(), value)
    }

    fn verify_value(
        &self,
        criteria: &CredentialCriteria,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        value: &[u8],
    ) -> Result<(), SignatureFailure> {
        let candidates = self.resolver.resolve(criteria);
        let mut keys = candidates.iter().filter_map(|c| c.verifying_key()).peekable();
        if keys.peek().is_none() {
            return Err(SignatureFailure::NoTrustedKey);
        }
        if keys.any(|key| key.verify(algorithm, data, value).is_ok()) {
            Ok(())
        } else {
            Err(SignatureFailure::Verification(
                "signature value does not verify with any trusted key".to_string(),
            ))
        }
    }

    fn signature_algorithm(
        &self,
        uri: &str,
        hmac_output_length: Option<u32>,
    ) -> Result<SignatureAlgorithm, SignatureFailure> {
        if hmac_output_length.is_some() || uri == uris::HMAC_SHA1 || uri.contains("#hmac-") {
            return Err(SignatureFailure::UntrustedAlgorithm(uri.to_string()));
        }
        let algorithm = SignatureAlgorithm::from_uri(uri)
            .ok_or_else(|| SignatureFailure::UnsupportedAlgorithm(uri.to_string()))?;
        if algorithm.is_legacy() && !self.config.allow_legacy_sha1 {
            return Err(SignatureFailure::UntrustedAlgorithm(uri.to_string()));
        }
        Ok(algorithm)
    }

    fn digest_algorithm(&self, uri: &str) -> Result<DigestAlgorithm, SignatureFailure> {
        let algorithm = DigestAlgorithm::from_uri(uri)
            .ok_or_else(|| SignatureFailure::UnsupportedAlgorithm(uri.to_string()))?;
        if algorithm.is_legacy() && !self.config.allow_legacy_sha1 {
            return Err(SignatureFailure::UntrustedAlgorithm(uri.to_string()));
        }
        Ok(algorithm)
    }
}
