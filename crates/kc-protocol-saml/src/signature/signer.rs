//! XML Signature creation.

use kc_crypto::digest;
use kc_xml::signature::{ContentReference, KeyInfo, Signature};
use kc_xml::{Marshalling, NodeId, XmlObjectRegistry, XmlObjectTree};
use tracing::debug;

use super::{canonical_form, is_exclusive_c14n, SignatureConfig, SignatureFailure};
use crate::security::Credential;

/// Computes enveloped signatures over signable nodes and Redirect binding
/// query strings.
#[derive(Debug, Clone, Default)]
pub struct Signer {
    config: SignatureConfig,
}

impl Signer {
    /// Creates a signer with `config`.
    #[must_use]
    pub const fn new(config: SignatureConfig) -> Self {
        Self { config }
    }

    /// The signer's configuration.
    #[must_use]
    pub const fn config(&self) -> &SignatureConfig {
        &self.config
    }

    /// Signs node `id` and attaches the signature.
    ///
    /// The digest covers the node exactly as it will be marshalled, minus
    /// the signature itself, so every descendant that needs its own
    /// signature must be signed first. Attaching the signature invalidates
    /// the cached DOM of the node and its ancestors.
    ///
    /// # Errors
    ///
    /// Fails when the node is not signable or has no ID, when the credential
    /// has no signing key or the key does not fit the algorithm, and when
    /// the content cannot be marshalled.
    pub fn sign_object(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        id: NodeId,
        credential: &Credential,
    ) -> Result<(), SignatureFailure> {
        let node = &tree[id];
        let element_name = node.element_name().clone();
        if !node.schema().signable {
            return Err(SignatureFailure::NotSignable(element_name));
        }
        let xml_id = node
            .id()
            .map(str::to_string)
            .ok_or_else(|| SignatureFailure::MissingId(element_name.clone()))?;
        let key = credential.signing_key().ok_or(SignatureFailure::MissingSigningKey)?;

        let c14n_method = self.config.canonicalization.as_str();
        if !is_exclusive_c14n(c14n_method) {
            return Err(SignatureFailure::UnsupportedAlgorithm(c14n_method.to_string()));
        }
        let digest_algorithm = self.config.digest_algorithm();

        let mut reference = ContentReference::enveloped(&xml_id, digest_algorithm.uri());
        if let Some(transform) = reference.transforms.last_mut() {
            transform.algorithm = c14n_method.to_string();
            transform.inclusive_prefixes = self.config.inclusive_prefixes.clone();
        }

        let inherited = tree.in_scope_namespaces(id);
        let content = Marshalling::new(registry).marshall_unsigned(tree, id)?;
        let canonical = canonical_form(&content, &inherited, c14n_method, &self.config.inclusive_prefixes)?;
        reference.digest_value = Some(digest(digest_algorithm, canonical.as_bytes()));

        let mut signature = Signature::new(c14n_method, self.config.algorithm.uri());
        signature.references.push(reference);

        let key_info = KeyInfo {
            key_names: if self.config.include_key_name {
                credential.key_names().to_vec()
            } else {
                Vec::new()
            },
            x509_certificates: if self.config.include_certificate {
                credential.certificate().map(<[u8]>::to_vec).into_iter().collect()
            } else {
                Vec::new()
            },
        };
        if !key_info.is_empty() {
            signature.key_info = Some(key_info);
        }

        let signed_info = canonical_form(
            &signature.signed_info_element(),
            &inherited,
            &signature.canonicalization_method,
            &signature.inclusive_prefixes,
        )?;
        signature.signature_value = Some(key.sign(self.config.algorithm, signed_info.as_bytes())?);

        tree.set_signature(id, signature)
            .map_err(|_| SignatureFailure::NotSignable(element_name.clone()))?;

        debug!(
            element = %element_name,
            id = %xml_id,
            algorithm = ?self.config.algorithm,
            "signed object"
        );
        Ok(())
    }

    /// Signs the octets of a Redirect binding query string.
    ///
    /// # Errors
    ///
    /// Fails when the credential has no signing key or the key does not fit
    /// the configured algorithm.
    pub fn sign_query(&self, query: &str, credential: &Credential) -> Result<Vec<u8>, SignatureFailure> {
        let key = credential.signing_key().ok_or(SignatureFailure::MissingSigningKey)?;
        Ok(key.sign(self.config.algorithm, query.as_bytes())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{build_assertion, build_response, idp_credential, EC_CERT, EC_KEY};
    use crate::types::constants::{saml, samlp};
    use crate::types::default_registry;
    use kc_crypto::SignatureAlgorithm;
    use kc_xml::MarshallingError;

    #[test]
    fn signed_assertion_marshals_with_signature_after_issuer() {
        let registry = default_registry();
        let mut tree = XmlObjectTree::new();
        let assertion = build_assertion(&registry, &mut tree, "_a1");
        tree.set_root(assertion).unwrap();

        Signer::default()
            .sign_object(&registry, &mut tree, assertion, &idp_credential())
            .unwrap();

        let element = Marshalling::new(&registry).marshall(&mut tree, assertion).unwrap();
        let names: Vec<_> = element.child_elements().map(|e| e.name.local_name().to_string()).collect();
        assert_eq!(names, ["Issuer", "Signature", "Subject"]);

        let signature = tree[assertion].signature().unwrap();
        assert!(signature.is_computed());
        assert_eq!(signature.references[0].uri, "#_a1");
        assert_eq!(signature.key_info.as_ref().unwrap().x509_certificates.len(), 1);
    }

    #[test]
    fn non_signable_node_is_rejected() {
        let registry = default_registry();
        let mut tree = XmlObjectTree::new();
        let issuer = registry.build(&mut tree, &saml("Issuer")).unwrap();
        let err = Signer::default()
            .sign_object(&registry, &mut tree, issuer, &idp_credential())
            .unwrap_err();
        assert!(matches!(err, SignatureFailure::NotSignable(_)));
    }

    #[test]
    fn node_without_id_is_rejected() {
        let registry = default_registry();
        let mut tree = XmlObjectTree::new();
        let request = registry.build(&mut tree, &samlp("AuthnRequest")).unwrap();
        let err = Signer::default()
            .sign_object(&registry, &mut tree, request, &idp_credential())
            .unwrap_err();
        assert!(matches!(err, SignatureFailure::MissingId(_)));
    }

    #[test]
    fn pending_signature_blocks_marshalling() {
        let registry = default_registry();
        let mut tree = XmlObjectTree::new();
        let response = build_response(&registry, &mut tree, "_r1");
        tree.set_signature(response, Signature::new(kc_xml::c14n::EXC_C14N, SignatureAlgorithm::RsaSha256.uri()))
            .unwrap();
        let err = Marshalling::new(&registry).marshall(&mut tree, response).unwrap_err();
        assert!(matches!(err, MarshallingError::SignatureNotComputed(_)));
    }

    #[test]
    fn ecdsa_key_needs_ecdsa_algorithm() {
        let registry = default_registry();
        let mut tree = XmlObjectTree::new();
        let assertion = build_assertion(&registry, &mut tree, "_a2");
        let credential = Credential::from_private_key_pem(EC_KEY, Some(EC_CERT)).unwrap();

        let err = Signer::default()
            .sign_object(&registry, &mut tree, assertion, &credential)
            .unwrap_err();
        assert!(matches!(err, SignatureFailure::Key(_)));

        Signer::new(SignatureConfig::with_algorithm(SignatureAlgorithm::EcdsaSha256))
            .sign_object(&registry, &mut tree, assertion, &credential)
            .unwrap();
        assert!(tree[assertion].signature().is_some());
    }

    #[test]
    fn query_signing_needs_private_key() {
        let public_only = Credential::new();
        let err = Signer::default().sign_query("SAMLRequest=x", &public_only).unwrap_err();
        assert!(matches!(err, SignatureFailure::MissingSigningKey));
        assert!(!Signer::default().sign_query("SAMLRequest=x", &idp_credential()).unwrap().is_empty());
    }
}
