//! Decrypting SAML encrypted wrappers.

use std::sync::Arc;

use kc_crypto::{aes_gcm_decrypt, DataEncryptionAlgorithm, KeyTransportAlgorithm};
use kc_xml::dom::{self, Element};
use kc_xml::signature::KeyInfo;
use kc_xml::{Marshalling, NodeId, QName, Unmarshalling, UnmarshallingOptions, XmlObjectRegistry, XmlObjectTree};
use tracing::{debug, error, warn};

use super::{cipher_value, ChainingEncryptedKeyResolver, DecryptionError, EncryptedElementKind, EncryptedKeyResolver, EncryptionMethod};
use crate::security::{CredentialCriteria, CredentialResolver, UsageType};
use crate::types::constants::{ds, saml, xenc};

/// Plaintext of an `EncryptedID`.
#[derive(Debug)]
pub enum DecryptedIdentifier {
    /// A `saml:NameID`.
    NameId(XmlObjectTree),
    /// A `saml:BaseID`.
    BaseId(XmlObjectTree),
    /// A `saml:Assertion` used as an identifier.
    Assertion(XmlObjectTree),
}

impl DecryptedIdentifier {
    /// The decrypted tree.
    #[must_use]
    pub const fn tree(&self) -> &XmlObjectTree {
        match self {
            Self::NameId(tree) | Self::BaseId(tree) | Self::Assertion(tree) => tree,
        }
    }

    /// Consumes the identifier, returning its tree.
    #[must_use]
    pub fn into_tree(self) -> XmlObjectTree {
        match self {
            Self::NameId(tree) | Self::BaseId(tree) | Self::Assertion(tree) => tree,
        }
    }
}

/// Decrypts the four SAML encrypted wrappers.
///
/// The content key is looked up first among the secret keys of the data key
/// resolver, if one is configured. Otherwise each `EncryptedKey` returned by
/// the encrypted key resolver is unwrapped with the private keys of the key
/// encryption key resolver until one yields a key that decrypts the content.
#[derive(Clone)]
pub struct Decrypter {
    data_key_resolver: Option<Arc<dyn CredentialResolver>>,
    kek_resolver: Option<Arc<dyn CredentialResolver>>,
    encrypted_key_resolver: Arc<dyn EncryptedKeyResolver>,
    root_in_new_document: bool,
    unmarshalling: UnmarshallingOptions,
}

impl std::fmt::Debug for Decrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decrypter")
            .field("data_key_resolver", &self.data_key_resolver.is_some())
            .field("kek_resolver", &self.kek_resolver.is_some())
            .field("root_in_new_document", &self.root_in_new_document)
            .field("unmarshalling", &self.unmarshalling)
            .finish_non_exhaustive()
    }
}

impl Decrypter {
    /// Creates a decrypter from its three resolvers.
    #[must_use]
    pub fn new(
        data_key_resolver: Option<Arc<dyn CredentialResolver>>,
        kek_resolver: Option<Arc<dyn CredentialResolver>>,
        encrypted_key_resolver: Arc<dyn EncryptedKeyResolver>,
    ) -> Self {
        Self {
            data_key_resolver,
            kek_resolver,
            encrypted_key_resolver,
            root_in_new_document: false,
            unmarshalling: UnmarshallingOptions::default(),
        }
    }

    /// Decrypter using `kek_resolver` for private keys and the standard
    /// inline-then-sibling key lookup for `recipients`.
    #[must_use]
    pub fn with_kek_resolver(kek_resolver: Arc<dyn CredentialResolver>, recipients: Vec<String>) -> Self {
        Self::new(
            None,
            Some(kek_resolver),
            Arc::new(ChainingEncryptedKeyResolver::standard(recipients)),
        )
    }

    /// Parse the plaintext as a standalone document instead of in the
    /// namespace context of the wrapper.
    #[must_use]
    pub const fn with_root_in_new_document(mut self, root_in_new_document: bool) -> Self {
        self.root_in_new_document = root_in_new_document;
        self
    }

    /// Options for unmarshalling the plaintext.
    #[must_use]
    pub const fn with_unmarshalling(mut self, options: UnmarshallingOptions) -> Self {
        self.unmarshalling = options;
        self
    }

    /// Whether plaintext is parsed as a standalone document.
    #[must_use]
    pub const fn root_in_new_document(&self) -> bool {
        self.root_in_new_document
    }

    /// Decrypts an `EncryptedAssertion`.
    ///
    /// # Errors
    ///
    /// See [`Self::decrypt`].
    pub fn decrypt_assertion(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        wrapper: NodeId,
    ) -> Result<XmlObjectTree, DecryptionError> {
        self.decrypt(registry, tree, wrapper, EncryptedElementKind::Assertion)
    }

    /// Decrypts an `EncryptedAttribute`.
    ///
    /// # Errors
    ///
    /// See [`Self::decrypt`].
    pub fn decrypt_attribute(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        wrapper: NodeId,
    ) -> Result<XmlObjectTree, DecryptionError> {
        self.decrypt(registry, tree, wrapper, EncryptedElementKind::Attribute)
    }

    /// Decrypts an `EncryptedID`.
    ///
    /// # Errors
    ///
    /// See [`Self::decrypt`].
    pub fn decrypt_id(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        wrapper: NodeId,
    ) -> Result<DecryptedIdentifier, DecryptionError> {
        let plaintext = self.decrypt(registry, tree, wrapper, EncryptedElementKind::Id)?;
        let name = resolved_name(&plaintext)?;
        if name == saml("NameID") {
            Ok(DecryptedIdentifier::NameId(plaintext))
        } else if name == saml("BaseID") {
            Ok(DecryptedIdentifier::BaseId(plaintext))
        } else {
            Ok(DecryptedIdentifier::Assertion(plaintext))
        }
    }

    /// Decrypts a `NewEncryptedID`.
    ///
    /// # Errors
    ///
    /// See [`Self::decrypt`].
    pub fn decrypt_new_id(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        wrapper: NodeId,
    ) -> Result<XmlObjectTree, DecryptionError> {
        self.decrypt(registry, tree, wrapper, EncryptedElementKind::NewId)
    }

    /// Decrypts the `kind` wrapper at `wrapper` into a new tree.
    ///
    /// `tree` is only marshalled to obtain the wrapper DOM; the wrapper
    /// stays in place.
    ///
    /// # Errors
    ///
    /// Fails when the wrapper is of another kind, has no `EncryptedData`,
    /// uses an unsupported algorithm, when no resolved key decrypts it, or
    /// when the plaintext is not a valid element of the expected type.
    pub fn decrypt(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        wrapper: NodeId,
        kind: EncryptedElementKind,
    ) -> Result<XmlObjectTree, DecryptionError> {
        match self.decrypt_inner(registry, tree, wrapper, kind) {
            Ok(plaintext) => {
                debug!(wrapper = %kind.wrapper_name(), "decrypted element");
                Ok(plaintext)
            }
            Err(e) => {
                error!(wrapper = %kind.wrapper_name(), error = %e, "decryption failed");
                Err(e)
            }
        }
    }

    fn decrypt_inner(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        wrapper: NodeId,
        kind: EncryptedElementKind,
    ) -> Result<XmlObjectTree, DecryptionError> {
        let wrapper_name = tree[wrapper].element_name().clone();
        if wrapper_name != kind.wrapper_name() {
            return Err(DecryptionError::TypeMismatch {
                expected: kind.wrapper_name().prefixed(),
                found: wrapper_name,
            });
        }

        let wrapper_element = Marshalling::new(registry).marshall(tree, wrapper)?;
        let encrypted_data = wrapper_element
            .first_child(&xenc("EncryptedData"))
            .ok_or(DecryptionError::MissingEncryptedData(wrapper_name))?;
        let bytes = self.decrypt_data(encrypted_data, &wrapper_element)?;

        let text = String::from_utf8(bytes)
            .map_err(|e| DecryptionError::InvalidContent(format!("plaintext is not UTF-8: {e}")))?;
        let element = if self.root_in_new_document {
            dom::parse(&text)
        } else {
            dom::parse_fragment(&text, &tree.in_scope_namespaces(wrapper))
        }
        .map_err(|e| DecryptionError::InvalidContent(e.to_string()))?;

        if !kind.accepts(&element.name) {
            return Err(type_mismatch(kind, element.name));
        }
        let plaintext = Unmarshalling::with_options(registry, self.unmarshalling).unmarshall(&element)?;

        // xsi:type may select a provider for another element than the tag names
        let resolved = resolved_name(&plaintext)?;
        if !kind.accepts(&resolved) {
            return Err(type_mismatch(kind, resolved));
        }
        Ok(plaintext)
    }

    fn decrypt_data(&self, encrypted_data: &Element, wrapper: &Element) -> Result<Vec<u8>, DecryptionError> {
        let method = EncryptionMethod::from_parent(encrypted_data)?;
        let algorithm = DataEncryptionAlgorithm::from_uri(&method.algorithm)
            .ok_or(DecryptionError::UnsupportedAlgorithm(method.algorithm))?;
        let ciphertext = cipher_value(encrypted_data)?;

        if let Some(resolver) = &self.data_key_resolver {
            let criteria = criteria_for(encrypted_data)?;
            for credential in resolver.resolve(&criteria) {
                let Some(key) = credential.secret_key() else {
                    continue;
                };
                match aes_gcm_decrypt(algorithm, key, &ciphertext) {
                    Ok(plaintext) => return Ok(plaintext),
                    Err(e) => warn!(error = %e, "resolved data key did not decrypt content"),
                }
            }
        }

        let encrypted_keys = self.encrypted_key_resolver.resolve(encrypted_data, wrapper);
        if encrypted_keys.is_empty() {
            return Err(DecryptionError::KeyResolution("no EncryptedKey found".to_string()));
        }
        let Some(kek_resolver) = &self.kek_resolver else {
            return Err(DecryptionError::KeyResolution(
                "no key encryption key resolver configured".to_string(),
            ));
        };

        for encrypted_key in &encrypted_keys {
            let key = match unwrap_key(kek_resolver.as_ref(), encrypted_key, algorithm) {
                Ok(key) => key,
                Err(e) => {
                    warn!(key = ?encrypted_key.attribute("Id"), error = %e, "EncryptedKey not usable");
                    continue;
                }
            };
            match aes_gcm_decrypt(algorithm, &key, &ciphertext) {
                Ok(plaintext) => return Ok(plaintext),
                Err(e) => warn!(key = ?encrypted_key.attribute("Id"), error = %e, "unwrapped key did not decrypt content"),
            }
        }
        Err(DecryptionError::KeyResolution(format!(
            "none of {} EncryptedKey candidates decrypted the content",
            encrypted_keys.len()
        )))
    }
}

/// Element name of the provider that built the plaintext root.
fn resolved_name(plaintext: &XmlObjectTree) -> Result<QName, DecryptionError> {
    plaintext
        .root()
        .map(|root| plaintext[root].schema().element_name.clone())
        .ok_or_else(|| DecryptionError::InvalidContent("decrypted tree has no root".to_string()))
}

fn type_mismatch(kind: EncryptedElementKind, found: QName) -> DecryptionError {
    DecryptionError::TypeMismatch {
        expected: kind
            .plaintext_names()
            .iter()
            .map(QName::prefixed)
            .collect::<Vec<_>>()
            .join(" | "),
        found,
    }
}

fn criteria_for(element: &Element) -> Result<CredentialCriteria, DecryptionError> {
    let criteria = CredentialCriteria::for_usage(UsageType::Encryption);
    match element.first_child(&ds("KeyInfo")) {
        Some(key_info) => {
            let key_info = KeyInfo::from_element(key_info).map_err(|e| DecryptionError::Malformed(e.to_string()))?;
            Ok(criteria.with_key_info(&key_info))
        }
        None => Ok(criteria),
    }
}

fn unwrap_key(
    resolver: &dyn CredentialResolver,
    encrypted_key: &Element,
    data_algorithm: DataEncryptionAlgorithm,
) -> Result<Vec<u8>, DecryptionError> {
    let method = EncryptionMethod::from_parent(encrypted_key)?;
    let transport = KeyTransportAlgorithm::from_parts(&method.algorithm, method.digest.as_deref(), method.mgf.as_deref())
        .ok_or(DecryptionError::UnsupportedAlgorithm(method.algorithm))?;
    let wrapped = cipher_value(encrypted_key)?;

    for credential in resolver.resolve(&criteria_for(encrypted_key)?) {
        let Some(kdk) = credential.key_decryption_key() else {
            continue;
        };
        if let Ok(key) = kdk.unwrap_key(transport, &wrapped) {
            if key.len() == data_algorithm.key_len() {
                return Ok(key);
            }
        }
    }
    Err(DecryptionError::KeyResolution(
        "no key encryption key unwrapped the EncryptedKey".to_string(),
    ))
}
