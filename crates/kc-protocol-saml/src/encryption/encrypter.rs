//! Encrypting SAML elements into their wrappers.

use kc_crypto::{aes_gcm_encrypt, generate_saml_id, random_bytes, DataEncryptionAlgorithm, KeyTransportAlgorithm};
use kc_xml::dom::Element;
use kc_xml::{Marshalling, NodeId, QName, Unmarshalling, XmlObjectRegistry, XmlObjectTree};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{cipher_data, EncryptedElementKind, EncryptionFailure, EncryptionMethod};
use crate::security::Credential;
use crate::types::constants::{ds, xenc, XMLENC_ENCRYPTED_KEY_TYPE, XMLENC_TYPE_ELEMENT};

/// Where the `EncryptedKey` goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPlacement {
    /// Inside `EncryptedData/ds:KeyInfo`.
    #[default]
    Inline,
    /// Next to `EncryptedData` in the wrapper, linked both ways by
    /// `RetrievalMethod` and `ReferenceList`.
    Peer,
}

/// Algorithms and layout for [`Encrypter`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionParameters {
    /// Content encryption algorithm.
    pub data_algorithm: DataEncryptionAlgorithm,
    /// Key transport algorithm.
    pub key_transport: KeyTransportAlgorithm,
    /// Placement of the `EncryptedKey`.
    pub key_placement: KeyPlacement,
    /// `EncryptedKey/@Recipient`.
    pub recipient: Option<String>,
}

/// Replaces SAML elements with their encrypted wrappers.
#[derive(Debug, Clone, Default)]
pub struct Encrypter {
    parameters: EncryptionParameters,
}

impl Encrypter {
    /// Creates an encrypter.
    #[must_use]
    pub const fn new(parameters: EncryptionParameters) -> Self {
        Self { parameters }
    }

    /// Encrypts node `target` for `recipient` into a `kind` wrapper.
    ///
    /// The wrapper is added to `tree` and, if `target` was attached, takes
    /// its place under the same parent. The detached plaintext node stays in
    /// the arena but is no longer reachable from the root.
    ///
    /// # Errors
    ///
    /// Fails when `target` is not a valid plaintext for `kind`, when the
    /// credential has no key encryption key, and on cipher or marshalling
    /// failures.
    pub fn encrypt(
        &self,
        registry: &XmlObjectRegistry,
        tree: &mut XmlObjectTree,
        target: NodeId,
        kind: EncryptedElementKind,
        recipient: &Credential,
    ) -> Result<NodeId, EncryptionFailure> {
        let target_name = tree[target].element_name().clone();
        if !kind.accepts(&target_name) {
            return Err(EncryptionFailure::InvalidTarget {
                wrapper: kind.wrapper_name(),
                found: target_name,
            });
        }
        let kek = recipient.key_encryption_key().ok_or(EncryptionFailure::MissingKey)?;

        let plaintext = Marshalling::new(registry).marshall(tree, target)?.to_xml();
        let data_key = random_bytes(self.parameters.data_algorithm.key_len());
        let ciphertext = aes_gcm_encrypt(self.parameters.data_algorithm, &data_key, plaintext.as_bytes())?;
        let wrapped_key = kek.wrap_key(self.parameters.key_transport, &data_key)?;

        let data_id = generate_saml_id();
        let key_id = generate_saml_id();
        let encrypted_key = self.encrypted_key(&key_id, &data_id, &wrapped_key, recipient);

        let mut key_info = Element::new(ds("KeyInfo"));
        let peer_key = match self.parameters.key_placement {
            KeyPlacement::Inline => {
                key_info.push_element(encrypted_key);
                None
            }
            KeyPlacement::Peer => {
                key_info.push_element(
                    Element::new(ds("RetrievalMethod"))
                        .with_attribute(QName::local("Type"), XMLENC_ENCRYPTED_KEY_TYPE)
                        .with_attribute(QName::local("URI"), format!("#{key_id}")),
                );
                Some(encrypted_key)
            }
        };

        let encrypted_data = Element::new(xenc("EncryptedData"))
            .with_attribute(QName::local("Id"), &*data_id)
            .with_attribute(QName::local("Type"), XMLENC_TYPE_ELEMENT)
            .with_child(
                EncryptionMethod {
                    algorithm: self.parameters.data_algorithm.uri().to_string(),
                    digest: None,
                    mgf: None,
                }
                .to_element(),
            )
            .with_child(key_info)
            .with_child(cipher_data(&ciphertext));

        let mut wrapper = Element::new(kind.wrapper_name()).with_child(encrypted_data);
        if let Some(key) = peer_key {
            wrapper.push_element(key);
        }

        let wrapper_tree = Unmarshalling::new(registry).unmarshall(&wrapper)?;
        let wrapper_root = wrapper_tree.root().ok_or_else(|| {
            EncryptionFailure::InvalidTarget {
                wrapper: kind.wrapper_name(),
                found: target_name.clone(),
            }
        })?;
        let wrapper_id = tree.import_subtree(&wrapper_tree, wrapper_root);
        if let Some(parent) = tree.detach(target) {
            tree.append_child(parent, wrapper_id)?;
        }

        debug!(
            element = %target_name,
            wrapper = %kind.wrapper_name(),
            algorithm = ?self.parameters.data_algorithm,
            placement = ?self.parameters.key_placement,
            "encrypted element"
        );
        Ok(wrapper_id)
    }

    fn encrypted_key(&self, key_id: &str, data_id: &str, wrapped_key: &[u8], recipient: &Credential) -> Element {
        let (digest, mgf) = self.parameters.key_transport.parameters();
        let mut key = Element::new(xenc("EncryptedKey")).with_attribute(QName::local("Id"), key_id);
        if let Some(name) = &self.parameters.recipient {
            key.set_attribute(QName::local("Recipient"), name.as_str());
        }
        key.push_element(
            EncryptionMethod {
                algorithm: self.parameters.key_transport.uri().to_string(),
                digest: digest.map(str::to_string),
                mgf: mgf.map(str::to_string),
            }
            .to_element(),
        );
        let key_info = recipient.key_info();
        if !key_info.is_empty() {
            key.push_element(key_info.to_element());
        }
        key.push_element(cipher_data(wrapped_key));
        if self.parameters.key_placement == KeyPlacement::Peer {
            key.push_element(
                Element::new(xenc("ReferenceList")).with_child(
                    Element::new(xenc("DataReference"))
                        .with_attribute(QName::local("URI"), format!("#{data_id}")),
                ),
            );
        }
        key
    }
}
