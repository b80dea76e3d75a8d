//! Toolkit configuration.
//!
//! Every section has defaults, so a host can deserialize a partial document
//! (JSON, TOML, ...) and override only what it needs.

use std::sync::Arc;

use kc_xml::UnmarshallingOptions;
use serde::{Deserialize, Serialize};

use crate::bindings::BindingConfig;
use crate::encryption::{Decrypter, Encrypter, EncryptionParameters};
use crate::security::CredentialResolver;
use crate::signature::{SignatureConfig, SignatureValidator, Signer};

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamlConfig {
    /// Signing and verification.
    pub signature: SignatureConfig,
    /// HTTP bindings.
    pub binding: BindingConfig,
    /// Outbound encryption.
    pub encryption: EncryptionParameters,
    /// Inbound decryption.
    pub decryption: DecryptionConfig,
    /// Parsing of received XML.
    pub unmarshalling: UnmarshallingConfig,
}

/// Decryption configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptionConfig {
    /// Parse plaintext as a standalone document.
    pub root_in_new_document: bool,
    /// `EncryptedKey/@Recipient` values addressed to us.
    pub recipients: Vec<String>,
}

/// Unmarshalling configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnmarshallingConfig {
    /// Accept unregistered elements as generic nodes.
    pub allow_unknown: bool,
    /// Run validator chains.
    pub validate: bool,
}

impl Default for UnmarshallingConfig {
    fn default() -> Self {
        let options = UnmarshallingOptions::default();
        Self {
            allow_unknown: options.allow_unknown,
            validate: options.validate,
        }
    }
}

impl From<UnmarshallingConfig> for UnmarshallingOptions {
    fn from(config: UnmarshallingConfig) -> Self {
        Self {
            allow_unknown: config.allow_unknown,
            validate: config.validate,
        }
    }
}

impl SamlConfig {
    /// Signer for outbound messages.
    #[must_use]
    pub fn signer(&self) -> Signer {
        Signer::new(self.signature.clone())
    }

    /// Verifier trusting the keys of `resolver`.
    #[must_use]
    pub fn signature_validator(&self, resolver: Arc<dyn CredentialResolver>) -> SignatureValidator {
        SignatureValidator::new(resolver, self.signature.clone())
    }

    /// Encrypter for outbound elements.
    #[must_use]
    pub fn encrypter(&self) -> Encrypter {
        Encrypter::new(self.encryption.clone())
    }

    /// Decrypter unwrapping keys with the private keys of `kek_resolver`.
    #[must_use]
    pub fn decrypter(&self, kek_resolver: Arc<dyn CredentialResolver>) -> Decrypter {
        Decrypter::with_kek_resolver(kek_resolver, self.decryption.recipients.clone())
            .with_root_in_new_document(self.decryption.root_in_new_document)
            .with_unmarshalling(self.unmarshalling.into())
    }
}
