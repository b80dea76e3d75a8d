//! XML Encryption of SAML elements.
//!
//! The four SAML wrappers (`EncryptedAssertion`, `EncryptedAttribute`,
//! `EncryptedID`, `NewEncryptedID`) hold one `xenc:EncryptedData` and any
//! number of `xenc:EncryptedKey` siblings. Content is encrypted with
//! AES-GCM; the data key is transported with RSA-OAEP, either inline in the
//! `EncryptedData/KeyInfo` or as a sibling referenced through a
//! `RetrievalMethod`.

mod decrypter;
mod encrypter;
mod resolver;

pub use decrypter::{DecryptedIdentifier, Decrypter};
pub use encrypter::{EncryptionParameters, Encrypter, KeyPlacement};
pub use resolver::{
    ChainingEncryptedKeyResolver, EncryptedKeyResolver, InlineEncryptedKeyResolver,
    SiblingEncryptedKeyResolver,
};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kc_crypto::EncryptionError;
use kc_xml::dom::Element;
use kc_xml::{MarshallingError, QName, TreeError, XmlError};
use thiserror::Error;

use crate::types::constants::{ds, saml, samlp, xenc, xenc11};

/// Which SAML wrapper an encrypted element lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncryptedElementKind {
    /// `saml:EncryptedAssertion`, holding an `Assertion`.
    Assertion,
    /// `saml:EncryptedAttribute`, holding an `Attribute`.
    Attribute,
    /// `saml:EncryptedID`, holding a `NameID`, `BaseID` or `Assertion`.
    Id,
    /// `samlp:NewEncryptedID`, holding a `NewID`.
    NewId,
}

impl EncryptedElementKind {
    /// Wrapper element name.
    #[must_use]
    pub fn wrapper_name(self) -> QName {
        match self {
            Self::Assertion => saml("EncryptedAssertion"),
            Self::Attribute => saml("EncryptedAttribute"),
            Self::Id => saml("EncryptedID"),
            Self::NewId => samlp("NewEncryptedID"),
        }
    }

    /// Element names the plaintext may have.
    #[must_use]
    pub fn plaintext_names(self) -> Vec<QName> {
        match self {
            Self::Assertion => vec![saml("Assertion")],
            Self::Attribute => vec![saml("Attribute")],
            Self::Id => vec![saml("NameID"), saml("BaseID"), saml("Assertion")],
            Self::NewId => vec![samlp("NewID")],
        }
    }

    /// The kind whose wrapper is named `name`.
    #[must_use]
    pub fn from_wrapper(name: &QName) -> Option<Self> {
        [Self::Assertion, Self::Attribute, Self::Id, Self::NewId]
            .into_iter()
            .find(|kind| &kind.wrapper_name() == name)
    }

    fn accepts(self, name: &QName) -> bool {
        self.plaintext_names().contains(name)
    }
}

/// Decryption failures.
#[derive(Debug, Error)]
pub enum DecryptionError {
    /// The wrapper has no `EncryptedData` child.
    #[error("{0} had no EncryptedData child")]
    MissingEncryptedData(QName),

    /// An algorithm this toolkit does not decrypt.
    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// No key material could decrypt the content.
    #[error("key resolution failed: {0}")]
    KeyResolution(String),

    /// The XML-Enc structure is malformed.
    #[error("malformed encrypted element: {0}")]
    Malformed(String),

    /// The plaintext is not an acceptable XML element.
    #[error("decrypted content is invalid: {0}")]
    InvalidContent(String),

    /// The plaintext is of the wrong type for its wrapper.
    #[error("expected {expected}, decrypted {found}")]
    TypeMismatch {
        /// Acceptable element names.
        expected: String,
        /// Element name found.
        found: QName,
    },

    /// The wrapper could not be rendered.
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),
}

impl From<XmlError> for DecryptionError {
    fn from(err: XmlError) -> Self {
        Self::InvalidContent(err.to_string())
    }
}

/// Encryption failures.
#[derive(Debug, Error)]
pub enum EncryptionFailure {
    /// A cipher operation failed.
    #[error(transparent)]
    Crypto(#[from] EncryptionError),

    /// The element cannot be placed in the requested wrapper.
    #[error("{found} cannot be encrypted as {wrapper}")]
    InvalidTarget {
        /// Wrapper requested.
        wrapper: QName,
        /// Element given.
        found: QName,
    },

    /// The credential has no key encryption key.
    #[error("credential has no key encryption key")]
    MissingKey,

    /// The plaintext could not be rendered.
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),

    /// The wrapper could not be built.
    #[error(transparent)]
    Xml(#[from] XmlError),

    /// The wrapper could not be placed in the tree.
    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// `EncryptionMethod` algorithm plus its `DigestMethod` and `MGF`
/// parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EncryptionMethod {
    pub algorithm: String,
    pub digest: Option<String>,
    pub mgf: Option<String>,
}

impl EncryptionMethod {
    pub(crate) fn from_parent(element: &Element) -> Result<Self, DecryptionError> {
        let method = element.first_child(&xenc("EncryptionMethod")).ok_or_else(|| {
            DecryptionError::Malformed(format!("{} has no EncryptionMethod", element.name.local_name()))
        })?;
        let algorithm = method
            .attribute("Algorithm")
            .ok_or_else(|| DecryptionError::Malformed("EncryptionMethod has no Algorithm".to_string()))?;
        let child_algorithm = |name: QName| {
            method
                .first_child(&name)
                .and_then(|e| e.attribute("Algorithm"))
                .map(str::to_string)
        };
        Ok(Self {
            algorithm: algorithm.to_string(),
            digest: child_algorithm(ds("DigestMethod")),
            mgf: child_algorithm(xenc11("MGF")),
        })
    }

    pub(crate) fn to_element(&self) -> Element {
        let mut method = Element::new(xenc("EncryptionMethod"))
            .with_attribute(QName::local("Algorithm"), &*self.algorithm);
        if let Some(digest) = &self.digest {
            method.push_element(
                Element::new(ds("DigestMethod")).with_attribute(QName::local("Algorithm"), &**digest),
            );
        }
        if let Some(mgf) = &self.mgf {
            method.push_element(
                Element::new(xenc11("MGF")).with_attribute(QName::local("Algorithm"), &**mgf),
            );
        }
        method
    }
}

/// Decoded `CipherData/CipherValue` of an `EncryptedData` or
/// `EncryptedKey`.
pub(crate) fn cipher_value(element: &Element) -> Result<Vec<u8>, DecryptionError> {
    let value = element
        .first_child(&xenc("CipherData"))
        .and_then(|data| data.first_child(&xenc("CipherValue")))
        .ok_or_else(|| {
            DecryptionError::Malformed(format!("{} has no CipherValue", element.name.local_name()))
        })?;
    let compact: String = value.text().chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|e| DecryptionError::Malformed(format!("CipherValue is not base64: {e}")))
}

pub(crate) fn cipher_data(bytes: &[u8]) -> Element {
    Element::new(xenc("CipherData"))
        .with_child(Element::new(xenc("CipherValue")).with_text(&STANDARD.encode(bytes)))
}
