//! Content encryption and key transport for XML Encryption.
//!
//! `EncryptedData` ciphertext uses the XML-Enc 1.1 GCM layout: a 96-bit IV,
//! the ciphertext, then the 128-bit authentication tag. Key transport is
//! RSA-OAEP.

use std::fmt;

use aws_lc_rs::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_128_GCM, AES_256_GCM, NONCE_LEN};
use aws_lc_rs::rsa::{
    OaepAlgorithm, OaepPrivateDecryptingKey, OaepPublicEncryptingKey, PrivateDecryptingKey,
    PublicEncryptingKey, OAEP_SHA1_MGF1SHA1, OAEP_SHA256_MGF1SHA256,
};
use thiserror::Error;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::algorithm::{DataEncryptionAlgorithm, KeyTransportAlgorithm};
use crate::random::random_bytes;

/// Error type for encryption operations.
#[derive(Debug, Error)]
pub enum EncryptionError {
    /// Invalid key material.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed; deliberately carries no detail.
    #[error("decryption failed")]
    Decryption,
}

/// Encrypts `plaintext` with AES-GCM, returning `IV || ciphertext || tag`.
///
/// # Errors
///
/// Returns an error if the key length does not match the algorithm.
pub fn aes_gcm_encrypt(
    algorithm: DataEncryptionAlgorithm,
    key: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let key = aead_key(algorithm, key)?;

    let iv = random_bytes(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(&iv)
        .map_err(|e| EncryptionError::Encryption(format!("invalid nonce: {e}")))?;

    let mut in_out = plaintext.to_vec();
    key.seal_in_place_append_tag(nonce, Aad::empty(), &mut in_out)
        .map_err(|e| EncryptionError::Encryption(format!("AES-GCM seal failed: {e}")))?;

    let mut out = iv;
    out.extend_from_slice(&in_out);
    Ok(out)
}

/// Decrypts `IV || ciphertext || tag` produced by AES-GCM.
///
/// # Errors
///
/// Returns an error if the key length is wrong, the input is too short, or
/// authentication fails.
pub fn aes_gcm_decrypt(
    algorithm: DataEncryptionAlgorithm,
    key: &[u8],
    data: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let key = aead_key(algorithm, key)?;

    if data.len() < NONCE_LEN {
        return Err(EncryptionError::Decryption);
    }
    let (iv, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::try_assume_unique_for_key(iv).map_err(|_| EncryptionError::Decryption)?;

    let mut in_out = ciphertext.to_vec();
    let plaintext = key
        .open_in_place(nonce, Aad::empty(), &mut in_out)
        .map_err(|_| EncryptionError::Decryption)?;
    Ok(plaintext.to_vec())
}

fn aead_key(algorithm: DataEncryptionAlgorithm, key: &[u8]) -> Result<LessSafeKey, EncryptionError> {
    if key.len() != algorithm.key_len() {
        return Err(EncryptionError::InvalidKey(format!(
            "{algorithm:?} needs a {}-byte key, got {}",
            algorithm.key_len(),
            key.len()
        )));
    }
    let alg = match algorithm {
        DataEncryptionAlgorithm::Aes128Gcm => &AES_128_GCM,
        DataEncryptionAlgorithm::Aes256Gcm => &AES_256_GCM,
    };
    let unbound = UnboundKey::new(alg, key)
        .map_err(|e| EncryptionError::InvalidKey(format!("AES key rejected: {e}")))?;
    Ok(LessSafeKey::new(unbound))
}

const fn oaep(algorithm: KeyTransportAlgorithm) -> &'static OaepAlgorithm {
    match algorithm {
        KeyTransportAlgorithm::RsaOaepMgf1p => &OAEP_SHA1_MGF1SHA1,
        KeyTransportAlgorithm::RsaOaepSha256 => &OAEP_SHA256_MGF1SHA256,
    }
}

/// RSA private key used to unwrap `EncryptedKey` values.
pub struct KeyDecryptionKey {
    key: OaepPrivateDecryptingKey,
}

impl KeyDecryptionKey {
    /// Loads a PKCS#8 DER-encoded RSA private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not a usable RSA key.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> Result<Self, EncryptionError> {
        let private = PrivateDecryptingKey::from_pkcs8(pkcs8_der)
            .map_err(|e| EncryptionError::InvalidKey(format!("invalid RSA PKCS#8 key: {e}")))?;
        let key = OaepPrivateDecryptingKey::new(private)
            .map_err(|e| EncryptionError::InvalidKey(format!("RSA key unusable for OAEP: {e}")))?;
        Ok(Self { key })
    }

    /// Recovers a symmetric key from its RSA-OAEP wrapping.
    ///
    /// # Errors
    ///
    /// Returns [`EncryptionError::Decryption`] if the wrapped value was not
    /// produced for this key.
    pub fn unwrap_key(
        &self,
        algorithm: KeyTransportAlgorithm,
        wrapped: &[u8],
    ) -> Result<Vec<u8>, EncryptionError> {
        let mut out = vec![0u8; self.key.min_output_size()];
        let plaintext = self
            .key
            .decrypt(oaep(algorithm), wrapped, &mut out, None)
            .map_err(|_| EncryptionError::Decryption)?;
        Ok(plaintext.to_vec())
    }
}

impl fmt::Debug for KeyDecryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyDecryptionKey { .. }")
    }
}

/// RSA public key used to wrap data encryption keys.
pub struct KeyEncryptionKey {
    key: OaepPublicEncryptingKey,
}

impl KeyEncryptionKey {
    /// Parses a DER-encoded `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is not an RSA public key.
    pub fn from_public_key_der(spki_der: &[u8]) -> Result<Self, EncryptionError> {
        let public = PublicEncryptingKey::from_der(spki_der)
            .map_err(|e| EncryptionError::InvalidKey(format!("invalid RSA public key: {e}")))?;
        let key = OaepPublicEncryptingKey::new(public)
            .map_err(|e| EncryptionError::InvalidKey(format!("RSA key unusable for OAEP: {e}")))?;
        Ok(Self { key })
    }

    /// Extracts the RSA public key of a DER-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate is invalid or not RSA.
    pub fn from_certificate_der(cert_der: &[u8]) -> Result<Self, EncryptionError> {
        let (_, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| EncryptionError::InvalidKey(format!("invalid certificate: {e}")))?;
        Self::from_public_key_der(cert.public_key().raw)
    }

    /// Wraps `key` with RSA-OAEP.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is too long for the modulus.
    pub fn wrap_key(
        &self,
        algorithm: KeyTransportAlgorithm,
        key: &[u8],
    ) -> Result<Vec<u8>, EncryptionError> {
        let mut out = vec![0u8; self.key.ciphertext_size()];
        let ciphertext = self
            .key
            .encrypt(oaep(algorithm), key, &mut out, None)
            .map_err(|e| EncryptionError::Encryption(format!("RSA-OAEP wrap failed: {e}")))?;
        Ok(ciphertext.to_vec())
    }
}

impl fmt::Debug for KeyEncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyEncryptionKey { .. }")
    }
}
