//! # kc-crypto
//!
//! Cryptographic primitives for XML Signature and XML Encryption, backed by
//! aws-lc-rs.
//!
//! The XML layers above this crate only ever see algorithm URIs and byte
//! strings; everything that touches key material lives here.
//!
//! ## Legacy algorithms
//!
//! SAML deployments still send RSA-SHA1 signatures and RSA-OAEP-MGF1P key
//! transport. SHA-1 is available for verification only, and only when the
//! caller opts in (see [`SignatureAlgorithm::is_legacy`]).

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod algorithm;
pub mod encryption;
pub mod hash;
pub mod keys;
pub mod random;
pub mod signature;

pub use algorithm::{
    DataEncryptionAlgorithm, DigestAlgorithm, KeyTransportAlgorithm, SignatureAlgorithm,
};
pub use encryption::{aes_gcm_decrypt, aes_gcm_encrypt, EncryptionError, KeyDecryptionKey, KeyEncryptionKey};
pub use hash::{digest, sha256};
pub use keys::{pem_to_der, KeyFamily, SigningKey, VerifyingKey};
pub use random::{generate_saml_id, random_bytes};
pub use signature::SignatureError;
