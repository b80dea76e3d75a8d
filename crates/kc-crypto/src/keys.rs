//! Signing and verification keys.
//!
//! Private keys are loaded from PKCS#8; the key family (RSA or one of the
//! NIST curves) is detected from the key itself. Public keys come from X.509
//! certificates or bare `SubjectPublicKeyInfo` structures.
//!
//! ## Supported Algorithms
//!
//! ### RSA
//! - RSA-SHA256, RSA-SHA384, RSA-SHA512 (sign and verify)
//! - RSA-SHA1 (verify only)
//!
//! ### ECDSA
//! - ECDSA-SHA256 on P-256
//! - ECDSA-SHA384 on P-384
//! - ECDSA-SHA512 on P-521
//!
//! ECDSA signature values use the fixed-width `r || s` encoding required by
//! XML-DSig, not ASN.1.

use std::fmt;

use aws_lc_rs::{
    rand::SystemRandom,
    signature::{
        self, EcdsaKeyPair, KeyPair, RsaKeyPair, UnparsedPublicKey, VerificationAlgorithm,
        ECDSA_P256_SHA256_FIXED_SIGNING, ECDSA_P384_SHA384_FIXED_SIGNING,
        ECDSA_P521_SHA512_FIXED_SIGNING,
    },
};
use base64::Engine;
use x509_parser::prelude::{FromDer, X509Certificate};
use x509_parser::public_key::PublicKey;
use x509_parser::x509::SubjectPublicKeyInfo;

use crate::algorithm::SignatureAlgorithm;
use crate::signature::SignatureError;

/// Family of an asymmetric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyFamily {
    /// RSA of any supported modulus size.
    Rsa,
    /// ECDSA on P-256.
    EcP256,
    /// ECDSA on P-384.
    EcP384,
    /// ECDSA on P-521.
    EcP521,
}

impl KeyFamily {
    /// Returns true if keys of this family can produce or check `algorithm`.
    #[must_use]
    pub const fn supports(self, algorithm: SignatureAlgorithm) -> bool {
        match self {
            Self::Rsa => algorithm.is_rsa(),
            Self::EcP256 => matches!(algorithm, SignatureAlgorithm::EcdsaSha256),
            Self::EcP384 => matches!(algorithm, SignatureAlgorithm::EcdsaSha384),
            Self::EcP521 => matches!(algorithm, SignatureAlgorithm::EcdsaSha512),
        }
    }

    /// Returns the algorithm used when the caller does not pick one.
    #[must_use]
    pub const fn default_algorithm(self) -> SignatureAlgorithm {
        match self {
            Self::Rsa => SignatureAlgorithm::RsaSha256,
            Self::EcP256 => SignatureAlgorithm::EcdsaSha256,
            Self::EcP384 => SignatureAlgorithm::EcdsaSha384,
            Self::EcP521 => SignatureAlgorithm::EcdsaSha512,
        }
    }

    /// Infers the curve from the length of an uncompressed EC point.
    const fn from_ec_point_len(len: usize) -> Option<Self> {
        match len {
            65 => Some(Self::EcP256),
            97 => Some(Self::EcP384),
            133 => Some(Self::EcP521),
            _ => None,
        }
    }
}

enum KeyPairInner {
    Rsa(RsaKeyPair),
    Ecdsa(EcdsaKeyPair),
}

/// Private key able to produce XML-DSig signature values.
pub struct SigningKey {
    key_pair: KeyPairInner,
    family: KeyFamily,
}

impl SigningKey {
    /// Loads a PKCS#8 DER-encoded RSA or EC private key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is neither RSA nor on a supported curve.
    pub fn from_pkcs8(pkcs8_der: &[u8]) -> Result<Self, SignatureError> {
        if let Ok(key_pair) = RsaKeyPair::from_pkcs8(pkcs8_der) {
            return Ok(Self {
                key_pair: KeyPairInner::Rsa(key_pair),
                family: KeyFamily::Rsa,
            });
        }

        let curves = [
            (&ECDSA_P256_SHA256_FIXED_SIGNING, KeyFamily::EcP256),
            (&ECDSA_P384_SHA384_FIXED_SIGNING, KeyFamily::EcP384),
            (&ECDSA_P521_SHA512_FIXED_SIGNING, KeyFamily::EcP521),
        ];
        for (alg, family) in curves {
            if let Ok(key_pair) = EcdsaKeyPair::from_pkcs8(alg, pkcs8_der) {
                return Ok(Self {
                    key_pair: KeyPairInner::Ecdsa(key_pair),
                    family,
                });
            }
        }

        Err(SignatureError::InvalidKey(
            "not an RSA or P-256/P-384/P-521 PKCS#8 key".to_string(),
        ))
    }

    /// Loads a PEM `PRIVATE KEY` block.
    ///
    /// # Errors
    ///
    /// Returns an error if the PEM block is missing or the key is invalid.
    pub fn from_pem(pem: &str) -> Result<Self, SignatureError> {
        let der = pem_to_der(pem, "PRIVATE KEY")
            .ok_or_else(|| SignatureError::InvalidKey("no PRIVATE KEY PEM block".to_string()))?;
        Self::from_pkcs8(&der)
    }

    /// Returns the key family.
    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        self.family
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        let public_key = match &self.key_pair {
            KeyPairInner::Rsa(kp) => kp.public_key().as_ref().to_vec(),
            KeyPairInner::Ecdsa(kp) => kp.public_key().as_ref().to_vec(),
        };
        VerifyingKey {
            family: self.family,
            public_key,
        }
    }

    /// Signs `data` with `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns an error if the algorithm does not fit the key family, if it
    /// is verification-only, or if the signing operation fails.
    pub fn sign(&self, algorithm: SignatureAlgorithm, data: &[u8]) -> Result<Vec<u8>, SignatureError> {
        if !self.family.supports(algorithm) || algorithm.is_legacy() {
            return Err(SignatureError::UnsupportedAlgorithm(format!(
                "{algorithm:?} cannot be produced with a {:?} key",
                self.family
            )));
        }

        let rng = SystemRandom::new();
        match &self.key_pair {
            KeyPairInner::Rsa(key_pair) => {
                let padding = match algorithm {
                    SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_SHA384,
                    SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_SHA512,
                    _ => &signature::RSA_PKCS1_SHA256,
                };
                let mut sig = vec![0u8; key_pair.public_modulus_len()];
                key_pair
                    .sign(padding, &rng, data, &mut sig)
                    .map_err(|e| SignatureError::Signing(format!("RSA signing failed: {e}")))?;
                Ok(sig)
            }
            KeyPairInner::Ecdsa(key_pair) => {
                let sig = key_pair
                    .sign(&rng, data)
                    .map_err(|e| SignatureError::Signing(format!("ECDSA signing failed: {e}")))?;
                Ok(sig.as_ref().to_vec())
            }
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("family", &self.family)
            .finish_non_exhaustive()
    }
}

/// Public key able to check XML-DSig signature values.
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey {
    family: KeyFamily,
    /// PKCS#1 `RSAPublicKey` for RSA, uncompressed point for EC.
    public_key: Vec<u8>,
}

impl VerifyingKey {
    /// Extracts the public key of a DER-encoded X.509 certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed or carries an
    /// unsupported key type.
    pub fn from_certificate_der(cert_der: &[u8]) -> Result<Self, SignatureError> {
        let (_, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| SignatureError::InvalidKey(format!("invalid certificate: {e}")))?;
        Self::from_spki(cert.public_key())
    }

    /// Parses a DER-encoded `SubjectPublicKeyInfo`.
    ///
    /// # Errors
    ///
    /// Returns an error if the structure is invalid or the key type is
    /// unsupported.
    pub fn from_public_key_der(spki_der: &[u8]) -> Result<Self, SignatureError> {
        let (_, spki) = SubjectPublicKeyInfo::from_der(spki_der)
            .map_err(|e| SignatureError::InvalidKey(format!("invalid public key: {e}")))?;
        Self::from_spki(&spki)
    }

    fn from_spki(spki: &SubjectPublicKeyInfo<'_>) -> Result<Self, SignatureError> {
        let public_key = spki.subject_public_key.data.to_vec();
        let family = match spki.parsed() {
            Ok(PublicKey::RSA(_)) => KeyFamily::Rsa,
            Ok(PublicKey::EC(_)) => KeyFamily::from_ec_point_len(public_key.len())
                .ok_or_else(|| SignatureError::InvalidKey("unsupported EC curve".to_string()))?,
            Ok(_) => {
                return Err(SignatureError::InvalidKey(
                    "unsupported public key type".to_string(),
                ))
            }
            Err(e) => return Err(SignatureError::InvalidKey(e.to_string())),
        };
        Ok(Self { family, public_key })
    }

    /// Returns the key family.
    #[must_use]
    pub const fn family(&self) -> KeyFamily {
        self.family
    }

    /// Checks `sig` over `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::Verification`] on any mismatch, including an
    /// algorithm that does not fit the key family.
    pub fn verify(
        &self,
        algorithm: SignatureAlgorithm,
        data: &[u8],
        sig: &[u8],
    ) -> Result<(), SignatureError> {
        if !self.family.supports(algorithm) {
            return Err(SignatureError::Verification);
        }

        let verification_alg: &'static dyn VerificationAlgorithm = match algorithm {
            SignatureAlgorithm::RsaSha1 => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
            SignatureAlgorithm::RsaSha256 => &signature::RSA_PKCS1_2048_8192_SHA256,
            SignatureAlgorithm::RsaSha384 => &signature::RSA_PKCS1_2048_8192_SHA384,
            SignatureAlgorithm::RsaSha512 => &signature::RSA_PKCS1_2048_8192_SHA512,
            SignatureAlgorithm::EcdsaSha256 => &signature::ECDSA_P256_SHA256_FIXED,
            SignatureAlgorithm::EcdsaSha384 => &signature::ECDSA_P384_SHA384_FIXED,
            SignatureAlgorithm::EcdsaSha512 => &signature::ECDSA_P521_SHA512_FIXED,
        };

        UnparsedPublicKey::new(verification_alg, self.public_key.as_slice())
            .verify(data, sig)
            .map_err(|_| SignatureError::Verification)
    }
}

impl fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerifyingKey")
            .field("family", &self.family)
            .field("len", &self.public_key.len())
            .finish()
    }
}

/// Extracts the DER payload of the first PEM block carrying `label`.
#[must_use]
pub fn pem_to_der(pem: &str, label: &str) -> Option<Vec<u8>> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let start = pem.find(&begin)? + begin.len();
    let stop = start + pem[start..].find(&end)?;

    let body: String = pem[start..stop]
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    base64::engine::general_purpose::STANDARD.decode(body).ok()
}
