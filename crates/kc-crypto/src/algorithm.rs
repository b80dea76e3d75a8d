//! XML Security algorithm identifiers.
//!
//! Every algorithm is addressed on the wire by a URI. The enums here are the
//! closed set this crate can execute; anything else is rejected by
//! `from_uri` returning `None`.

use serde::{Deserialize, Serialize};

/// Algorithm URIs from XML-DSig, XML-Enc and their 1.1 revisions.
pub mod uris {
    /// Exclusive canonicalization 1.0, comments omitted.
    pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";
    /// Exclusive canonicalization 1.0, comments retained.
    pub const EXC_C14N_WITH_COMMENTS: &str = "http://www.w3.org/2001/10/xml-exc-c14n#WithComments";
    /// Enveloped signature transform.
    pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

    /// SHA-1 digest.
    pub const SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
    /// SHA-256 digest.
    pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
    /// SHA-384 digest.
    pub const SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#sha384";
    /// SHA-512 digest.
    pub const SHA512: &str = "http://www.w3.org/2001/04/xmlenc#sha512";

    /// RSA PKCS#1 v1.5 with SHA-1.
    pub const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
    /// RSA PKCS#1 v1.5 with SHA-256.
    pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    /// RSA PKCS#1 v1.5 with SHA-384.
    pub const RSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha384";
    /// RSA PKCS#1 v1.5 with SHA-512.
    pub const RSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha512";
    /// ECDSA with SHA-256.
    pub const ECDSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha256";
    /// ECDSA with SHA-384.
    pub const ECDSA_SHA384: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha384";
    /// ECDSA with SHA-512.
    pub const ECDSA_SHA512: &str = "http://www.w3.org/2001/04/xmldsig-more#ecdsa-sha512";
    /// HMAC-SHA1. Recognised so it can be rejected by name.
    pub const HMAC_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#hmac-sha1";

    /// AES-128 in GCM mode.
    pub const AES128_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes128-gcm";
    /// AES-256 in GCM mode.
    pub const AES256_GCM: &str = "http://www.w3.org/2009/xmlenc11#aes256-gcm";
    /// AES-128 in CBC mode (not supported for decryption).
    pub const AES128_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes128-cbc";
    /// AES-256 in CBC mode (not supported for decryption).
    pub const AES256_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";

    /// RSA-OAEP with MGF1-SHA1 and a SHA-1 digest.
    pub const RSA_OAEP_MGF1P: &str = "http://www.w3.org/2001/04/xmlenc#rsa-oaep-mgf1p";
    /// XML-Enc 1.1 RSA-OAEP; digest and MGF given as child elements.
    pub const RSA_OAEP: &str = "http://www.w3.org/2009/xmlenc11#rsa-oaep";
    /// MGF1 with SHA-256, for [`RSA_OAEP`].
    pub const MGF1_SHA256: &str = "http://www.w3.org/2009/xmlenc11#mgf1sha256";
}

/// Digest algorithms usable in `ds:DigestMethod`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlgorithm {
    /// SHA-1, verification of legacy signatures only.
    #[serde(rename = "SHA1")]
    Sha1,
    /// SHA-256.
    #[serde(rename = "SHA256")]
    Sha256,
    /// SHA-384.
    #[serde(rename = "SHA384")]
    Sha384,
    /// SHA-512.
    #[serde(rename = "SHA512")]
    Sha512,
}

impl DigestAlgorithm {
    /// Returns the algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Sha1 => uris::SHA1,
            Self::Sha256 => uris::SHA256,
            Self::Sha384 => uris::SHA384,
            Self::Sha512 => uris::SHA512,
        }
    }

    /// Parses a digest algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            uris::SHA1 => Some(Self::Sha1),
            uris::SHA256 => Some(Self::Sha256),
            uris::SHA384 => Some(Self::Sha384),
            uris::SHA512 => Some(Self::Sha512),
            _ => None,
        }
    }

    /// Returns the output length in bytes.
    #[must_use]
    pub const fn output_len(self) -> usize {
        match self {
            Self::Sha1 => 20,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Returns true for digests kept only for interoperability.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::Sha1)
    }
}

/// Signature algorithms usable in `ds:SignatureMethod` and the Redirect
/// binding `SigAlg` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    /// RSA with SHA-256.
    #[default]
    #[serde(rename = "RSA-SHA256")]
    RsaSha256,
    /// RSA with SHA-384.
    #[serde(rename = "RSA-SHA384")]
    RsaSha384,
    /// RSA with SHA-512.
    #[serde(rename = "RSA-SHA512")]
    RsaSha512,
    /// ECDSA with SHA-256 (P-256).
    #[serde(rename = "ECDSA-SHA256")]
    EcdsaSha256,
    /// ECDSA with SHA-384 (P-384).
    #[serde(rename = "ECDSA-SHA384")]
    EcdsaSha384,
    /// ECDSA with SHA-512 (P-521).
    #[serde(rename = "ECDSA-SHA512")]
    EcdsaSha512,
    /// Legacy RSA with SHA-1, verification only.
    #[serde(rename = "RSA-SHA1")]
    RsaSha1,
}

impl SignatureAlgorithm {
    /// Returns the algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaSha256 => uris::RSA_SHA256,
            Self::RsaSha384 => uris::RSA_SHA384,
            Self::RsaSha512 => uris::RSA_SHA512,
            Self::EcdsaSha256 => uris::ECDSA_SHA256,
            Self::EcdsaSha384 => uris::ECDSA_SHA384,
            Self::EcdsaSha512 => uris::ECDSA_SHA512,
            Self::RsaSha1 => uris::RSA_SHA1,
        }
    }

    /// Parses a signature algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            uris::RSA_SHA256 => Some(Self::RsaSha256),
            uris::RSA_SHA384 => Some(Self::RsaSha384),
            uris::RSA_SHA512 => Some(Self::RsaSha512),
            uris::ECDSA_SHA256 => Some(Self::EcdsaSha256),
            uris::ECDSA_SHA384 => Some(Self::EcdsaSha384),
            uris::ECDSA_SHA512 => Some(Self::EcdsaSha512),
            uris::RSA_SHA1 => Some(Self::RsaSha1),
            _ => None,
        }
    }

    /// Returns the digest paired with this algorithm by default.
    #[must_use]
    pub const fn digest_algorithm(self) -> DigestAlgorithm {
        match self {
            Self::RsaSha256 | Self::EcdsaSha256 => DigestAlgorithm::Sha256,
            Self::RsaSha384 | Self::EcdsaSha384 => DigestAlgorithm::Sha384,
            Self::RsaSha512 | Self::EcdsaSha512 => DigestAlgorithm::Sha512,
            Self::RsaSha1 => DigestAlgorithm::Sha1,
        }
    }

    /// Returns true if this is an RSA algorithm.
    #[must_use]
    pub const fn is_rsa(self) -> bool {
        matches!(
            self,
            Self::RsaSha256 | Self::RsaSha384 | Self::RsaSha512 | Self::RsaSha1
        )
    }

    /// Returns true for algorithms accepted only when explicitly allowed.
    #[must_use]
    pub const fn is_legacy(self) -> bool {
        matches!(self, Self::RsaSha1)
    }
}

/// Block encryption algorithms for `xenc:EncryptedData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DataEncryptionAlgorithm {
    /// AES-128-GCM.
    #[serde(rename = "AES128-GCM")]
    Aes128Gcm,
    /// AES-256-GCM.
    #[default]
    #[serde(rename = "AES256-GCM")]
    Aes256Gcm,
}

impl DataEncryptionAlgorithm {
    /// Returns the algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::Aes128Gcm => uris::AES128_GCM,
            Self::Aes256Gcm => uris::AES256_GCM,
        }
    }

    /// Parses a data encryption algorithm from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            uris::AES128_GCM => Some(Self::Aes128Gcm),
            uris::AES256_GCM => Some(Self::Aes256Gcm),
            _ => None,
        }
    }

    /// Returns the key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128Gcm => 16,
            Self::Aes256Gcm => 32,
        }
    }
}

/// Key transport algorithms for `xenc:EncryptedKey`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum KeyTransportAlgorithm {
    /// RSA-OAEP, SHA-1 digest, MGF1 with SHA-1.
    #[default]
    #[serde(rename = "RSA-OAEP-MGF1P")]
    RsaOaepMgf1p,
    /// RSA-OAEP (XML-Enc 1.1), SHA-256 digest, MGF1 with SHA-256.
    #[serde(rename = "RSA-OAEP-SHA256")]
    RsaOaepSha256,
}

impl KeyTransportAlgorithm {
    /// Returns the algorithm URI.
    #[must_use]
    pub const fn uri(self) -> &'static str {
        match self {
            Self::RsaOaepMgf1p => uris::RSA_OAEP_MGF1P,
            Self::RsaOaepSha256 => uris::RSA_OAEP,
        }
    }

    /// Resolves the algorithm from an `EncryptionMethod` URI plus its
    /// optional `DigestMethod` and `MGF` children.
    ///
    /// XML-Enc 1.1 `rsa-oaep` is accepted only with SHA-256 for both the
    /// digest and the mask generation function.
    #[must_use]
    pub fn from_parts(uri: &str, digest: Option<&str>, mgf: Option<&str>) -> Option<Self> {
        match (uri, digest, mgf) {
            (uris::RSA_OAEP_MGF1P, None | Some(uris::SHA1), None) => Some(Self::RsaOaepMgf1p),
            (uris::RSA_OAEP, Some(uris::SHA256), Some(uris::MGF1_SHA256)) => {
                Some(Self::RsaOaepSha256)
            }
            _ => None,
        }
    }

    /// Returns the `DigestMethod` and `MGF` URIs to emit alongside the
    /// algorithm URI.
    #[must_use]
    pub const fn parameters(self) -> (Option<&'static str>, Option<&'static str>) {
        match self {
            Self::RsaOaepMgf1p => (Some(uris::SHA1), None),
            Self::RsaOaepSha256 => (Some(uris::SHA256), Some(uris::MGF1_SHA256)),
        }
    }
}
