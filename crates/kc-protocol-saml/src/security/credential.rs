//! Credentials and credential resolution.
//!
//! A [`Credential`] bundles whatever key material is known for one entity
//! and purpose. Signature verification and decryption never take keys from
//! the message itself; they ask a [`CredentialResolver`] backed by a trust
//! store, using `KeyInfo` hints only as lookup criteria.

use std::fmt;
use std::sync::Arc;

use kc_crypto::{
    pem_to_der, KeyDecryptionKey, KeyEncryptionKey, SignatureError, SigningKey, VerifyingKey,
};
use kc_xml::signature::KeyInfo;

/// What a credential may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UsageType {
    /// Signing and signature verification.
    Signing,
    /// Encryption and decryption.
    Encryption,
    /// Any purpose.
    #[default]
    Unspecified,
}

impl UsageType {
    /// Whether a credential with this usage satisfies `requested`.
    #[must_use]
    pub fn permits(self, requested: Self) -> bool {
        self == Self::Unspecified || requested == Self::Unspecified || self == requested
    }
}

/// Key material for one entity and purpose.
#[derive(Clone, Default)]
pub struct Credential {
    entity_id: Option<String>,
    usage: UsageType,
    key_names: Vec<String>,
    signing_key: Option<Arc<SigningKey>>,
    verifying_key: Option<VerifyingKey>,
    key_decryption_key: Option<Arc<KeyDecryptionKey>>,
    key_encryption_key: Option<Arc<KeyEncryptionKey>>,
    secret_key: Option<Vec<u8>>,
    certificate: Option<Vec<u8>>,
}

impl Credential {
    /// Creates an empty credential.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a PEM private key and, optionally, its PEM certificate.
    ///
    /// RSA keys can also unwrap encrypted keys; the certificate supplies the
    /// matching public key for encryption.
    ///
    /// # Errors
    ///
    /// Returns an error if the key or certificate cannot be parsed.
    pub fn from_private_key_pem(key_pem: &str, certificate_pem: Option<&str>) -> Result<Self, SignatureError> {
        let signing_key = SigningKey::from_pem(key_pem)?;
        let key_decryption_key = pem_to_der(key_pem, "PRIVATE KEY")
            .and_then(|der| KeyDecryptionKey::from_pkcs8(&der).ok());

        let mut credential = Self {
            verifying_key: Some(signing_key.verifying_key()),
            signing_key: Some(Arc::new(signing_key)),
            key_decryption_key: key_decryption_key.map(Arc::new),
            ..Self::default()
        };
        if let Some(pem) = certificate_pem {
            let der = certificate_der(pem)?;
            credential.key_encryption_key = KeyEncryptionKey::from_certificate_der(&der).ok().map(Arc::new);
            credential.certificate = Some(der);
        }
        Ok(credential)
    }

    /// Loads a PEM certificate as a public-only credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed.
    pub fn from_certificate_pem(pem: &str) -> Result<Self, SignatureError> {
        Self::from_certificate_der(certificate_der(pem)?)
    }

    /// Loads a DER certificate as a public-only credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be parsed.
    pub fn from_certificate_der(der: Vec<u8>) -> Result<Self, SignatureError> {
        Ok(Self {
            verifying_key: Some(VerifyingKey::from_certificate_der(&der)?),
            key_encryption_key: KeyEncryptionKey::from_certificate_der(&der).ok().map(Arc::new),
            certificate: Some(der),
            ..Self::default()
        })
    }

    /// A credential holding a symmetric data encryption key.
    #[must_use]
    pub fn from_secret_key(key: Vec<u8>) -> Self {
        Self {
            secret_key: Some(key),
            usage: UsageType::Encryption,
            ..Self::default()
        }
    }

    /// Sets the owning entity.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    /// Sets the permitted usage.
    #[must_use]
    pub const fn with_usage(mut self, usage: UsageType) -> Self {
        self.usage = usage;
        self
    }

    /// Adds a key name, matched against `ds:KeyName` hints.
    #[must_use]
    pub fn with_key_name(mut self, name: impl Into<String>) -> Self {
        self.key_names.push(name.into());
        self
    }

    /// Owning entity.
    #[must_use]
    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    /// Permitted usage.
    #[must_use]
    pub const fn usage(&self) -> UsageType {
        self.usage
    }

    /// Key names.
    #[must_use]
    pub fn key_names(&self) -> &[String] {
        &self.key_names
    }

    /// Private signing key.
    #[must_use]
    pub fn signing_key(&self) -> Option<&SigningKey> {
        self.signing_key.as_deref()
    }

    /// Public verification key.
    #[must_use]
    pub fn verifying_key(&self) -> Option<&VerifyingKey> {
        self.verifying_key.as_ref()
    }

    /// RSA private key for unwrapping encrypted keys.
    #[must_use]
    pub fn key_decryption_key(&self) -> Option<&KeyDecryptionKey> {
        self.key_decryption_key.as_deref()
    }

    /// RSA public key for wrapping data encryption keys.
    #[must_use]
    pub fn key_encryption_key(&self) -> Option<&KeyEncryptionKey> {
        self.key_encryption_key.as_deref()
    }

    /// Symmetric data encryption key.
    #[must_use]
    pub fn secret_key(&self) -> Option<&[u8]> {
        self.secret_key.as_deref()
    }

    /// DER certificate.
    #[must_use]
    pub fn certificate(&self) -> Option<&[u8]> {
        self.certificate.as_deref()
    }

    /// `ds:KeyInfo` advertising this credential's names and certificate.
    #[must_use]
    pub fn key_info(&self) -> KeyInfo {
        KeyInfo {
            key_names: self.key_names.clone(),
            x509_certificates: self.certificate.iter().cloned().collect(),
        }
    }

    fn matches(&self, criteria: &CredentialCriteria) -> bool {
        if let (Some(wanted), Some(actual)) = (&criteria.entity_id, &self.entity_id) {
            if wanted != actual {
                return false;
            }
        }
        if !self.usage.permits(criteria.usage) {
            return false;
        }
        if !criteria.key_names.is_empty()
            && !self.key_names.is_empty()
            && !criteria.key_names.iter().any(|n| self.key_names.contains(n))
        {
            return false;
        }
        if !criteria.certificates.is_empty() {
            if let Some(cert) = &self.certificate {
                return criteria.certificates.contains(cert);
            }
        }
        true
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("entity_id", &self.entity_id)
            .field("usage", &self.usage)
            .field("key_names", &self.key_names)
            .field("signing_key", &self.signing_key.is_some())
            .field("key_decryption_key", &self.key_decryption_key.is_some())
            .field("certificate", &self.certificate.is_some())
            .finish_non_exhaustive()
    }
}

fn certificate_der(pem: &str) -> Result<Vec<u8>, SignatureError> {
    pem_to_der(pem, "CERTIFICATE")
        .ok_or_else(|| SignatureError::InvalidKey("no CERTIFICATE PEM block".to_string()))
}

/// What to look a credential up by.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialCriteria {
    /// Entity that should own the credential.
    pub entity_id: Option<String>,
    /// Requested usage.
    pub usage: UsageType,
    /// `ds:KeyName` hints.
    pub key_names: Vec<String>,
    /// DER certificates hinted by `ds:X509Certificate`.
    pub certificates: Vec<Vec<u8>>,
}

impl CredentialCriteria {
    /// Criteria for `usage` with no further hints.
    #[must_use]
    pub fn for_usage(usage: UsageType) -> Self {
        Self {
            usage,
            ..Self::default()
        }
    }

    /// Adds the hints carried by a `ds:KeyInfo`.
    #[must_use]
    pub fn with_key_info(mut self, key_info: &KeyInfo) -> Self {
        self.key_names.extend(key_info.key_names.iter().cloned());
        self.certificates.extend(key_info.x509_certificates.iter().cloned());
        self
    }

    /// Restricts the lookup to one entity.
    #[must_use]
    pub fn with_entity_id(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }
}

/// Looks up trusted credentials.
pub trait CredentialResolver: Send + Sync {
    /// Returns every credential matching `criteria`, best match first.
    fn resolve(&self, criteria: &CredentialCriteria) -> Vec<Credential>;

    /// Returns the best match.
    fn resolve_single(&self, criteria: &CredentialCriteria) -> Option<Credential> {
        self.resolve(criteria).into_iter().next()
    }
}

/// In-memory trust store.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentialResolver {
    credentials: Vec<Credential>,
}

impl StaticCredentialResolver {
    /// Creates a resolver over `credentials`.
    #[must_use]
    pub fn new(credentials: Vec<Credential>) -> Self {
        Self { credentials }
    }

    /// Adds a credential.
    #[must_use]
    pub fn with(mut self, credential: Credential) -> Self {
        self.credentials.push(credential);
        self
    }
}

impl CredentialResolver for StaticCredentialResolver {
    fn resolve(&self, criteria: &CredentialCriteria) -> Vec<Credential> {
        self.credentials
            .iter()
            .filter(|c| c.matches(criteria))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{IDP_CERT, IDP_KEY, ROGUE_CERT};

    #[test]
    fn private_key_credential_has_all_rsa_keys() {
        let credential = Credential::from_private_key_pem(IDP_KEY, Some(IDP_CERT)).unwrap();
        assert!(credential.signing_key().is_some());
        assert!(credential.verifying_key().is_some());
        assert!(credential.key_decryption_key().is_some());
        assert!(credential.key_encryption_key().is_some());
        assert_eq!(credential.key_info().x509_certificates.len(), 1);
    }

    #[test]
    fn certificate_hint_must_match_trusted_certificate() {
        let trusted = Credential::from_certificate_pem(IDP_CERT).unwrap();
        let resolver = StaticCredentialResolver::default().with(trusted.clone());

        let hinted = CredentialCriteria::for_usage(UsageType::Signing).with_key_info(&trusted.key_info());
        assert_eq!(resolver.resolve(&hinted).len(), 1);

        let rogue = Credential::from_certificate_pem(ROGUE_CERT).unwrap();
        let hinted = CredentialCriteria::for_usage(UsageType::Signing).with_key_info(&rogue.key_info());
        assert!(resolver.resolve(&hinted).is_empty());
    }

    #[test]
    fn usage_and_entity_filter() {
        let resolver = StaticCredentialResolver::new(vec![
            Credential::from_secret_key(vec![0u8; 32]).with_entity_id("https://idp.example.org"),
            Credential::from_certificate_pem(IDP_CERT)
                .unwrap()
                .with_usage(UsageType::Signing)
                .with_key_name("idp-signing"),
        ]);

        let encryption = CredentialCriteria::for_usage(UsageType::Encryption)
            .with_entity_id("https://idp.example.org");
        let found = resolver.resolve(&encryption);
        assert_eq!(found.len(), 1);
        assert!(found[0].secret_key().is_some());

        let mut by_name = CredentialCriteria::for_usage(UsageType::Signing);
        by_name.key_names.push("other".to_string());
        assert!(resolver.resolve(&by_name).is_empty());
        by_name.key_names.push("idp-signing".to_string());
        assert_eq!(resolver.resolve_single(&by_name).unwrap().key_names(), ["idp-signing"]);
    }
}
