//! Cryptographically secure random generation.
//!
//! Used for data encryption keys, GCM nonces and SAML message identifiers.

use rand::Rng;

/// Generates a cryptographically secure random byte array.
///
/// Uses the thread-local random number generator which is cryptographically
/// secure by default.
#[must_use]
pub fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rng();
    let mut bytes = vec![0u8; len];
    rng.fill(&mut bytes[..]);
    bytes
}

/// Generates an identifier for a SAML `ID` attribute.
///
/// 128 random bits, hex encoded and prefixed with `_` so the value is a
/// valid `xs:ID` (an NCName cannot start with a digit).
#[must_use]
pub fn generate_saml_id() -> String {
    let hex: String = random_bytes(16).iter().map(|b| format!("{b:02x}")).collect();
    format!("_{hex}")
}
