//! Key material and trust stores.

pub mod credential;

pub use credential::{
    Credential, CredentialCriteria, CredentialResolver, StaticCredentialResolver, UsageType,
};
