//! SAML 2.0 and 1.x message toolkit.
//!
//! This crate builds on the generic object model of [`kc_xml`] and provides:
//!
//! - **Element registrations** - Builders, marshallers, unmarshallers and validators for SAML elements
//! - **XML signature** - Enveloped signing and verification resistant to signature wrapping
//! - **XML encryption** - Encrypted assertions, attributes and identifiers
//! - **POST and Redirect bindings** - Encoding and decoding of messages over HTTP
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`types`] - Constants, default registry, SAML validators
//! - [`security`] - Credentials and credential resolvers
//! - [`signature`] - XML signature signing and validation
//! - [`encryption`] - Encryption and decryption of SAML elements
//! - [`bindings`] - POST and Redirect binding implementations
//! - [`config`] - Serde-deserializable configuration
//! - [`error`] - Error types for SAML operations
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kc_protocol_saml::{bindings::{BindingContext, HttpPostEncoder}, default_registry, SamlConfig};
//!
//! let registry = Arc::new(default_registry());
//! let config = SamlConfig::default();
//! let encoder = HttpPostEncoder::new(registry, config.signer(), config.binding.clone());
//! let http_response = encoder.encode(&mut BindingContext::new(tree, response)
//!     .with_endpoint("https://sp.example.org/acs")
//!     .with_signing_credential(credential))?;
//! ```
//!
//! # SAML Specifications
//!
//! This implementation follows these specifications:
//!
//! - [SAML 2.0 Core](https://docs.oasis-open.org/security/saml/v2.0/saml-core-2.0-os.pdf)
//! - [SAML 2.0 Bindings](https://docs.oasis-open.org/security/saml/v2.0/saml-bindings-2.0-os.pdf)
//! - [XML Signature](https://www.w3.org/TR/xmldsig-core1/)
//! - [XML Encryption](https://www.w3.org/TR/xmlenc-core1/)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bindings;
pub mod config;
pub mod encryption;
pub mod error;
pub mod security;
pub mod signature;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::SamlConfig;
pub use error::{SamlError, SamlResult};
pub use types::*;
