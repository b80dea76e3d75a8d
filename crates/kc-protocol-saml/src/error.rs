//! SAML error types.
//!
//! One variant per failure class of the message pipeline: malformed input,
//! semantic validation, marshalling, signing and verification, decryption,
//! encryption and transport binding.

use kc_xml::{DomError, MarshallingError, TreeError, UnmarshallingError, ValidationError, XmlError};
use thiserror::Error;

use crate::bindings::BindingError;
use crate::encryption::{DecryptionError, EncryptionFailure};
use crate::signature::SignatureFailure;
use crate::types::constants::status_codes;

/// Result type for SAML operations.
pub type SamlResult<T> = Result<T, SamlError>;

/// SAML protocol errors.
#[derive(Debug, Error)]
pub enum SamlError {
    /// Malformed or unrecognized XML where a known type was required.
    #[error(transparent)]
    Unmarshalling(#[from] UnmarshallingError),

    /// A semantic rule was violated by a well-formed object.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The object tree could not be rendered.
    #[error(transparent)]
    Marshalling(#[from] MarshallingError),

    /// Signing or verification failed.
    #[error(transparent)]
    Signature(#[from] SignatureFailure),

    /// An encrypted element could not be decrypted.
    #[error(transparent)]
    Decryption(#[from] DecryptionError),

    /// An element could not be encrypted.
    #[error(transparent)]
    Encryption(#[from] EncryptionFailure),

    /// Transport encoding or decoding failed.
    #[error(transparent)]
    Binding(#[from] BindingError),
}

impl SamlError {
    /// Returns the SAML status code to report for this error.
    #[must_use]
    pub fn status_code(&self) -> &'static str {
        match self {
            Self::Validation(ValidationError::VersionMismatch { .. }) => status_codes::VERSION_MISMATCH,
            Self::Unmarshalling(_)
            | Self::Validation(_)
            | Self::Signature(_)
            | Self::Decryption(_) => status_codes::REQUESTER,
            Self::Binding(BindingError::UnsupportedEncoding(_)) => status_codes::REQUEST_UNSUPPORTED,
            Self::Binding(
                BindingError::MissingParameter(_)
                | BindingError::InvalidEncoding(_)
                | BindingError::UnexpectedMessage(_),
            ) => status_codes::REQUESTER,
            Self::Binding(BindingError::DestinationMismatch { .. }) => status_codes::REQUEST_DENIED,
            _ => status_codes::RESPONDER,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::Unmarshalling(_) | Self::Validation(_) | Self::Decryption(_) => 400,
            Self::Binding(
                BindingError::MissingParameter(_)
                | BindingError::InvalidEncoding(_)
                | BindingError::UnsupportedEncoding(_)
                | BindingError::UnexpectedMessage(_)
                | BindingError::RelayStateTooLong(_),
            ) => 400,
            Self::Signature(SignatureFailure::Verification(_) | SignatureFailure::NoTrustedKey) => 401,
            Self::Binding(BindingError::DestinationMismatch { .. }) => 403,
            _ => 500,
        }
    }
}

impl From<XmlError> for SamlError {
    fn from(err: XmlError) -> Self {
        match err {
            XmlError::Dom(e) => Self::Unmarshalling(UnmarshallingError::Dom(e)),
            XmlError::Tree(e) => Self::Unmarshalling(UnmarshallingError::Tree(e)),
            XmlError::Marshalling(e) => Self::Marshalling(e),
            XmlError::Unmarshalling(e) => Self::Unmarshalling(e),
            XmlError::Validation(e) => Self::Validation(e),
        }
    }
}

impl From<DomError> for SamlError {
    fn from(err: DomError) -> Self {
        Self::Unmarshalling(UnmarshallingError::Dom(err))
    }
}

impl From<TreeError> for SamlError {
    fn from(err: TreeError) -> Self {
        Self::Unmarshalling(UnmarshallingError::Tree(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kc_xml::QName;

    #[test]
    fn error_status_codes() {
        let err = SamlError::from(UnmarshallingError::UnknownElement(QName::local("Foo")));
        assert_eq!(err.status_code(), status_codes::REQUESTER);
        assert_eq!(err.http_status(), 400);

        let err = SamlError::from(SignatureFailure::Verification("digest mismatch".to_string()));
        assert_eq!(err.status_code(), status_codes::REQUESTER);
        assert_eq!(err.http_status(), 401);

        let err = SamlError::from(MarshallingError::NoMarshaller(QName::local("Foo")));
        assert_eq!(err.status_code(), status_codes::RESPONDER);
        assert_eq!(err.http_status(), 500);
    }

    #[test]
    fn xml_errors_keep_their_class() {
        let err = SamlError::from(XmlError::Validation(ValidationError::MissingChild {
            element: QName::local("Response"),
            child: QName::local("Status"),
        }));
        assert!(matches!(err, SamlError::Validation(_)));

        let err = SamlError::from(XmlError::Dom(DomError::NoRootElement));
        assert!(matches!(err, SamlError::Unmarshalling(UnmarshallingError::Dom(_))));
    }

    #[test]
    fn unsupported_encoding_maps_to_request_unsupported() {
        let err = SamlError::from(BindingError::UnsupportedEncoding("urn:x".to_string()));
        assert_eq!(err.status_code(), status_codes::REQUEST_UNSUPPORTED);
        assert_eq!(err.http_status(), 400);
    }
}
