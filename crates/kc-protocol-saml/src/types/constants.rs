//! SAML constants and URIs.
//!
//! Namespace URIs and their conventional prefixes, binding URIs, name ID
//! formats and status codes, plus shorthand constructors for qualified
//! element names in each namespace.

use kc_xml::QName;

pub use kc_xml::ns::{XMLDSIG_NS, XMLDSIG_PREFIX, XSI_NS, XSI_PREFIX};

/// SAML 2.0 assertion namespace URI.
pub const SAML20_NS: &str = "urn:oasis:names:tc:SAML:2.0:assertion";

/// Conventional prefix for [`SAML20_NS`].
pub const SAML20_PREFIX: &str = "saml";

/// SAML 2.0 protocol namespace URI.
pub const SAML20P_NS: &str = "urn:oasis:names:tc:SAML:2.0:protocol";

/// Conventional prefix for [`SAML20P_NS`].
pub const SAML20P_PREFIX: &str = "samlp";

/// SAML 1.x assertion namespace URI.
pub const SAML1_NS: &str = "urn:oasis:names:tc:SAML:1.0:assertion";

/// Prefix used for [`SAML1_NS`]. Distinct from the SAML 2.0 prefix so the
/// two can coexist in one document.
pub const SAML1_PREFIX: &str = "saml1";

/// SAML 1.x protocol namespace URI.
pub const SAML1P_NS: &str = "urn:oasis:names:tc:SAML:1.0:protocol";

/// Prefix used for [`SAML1P_NS`].
pub const SAML1P_PREFIX: &str = "saml1p";

/// SAML 2.0 metadata namespace URI.
pub const SAML20MD_NS: &str = "urn:oasis:names:tc:SAML:2.0:metadata";

/// Conventional prefix for [`SAML20MD_NS`].
pub const SAML20MD_PREFIX: &str = "md";

/// Metadata UI extension namespace URI.
pub const MDUI_NS: &str = "urn:oasis:names:tc:SAML:metadata:ui";

/// Conventional prefix for [`MDUI_NS`].
pub const MDUI_PREFIX: &str = "mdui";

/// Metadata query extension namespace URI.
pub const MDQUERY_NS: &str = "urn:oasis:names:tc:SAML:metadata:ext:query";

/// Conventional prefix for [`MDQUERY_NS`].
pub const MDQUERY_PREFIX: &str = "query";

/// XML Encryption namespace URI.
pub const XMLENC_NS: &str = "http://www.w3.org/2001/04/xmlenc#";

/// Conventional prefix for [`XMLENC_NS`].
pub const XMLENC_PREFIX: &str = "xenc";

/// XML Encryption 1.1 namespace URI.
pub const XMLENC11_NS: &str = "http://www.w3.org/2009/xmlenc11#";

/// Conventional prefix for [`XMLENC11_NS`].
pub const XMLENC11_PREFIX: &str = "xenc11";

/// XML Schema namespace URI.
pub const XS_NS: &str = "http://www.w3.org/2001/XMLSchema";

/// Conventional prefix for [`XS_NS`].
pub const XS_PREFIX: &str = "xs";

/// `EncryptedData/@Type` for an encrypted element.
pub const XMLENC_TYPE_ELEMENT: &str = "http://www.w3.org/2001/04/xmlenc#Element";

/// `EncryptedKey/@Type`-independent marker for key retrieval methods.
pub const XMLENC_ENCRYPTED_KEY_TYPE: &str = "http://www.w3.org/2001/04/xmlenc#EncryptedKey";

/// The only `SAMLEncoding` the Redirect binding supports.
pub const DEFLATE_ENCODING: &str = "urn:oasis:names:tc:SAML:2.0:bindings:URL-Encoding:DEFLATE";

/// SAML 2.0 assertion element name.
#[must_use]
pub fn saml(local: &str) -> QName {
    QName::new(SAML20_NS, local).with_prefix(SAML20_PREFIX)
}

/// SAML 2.0 protocol element name.
#[must_use]
pub fn samlp(local: &str) -> QName {
    QName::new(SAML20P_NS, local).with_prefix(SAML20P_PREFIX)
}

/// SAML 1.x assertion element name.
#[must_use]
pub fn saml1(local: &str) -> QName {
    QName::new(SAML1_NS, local).with_prefix(SAML1_PREFIX)
}

/// SAML 1.x protocol element name.
#[must_use]
pub fn saml1p(local: &str) -> QName {
    QName::new(SAML1P_NS, local).with_prefix(SAML1P_PREFIX)
}

/// Metadata element name.
#[must_use]
pub fn md(local: &str) -> QName {
    QName::new(SAML20MD_NS, local).with_prefix(SAML20MD_PREFIX)
}

/// Metadata UI element name.
#[must_use]
pub fn mdui(local: &str) -> QName {
    QName::new(MDUI_NS, local).with_prefix(MDUI_PREFIX)
}

/// Metadata query extension name.
#[must_use]
pub fn mdquery(local: &str) -> QName {
    QName::new(MDQUERY_NS, local).with_prefix(MDQUERY_PREFIX)
}

/// XML Encryption element name.
#[must_use]
pub fn xenc(local: &str) -> QName {
    QName::new(XMLENC_NS, local).with_prefix(XMLENC_PREFIX)
}

/// XML Encryption 1.1 element name.
#[must_use]
pub fn xenc11(local: &str) -> QName {
    QName::new(XMLENC11_NS, local).with_prefix(XMLENC11_PREFIX)
}

/// XML Signature element name.
#[must_use]
pub fn ds(local: &str) -> QName {
    QName::new(XMLDSIG_NS, local).with_prefix(XMLDSIG_PREFIX)
}

/// XML Schema type name.
#[must_use]
pub fn xs(local: &str) -> QName {
    QName::new(XS_NS, local).with_prefix(XS_PREFIX)
}

// ============================================================================
// Binding URIs
// ============================================================================

/// SAML binding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamlBinding {
    /// HTTP POST binding.
    HttpPost,
    /// HTTP Redirect binding.
    HttpRedirect,
}

impl SamlBinding {
    /// Returns the URI for this binding.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::HttpPost => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST",
            Self::HttpRedirect => "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect",
        }
    }

    /// Parses a binding from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-POST" => Some(Self::HttpPost),
            "urn:oasis:names:tc:SAML:2.0:bindings:HTTP-Redirect" => Some(Self::HttpRedirect),
            _ => None,
        }
    }
}

// ============================================================================
// Name ID Formats
// ============================================================================

/// SAML Name ID formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NameIdFormat {
    /// Unspecified name ID format.
    #[default]
    Unspecified,
    /// Email address format.
    Email,
    /// Entity identifier format.
    Entity,
    /// Persistent identifier format.
    Persistent,
    /// Transient identifier format.
    Transient,
}

impl NameIdFormat {
    /// Returns the URI for this name ID format.
    #[must_use]
    pub const fn uri(&self) -> &'static str {
        match self {
            Self::Unspecified => "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified",
            Self::Email => "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress",
            Self::Entity => "urn:oasis:names:tc:SAML:2.0:nameid-format:entity",
            Self::Persistent => "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent",
            Self::Transient => "urn:oasis:names:tc:SAML:2.0:nameid-format:transient",
        }
    }

    /// Parses a name ID format from its URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            "urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified" => Some(Self::Unspecified),
            "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress" => Some(Self::Email),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:entity" => Some(Self::Entity),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:persistent" => Some(Self::Persistent),
            "urn:oasis:names:tc:SAML:2.0:nameid-format:transient" => Some(Self::Transient),
            _ => None,
        }
    }
}

// ============================================================================
// Status Codes
// ============================================================================

/// SAML 2.0 status codes.
pub mod status_codes {
    /// Success status code.
    pub const SUCCESS: &str = "urn:oasis:names:tc:SAML:2.0:status:Success";

    /// Requester error status code.
    pub const REQUESTER: &str = "urn:oasis:names:tc:SAML:2.0:status:Requester";

    /// Responder error status code.
    pub const RESPONDER: &str = "urn:oasis:names:tc:SAML:2.0:status:Responder";

    /// Version mismatch status code.
    pub const VERSION_MISMATCH: &str = "urn:oasis:names:tc:SAML:2.0:status:VersionMismatch";

    /// Request denied.
    pub const REQUEST_DENIED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestDenied";

    /// Request unsupported.
    pub const REQUEST_UNSUPPORTED: &str = "urn:oasis:names:tc:SAML:2.0:status:RequestUnsupported";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_uri_roundtrip() {
        for binding in [SamlBinding::HttpPost, SamlBinding::HttpRedirect] {
            assert_eq!(SamlBinding::from_uri(binding.uri()), Some(binding));
        }
        assert_eq!(
            SamlBinding::from_uri("urn:oasis:names:tc:SAML:2.0:bindings:SOAP"),
            None
        );
    }

    #[test]
    fn name_id_format_uri_roundtrip() {
        for format in [
            NameIdFormat::Unspecified,
            NameIdFormat::Email,
            NameIdFormat::Persistent,
            NameIdFormat::Transient,
        ] {
            assert_eq!(NameIdFormat::from_uri(format.uri()), Some(format));
        }
    }

    #[test]
    fn saml1_and_saml2_names_differ() {
        assert_ne!(saml("Assertion"), saml1("Assertion"));
        assert_eq!(saml("Assertion").prefixed(), "saml:Assertion");
        assert_eq!(saml1p("Response").prefixed(), "saml1p:Response");
    }
}
