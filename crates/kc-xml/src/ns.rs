//! Namespaces the generic layer itself depends on.

/// XML namespace, bound to the `xml` prefix.
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

/// Namespace of `xmlns` declarations.
pub const XMLNS_NS: &str = "http://www.w3.org/2000/xmlns/";

/// XML Schema instance namespace (`xsi:type`).
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// Conventional prefix for [`XSI_NS`].
pub const XSI_PREFIX: &str = "xsi";

/// XML Digital Signature namespace.
pub const XMLDSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Conventional prefix for [`XMLDSIG_NS`].
pub const XMLDSIG_PREFIX: &str = "ds";
