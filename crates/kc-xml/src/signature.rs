//! The XML-DSig `Signature` model.
//!
//! A [`Signature`] is attached to a signable node and rendered as an
//! enveloped `ds:Signature` child by the marshaller. When it was read from
//! a document the original element is retained so verification can
//! canonicalize `SignedInfo` byte-for-byte as received.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::c14n;
use crate::dom::Element;
use crate::error::UnmarshallingError;
use crate::name::QName;
use crate::ns::{XMLDSIG_NS, XMLDSIG_PREFIX};

/// `http://www.w3.org/2000/09/xmldsig#enveloped-signature`
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

const EC_PREFIX: &str = "ec";

fn ds(local: &str) -> QName {
    QName::new(XMLDSIG_NS, local).with_prefix(XMLDSIG_PREFIX)
}

fn inclusive_namespaces() -> QName {
    QName::new(c14n::EXC_C14N, "InclusiveNamespaces").with_prefix(EC_PREFIX)
}

fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn decode(element: &Element) -> Result<Vec<u8>, UnmarshallingError> {
    let compact: String = element.text().chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact).map_err(|e| {
        UnmarshallingError::InvalidSignature(format!("{}: {e}", element.name.local_name()))
    })
}

fn required_child<'a>(element: &'a Element, local: &str) -> Result<&'a Element, UnmarshallingError> {
    element.first_child(&ds(local)).ok_or_else(|| {
        UnmarshallingError::InvalidSignature(format!(
            "{} has no {local}",
            element.name.local_name()
        ))
    })
}

fn algorithm(element: &Element) -> Result<String, UnmarshallingError> {
    element.attribute("Algorithm").map(str::to_string).ok_or_else(|| {
        UnmarshallingError::InvalidSignature(format!(
            "{} has no Algorithm",
            element.name.local_name()
        ))
    })
}

fn prefix_list(element: &Element) -> Vec<String> {
    element
        .first_child(&inclusive_namespaces())
        .and_then(|inc| inc.attribute("PrefixList"))
        .map(|list| list.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn algorithm_element(local: &str, algorithm: &str, inclusive_prefixes: &[String]) -> Element {
    let mut element = Element::new(ds(local)).with_attribute(QName::local("Algorithm"), algorithm);
    if !inclusive_prefixes.is_empty() {
        element.push_element(
            Element::new(inclusive_namespaces())
                .with_attribute(QName::local("PrefixList"), inclusive_prefixes.join(" ")),
        );
    }
    element
}

/// A `ds:Transform`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transform {
    /// Transform algorithm URI.
    pub algorithm: String,
    /// `InclusiveNamespaces` prefixes for exclusive canonicalization.
    pub inclusive_prefixes: Vec<String>,
}

impl Transform {
    /// A transform without parameters.
    #[must_use]
    pub fn new(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            inclusive_prefixes: Vec::new(),
        }
    }
}

/// A `ds:Reference` to signed content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReference {
    /// Reference URI, `#` followed by the target's ID.
    pub uri: String,
    /// Transforms in order.
    pub transforms: Vec<Transform>,
    /// Digest algorithm URI.
    pub digest_method: String,
    /// Computed digest.
    pub digest_value: Option<Vec<u8>>,
}

impl ContentReference {
    /// A same-document reference with the enveloped-signature and exclusive
    /// canonicalization transforms.
    #[must_use]
    pub fn enveloped(id: &str, digest_method: impl Into<String>) -> Self {
        Self {
            uri: format!("#{id}"),
            transforms: vec![Transform::new(ENVELOPED_SIGNATURE), Transform::new(c14n::EXC_C14N)],
            digest_method: digest_method.into(),
            digest_value: None,
        }
    }

    fn to_element(&self) -> Element {
        let mut reference = Element::new(ds("Reference")).with_attribute(QName::local("URI"), &*self.uri);
        if !self.transforms.is_empty() {
            let mut transforms = Element::new(ds("Transforms"));
            for t in &self.transforms {
                transforms.push_element(algorithm_element("Transform", &t.algorithm, &t.inclusive_prefixes));
            }
            reference.push_element(transforms);
        }
        reference.push_element(algorithm_element("DigestMethod", &self.digest_method, &[]));
        let digest = self.digest_value.as_deref().map(encode).unwrap_or_default();
        reference.push_element(Element::new(ds("DigestValue")).with_text(&digest));
        reference
    }

    fn from_element(element: &Element) -> Result<Self, UnmarshallingError> {
        let transforms = match element.first_child(&ds("Transforms")) {
            Some(list) => list
                .children_named(&ds("Transform"))
                .map(|t| {
                    Ok(Transform {
                        algorithm: algorithm(t)?,
                        inclusive_prefixes: prefix_list(t),
                    })
                })
                .collect::<Result<Vec<_>, UnmarshallingError>>()?,
            None => Vec::new(),
        };
        Ok(Self {
            uri: element.attribute("URI").unwrap_or_default().to_string(),
            transforms,
            digest_method: algorithm(required_child(element, "DigestMethod")?)?,
            digest_value: Some(decode(required_child(element, "DigestValue")?)?),
        })
    }
}

/// `ds:KeyInfo` contents the toolkit understands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyInfo {
    /// `ds:KeyName` values.
    pub key_names: Vec<String>,
    /// DER certificates from `ds:X509Data/ds:X509Certificate`.
    pub x509_certificates: Vec<Vec<u8>>,
}

impl KeyInfo {
    /// Whether nothing would be emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_names.is_empty() && self.x509_certificates.is_empty()
    }

    /// Renders `ds:KeyInfo`.
    #[must_use]
    pub fn to_element(&self) -> Element {
        let mut key_info = Element::new(ds("KeyInfo"));
        for name in &self.key_names {
            key_info.push_element(Element::new(ds("KeyName")).with_text(name));
        }
        if !self.x509_certificates.is_empty() {
            let mut data = Element::new(ds("X509Data"));
            for cert in &self.x509_certificates {
                data.push_element(Element::new(ds("X509Certificate")).with_text(&encode(cert)));
            }
            key_info.push_element(data);
        }
        key_info
    }

    /// Reads `ds:KeyInfo`, ignoring key material types it does not model.
    ///
    /// # Errors
    ///
    /// Fails on certificates that are not valid base64.
    pub fn from_element(element: &Element) -> Result<Self, UnmarshallingError> {
        let mut key_info = Self::default();
        for child in element.child_elements() {
            if child.name == ds("KeyName") {
                key_info.key_names.push(child.text().trim().to_string());
            } else if child.name == ds("X509Data") {
                for cert in child.children_named(&ds("X509Certificate")) {
                    key_info.x509_certificates.push(decode(cert)?);
                }
            }
        }
        Ok(key_info)
    }
}

/// An enveloped XML signature.
#[derive(Debug, Clone)]
pub struct Signature {
    /// `CanonicalizationMethod` URI.
    pub canonicalization_method: String,
    /// `InclusiveNamespaces` prefixes on the canonicalization method.
    pub inclusive_prefixes: Vec<String>,
    /// `SignatureMethod` URI.
    pub signature_method: String,
    /// `SignatureMethod/HMACOutputLength`.
    pub hmac_output_length: Option<u32>,
    /// References in `SignedInfo`.
    pub references: Vec<ContentReference>,
    /// Key material hints.
    pub key_info: Option<KeyInfo>,
    /// Computed signature value.
    pub signature_value: Option<Vec<u8>>,
    source: Option<Element>,
}

impl Signature {
    /// A pending signature with no references.
    #[must_use]
    pub fn new(canonicalization_method: impl Into<String>, signature_method: impl Into<String>) -> Self {
        Self {
            canonicalization_method: canonicalization_method.into(),
            inclusive_prefixes: Vec::new(),
            signature_method: signature_method.into(),
            hmac_output_length: None,
            references: Vec::new(),
            key_info: None,
            signature_value: None,
            source: None,
        }
    }

    /// Whether a value has been computed.
    #[must_use]
    pub fn is_computed(&self) -> bool {
        self.signature_value.is_some()
            && self.references.iter().all(|r| r.digest_value.is_some())
    }

    /// The element this signature was read from.
    #[must_use]
    pub fn source(&self) -> Option<&Element> {
        self.source.as_ref()
    }

    /// `ds:SignedInfo`: as received when read from a document, otherwise
    /// rendered from the model.
    #[must_use]
    pub fn signed_info_element(&self) -> Element {
        if let Some(signed_info) = self.source.as_ref().and_then(|s| s.first_child(&ds("SignedInfo"))) {
            return signed_info.clone();
        }

        let mut signed_info = Element::new(ds("SignedInfo"));
        signed_info.push_element(algorithm_element(
            "CanonicalizationMethod",
            &self.canonicalization_method,
            &self.inclusive_prefixes,
        ));
        let mut method = algorithm_element("SignatureMethod", &self.signature_method, &[]);
        if let Some(len) = self.hmac_output_length {
            method.push_element(Element::new(ds("HMACOutputLength")).with_text(&len.to_string()));
        }
        signed_info.push_element(method);
        for reference in &self.references {
            signed_info.push_element(reference.to_element());
        }
        signed_info
    }

    /// Renders `ds:Signature`.
    #[must_use]
    pub fn to_element(&self) -> Element {
        if let Some(source) = &self.source {
            return source.clone();
        }
        let mut signature = Element::new(ds("Signature")).with_child(self.signed_info_element());
        let value = self.signature_value.as_deref().map(encode).unwrap_or_default();
        signature.push_element(Element::new(ds("SignatureValue")).with_text(&value));
        if let Some(key_info) = self.key_info.as_ref().filter(|k| !k.is_empty()) {
            signature.push_element(key_info.to_element());
        }
        signature
    }

    /// Reads a `ds:Signature` element, retaining it as the source.
    ///
    /// # Errors
    ///
    /// Fails when a required part is missing or a value is not base64.
    pub fn from_element(element: &Element) -> Result<Self, UnmarshallingError> {
        if element.name != ds("Signature") {
            return Err(UnmarshallingError::InvalidSignature(format!(
                "expected ds:Signature, found {}",
                element.name
            )));
        }
        let signed_info = required_child(element, "SignedInfo")?;
        let c14n_method = required_child(signed_info, "CanonicalizationMethod")?;
        let method = required_child(signed_info, "SignatureMethod")?;
        let hmac_output_length = match method.first_child(&ds("HMACOutputLength")) {
            Some(len) => Some(len.text().trim().parse().map_err(|_| {
                UnmarshallingError::InvalidSignature("invalid HMACOutputLength".to_string())
            })?),
            None => None,
        };
        let references = signed_info
            .children_named(&ds("Reference"))
            .map(ContentReference::from_element)
            .collect::<Result<Vec<_>, _>>()?;
        let key_info = element
            .first_child(&ds("KeyInfo"))
            .map(KeyInfo::from_element)
            .transpose()?;

        Ok(Self {
            canonicalization_method: algorithm(c14n_method)?,
            inclusive_prefixes: prefix_list(c14n_method),
            signature_method: algorithm(method)?,
            hmac_output_length,
            references,
            key_info,
            signature_value: Some(decode(required_child(element, "SignatureValue")?)?),
            source: Some(element.clone()),
        })
    }

    /// The qualified name `ds:Signature`.
    #[must_use]
    pub fn element_name() -> QName {
        ds("Signature")
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.canonicalization_method == other.canonicalization_method
            && self.inclusive_prefixes == other.inclusive_prefixes
            && self.signature_method == other.signature_method
            && self.hmac_output_length == other.hmac_output_length
            && self.references == other.references
            && self.key_info == other.key_info
            && self.signature_value == other.signature_value
    }
}

impl Eq for Signature {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::parse;

    const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
    const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

    fn computed() -> Signature {
        let mut sig = Signature::new(c14n::EXC_C14N, RSA_SHA256);
        let mut reference = ContentReference::enveloped("_abc", SHA256);
        reference.digest_value = Some(vec![1, 2, 3]);
        sig.references.push(reference);
        sig.signature_value = Some(vec![9; 16]);
        sig.key_info = Some(KeyInfo {
            key_names: vec!["idp".to_string()],
            x509_certificates: vec![vec![0x30, 0x82]],
        });
        sig
    }

    #[test]
    fn reads_back_what_it_writes() {
        let sig = computed();
        let xml = sig.to_element().to_xml();
        let read = Signature::from_element(&parse(&xml).unwrap()).unwrap();
        assert_eq!(read, sig);
        assert!(read.source().is_some());
        assert!(read.is_computed());
    }

    #[test]
    fn pending_signature_is_not_computed() {
        let mut sig = computed();
        sig.references[0].digest_value = None;
        assert!(!sig.is_computed());
        assert!(!Signature::new(c14n::EXC_C14N, RSA_SHA256).is_computed());
    }

    #[test]
    fn signed_info_comes_from_source_when_present() {
        let xml = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignedInfo><ds:CanonicalizationMethod Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#"/><ds:SignatureMethod Algorithm="urn:m"><ds:HMACOutputLength>128</ds:HMACOutputLength></ds:SignatureMethod><!--kept--></ds:SignedInfo><ds:SignatureValue>AA==
</ds:SignatureValue></ds:Signature>"#;
        let sig = Signature::from_element(&parse(xml).unwrap()).unwrap();
        assert_eq!(sig.hmac_output_length, Some(128));
        assert_eq!(sig.signature_value, Some(vec![0]));
        assert!(sig.signed_info_element().to_xml().contains("<!--kept-->"));
    }

    #[test]
    fn rejects_missing_signed_info() {
        let xml = r#"<ds:Signature xmlns:ds="http://www.w3.org/2000/09/xmldsig#"><ds:SignatureValue>AA==</ds:SignatureValue></ds:Signature>"#;
        assert!(matches!(
            Signature::from_element(&parse(xml).unwrap()),
            Err(UnmarshallingError::InvalidSignature(_))
        ));
    }

    #[test]
    fn inclusive_prefixes_round_trip() {
        let mut sig = computed();
        sig.references[0].transforms[1].inclusive_prefixes = vec!["xs".to_string()];
        let read = Signature::from_element(&parse(&sig.to_element().to_xml()).unwrap()).unwrap();
        assert_eq!(read.references[0].transforms[1].inclusive_prefixes, vec!["xs"]);
    }
}
