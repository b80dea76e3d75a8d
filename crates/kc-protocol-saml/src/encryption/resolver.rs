//! Locating the `EncryptedKey` for an `EncryptedData`.

use std::sync::Arc;

use kc_xml::dom::Element;

use crate::types::constants::{ds, xenc};

/// Finds candidate `xenc:EncryptedKey` elements for an `EncryptedData`.
pub trait EncryptedKeyResolver: Send + Sync {
    /// Candidates for `encrypted_data`, which sits in `wrapper`.
    fn resolve(&self, encrypted_data: &Element, wrapper: &Element) -> Vec<Element>;
}

/// Keys carried in `EncryptedData/ds:KeyInfo`.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineEncryptedKeyResolver;

impl EncryptedKeyResolver for InlineEncryptedKeyResolver {
    fn resolve(&self, encrypted_data: &Element, _wrapper: &Element) -> Vec<Element> {
        let name = xenc("EncryptedKey");
        encrypted_data
            .first_child(&ds("KeyInfo"))
            .map(|key_info| key_info.children_named(&name).cloned().collect())
            .unwrap_or_default()
    }
}

/// Keys placed next to the `EncryptedData` inside the SAML wrapper.
///
/// A key with a `ReferenceList` is used only if it lists the data's `Id`. A
/// key with a `Recipient` is used only if that recipient is configured; keys
/// without one are always candidates.
#[derive(Debug, Clone, Default)]
pub struct SiblingEncryptedKeyResolver {
    recipients: Vec<String>,
}

impl SiblingEncryptedKeyResolver {
    /// A resolver accepting keys addressed to any of `recipients`.
    #[must_use]
    pub fn new(recipients: Vec<String>) -> Self {
        Self { recipients }
    }

    fn references(key: &Element, data_id: Option<&str>) -> bool {
        let Some(list) = key.first_child(&xenc("ReferenceList")) else {
            return true;
        };
        let reference = xenc("DataReference");
        data_id.is_some_and(|id| {
            list.children_named(&reference)
                .filter_map(|r| r.attribute("URI"))
                .any(|uri| uri.strip_prefix('#') == Some(id))
        })
    }

    fn addressed(&self, key: &Element) -> bool {
        key.attribute("Recipient")
            .is_none_or(|recipient| self.recipients.iter().any(|r| r == recipient))
    }
}

impl EncryptedKeyResolver for SiblingEncryptedKeyResolver {
    fn resolve(&self, encrypted_data: &Element, wrapper: &Element) -> Vec<Element> {
        let data_id = encrypted_data.attribute("Id");
        wrapper
            .children_named(&xenc("EncryptedKey"))
            .filter(|key| Self::references(key, data_id) && self.addressed(key))
            .cloned()
            .collect()
    }
}

/// Concatenates the candidates of several resolvers, in order.
#[derive(Clone, Default)]
pub struct ChainingEncryptedKeyResolver {
    resolvers: Vec<Arc<dyn EncryptedKeyResolver>>,
}

impl ChainingEncryptedKeyResolver {
    /// Chains `resolvers`.
    #[must_use]
    pub fn new(resolvers: Vec<Arc<dyn EncryptedKeyResolver>>) -> Self {
        Self { resolvers }
    }

    /// Inline keys first, then wrapper siblings addressed to `recipients`.
    #[must_use]
    pub fn standard(recipients: Vec<String>) -> Self {
        Self::new(vec![
            Arc::new(InlineEncryptedKeyResolver),
            Arc::new(SiblingEncryptedKeyResolver::new(recipients)),
        ])
    }
}

impl std::fmt::Debug for ChainingEncryptedKeyResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainingEncryptedKeyResolver")
            .field("resolvers", &self.resolvers.len())
            .finish()
    }
}

impl EncryptedKeyResolver for ChainingEncryptedKeyResolver {
    fn resolve(&self, encrypted_data: &Element, wrapper: &Element) -> Vec<Element> {
        self.resolvers
            .iter()
            .flat_map(|r| r.resolve(encrypted_data, wrapper))
            .collect()
    }
}
