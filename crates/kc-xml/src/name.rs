//! Qualified names.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ns;

/// A namespace-qualified name.
///
/// Identity is the `(namespace, local name)` pair. The prefix is carried
/// only so serialization can reuse the author's choice; two names that
/// differ only by prefix are equal and hash identically.
#[derive(Debug, Clone)]
pub struct QName {
    namespace: String,
    local: String,
    prefix: Option<String>,
}

impl QName {
    /// Creates a name in `namespace` (empty for no namespace).
    pub fn new(namespace: impl Into<String>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local: local.into(),
            prefix: None,
        }
    }

    /// Creates a name that belongs to no namespace.
    pub fn local(local: impl Into<String>) -> Self {
        Self::new("", local)
    }

    /// Sets the preferred prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        self.prefix = if prefix.is_empty() { None } else { Some(prefix) };
        self
    }

    /// The `xsi:type` attribute name.
    #[must_use]
    pub fn xsi_type() -> Self {
        Self::new(ns::XSI_NS, "type").with_prefix(ns::XSI_PREFIX)
    }

    /// Namespace URI, empty when unqualified.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Local part.
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local
    }

    /// Preferred prefix, if any.
    #[must_use]
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Returns true if the name carries a namespace.
    #[must_use]
    pub fn has_namespace(&self) -> bool {
        !self.namespace.is_empty()
    }

    /// Returns true if this name is `local` in `namespace`.
    #[must_use]
    pub fn is(&self, namespace: &str, local: &str) -> bool {
        self.namespace == namespace && self.local == local
    }

    /// The `prefix:local` form used in XML text.
    #[must_use]
    pub fn prefixed(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.local),
            None => self.local.clone(),
        }
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.namespace == other.namespace && self.local == other.local
    }
}

impl Eq for QName {}

impl Hash for QName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.namespace.hash(state);
        self.local.hash(state);
    }
}

impl PartialOrd for QName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QName {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.namespace, &self.local).cmp(&(&other.namespace, &other.local))
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            f.write_str(&self.local)
        } else {
            write!(f, "{{{}}}{}", self.namespace, self.local)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn prefix_is_not_part_of_identity() {
        let a = QName::new("urn:x", "Item").with_prefix("a");
        let b = QName::new("urn:x", "Item").with_prefix("b");
        assert_eq!(a, b);

        let set: HashSet<QName> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn display_uses_clark_notation() {
        assert_eq!(QName::new("urn:x", "Item").to_string(), "{urn:x}Item");
        assert_eq!(QName::local("ID").to_string(), "ID");
    }

    #[test]
    fn empty_prefix_means_none() {
        let name = QName::new("urn:x", "Item").with_prefix("");
        assert_eq!(name.prefix(), None);
        assert_eq!(name.prefixed(), "Item");
    }
}
