//! Post-unmarshal validation.
//!
//! Each element type has an ordered [`ValidatorChain`]. Chains stop at the
//! first failure, and [`validate_tree`] stops at the first failing node in
//! document order, so a rejected document yields exactly one reason.

use std::fmt;
use std::sync::Arc;

use crate::error::ValidationError;
use crate::name::QName;
use crate::object::{NodeId, XmlObjectTree};
use crate::registry::XmlObjectRegistry;

/// One semantic check on a built object.
pub trait Validator: Send + Sync {
    /// Checks node `id` of `tree`.
    ///
    /// # Errors
    ///
    /// Returns the violated rule.
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&XmlObjectTree, NodeId) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        self(tree, id)
    }
}

/// Ordered, fail-fast list of validators.
#[derive(Clone, Default)]
pub struct ValidatorChain {
    validators: Vec<Arc<dyn Validator>>,
}

impl ValidatorChain {
    /// Creates an empty chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a validator.
    pub fn push(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    /// Builder form of [`Self::push`].
    #[must_use]
    pub fn with(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Number of validators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Whether the chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Runs every validator until one fails.
    ///
    /// # Errors
    ///
    /// Returns the first failure.
    pub fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        self.validators.iter().try_for_each(|v| v.validate(tree, id))
    }
}

impl fmt::Debug for ValidatorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorChain")
            .field("len", &self.validators.len())
            .finish()
    }
}

/// Validates `root` and its descendants in document order. A node is
/// checked for the attributes its schema marks required, then by the chain
/// registered for its `xsi:type`, then by the chain registered for its
/// element name.
///
/// # Errors
///
/// Returns the first failure.
pub fn validate_tree(
    registry: &XmlObjectRegistry,
    tree: &XmlObjectTree,
    root: NodeId,
) -> Result<(), ValidationError> {
    for id in tree.descendants(root) {
        let node = &tree[id];
        for spec in node.schema().attributes.iter().filter(|a| a.required) {
            if node.attribute(&spec.name).is_none() {
                return Err(ValidationError::MissingAttribute {
                    element: node.element_name().clone(),
                    attribute: spec.name.clone(),
                });
            }
        }
        let type_name = node.schema_type().or(node.schema().type_name.as_ref());
        if let Some(chain) = type_name.and_then(|t| registry.validators_for(t)) {
            chain.validate(tree, id)?;
        }
        if type_name != Some(node.element_name()) {
            if let Some(chain) = registry.validators_for(node.element_name()) {
                chain.validate(tree, id)?;
            }
        }
    }
    Ok(())
}

/// Requires at least one child named `child`.
#[derive(Debug, Clone)]
pub struct RequiredChild {
    child: QName,
}

impl RequiredChild {
    /// Creates the rule.
    #[must_use]
    pub fn new(child: QName) -> Self {
        Self { child }
    }
}

impl Validator for RequiredChild {
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        if tree.first_child_named(id, &self.child).is_none() {
            return Err(ValidationError::MissingChild {
                element: tree[id].element_name().clone(),
                child: self.child.clone(),
            });
        }
        Ok(())
    }
}

/// Bounds the number of children named `child`.
#[derive(Debug, Clone)]
pub struct ChildCardinality {
    child: QName,
    min: usize,
    max: Option<usize>,
}

impl ChildCardinality {
    /// `min..=max` occurrences; `max` of `None` is unbounded.
    #[must_use]
    pub fn new(child: QName, min: usize, max: Option<usize>) -> Self {
        Self { child, min, max }
    }
}

impl Validator for ChildCardinality {
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        let found = tree.children_named(id, &self.child).len();
        if found < self.min || self.max.is_some_and(|max| found > max) {
            return Err(ValidationError::Cardinality {
                element: tree[id].element_name().clone(),
                child: self.child.clone(),
                min: self.min,
                max: self.max,
                found,
            });
        }
        Ok(())
    }
}

/// Requires an attribute.
#[derive(Debug, Clone)]
pub struct RequiredAttribute {
    attribute: QName,
}

impl RequiredAttribute {
    /// Creates the rule.
    #[must_use]
    pub fn new(attribute: QName) -> Self {
        Self { attribute }
    }
}

impl Validator for RequiredAttribute {
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        if tree[id].attribute(&self.attribute).is_none() {
            return Err(ValidationError::MissingAttribute {
                element: tree[id].element_name().clone(),
                attribute: self.attribute.clone(),
            });
        }
        Ok(())
    }
}

/// Rejects element children whose own version differs from the version
/// of the container.
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionConsistency;

impl Validator for VersionConsistency {
    fn validate(&self, tree: &XmlObjectTree, id: NodeId) -> Result<(), ValidationError> {
        let Some(expected) = tree.effective_version(id) else {
            return Ok(());
        };
        for child in tree.element_children(id) {
            if let Some(found) = tree[child].version() {
                if found != expected {
                    return Err(ValidationError::VersionMismatch {
                        element: tree[id].element_name().clone(),
                        child: tree[child].element_name().clone(),
                        expected,
                        found,
                    });
                }
            }
        }
        Ok(())
    }
}
