use serde::{Deserialize, Serialize};

use crate::error::{SpecError, SpecResult};
use crate::parent::Parent;
use crate::quantity::Quantity;

/// Spec for a link child of a group.
///
/// A link points at an instance of `target_type` stored elsewhere in the
/// hierarchy (or in another file). Links never own attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinkSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub doc: String,
    pub target_type: String,
    #[serde(default, skip_serializing_if = "Quantity::is_default")]
    pub quantity: Quantity,
    #[serde(skip)]
    pub(crate) parent: Parent,
}

impl LinkSpec {
    /// A required, wildcard-named link to the given target type.
    pub fn new(target_type: impl Into<String>, doc: impl Into<String>) -> Self {
        Self {
            name: None,
            doc: doc.into(),
            target_type: target_type.into(),
            quantity: Quantity::One,
            parent: Parent::default(),
        }
    }

    /// Give the link a fixed name within its parent group.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the allowed instance count.
    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }

    /// The name this link is keyed under in its parent: the fixed name if
    /// any, else the target type.
    pub fn key(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.target_type)
    }

    /// Whether at least one instance must be present.
    pub fn required(&self) -> bool {
        self.quantity.required()
    }

    /// Check the definition-time invariants.
    pub fn validate(&self) -> SpecResult<()> {
        if let Some(name) = &self.name {
            if self.quantity.is_many() {
                return Err(SpecError::NamedMultiInstance {
                    name: name.clone(),
                    quantity: self.quantity.to_string(),
                });
            }
        }
        Ok(())
    }
}
