use std::fmt;

use serde::{Deserialize, Serialize};

/// Fully-qualified name of a registered data type.
///
/// A data type is identified by the namespace that declared it plus its type
/// name, e.g. `core/Electrode`. Keys are the lookup currency of the type
/// map: container records carry one, and builders record its two halves as
/// reserved attributes so readers can resolve the implementation class.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeKey {
    /// Name of the namespace the type is registered in.
    pub namespace: String,
    /// The type name within that namespace.
    pub data_type: String,
}

impl TypeKey {
    /// Create a key from a namespace and type name.
    pub fn new(namespace: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            data_type: data_type.into(),
        }
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({}/{})", self.namespace, self.data_type)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.data_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_namespace_and_type() {
        let key = TypeKey::new("core", "Electrode");
        assert_eq!(format!("{key}"), "core/Electrode");
    }

    #[test]
    fn keys_compare_by_value() {
        assert_eq!(TypeKey::new("a", "B"), TypeKey::new("a", "B"));
        assert_ne!(TypeKey::new("a", "B"), TypeKey::new("a", "C"));
    }
}
