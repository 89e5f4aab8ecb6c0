use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trellis_types::{ContainerId, TypeKey, Value};
use uuid::Uuid;

/// One domain object: a tagged record of named field values.
///
/// Containers live in a [`ContainerStore`](crate::ContainerStore) arena
/// and refer to each other by handle. The type key identifies which
/// registered data type the record instantiates; the mapping engine never
/// needs a dedicated Rust type per schema type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// The object's own name, used as its on-disk name when the spec
    /// leaves the name to the instance.
    pub name: String,
    /// The registered data type this record instantiates.
    pub type_key: TypeKey,
    /// Field values keyed by field name.
    pub fields: BTreeMap<String, Value>,
    /// Owning parent, if attached. Ownership-only back-reference.
    pub(crate) parent: Option<ContainerId>,
    /// Children attached via `set_parent`, in attachment order.
    pub(crate) children: Vec<ContainerId>,
    /// Path of the file this object was read from or written to.
    pub container_source: Option<String>,
    /// Stable identity stamped into storage, preserved across round trips.
    pub object_id: Uuid,
}

impl Container {
    /// A new, unattached container with no fields.
    pub fn new(name: impl Into<String>, type_key: TypeKey) -> Self {
        Self {
            name: name.into(),
            type_key,
            fields: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
            container_source: None,
            object_id: Uuid::now_v7(),
        }
    }

    /// The value of a field, if set.
    pub fn get_field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// The owning parent, if attached.
    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    /// Children attached to this container, in attachment order.
    pub fn children(&self) -> &[ContainerId] {
        &self.children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_container_is_unattached() {
        let c = Container::new("probe0", TypeKey::new("core", "Device"));
        assert!(c.parent().is_none());
        assert!(c.children().is_empty());
        assert!(c.fields.is_empty());
    }

    #[test]
    fn object_ids_are_unique() {
        let a = Container::new("a", TypeKey::new("core", "Device"));
        let b = Container::new("b", TypeKey::new("core", "Device"));
        assert_ne!(a.object_id, b.object_id);
    }
}
