use tracing::trace;
use trellis_types::{ContainerId, Value};

use crate::container::Container;
use crate::error::{ContainerError, ContainerResult};

/// Arena owning every container of one object graph.
///
/// Handles index into the arena; containers are never removed, and parent
/// links are handles rather than references so the graph stays a plain
/// tree of owned values. Containers are dropped with the store.
#[derive(Debug, Default)]
pub struct ContainerStore {
    containers: Vec<Container>,
}

impl ContainerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move a container into the arena, returning its handle.
    pub fn insert(&mut self, container: Container) -> ContainerId {
        let id = ContainerId::from_index(self.containers.len());
        trace!(container = %id, name = %container.name, type_key = %container.type_key, "inserted container");
        self.containers.push(container);
        id
    }

    /// The container behind a handle, if the handle belongs to this arena.
    pub fn get(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id.index())
    }

    /// Mutable access to the container behind a handle.
    pub fn get_mut(&mut self, id: ContainerId) -> Option<&mut Container> {
        self.containers.get_mut(id.index())
    }

    /// Like [`get`](Self::get) but failing on a foreign handle.
    pub fn require(&self, id: ContainerId) -> ContainerResult<&Container> {
        self.get(id).ok_or(ContainerError::DanglingHandle(id))
    }

    fn require_mut(&mut self, id: ContainerId) -> ContainerResult<&mut Container> {
        self.get_mut(id).ok_or(ContainerError::DanglingHandle(id))
    }

    /// Number of containers in the arena.
    pub fn len(&self) -> usize {
        self.containers.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// Iterate over every container with its handle.
    pub fn iter(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.containers
            .iter()
            .enumerate()
            .map(|(index, c)| (ContainerId::from_index(index), c))
    }

    /// Set a field value exactly once.
    pub fn set_field(
        &mut self,
        id: ContainerId,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> ContainerResult<()> {
        let name = name.into();
        let container = self.require_mut(id)?;
        if container.fields.contains_key(&name) {
            return Err(ContainerError::FieldReassigned {
                container: id,
                field: name,
            });
        }
        container.fields.insert(name, value.into());
        Ok(())
    }

    /// Attach `child` to `parent`, exactly once, rejecting cycles.
    ///
    /// Appends the child to the parent's child list; the back-reference is
    /// ownership bookkeeping only and is never traversed downward.
    pub fn set_parent(&mut self, child: ContainerId, parent: ContainerId) -> ContainerResult<()> {
        self.require(parent)?;
        if self.require(child)?.parent.is_some() {
            return Err(ContainerError::ParentReassigned { container: child });
        }
        if child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(ContainerError::ParentCycle { child, parent });
        }
        self.require_mut(child)?.parent = Some(parent);
        self.require_mut(parent)?.children.push(child);
        trace!(child = %child, parent = %parent, "attached container");
        Ok(())
    }

    /// Walk the parent chain upward, starting from the parent of `id`.
    pub fn ancestors(&self, id: ContainerId) -> impl Iterator<Item = ContainerId> + '_ {
        let mut current = self.get(id).and_then(|c| c.parent);
        std::iter::from_fn(move || {
            let next = current?;
            current = self.get(next).and_then(|c| c.parent);
            Some(next)
        })
    }

    /// The topmost ancestor of a container (itself, if unattached).
    pub fn root_of(&self, id: ContainerId) -> ContainerId {
        self.ancestors(id).last().unwrap_or(id)
    }

    /// Preorder walk of a container and everything attached beneath it.
    pub fn descendants(&self, id: ContainerId) -> Vec<ContainerId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(container) = self.get(current) {
                for child in container.children.iter().rev() {
                    stack.push(*child);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use trellis_types::TypeKey;

    use super::*;

    fn device(name: &str) -> Container {
        Container::new(name, TypeKey::new("core", "Device"))
    }

    #[test]
    fn fields_are_set_once() {
        let mut store = ContainerStore::new();
        let id = store.insert(device("probe0"));
        store.set_field(id, "serial", "A-17").unwrap();
        let err = store.set_field(id, "serial", "B-2").unwrap_err();
        assert_eq!(
            err,
            ContainerError::FieldReassigned {
                container: id,
                field: "serial".into()
            }
        );
        assert_eq!(
            store.get(id).unwrap().get_field("serial"),
            Some(&Value::text("A-17"))
        );
    }

    #[test]
    fn parent_is_set_once() {
        let mut store = ContainerStore::new();
        let root = store.insert(device("root"));
        let child = store.insert(device("child"));
        let other = store.insert(device("other"));
        store.set_parent(child, root).unwrap();
        assert_eq!(store.get(child).unwrap().parent(), Some(root));
        assert_eq!(store.get(root).unwrap().children(), &[child]);
        assert_eq!(
            store.set_parent(child, other).unwrap_err(),
            ContainerError::ParentReassigned { container: child }
        );
    }

    #[test]
    fn cycles_are_rejected() {
        let mut store = ContainerStore::new();
        let a = store.insert(device("a"));
        let b = store.insert(device("b"));
        let c = store.insert(device("c"));
        store.set_parent(b, a).unwrap();
        store.set_parent(c, b).unwrap();
        assert_eq!(
            store.set_parent(a, c).unwrap_err(),
            ContainerError::ParentCycle { child: a, parent: c }
        );
        assert_eq!(
            store.set_parent(a, a).unwrap_err(),
            ContainerError::ParentCycle { child: a, parent: a }
        );
    }

    #[test]
    fn ancestry_queries() {
        let mut store = ContainerStore::new();
        let a = store.insert(device("a"));
        let b = store.insert(device("b"));
        let c = store.insert(device("c"));
        store.set_parent(b, a).unwrap();
        store.set_parent(c, b).unwrap();

        assert_eq!(store.ancestors(c).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(store.root_of(c), a);
        assert_eq!(store.root_of(a), a);
        assert_eq!(store.descendants(a), vec![a, b, c]);
    }

    #[test]
    fn dangling_handles_fail() {
        let mut store = ContainerStore::new();
        let ghost = ContainerId::from_index(9);
        assert_eq!(
            store.set_field(ghost, "x", 1i64).unwrap_err(),
            ContainerError::DanglingHandle(ghost)
        );
    }
}
