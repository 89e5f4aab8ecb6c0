use tracing::debug;
use trellis_build::{BuilderKind, BuilderTree};
use trellis_container::ContainerStore;
use trellis_map::BuildManager;
use trellis_types::{BuilderId, ContainerId};

use crate::error::{IoError, IoResult};

/// Name of the anonymous group every backend stores its content under.
pub const ROOT_NAME: &str = "root";

/// Contract between the mapping engine and a storage format.
///
/// A backend persists builder trees and hands them back; the default
/// `write`/`read` methods layer the object mapping on top, so a backend
/// only implements the tree-level pair. Backends must preserve names
/// exactly, classify links as soft or external by comparing recorded
/// sources, and drain chunked dataset data into storage.
pub trait StorageBackend {
    /// Identifier of the storage this backend fronts, recorded as the
    /// source of every node written through it.
    fn source(&self) -> &str;

    /// Materialize the stored content as a fresh builder tree, returning
    /// the tree and its root group.
    fn read_builder(&self) -> IoResult<(BuilderTree, BuilderId)>;

    /// Persist the subtree rooted at `root`. Chunked datasets are
    /// drained in the process, which is why the tree is mutable.
    fn write_builder(&mut self, tree: &mut BuilderTree, root: BuilderId) -> IoResult<()>;

    /// Build a container and persist it under a fresh storage root
    /// stamped with this backend's source.
    fn write(
        &mut self,
        store: &ContainerStore,
        manager: &mut BuildManager,
        tree: &mut BuilderTree,
        container: ContainerId,
    ) -> IoResult<()> {
        let built = manager.build(store, tree, container, None)?;
        let root = tree.add_group(None, ROOT_NAME)?;
        tree.attach(root, built)?;
        let source = self.source().to_string();
        tree.set_source(root, &source)?;
        debug!(source = %source, container = %container, "writing container");
        self.write_builder(tree, root)
    }

    /// Read the stored content back into a container graph.
    ///
    /// Storage holds exactly one typed object under the root; zero or
    /// several make the read fail rather than guess.
    fn read(&self, store: &mut ContainerStore, manager: &mut BuildManager) -> IoResult<ContainerId> {
        let (tree, root) = self.read_builder()?;
        let typed: Vec<BuilderId> = match &tree.require(root)?.kind {
            BuilderKind::Group(group) => group
                .children
                .values()
                .copied()
                .filter(|&child| tree.attribute(child, "data_type").is_some())
                .collect(),
            _ => Vec::new(),
        };
        let builder = match typed.as_slice() {
            [one] => *one,
            [] => {
                return Err(IoError::NoTypedRoot {
                    source_name: self.source().to_string(),
                })
            }
            several => {
                return Err(IoError::AmbiguousRoot {
                    source_name: self.source().to_string(),
                    count: several.len(),
                })
            }
        };
        debug!(source = %self.source(), builder = %builder, "reading container");
        Ok(manager.construct(store, &tree, builder)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use trellis_build::AttrValue;
    use trellis_container::Container;
    use trellis_map::TypeMap;
    use trellis_spec::{
        AttributeSpec, GroupSpec, NamespaceCatalog, NamespaceMeta, SpecCatalog, SpecNamespace,
        StorageSpec,
    };
    use trellis_types::{DType, TypeKey, Value};

    use crate::memory::MemoryBackend;
    use super::*;

    fn core_type_map() -> Arc<TypeMap> {
        let mut catalog = SpecCatalog::new();
        catalog
            .register_spec(
                StorageSpec::Group(
                    GroupSpec::new("a recording block")
                        .with_data_type_def("Block")
                        .with_attribute(AttributeSpec::new("label", DType::Text, "display label"))
                        .unwrap(),
                ),
                None,
            )
            .unwrap();
        let meta = NamespaceMeta {
            name: "core".to_string(),
            doc: "core test namespace".to_string(),
            full_name: None,
            version: Some("0.1.0".to_string()),
            date: None,
            authors: Vec::new(),
            contacts: Vec::new(),
            schema: Vec::new(),
        };
        let mut namespaces = NamespaceCatalog::new();
        namespaces
            .add_namespace(SpecNamespace::new(meta, catalog))
            .unwrap();
        Arc::new(TypeMap::with_namespaces(namespaces))
    }

    #[test]
    fn write_then_read_constructs_the_typed_root() {
        let mut store = ContainerStore::new();
        let block = store.insert(Container::new("b0", TypeKey::new("core", "Block")));
        store.set_field(block, "label", "first").unwrap();

        let mut backend = MemoryBackend::new("core.mem");
        let mut writer = BuildManager::new(core_type_map());
        let mut tree = BuilderTree::new();
        backend.write(&store, &mut writer, &mut tree, block).unwrap();

        let mut read_store = ContainerStore::new();
        let mut reader = BuildManager::new(core_type_map());
        let read = backend.read(&mut read_store, &mut reader).unwrap();
        let record = read_store.get(read).unwrap();
        assert_eq!(record.name, "b0");
        assert_eq!(record.get_field("label"), Some(&Value::text("first")));
        assert_eq!(record.container_source.as_deref(), Some("core.mem"));
    }

    #[test]
    fn reading_a_root_with_no_typed_child_fails() {
        let mut tree = BuilderTree::new();
        let root = tree.add_group(None, ROOT_NAME).unwrap();
        tree.add_group(Some(root), "untyped").unwrap();
        tree.set_source(root, "core.mem").unwrap();

        let mut backend = MemoryBackend::new("core.mem");
        backend.write_builder(&mut tree, root).unwrap();
        let mut store = ContainerStore::new();
        let mut manager = BuildManager::new(core_type_map());
        assert!(matches!(
            backend.read(&mut store, &mut manager),
            Err(IoError::NoTypedRoot { .. })
        ));
    }

    #[test]
    fn several_typed_roots_are_rejected() {
        let mut tree = BuilderTree::new();
        let root = tree.add_group(None, ROOT_NAME).unwrap();
        for name in ["a", "b"] {
            let child = tree.add_group(Some(root), name).unwrap();
            tree.set_attribute(child, "data_type", AttrValue::text("Block"))
                .unwrap();
        }
        tree.set_source(root, "core.mem").unwrap();

        let mut backend = MemoryBackend::new("core.mem");
        backend.write_builder(&mut tree, root).unwrap();
        let mut store = ContainerStore::new();
        let mut manager = BuildManager::new(core_type_map());
        assert!(matches!(
            backend.read(&mut store, &mut manager),
            Err(IoError::AmbiguousRoot { count: 2, .. })
        ));
    }
}
