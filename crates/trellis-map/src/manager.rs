use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;
use trellis_build::{AttrValue, BuilderTree};
use trellis_container::ContainerStore;
use trellis_spec::StorageSpec;
use trellis_types::{BuilderId, ContainerId, ScalarValue, TypeKey};
use uuid::Uuid;

use crate::error::{MapError, MapResult};
use crate::names::camel_to_snake;
use crate::typemap::TypeMap;

/// Tunable limits of one build/construct session.
#[derive(Clone, Copy, Debug)]
pub struct BuildOptions {
    /// Maximum nesting depth before a build or construct aborts.
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { max_depth: 128 }
    }
}

/// Orchestrator of one mapping session, carrying the identity caches
/// that make builds and constructs idempotent.
///
/// A container built twice yields the same builder; a builder
/// constructed twice yields the same container. The caches also pair the
/// two directions, so exporting what was just read reuses the original
/// nodes. In-progress sets reject reference cycles, and a depth guard
/// bounds pathological nesting.
pub struct BuildManager {
    type_map: Arc<TypeMap>,
    built: HashMap<ContainerId, BuilderId>,
    constructed: HashMap<BuilderId, ContainerId>,
    building: HashSet<ContainerId>,
    constructing: HashSet<BuilderId>,
    depth: usize,
    options: BuildOptions,
}

impl BuildManager {
    pub fn new(type_map: Arc<TypeMap>) -> Self {
        Self::with_options(type_map, BuildOptions::default())
    }

    pub fn with_options(type_map: Arc<TypeMap>, options: BuildOptions) -> Self {
        Self {
            type_map,
            built: HashMap::new(),
            constructed: HashMap::new(),
            building: HashSet::new(),
            constructing: HashSet::new(),
            depth: 0,
            options,
        }
    }

    pub fn type_map(&self) -> &Arc<TypeMap> {
        &self.type_map
    }

    /// The builder a container was rendered to, if it was.
    pub fn builder_for(&self, container: ContainerId) -> Option<BuilderId> {
        self.built.get(&container).copied()
    }

    /// The container a builder was read into, if it was.
    pub fn container_for(&self, builder: BuilderId) -> Option<ContainerId> {
        self.constructed.get(&builder).copied()
    }

    /// Render a container as a builder subtree, attached under `parent`
    /// when given.
    ///
    /// Idempotent per manager: a second build of the same container
    /// returns the cached builder, attaching it if it was built
    /// unattached (a link target whose owner arrives later).
    pub fn build(
        &mut self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        container: ContainerId,
        parent: Option<BuilderId>,
    ) -> MapResult<BuilderId> {
        if let Some(&builder) = self.built.get(&container) {
            if let Some(parent) = parent {
                if tree.require(builder)?.parent.is_none() {
                    tree.attach(parent, builder)?;
                }
            }
            return Ok(builder);
        }
        if self.building.contains(&container) {
            return Err(MapError::ContainerCycle { container });
        }
        if self.depth >= self.options.max_depth {
            return Err(MapError::RecursionLimit {
                limit: self.options.max_depth,
            });
        }

        let record = store.require(container)?;
        let key = record.type_key.clone();
        let object_id = record.object_id;
        let mapper = self.type_map.get_map(&key)?;
        let name = builder_name(mapper.spec(), &record.name, &key);

        self.building.insert(container);
        self.depth += 1;
        let result = mapper.build(store, tree, self, container, parent, &name);
        self.depth -= 1;
        self.building.remove(&container);
        let builder = result?;

        // every typed builder advertises its identity in storage
        tree.set_attribute(builder, "namespace", AttrValue::text(key.namespace.clone()))?;
        tree.set_attribute(builder, "data_type", AttrValue::text(key.data_type.clone()))?;
        tree.set_attribute(builder, "object_id", AttrValue::text(object_id.to_string()))?;

        self.built.insert(container, builder);
        self.constructed.insert(builder, container);
        debug!(container = %container, builder = %builder, key = %key, "built container");
        Ok(builder)
    }

    /// Read a builder subtree back into a container, resolving the
    /// implementation class from the builder's reserved attributes.
    ///
    /// Idempotent per manager: constructing the same builder again
    /// returns the same container.
    pub fn construct(
        &mut self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        builder: BuilderId,
    ) -> MapResult<ContainerId> {
        if let Some(&container) = self.constructed.get(&builder) {
            return Ok(container);
        }
        if self.constructing.contains(&builder) {
            return Err(MapError::BuilderCycle { builder });
        }
        if self.depth >= self.options.max_depth {
            return Err(MapError::RecursionLimit {
                limit: self.options.max_depth,
            });
        }

        let key = self.type_map.get_cls(tree, builder)?;
        let mapper = self.type_map.get_map(&key)?;

        self.constructing.insert(builder);
        self.depth += 1;
        let result = mapper.construct(store, tree, self, builder);
        self.depth -= 1;
        self.constructing.remove(&builder);
        let container = result?;

        self.stamp_identity(store, tree, builder, container)?;
        self.constructed.insert(builder, container);
        self.built.insert(container, builder);
        debug!(builder = %builder, container = %container, key = %key, "constructed container");
        Ok(container)
    }

    /// Carry the stored object id and source file onto the constructed
    /// container, preserving identity across round trips.
    fn stamp_identity(
        &self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        builder: BuilderId,
        container: ContainerId,
    ) -> MapResult<()> {
        let object_id = match tree.attribute(builder, "object_id") {
            Some(AttrValue::Scalar(ScalarValue::Text(text))) => Some(
                Uuid::parse_str(text).map_err(|_| MapError::InvalidObjectId(text.clone()))?,
            ),
            _ => None,
        };
        let source = tree.source(builder).map(str::to_string);
        let record = store
            .get_mut(container)
            .ok_or(trellis_container::ContainerError::DanglingHandle(container))?;
        if let Some(id) = object_id {
            record.object_id = id;
        }
        record.container_source = source;
        Ok(())
    }
}

/// The storage name of a container: the spec's fixed name when it has
/// one, else the container's own name, else the spec's default name,
/// falling back to the snake-cased type name.
fn builder_name(spec: &StorageSpec, container_name: &str, key: &TypeKey) -> String {
    if let Some(fixed) = spec.name() {
        return fixed.to_string();
    }
    if !container_name.is_empty() {
        return container_name.to_string();
    }
    if let Some(default) = spec.default_name() {
        return default.to_string();
    }
    camel_to_snake(&key.data_type)
}
