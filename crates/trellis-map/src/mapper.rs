use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, trace};
use trellis_build::{AttrValue, BuilderTree, DatasetValue};
use trellis_container::{Container, ContainerStore};
use trellis_spec::{
    AttributeSpec, DatasetSpec, GroupSpec, LinkSpec, ShapeSpec, StorageSpec, TypedChild,
    RESERVED_ATTRIBUTES,
};
use trellis_types::{BuilderId, ContainerId, DType, TypeKey, Value};

use crate::error::{MapError, MapResult};
use crate::manager::BuildManager;
use crate::walk::collect_entries;

/// Hook supplying a constructor argument from the builder being read,
/// overriding whatever the default mapping gathered.
pub type ConstructorArgHook =
    Arc<dyn Fn(&BuilderTree, BuilderId) -> MapResult<Option<Value>> + Send + Sync>;

/// Hook supplying the value for a spec path at build time, overriding the
/// object field the path maps to.
pub type FieldValueHook =
    Arc<dyn Fn(&ContainerStore, &Container) -> MapResult<Option<Value>> + Send + Sync>;

/// Deviations from the default naming rules for one type's mapper.
///
/// Paths are `/`-joined from the type's root spec, the same form
/// [`ObjectMapper::field_name`] takes. An entry here applies to the type
/// it is registered for and, unless shadowed, to its subtypes.
#[derive(Clone, Default)]
pub struct MapperOverrides {
    /// Spec path to object field name.
    pub field_renames: BTreeMap<String, String>,
    /// Spec path to constructor argument name, when it differs from the
    /// field name.
    pub arg_renames: BTreeMap<String, String>,
    /// Spec paths excluded from mapping in both directions.
    pub unmapped: BTreeSet<String>,
    /// Build-side value hooks by spec path.
    pub field_values: BTreeMap<String, FieldValueHook>,
    /// Construct-side argument hooks by argument name.
    pub const_args: BTreeMap<String, ConstructorArgHook>,
}

impl MapperOverrides {
    /// Map a spec path to a different object field name. The constructor
    /// argument follows unless [`constructor_arg_name`] says otherwise.
    ///
    /// [`constructor_arg_name`]: Self::constructor_arg_name
    pub fn map_field(mut self, spec_path: impl Into<String>, field: impl Into<String>) -> Self {
        self.field_renames.insert(spec_path.into(), field.into());
        self
    }

    /// Name the constructor argument a spec path feeds.
    pub fn constructor_arg_name(
        mut self,
        spec_path: impl Into<String>,
        arg: impl Into<String>,
    ) -> Self {
        self.arg_renames.insert(spec_path.into(), arg.into());
        self
    }

    /// Exclude a spec path from mapping in both directions.
    pub fn unmap(mut self, spec_path: impl Into<String>) -> Self {
        self.unmapped.insert(spec_path.into());
        self
    }

    /// Compute a constructor argument from the builder instead of
    /// gathering it; wins over any gathered value.
    pub fn constructor_arg(mut self, arg: impl Into<String>, hook: ConstructorArgHook) -> Self {
        self.const_args.insert(arg.into(), hook);
        self
    }

    /// Compute a spec path's build-side value from the container instead
    /// of reading the mapped field.
    pub fn field_value(mut self, spec_path: impl Into<String>, hook: FieldValueHook) -> Self {
        self.field_values.insert(spec_path.into(), hook);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.field_renames.is_empty()
            && self.arg_renames.is_empty()
            && self.unmapped.is_empty()
            && self.field_values.is_empty()
            && self.const_args.is_empty()
    }
}

/// Bidirectional translator between one type's containers and builder
/// subtrees.
///
/// The mapper is derived from the type's resolved spec: every mappable
/// spec child gets a field name and a constructor argument name by the
/// default naming rules, adjusted by [`MapperOverrides`]. Mappers are
/// immutable once created and shared behind `Arc` by the type map.
pub struct ObjectMapper {
    key: TypeKey,
    spec: Arc<StorageSpec>,
    field_map: BTreeMap<String, String>,
    arg_map: BTreeMap<String, String>,
    overrides: MapperOverrides,
}

impl ObjectMapper {
    pub fn new(key: TypeKey, spec: Arc<StorageSpec>, overrides: MapperOverrides) -> Self {
        let mut field_map = BTreeMap::new();
        let mut arg_map = BTreeMap::new();
        for entry in collect_entries(&spec) {
            if overrides.unmapped.contains(&entry.path) {
                continue;
            }
            let field = overrides
                .field_renames
                .get(&entry.path)
                .cloned()
                .unwrap_or_else(|| entry.field.clone());
            let arg = overrides
                .arg_renames
                .get(&entry.path)
                .cloned()
                .unwrap_or_else(|| field.clone());
            field_map.entry(entry.path.clone()).or_insert(field);
            arg_map.entry(entry.path).or_insert(arg);
        }
        trace!(key = %key, paths = field_map.len(), "derived object mapper");
        Self {
            key,
            spec,
            field_map,
            arg_map,
            overrides,
        }
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn spec(&self) -> &Arc<StorageSpec> {
        &self.spec
    }

    /// The object field a spec path maps to, if the path is mapped.
    pub fn field_name(&self, path: &str) -> Option<&str> {
        self.field_map.get(path).map(String::as_str)
    }

    /// The constructor argument a spec path maps to, if mapped.
    pub fn arg_name(&self, path: &str) -> Option<&str> {
        self.arg_map.get(path).map(String::as_str)
    }

    fn field_value(
        &self,
        store: &ContainerStore,
        container: &Container,
        path: &str,
    ) -> MapResult<Option<Value>> {
        if let Some(hook) = self.overrides.field_values.get(path) {
            return hook(store, container);
        }
        Ok(self
            .field_map
            .get(path)
            .and_then(|field| container.get_field(field))
            .cloned())
    }

    fn missing(&self, path: &str) -> MapError {
        MapError::MissingRequiredField {
            data_type: self.key.to_string(),
            field: path.to_string(),
        }
    }

    // ---- build: container to builder subtree ----

    /// Render a container as a builder subtree, attached under `parent`
    /// when given. Typed children and link targets go through the
    /// manager so shared containers build once.
    pub fn build(
        &self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        manager: &mut BuildManager,
        container_id: ContainerId,
        parent: Option<BuilderId>,
        name: &str,
    ) -> MapResult<BuilderId> {
        let container = store.require(container_id)?;
        debug!(key = %self.key, container = %container_id, name = %name, "building container");
        match self.spec.as_ref() {
            StorageSpec::Group(group) => {
                let node = tree.add_group(parent, name)?;
                self.build_group(store, tree, manager, container, group, "", node)?;
                Ok(node)
            }
            StorageSpec::Dataset(dataset) => {
                let value = match self.field_value(store, container, "data")? {
                    Some(v) => v,
                    None => match &dataset.default_value {
                        Some(d) => d.clone(),
                        None => return Err(self.missing("data")),
                    },
                };
                let node = self.add_dataset_node(
                    store, tree, manager, parent, name, dataset, value, "data",
                )?;
                self.build_attributes(
                    store,
                    tree,
                    manager,
                    container,
                    &dataset.attributes,
                    "",
                    node,
                )?;
                Ok(node)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_group(
        &self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        manager: &mut BuildManager,
        container: &Container,
        group: &GroupSpec,
        prefix: &str,
        node: BuilderId,
    ) -> MapResult<()> {
        for dataset in &group.datasets {
            if dataset.self_data_type().is_some() {
                let path = join(prefix, dataset.key());
                self.build_typed_children(
                    store,
                    tree,
                    manager,
                    container,
                    &path,
                    dataset.required(),
                    node,
                )?;
                continue;
            }
            let Some(name) = dataset.name.as_deref() else {
                continue;
            };
            let path = join(prefix, name);
            let value = match self.field_value(store, container, &path)? {
                Some(v) => v,
                None => match &dataset.default_value {
                    Some(d) => d.clone(),
                    None if dataset.required() => return Err(self.missing(&path)),
                    None => continue,
                },
            };
            let child =
                self.add_dataset_node(store, tree, manager, Some(node), name, dataset, value, &path)?;
            self.build_attributes(
                store,
                tree,
                manager,
                container,
                &dataset.attributes,
                &path,
                child,
            )?;
        }
        for child in &group.groups {
            if child.self_data_type().is_some() {
                let path = join(prefix, child.key());
                self.build_typed_children(
                    store,
                    tree,
                    manager,
                    container,
                    &path,
                    child.required(),
                    node,
                )?;
                continue;
            }
            let Some(name) = child.name.as_deref() else {
                continue;
            };
            let path = join(prefix, name);
            if !child.required() && !self.subtree_in_use(store, container, &path)? {
                trace!(key = %self.key, path = %path, "skipping empty optional subgroup");
                continue;
            }
            let sub = tree.add_group(Some(node), name)?;
            self.build_group(store, tree, manager, container, child, &path, sub)?;
        }
        for link in &group.links {
            self.build_link(store, tree, manager, container, link, prefix, node)?;
        }
        self.build_attributes(store, tree, manager, container, &group.attributes, prefix, node)
    }

    #[allow(clippy::too_many_arguments)]
    fn build_typed_children(
        &self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        manager: &mut BuildManager,
        container: &Container,
        path: &str,
        required: bool,
        node: BuilderId,
    ) -> MapResult<()> {
        let Some(value) = self.field_value(store, container, path)? else {
            if required {
                return Err(self.missing(path));
            }
            return Ok(());
        };
        let ids = value.as_containers().ok_or_else(|| MapError::NotAContainerValue {
            field: path.to_string(),
        })?;
        if ids.is_empty() && required {
            return Err(self.missing(path));
        }
        for id in ids {
            manager.build(store, tree, id, Some(node))?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_link(
        &self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        manager: &mut BuildManager,
        container: &Container,
        link: &LinkSpec,
        prefix: &str,
        node: BuilderId,
    ) -> MapResult<()> {
        let path = join(prefix, link.key());
        let Some(value) = self.field_value(store, container, &path)? else {
            if link.required() {
                return Err(self.missing(&path));
            }
            return Ok(());
        };
        let ids = value.as_containers().ok_or_else(|| MapError::NotAContainerValue {
            field: path.clone(),
        })?;
        if ids.is_empty() && link.required() {
            return Err(self.missing(&path));
        }
        for id in ids {
            // targets build unattached; their owner attaches them later
            let target = manager.build(store, tree, id, None)?;
            let link_name = match &link.name {
                Some(n) => n.clone(),
                None => tree.require(target)?.name.clone(),
            };
            tree.add_link(node, link_name, target)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn build_attributes(
        &self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        manager: &mut BuildManager,
        container: &Container,
        attributes: &[AttributeSpec],
        prefix: &str,
        node: BuilderId,
    ) -> MapResult<()> {
        for attr in attributes {
            let path = join(prefix, &attr.name);
            let value = if attr.value.is_some() {
                attr.value.clone()
            } else {
                self.field_value(store, container, &path)?
                    .or_else(|| attr.default_value.clone())
            };
            match value {
                Some(v) => {
                    let av = self.to_attr_value(store, tree, manager, attr, &path, v)?;
                    tree.set_attribute(node, &attr.name, av)?;
                }
                None if attr.required => return Err(self.missing(&path)),
                None => {}
            }
        }
        Ok(())
    }

    fn to_attr_value(
        &self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        manager: &mut BuildManager,
        attr: &AttributeSpec,
        path: &str,
        value: Value,
    ) -> MapResult<AttrValue> {
        match value {
            Value::Container(id) => {
                if !matches!(attr.dtype, DType::Ref(_)) {
                    return Err(MapError::NotAContainerValue {
                        field: path.to_string(),
                    });
                }
                Ok(AttrValue::Ref(manager.build(store, tree, id, None)?))
            }
            Value::ContainerList(ids) => {
                if !matches!(attr.dtype, DType::Ref(_)) {
                    return Err(MapError::NotAContainerValue {
                        field: path.to_string(),
                    });
                }
                let refs = ids
                    .into_iter()
                    .map(|id| manager.build(store, tree, id, None))
                    .collect::<MapResult<Vec<_>>>()?;
                Ok(AttrValue::RefList(refs))
            }
            Value::Scalar(s) => {
                let s = coerce_scalar(&attr.dtype, s, path)?;
                Ok(AttrValue::Scalar(s))
            }
            Value::Array(a) => {
                if let Some(shape) = &attr.shape {
                    if !shape.matches(a.shape()) {
                        return Err(MapError::ValueShape {
                            field: path.to_string(),
                            declared: shape_string(shape),
                            actual: a.shape().to_vec(),
                        });
                    }
                }
                let a = coerce_array(&attr.dtype, a)?;
                Ok(AttrValue::Array(a))
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn add_dataset_node(
        &self,
        store: &ContainerStore,
        tree: &mut BuilderTree,
        manager: &mut BuildManager,
        parent: Option<BuilderId>,
        name: &str,
        spec: &DatasetSpec,
        value: Value,
        path: &str,
    ) -> MapResult<BuilderId> {
        let data = match value {
            Value::Scalar(s) => {
                let s = match &spec.dtype {
                    Some(dtype) => coerce_scalar(dtype, s, path)?,
                    None => s,
                };
                DatasetValue::Scalar(s)
            }
            Value::Array(a) => {
                if let Some(shape) = &spec.shape {
                    if !shape.matches(a.shape()) {
                        return Err(MapError::ValueShape {
                            field: path.to_string(),
                            declared: shape_string(shape),
                            actual: a.shape().to_vec(),
                        });
                    }
                }
                let a = match &spec.dtype {
                    Some(dtype) => coerce_array(dtype, a)?,
                    None => a,
                };
                DatasetValue::Array(a)
            }
            Value::Container(id) => DatasetValue::Ref(manager.build(store, tree, id, None)?),
            Value::ContainerList(ids) => DatasetValue::RefList(
                ids.into_iter()
                    .map(|id| manager.build(store, tree, id, None))
                    .collect::<MapResult<Vec<_>>>()?,
            ),
        };
        let node = tree.add_dataset(parent, name, data)?;
        let payload = tree.dataset_mut(node)?;
        payload.dtype = spec.dtype.clone();
        if let Some(ShapeSpec::Single(dims)) = &spec.shape {
            payload.maxshape = Some(dims.clone());
        }
        Ok(node)
    }

    /// Whether any mapped path under `prefix/` carries a value, deciding
    /// if an optional untyped subgroup materializes at all.
    fn subtree_in_use(
        &self,
        store: &ContainerStore,
        container: &Container,
        prefix: &str,
    ) -> MapResult<bool> {
        let nested = format!("{prefix}/");
        for path in self.field_map.keys() {
            if path.starts_with(&nested) && self.field_value(store, container, path)?.is_some() {
                return Ok(true);
            }
        }
        for path in self.overrides.field_values.keys() {
            if path.starts_with(&nested) && self.field_value(store, container, path)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ---- construct: builder subtree to container ----

    /// Read a builder subtree back into a container of this type.
    /// Typed children construct first through the manager; gathered
    /// values become constructor arguments by the reverse of the naming
    /// rules, with [`MapperOverrides::const_args`] applied last.
    pub fn construct(
        &self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        manager: &mut BuildManager,
        builder: BuilderId,
    ) -> MapResult<ContainerId> {
        debug!(key = %self.key, builder = %builder, "constructing container");
        let mut gathered: BTreeMap<String, Value> = BTreeMap::new();
        match self.spec.as_ref() {
            StorageSpec::Group(group) => {
                self.gather_group(store, tree, manager, group, "", builder, &mut gathered)?
            }
            StorageSpec::Dataset(dataset) => {
                if let Some(v) = self.dataset_payload(store, tree, manager, builder)? {
                    gathered.insert("data".to_string(), v);
                }
                self.gather_node_attributes(
                    store,
                    tree,
                    manager,
                    |name| dataset.get_attribute(name),
                    "",
                    builder,
                    &mut gathered,
                )?;
            }
        }

        let mut args = BTreeMap::new();
        for (path, value) in gathered {
            if let Some(arg) = self.arg_map.get(&path) {
                args.insert(arg.clone(), value);
            }
        }
        for (arg, hook) in &self.overrides.const_args {
            if let Some(v) = hook(tree, builder)? {
                args.insert(arg.clone(), v);
            }
        }

        let name = tree.require(builder)?.name.clone();
        let factory = Arc::clone(manager.type_map()).get_container_cls(&self.key)?;
        factory.construct(&name, args, store)
    }

    #[allow(clippy::too_many_arguments)]
    fn gather_group(
        &self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        manager: &mut BuildManager,
        group: &GroupSpec,
        prefix: &str,
        node: BuilderId,
        out: &mut BTreeMap<String, Value>,
    ) -> MapResult<()> {
        self.gather_node_attributes(
            store,
            tree,
            manager,
            |name| group.get_attribute(name),
            prefix,
            node,
            out,
        )?;

        let children: Vec<(String, BuilderId)> = tree
            .group(node)?
            .children
            .iter()
            .map(|(n, id)| (n.clone(), *id))
            .collect();
        for (child_name, child_id) in children {
            if tree.link(child_id).is_ok() {
                self.gather_link(store, tree, manager, group, prefix, &child_name, child_id, out)?;
            } else if tree.attribute(child_id, "data_type").is_some() {
                self.gather_typed_child(
                    store,
                    tree,
                    manager,
                    group,
                    prefix,
                    &child_name,
                    child_id,
                    out,
                )?;
            } else if tree.group(child_id).is_ok() {
                let Some(sub) = group.get_group(&child_name) else {
                    return Err(self.no_subspec(&child_name));
                };
                self.gather_group(store, tree, manager, sub, &join(prefix, &child_name), child_id, out)?;
            } else {
                let Some(spec) = group.get_dataset(&child_name) else {
                    return Err(self.no_subspec(&child_name));
                };
                let path = join(prefix, &child_name);
                if let Some(v) = self.dataset_payload(store, tree, manager, child_id)? {
                    out.insert(path.clone(), v);
                }
                self.gather_node_attributes(
                    store,
                    tree,
                    manager,
                    |name| spec.get_attribute(name),
                    &path,
                    child_id,
                    out,
                )?;
            }
        }
        Ok(())
    }

    /// Attributes of one builder node, keyed by spec path. Reserved and
    /// fixed-value attributes never reach the object; attributes the
    /// spec does not declare are ignored.
    #[allow(clippy::too_many_arguments)]
    fn gather_node_attributes<'s>(
        &self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        manager: &mut BuildManager,
        lookup: impl Fn(&str) -> Option<&'s AttributeSpec>,
        prefix: &str,
        node: BuilderId,
        out: &mut BTreeMap<String, Value>,
    ) -> MapResult<()> {
        let attributes: Vec<(String, AttrValue)> = match tree.group(node) {
            Ok(g) => g.attributes.iter().map(|(n, v)| (n.clone(), v.clone())).collect(),
            Err(_) => tree
                .dataset(node)?
                .attributes
                .iter()
                .map(|(n, v)| (n.clone(), v.clone()))
                .collect(),
        };
        for (name, av) in attributes {
            if RESERVED_ATTRIBUTES.contains(&name.as_str()) {
                continue;
            }
            let Some(spec) = lookup(&name) else {
                trace!(key = %self.key, attribute = %name, "ignoring undeclared attribute");
                continue;
            };
            if spec.value.is_some() {
                continue;
            }
            let value = match av {
                AttrValue::Scalar(s) => Value::Scalar(s),
                AttrValue::Array(a) => Value::Array(a),
                AttrValue::Ref(target) => {
                    Value::Container(manager.construct(store, tree, target)?)
                }
                AttrValue::RefList(targets) => Value::ContainerList(
                    targets
                        .into_iter()
                        .map(|t| manager.construct(store, tree, t))
                        .collect::<MapResult<Vec<_>>>()?,
                ),
            };
            out.insert(join(prefix, &name), value);
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn gather_typed_child(
        &self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        manager: &mut BuildManager,
        group: &GroupSpec,
        prefix: &str,
        child_name: &str,
        child_id: BuilderId,
        out: &mut BTreeMap<String, Value>,
    ) -> MapResult<()> {
        // a spec child fixed to this name wins over type matching
        let named = group
            .get_group(child_name)
            .map(TypedChild::Group)
            .filter(|tc| tc.self_data_type().is_some())
            .or_else(|| {
                group
                    .get_dataset(child_name)
                    .map(TypedChild::Dataset)
                    .filter(|tc| tc.self_data_type().is_some())
            });
        let matched = match named {
            Some(tc) => Some(tc),
            None => {
                let child_key = Arc::clone(manager.type_map()).get_cls(tree, child_id)?;
                let hierarchy = manager.type_map().hierarchy(&child_key)?;
                hierarchy.iter().find_map(|t| group.get_data_type(t))
            }
        };
        let Some(matched) = matched else {
            return Err(self.no_subspec(child_name));
        };
        let path = join(prefix, matched.key());
        let many = matched.quantity().is_many();
        let constructed = manager.construct(store, tree, child_id)?;
        push_container(out, path, constructed, many);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn gather_link(
        &self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        manager: &mut BuildManager,
        group: &GroupSpec,
        prefix: &str,
        child_name: &str,
        child_id: BuilderId,
        out: &mut BTreeMap<String, Value>,
    ) -> MapResult<()> {
        let target = tree.link(child_id)?.target;
        let spec = match group.get_link(child_name) {
            Some(l) => Some(l),
            None => {
                let target_key = Arc::clone(manager.type_map()).get_cls(tree, target)?;
                let hierarchy = manager.type_map().hierarchy(&target_key)?;
                group
                    .links
                    .iter()
                    .find(|l| hierarchy.iter().any(|t| t == &l.target_type))
            }
        };
        let Some(spec) = spec else {
            return Err(self.no_subspec(child_name));
        };
        let path = join(prefix, spec.key());
        let constructed = manager.construct(store, tree, target)?;
        push_container(out, path, constructed, spec.quantity.is_many());
        Ok(())
    }

    fn dataset_payload(
        &self,
        store: &mut ContainerStore,
        tree: &BuilderTree,
        manager: &mut BuildManager,
        node: BuilderId,
    ) -> MapResult<Option<Value>> {
        let value = match &tree.dataset(node)?.data {
            DatasetValue::Empty => None,
            DatasetValue::Scalar(s) => Some(Value::Scalar(s.clone())),
            DatasetValue::Array(a) => Some(Value::Array(a.clone())),
            DatasetValue::Ref(target) => {
                Some(Value::Container(manager.construct(store, tree, *target)?))
            }
            DatasetValue::RefList(targets) => Some(Value::ContainerList(
                targets
                    .clone()
                    .into_iter()
                    .map(|t| manager.construct(store, tree, t))
                    .collect::<MapResult<Vec<_>>>()?,
            )),
            DatasetValue::Chunked(_) => {
                return Err(MapError::Construction {
                    data_type: self.key.to_string(),
                    message: "chunked dataset data must be materialized before reading".to_string(),
                })
            }
        };
        Ok(value)
    }

    fn no_subspec(&self, child: &str) -> MapError {
        MapError::NoMatchingSubspec {
            parent: self.key.to_string(),
            child: child.to_string(),
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}/{name}")
    }
}

fn push_container(out: &mut BTreeMap<String, Value>, path: String, id: ContainerId, many: bool) {
    match out.get_mut(&path) {
        Some(Value::ContainerList(list)) => list.push(id),
        Some(_) => {}
        None => {
            let value = if many {
                Value::ContainerList(vec![id])
            } else {
                Value::Container(id)
            };
            out.insert(path, value);
        }
    }
}

fn coerce_scalar(
    declared: &DType,
    value: trellis_types::ScalarValue,
    path: &str,
) -> MapResult<trellis_types::ScalarValue> {
    let actual = value.dtype();
    if declared.accepts(&actual) {
        return Ok(value);
    }
    if *declared == DType::Text {
        return Ok(value.to_text()?);
    }
    Err(MapError::Value(trellis_types::TypeError::DTypeMismatch {
        expected: format!("{declared} at {path}"),
        actual: actual.to_string(),
    }))
}

fn coerce_array(declared: &DType, value: trellis_types::ArrayValue) -> MapResult<trellis_types::ArrayValue> {
    let actual = value.dtype();
    if declared.accepts(&actual) {
        return Ok(value);
    }
    if *declared == DType::Text {
        return Ok(value.to_text()?);
    }
    Err(MapError::Value(trellis_types::TypeError::DTypeMismatch {
        expected: declared.to_string(),
        actual: actual.to_string(),
    }))
}

fn shape_string(shape: &ShapeSpec) -> String {
    let alts: Vec<String> = shape
        .alternatives()
        .iter()
        .map(|alt| {
            let dims: Vec<String> = alt
                .iter()
                .map(|d| d.map_or_else(|| "null".to_string(), |v| v.to_string()))
                .collect();
            format!("[{}]", dims.join(", "))
        })
        .collect();
    alts.join(" | ")
}

#[cfg(test)]
mod tests {
    use trellis_spec::{AttributeSpec, DatasetSpec, GroupSpec, Quantity};
    use trellis_types::DType;

    use super::*;

    fn series_spec() -> Arc<StorageSpec> {
        Arc::new(StorageSpec::Group(
            GroupSpec::new("a measurement series")
                .with_data_type_def("Series")
                .with_attribute(AttributeSpec::new("rate", DType::Float64, "sampling rate"))
                .unwrap()
                .with_dataset(
                    DatasetSpec::new("the samples")
                        .with_name("values")
                        .with_dtype(DType::Float64)
                        .with_attribute(AttributeSpec::new("unit", DType::Text, "unit"))
                        .unwrap(),
                )
                .unwrap()
                .with_group(
                    GroupSpec::new("nested series")
                        .with_data_type_inc("Series")
                        .with_quantity(Quantity::ZeroOrMany),
                )
                .unwrap(),
        ))
    }

    #[test]
    fn default_maps_follow_naming_rules() {
        let mapper = ObjectMapper::new(
            TypeKey::new("core", "Series"),
            series_spec(),
            MapperOverrides::default(),
        );
        assert_eq!(mapper.field_name("rate"), Some("rate"));
        assert_eq!(mapper.field_name("values"), Some("values"));
        assert_eq!(mapper.field_name("values/unit"), Some("unit"));
        assert_eq!(mapper.field_name("Series"), Some("seriess"));
        assert_eq!(mapper.arg_name("rate"), Some("rate"));
    }

    #[test]
    fn renames_and_unmapped_paths_apply() {
        let overrides = MapperOverrides::default()
            .map_field("values", "samples")
            .constructor_arg_name("values", "raw_samples")
            .unmap("values/unit");
        let mapper = ObjectMapper::new(TypeKey::new("core", "Series"), series_spec(), overrides);
        assert_eq!(mapper.field_name("values"), Some("samples"));
        assert_eq!(mapper.arg_name("values"), Some("raw_samples"));
        assert_eq!(mapper.field_name("values/unit"), None);
        assert_eq!(mapper.arg_name("values/unit"), None);
    }

    #[test]
    fn arg_name_defaults_to_field_rename() {
        let overrides = MapperOverrides::default().map_field("rate", "sampling_rate");
        let mapper = ObjectMapper::new(TypeKey::new("core", "Series"), series_spec(), overrides);
        assert_eq!(mapper.arg_name("rate"), Some("sampling_rate"));
    }
}
