use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::{debug, trace};
use trellis_build::{AttrValue, BuilderTree};
use trellis_spec::{NamespaceCatalog, SpecNamespace, StorageSpec};
use trellis_types::{BuilderId, TypeKey};

use crate::error::{MapError, MapResult};
use crate::mapper::{MapperOverrides, ObjectMapper};
use crate::synth::{ContainerClass, ContainerFactory, FieldDescriptor, FieldKind};
use crate::walk::collect_entries;

#[derive(Default)]
struct TypeMapState {
    /// Hand-registered implementations, by canonical key.
    factories: BTreeMap<TypeKey, Arc<dyn ContainerFactory>>,
    /// Imported types: the key under the importing namespace points at
    /// the key under the declaring one.
    aliases: BTreeMap<TypeKey, TypeKey>,
    overrides: BTreeMap<TypeKey, MapperOverrides>,
    /// Memoized synthesized classes; invalidated by registrations.
    classes: BTreeMap<TypeKey, Arc<dyn ContainerFactory>>,
    /// Memoized mappers; invalidated by registrations.
    mappers: BTreeMap<TypeKey, Arc<ObjectMapper>>,
}

/// Registry binding registered data types to their implementation
/// factories and object mappers.
///
/// The type map owns the loaded namespaces and answers three questions:
/// which factory instantiates a type ([`get_container_cls`], synthesizing
/// a [`ContainerClass`] when none was registered), which mapper
/// translates it ([`get_map`]), and which type a builder claims to be
/// ([`get_cls`]). All lookups are memoized; interior locks make the map
/// shareable behind `Arc` without external synchronization.
///
/// [`get_container_cls`]: TypeMap::get_container_cls
/// [`get_map`]: TypeMap::get_map
/// [`get_cls`]: TypeMap::get_cls
pub struct TypeMap {
    namespaces: RwLock<NamespaceCatalog>,
    state: RwLock<TypeMapState>,
}

impl Default for TypeMap {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeMap {
    pub fn new() -> Self {
        Self::with_namespaces(NamespaceCatalog::new())
    }

    /// Wrap an already-loaded namespace catalog.
    pub fn with_namespaces(namespaces: NamespaceCatalog) -> Self {
        let map = Self {
            namespaces: RwLock::new(namespaces),
            state: RwLock::new(TypeMapState::default()),
        };
        map.refresh_aliases();
        map
    }

    /// Load a namespace document from disk, registering every namespace
    /// it defines. Returns, per namespace, the types registered.
    pub fn load_namespace_file(
        &self,
        path: &Path,
    ) -> MapResult<BTreeMap<String, Vec<String>>> {
        let registered = self
            .namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .load_namespace_file(path)?;
        self.refresh_aliases();
        debug!(path = %path.display(), namespaces = registered.len(), "loaded namespace document");
        Ok(registered)
    }

    /// Register a programmatically assembled namespace.
    pub fn register_namespace(&self, namespace: SpecNamespace) -> MapResult<()> {
        self.namespaces
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .add_namespace(namespace)?;
        self.refresh_aliases();
        Ok(())
    }

    /// Re-derive the import alias table from the loaded namespaces.
    fn refresh_aliases(&self) {
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        for name in namespaces.namespaces() {
            let Some(ns) = namespaces.get_namespace(&name) else {
                continue;
            };
            for (data_type, from) in ns.imports() {
                state.aliases.insert(
                    TypeKey::new(name.clone(), data_type.clone()),
                    TypeKey::new(from.clone(), data_type.clone()),
                );
            }
        }
    }

    /// Bind a hand-written implementation to its type.
    pub fn register_container_factory(&self, factory: Arc<dyn ContainerFactory>) {
        let key = factory.key().clone();
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        debug!(key = %key, "registered container factory");
        state.factories.insert(key, factory);
        state.classes.clear();
        state.mappers.clear();
    }

    /// Declare that a type is defined in another namespace. Namespace
    /// imports register these automatically; this is the manual form.
    pub fn register_type_source(&self, key: TypeKey, namespace: impl Into<String>) {
        let from = TypeKey::new(namespace, key.data_type.clone());
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        debug!(key = %key, from = %from, "registered type source");
        state.aliases.insert(key, from);
        state.classes.clear();
        state.mappers.clear();
    }

    /// Register mapping deviations for a type; they apply to its
    /// subtypes too unless a nearer registration shadows them.
    pub fn register_map_overrides(&self, key: TypeKey, overrides: MapperOverrides) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        debug!(key = %key, "registered mapper overrides");
        state.overrides.insert(key, overrides);
        state.classes.clear();
        state.mappers.clear();
    }

    /// Resolve import aliases down to the declaring namespace.
    fn canonical(&self, key: &TypeKey) -> MapResult<TypeKey> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut current = key.clone();
        let mut seen = BTreeSet::new();
        while let Some(next) = state.aliases.get(&current) {
            if !seen.insert(current.clone()) {
                return Err(MapError::UnresolvedType {
                    key: key.to_string(),
                });
            }
            current = next.clone();
        }
        Ok(current)
    }

    /// The resolved spec of a type.
    pub fn get_spec(&self, key: &TypeKey) -> MapResult<Arc<StorageSpec>> {
        let key = self.canonical(key)?;
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        Ok(namespaces.get_spec(&key.namespace, &key.data_type)?)
    }

    /// The ancestor chain of a type, the type itself first.
    pub fn hierarchy(&self, key: &TypeKey) -> MapResult<Arc<[String]>> {
        let key = self.canonical(key)?;
        let namespaces = self.namespaces.read().unwrap_or_else(PoisonError::into_inner);
        Ok(namespaces.get_hierarchy(&key.namespace, &key.data_type)?)
    }

    /// A loaded namespace by name.
    pub fn get_namespace(&self, name: &str) -> Option<Arc<SpecNamespace>> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get_namespace(name)
    }

    /// Names of every loaded namespace.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .namespaces()
    }

    /// The factory instantiating a type: the registered implementation
    /// when one exists, a synthesized class otherwise. Synthesized
    /// classes take their base fields from the parent type's factory, so
    /// a hand-written ancestor shapes every synthesized descendant.
    pub fn get_container_cls(&self, key: &TypeKey) -> MapResult<Arc<dyn ContainerFactory>> {
        let key = self.canonical(key)?;
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(factory) = state.factories.get(&key) {
                return Ok(Arc::clone(factory));
            }
            if let Some(class) = state.classes.get(&key) {
                return Ok(Arc::clone(class));
            }
        }

        let spec = self.get_spec(&key)?;
        let hierarchy = self.hierarchy(&key)?;
        let base = match hierarchy.get(1) {
            Some(parent) => {
                let parent_key = self.canonical(&TypeKey::new(key.namespace.clone(), parent))?;
                Some((parent_key.clone(), self.get_container_cls(&parent_key)?))
            }
            None => None,
        };
        let overrides = self.resolved_overrides(&key)?;
        let own = descriptors_for(&spec, &overrides);
        let (base_key, base_fields) = match &base {
            Some((k, factory)) => (Some(k.clone()), factory.fields()),
            None => (None, &[][..]),
        };
        let class: Arc<dyn ContainerFactory> =
            Arc::new(ContainerClass::new(key.clone(), base_key, base_fields, own));
        trace!(key = %key, "cached synthesized class");
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .classes
            .insert(key, Arc::clone(&class));
        Ok(class)
    }

    /// The mapper for a type, derived from its resolved spec and the
    /// nearest registered overrides along its hierarchy.
    pub fn get_map(&self, key: &TypeKey) -> MapResult<Arc<ObjectMapper>> {
        let key = self.canonical(key)?;
        {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(mapper) = state.mappers.get(&key) {
                return Ok(Arc::clone(mapper));
            }
        }
        let spec = self.get_spec(&key)?;
        let overrides = self.resolved_overrides(&key)?;
        let mapper = Arc::new(ObjectMapper::new(key.clone(), spec, overrides));
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .mappers
            .insert(key, Arc::clone(&mapper));
        Ok(mapper)
    }

    /// The most specific overrides registered along the type's ancestor
    /// chain, the type itself first.
    fn resolved_overrides(&self, key: &TypeKey) -> MapResult<MapperOverrides> {
        let hierarchy = self.hierarchy(key)?;
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        for data_type in hierarchy.iter() {
            let candidate = TypeKey::new(key.namespace.clone(), data_type.clone());
            if let Some(overrides) = state.overrides.get(&candidate) {
                return Ok(overrides.clone());
            }
        }
        Ok(MapperOverrides::default())
    }

    /// The type a builder claims via its reserved `namespace` and
    /// `data_type` attributes.
    pub fn get_cls(&self, tree: &BuilderTree, builder: BuilderId) -> MapResult<TypeKey> {
        let namespace = tree
            .attribute(builder, "namespace")
            .and_then(AttrValue::as_text);
        let data_type = tree
            .attribute(builder, "data_type")
            .and_then(AttrValue::as_text);
        match (namespace, data_type) {
            (Some(ns), Some(dt)) => Ok(TypeKey::new(ns, dt)),
            _ => Err(MapError::UntypedBuilder {
                path: tree.path(builder),
            }),
        }
    }
}

/// Constructor fields a spec contributes, named the way the type's
/// mapper will name its arguments.
fn descriptors_for(spec: &StorageSpec, overrides: &MapperOverrides) -> Vec<FieldDescriptor> {
    let mut fields = Vec::new();
    for entry in collect_entries(spec) {
        if overrides.unmapped.contains(&entry.path) {
            continue;
        }
        let name = overrides
            .arg_renames
            .get(&entry.path)
            .or_else(|| overrides.field_renames.get(&entry.path))
            .cloned()
            .unwrap_or(entry.field);
        fields.push(FieldDescriptor {
            name,
            doc: entry.doc,
            required: entry.required,
            kind: entry.kind,
        });
    }
    // hook-supplied arguments must be declared, or construction rejects
    // them as unknown
    for arg in overrides.const_args.keys() {
        if !fields.iter().any(|f| &f.name == arg) {
            fields.push(FieldDescriptor {
                name: arg.clone(),
                doc: "derived constructor argument".to_string(),
                required: false,
                kind: FieldKind::Attribute,
            });
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use trellis_spec::{
        AttributeSpec, DatasetSpec, GroupSpec, NamespaceMeta, Quantity, SpecCatalog,
    };
    use trellis_types::DType;

    use super::*;

    fn meta(name: &str) -> NamespaceMeta {
        NamespaceMeta {
            name: name.to_string(),
            doc: format!("{name} test namespace"),
            full_name: None,
            version: Some("0.1.0".to_string()),
            date: None,
            authors: Vec::new(),
            contacts: Vec::new(),
            schema: Vec::new(),
        }
    }

    fn core_map() -> TypeMap {
        let mut catalog = SpecCatalog::new();
        catalog
            .register_spec(
                StorageSpec::Group(
                    GroupSpec::new("base container")
                        .with_data_type_def("Base")
                        .with_attribute(
                            AttributeSpec::new("comment", DType::Text, "free text").optional(),
                        )
                        .unwrap(),
                ),
                None,
            )
            .unwrap();
        catalog
            .register_spec(
                StorageSpec::Group(
                    GroupSpec::new("series of samples")
                        .with_data_type_def("Series")
                        .with_data_type_inc("Base")
                        .with_dataset(
                            DatasetSpec::new("samples")
                                .with_name("values")
                                .with_dtype(DType::Float64),
                        )
                        .unwrap(),
                ),
                None,
            )
            .unwrap();
        catalog.resolve_all().unwrap();
        let mut namespaces = NamespaceCatalog::new();
        namespaces
            .add_namespace(SpecNamespace::new(meta("core"), catalog))
            .unwrap();
        TypeMap::with_namespaces(namespaces)
    }

    #[test]
    fn synthesized_classes_inherit_base_fields() {
        let map = core_map();
        let class = map.get_container_cls(&TypeKey::new("core", "Series")).unwrap();
        let names: Vec<&str> = class.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["comment", "values"]);
        assert_eq!(class.base().unwrap().data_type, "Base");
    }

    #[test]
    fn factories_and_mappers_are_memoized() {
        let map = core_map();
        let key = TypeKey::new("core", "Series");
        let a = map.get_container_cls(&key).unwrap();
        let b = map.get_container_cls(&key).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let m1 = map.get_map(&key).unwrap();
        let m2 = map.get_map(&key).unwrap();
        assert!(Arc::ptr_eq(&m1, &m2));
    }

    #[test]
    fn overrides_flow_down_the_hierarchy() {
        let map = core_map();
        let overrides = MapperOverrides::default().map_field("comment", "note");
        map.register_map_overrides(TypeKey::new("core", "Base"), overrides);
        let mapper = map.get_map(&TypeKey::new("core", "Series")).unwrap();
        assert_eq!(mapper.field_name("comment"), Some("note"));
        let class = map.get_container_cls(&TypeKey::new("core", "Series")).unwrap();
        assert!(class.fields().iter().any(|f| f.name == "note"));
    }

    #[test]
    fn type_sources_resolve_to_the_declaring_namespace() {
        let map = core_map();
        map.register_type_source(TypeKey::new("ext", "Series"), "core");
        let spec = map.get_spec(&TypeKey::new("ext", "Series")).unwrap();
        assert_eq!(spec.data_type_def(), Some("Series"));
        let class = map.get_container_cls(&TypeKey::new("ext", "Series")).unwrap();
        assert_eq!(class.key(), &TypeKey::new("core", "Series"));
    }

    #[test]
    fn unknown_types_fail_lookup() {
        let map = core_map();
        assert!(map.get_spec(&TypeKey::new("core", "Missing")).is_err());
        assert!(map.get_map(&TypeKey::new("nope", "Series")).is_err());
    }

    #[test]
    fn builder_type_resolution_requires_reserved_attributes() {
        let map = core_map();
        let mut tree = BuilderTree::new();
        let node = tree.add_group(None, "thing").unwrap();
        assert!(matches!(
            map.get_cls(&tree, node),
            Err(MapError::UntypedBuilder { .. })
        ));
        tree.set_attribute(node, "namespace", AttrValue::text("core"))
            .unwrap();
        tree.set_attribute(node, "data_type", AttrValue::text("Series"))
            .unwrap();
        assert_eq!(map.get_cls(&tree, node).unwrap(), TypeKey::new("core", "Series"));
    }
}
