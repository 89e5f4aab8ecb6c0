use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use trellis_build::BuilderTree;
use trellis_container::ContainerStore;
use trellis_io::StorageBackend;
use trellis_map::{BuildManager, FieldArgs, TypeMap};
use trellis_types::{ContainerId, TypeKey, Value};

use crate::error::{SdkError, SdkResult};

/// High-level entry point: one object graph bound to one type map.
///
/// A workspace owns the [`ContainerStore`] holding the domain objects
/// and shares a [`TypeMap`] describing their types. `create` instantiates
/// objects through the registered (or synthesized) factories; `export`
/// and `import` each run one mapping session against a storage backend.
pub struct Workspace {
    type_map: Arc<TypeMap>,
    store: ContainerStore,
}

impl Workspace {
    pub fn new(type_map: Arc<TypeMap>) -> Self {
        Self {
            type_map,
            store: ContainerStore::new(),
        }
    }

    /// Load a namespace document and open a workspace over it.
    pub fn from_namespace_file(path: &Path) -> SdkResult<Self> {
        let type_map = TypeMap::new();
        type_map.load_namespace_file(path)?;
        Ok(Self::new(Arc::new(type_map)))
    }

    pub fn type_map(&self) -> &Arc<TypeMap> {
        &self.type_map
    }

    pub fn store(&self) -> &ContainerStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ContainerStore {
        &mut self.store
    }

    /// Instantiate a registered data type with the given fields.
    pub fn create(
        &mut self,
        namespace: &str,
        data_type: &str,
        name: &str,
        fields: FieldArgs,
    ) -> SdkResult<ContainerId> {
        let key = TypeKey::new(namespace, data_type);
        let factory = self.type_map.get_container_cls(&key)?;
        let id = factory.construct(name, fields, &mut self.store)?;
        debug!(%key, %id, name, "created container");
        Ok(id)
    }

    /// A field of a stored container.
    pub fn field(&self, container: ContainerId, name: &str) -> SdkResult<&Value> {
        let record = self.store.require(container)?;
        record
            .get_field(name)
            .ok_or_else(|| SdkError::FieldNotFound {
                container,
                field: name.to_string(),
            })
    }

    /// Map a container to builder form and hand it to the backend.
    pub fn export(
        &self,
        backend: &mut impl StorageBackend,
        container: ContainerId,
    ) -> SdkResult<()> {
        let mut manager = BuildManager::new(Arc::clone(&self.type_map));
        let mut tree = BuilderTree::new();
        backend.write(&self.store, &mut manager, &mut tree, container)?;
        debug!(source = backend.source(), %container, "exported container");
        Ok(())
    }

    /// Read the backend's typed root into this workspace's store.
    pub fn import(&mut self, backend: &impl StorageBackend) -> SdkResult<ContainerId> {
        let mut manager = BuildManager::new(Arc::clone(&self.type_map));
        let id = backend.read(&mut self.store, &mut manager)?;
        debug!(source = backend.source(), %id, "imported container");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use proptest::prelude::*;
    use trellis_io::{IoError, MemoryBackend};
    use trellis_map::MapError;
    use trellis_spec::{
        AttributeSpec, DatasetSpec, GroupSpec, LinkSpec, NamespaceCatalog, NamespaceMeta,
        Quantity, SpecCatalog, SpecNamespace, StorageSpec,
    };
    use trellis_types::{ArrayData, ArrayValue, DType};

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

    fn lab_type_map() -> Arc<TypeMap> {
        let mut catalog = SpecCatalog::new();
        catalog
            .register_spec(
                StorageSpec::Group(
                    GroupSpec::new("recording hardware")
                        .with_data_type_def("Device")
                        .with_attribute(
                            AttributeSpec::new("serial", DType::Text, "serial number").optional(),
                        )
                        .unwrap(),
                ),
                None,
            )
            .unwrap();
        catalog
            .register_spec(
                StorageSpec::Group(
                    GroupSpec::new("a sampled series")
                        .with_data_type_def("Series")
                        .with_attribute(AttributeSpec::new(
                            "rate",
                            DType::Float64,
                            "sampling rate",
                        ))
                        .unwrap()
                        .with_dataset(
                            DatasetSpec::new("the samples")
                                .with_name("values")
                                .with_dtype(DType::Float64)
                                .with_attribute(AttributeSpec::new(
                                    "unit",
                                    DType::Text,
                                    "unit of measure",
                                ))
                                .unwrap(),
                        )
                        .unwrap()
                        .with_link(
                            LinkSpec::new("Device", "device that produced the series")
                                .with_quantity(Quantity::ZeroOrOne),
                        )
                        .unwrap(),
                ),
                None,
            )
            .unwrap();
        catalog
            .register_spec(
                StorageSpec::Group(
                    GroupSpec::new("one recording session")
                        .with_data_type_def("Session")
                        .with_attribute(AttributeSpec::new(
                            "description",
                            DType::Text,
                            "what happened",
                        ))
                        .unwrap()
                        .with_group(
                            GroupSpec::new("acquired data")
                                .with_name("acquisition")
                                .with_group(
                                    GroupSpec::new("series acquired in-session")
                                        .with_data_type_inc("Series")
                                        .with_quantity(Quantity::ZeroOrMany),
                                )
                                .unwrap(),
                        )
                        .unwrap()
                        .with_group(
                            GroupSpec::new("hardware inventory")
                                .with_name("devices")
                                .with_quantity(Quantity::ZeroOrOne)
                                .with_group(
                                    GroupSpec::new("devices used")
                                        .with_data_type_inc("Device")
                                        .with_quantity(Quantity::ZeroOrMany),
                                )
                                .unwrap(),
                        )
                        .unwrap(),
                ),
                None,
            )
            .unwrap();
        let mut namespaces = NamespaceCatalog::new();
        namespaces
            .add_namespace(SpecNamespace::new(meta("lab"), catalog))
            .unwrap();
        Arc::new(TypeMap::with_namespaces(namespaces))
    }

    fn args(pairs: Vec<(&str, Value)>) -> FieldArgs {
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn samples(values: Vec<f64>) -> Value {
        Value::Array(ArrayValue::one_dim(ArrayData::Float(values)))
    }

    fn session_fixture(ws: &mut Workspace, rate: f64, description: &str) -> ContainerId {
        let device = ws
            .create(
                "lab",
                "Device",
                "probe0",
                args(vec![("serial", Value::text("A-17"))]),
            )
            .unwrap();
        let series = ws
            .create(
                "lab",
                "Series",
                "s1",
                args(vec![
                    ("rate", Value::from(rate)),
                    ("values", samples(vec![0.1, 0.2, 0.3])),
                    ("unit", Value::text("volts")),
                    ("device", Value::Container(device)),
                ]),
            )
            .unwrap();
        ws.create(
            "lab",
            "Session",
            "sess",
            args(vec![
                ("description", Value::text(description)),
                ("seriess", Value::ContainerList(vec![series])),
                ("devices", Value::ContainerList(vec![device])),
            ]),
        )
        .unwrap()
    }

    #[test]
    fn create_goes_through_the_synthesized_factory() {
        let mut ws = Workspace::new(lab_type_map());
        let device = ws
            .create(
                "lab",
                "Device",
                "probe0",
                args(vec![("serial", Value::text("A-17"))]),
            )
            .unwrap();
        assert_eq!(ws.field(device, "serial").unwrap(), &Value::text("A-17"));
        assert!(matches!(
            ws.field(device, "firmware"),
            Err(SdkError::FieldNotFound { .. })
        ));

        let err = ws
            .create("lab", "Series", "s1", args(vec![]))
            .unwrap_err();
        assert!(matches!(
            err,
            SdkError::Map(MapError::MissingRequiredField { .. })
        ));
    }

    #[test]
    fn export_import_round_trip_preserves_the_graph() {
        let mut writer = Workspace::new(lab_type_map());
        let session = session_fixture(&mut writer, 1000.0, "baseline recording");
        let original_oid = writer.store().get(session).unwrap().object_id;

        let mut backend = MemoryBackend::new("session.mem");
        writer.export(&mut backend, session).unwrap();

        let mut reader = Workspace::new(lab_type_map());
        let read = reader.import(&backend).unwrap();
        assert_eq!(reader.store().get(read).unwrap().object_id, original_oid);
        assert_eq!(
            reader.field(read, "description").unwrap(),
            &Value::text("baseline recording")
        );

        let series = reader.field(read, "seriess").unwrap().as_containers().unwrap()[0];
        assert_eq!(
            reader.field(series, "values").unwrap(),
            &samples(vec![0.1, 0.2, 0.3])
        );
        // the series link and the inventory name one container
        let linked = reader.field(series, "device").unwrap().as_containers().unwrap()[0];
        let inventory = reader.field(read, "devices").unwrap().as_containers().unwrap();
        assert_eq!(inventory, vec![linked]);
    }

    #[test]
    fn reexport_keeps_object_identity_across_hops() {
        let mut writer = Workspace::new(lab_type_map());
        let session = session_fixture(&mut writer, 500.0, "hop one");
        let original_oid = writer.store().get(session).unwrap().object_id;

        let mut first = MemoryBackend::new("a.mem");
        writer.export(&mut first, session).unwrap();

        let mut middle = Workspace::new(lab_type_map());
        let imported = middle.import(&first).unwrap();

        let mut second = MemoryBackend::new("b.mem");
        middle.export(&mut second, imported).unwrap();

        let mut reader = Workspace::new(lab_type_map());
        let read = reader.import(&second).unwrap();
        assert_eq!(reader.store().get(read).unwrap().object_id, original_oid);
    }

    #[test]
    fn importing_an_unwritten_backend_fails() {
        let mut ws = Workspace::new(lab_type_map());
        let backend = MemoryBackend::new("empty.mem");
        assert!(matches!(
            ws.import(&backend),
            Err(SdkError::Io(IoError::Empty { .. }))
        ));
    }

    const CORE_TYPES: &str = r#"
specs:
- doc: a recording block
  data_type_def: Block
  attributes:
  - name: label
    doc: display label
    dtype: text
"#;

    const CORE_NAMESPACE: &str = r#"
namespaces:
- name: core
  doc: core test types
  version: "1.0.0"
  schema:
  - source: core.types.yaml
"#;

    #[test]
    fn opens_a_workspace_from_a_namespace_file() {
        let dir = tempfile::tempdir().unwrap();
        for (name, text) in [
            ("core.types.yaml", CORE_TYPES),
            ("core.namespace.yaml", CORE_NAMESPACE),
        ] {
            let mut file = std::fs::File::create(dir.path().join(name)).unwrap();
            file.write_all(text.as_bytes()).unwrap();
        }

        let mut ws = Workspace::from_namespace_file(&dir.path().join("core.namespace.yaml"))
            .unwrap();
        assert_eq!(ws.type_map().namespaces(), vec!["core".to_string()]);
        let block = ws
            .create(
                "core",
                "Block",
                "b0",
                args(vec![("label", Value::text("first"))]),
            )
            .unwrap();
        assert_eq!(ws.field(block, "label").unwrap(), &Value::text("first"));
    }

    proptest! {
        #[test]
        fn round_trip_preserves_arbitrary_field_values(
            rate in 0.0f64..1e6,
            description in "[a-zA-Z0-9 ]{1,40}",
        ) {
            let mut writer = Workspace::new(lab_type_map());
            let session = session_fixture(&mut writer, rate, &description);

            let mut backend = MemoryBackend::new("prop.mem");
            writer.export(&mut backend, session).unwrap();

            let mut reader = Workspace::new(lab_type_map());
            let read = reader.import(&backend).unwrap();
            prop_assert_eq!(
                reader.field(read, "description").unwrap(),
                &Value::text(description)
            );
            let series = reader.field(read, "seriess").unwrap().as_containers().unwrap()[0];
            prop_assert_eq!(reader.field(series, "rate").unwrap(), &Value::from(rate));
        }
    }
}
