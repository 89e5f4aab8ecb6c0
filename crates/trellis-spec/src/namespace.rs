use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::catalog::SpecCatalog;
use crate::error::{SpecError, SpecResult};
use crate::storage::StorageSpec;

/// Document format of a namespace or spec file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocFormat {
    Yaml,
    Json,
}

impl DocFormat {
    /// Pick the format from a file extension; YAML is the default.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// One entry of a namespace's `schema` list: load types from a sibling
/// spec file, or import them from an already-registered namespace.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SchemaEntry {
    Source {
        source: String,
        #[serde(
            default,
            alias = "neurodata_types",
            skip_serializing_if = "Option::is_none"
        )]
        data_types: Option<Vec<String>>,
    },
    Include {
        namespace: String,
        #[serde(
            default,
            alias = "neurodata_types",
            skip_serializing_if = "Option::is_none"
        )]
        data_types: Option<Vec<String>>,
    },
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
    })
}

/// Namespace metadata as it appears in a namespace document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespaceMeta {
    pub name: String,
    pub doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<DateTime<Utc>>,
    #[serde(
        default,
        alias = "author",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub authors: Vec<String>,
    #[serde(
        default,
        alias = "contact",
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub contacts: Vec<String>,
    pub schema: Vec<SchemaEntry>,
}

/// Top-level namespace document: a list of namespace definitions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamespaceDocument {
    pub namespaces: Vec<NamespaceMeta>,
}

/// A loaded, versioned namespace: metadata plus the catalog of every type
/// it registered, and the provenance of types imported from dependencies.
#[derive(Debug)]
pub struct SpecNamespace {
    meta: NamespaceMeta,
    catalog: SpecCatalog,
    imports: BTreeMap<String, String>,
}

impl SpecNamespace {
    /// Build a namespace directly from metadata and a filled catalog.
    ///
    /// Namespace documents go through [`NamespaceCatalog`]; this is the
    /// constructor for programmatically assembled schemas.
    pub fn new(meta: NamespaceMeta, catalog: SpecCatalog) -> Self {
        Self {
            meta,
            catalog,
            imports: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn version(&self) -> Option<&str> {
        self.meta.version.as_deref()
    }

    pub fn meta(&self) -> &NamespaceMeta {
        &self.meta
    }

    /// The catalog of every type this namespace registered.
    pub fn catalog(&self) -> &SpecCatalog {
        &self.catalog
    }

    /// For each imported type, the namespace it came from.
    pub fn imports(&self) -> &BTreeMap<String, String> {
        &self.imports
    }

    pub fn get_spec(&self, data_type: &str) -> Option<Arc<StorageSpec>> {
        self.catalog.get_spec(data_type)
    }

    pub fn get_hierarchy(&self, data_type: &str) -> SpecResult<Arc<[String]>> {
        self.catalog.get_hierarchy(data_type)
    }
}

/// Registry of loaded namespaces plus a spec-file cache so one file
/// referenced by several namespaces parses once.
#[derive(Debug, Default)]
pub struct NamespaceCatalog {
    namespaces: BTreeMap<String, Arc<SpecNamespace>>,
    file_cache: HashMap<PathBuf, Arc<Vec<StorageSpec>>>,
}

impl NamespaceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a namespace document from disk; format follows the file
    /// extension. Returns, per namespace, the types it registered
    /// (including imported ones).
    pub fn load_namespace_file(
        &mut self,
        path: &Path,
    ) -> SpecResult<BTreeMap<String, Vec<String>>> {
        let text = std::fs::read_to_string(path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.load_namespaces_str(&text, dir, DocFormat::from_path(path))
    }

    /// Load a namespace document from text; `dir` anchors relative
    /// `source` entries.
    pub fn load_namespaces_str(
        &mut self,
        text: &str,
        dir: &Path,
        format: DocFormat,
    ) -> SpecResult<BTreeMap<String, Vec<String>>> {
        let document: NamespaceDocument = match format {
            DocFormat::Yaml => serde_yaml::from_str(text)?,
            DocFormat::Json => serde_json::from_str(text)?,
        };
        let mut registered = BTreeMap::new();
        for meta in document.namespaces {
            if let Some(existing) = self.namespaces.get(&meta.name) {
                if existing.version() == meta.version.as_deref() {
                    // re-load of a known namespace is a no-op
                    registered.insert(meta.name.clone(), existing.catalog.registered_types());
                    continue;
                }
                return Err(SpecError::NamespaceVersionConflict {
                    namespace: meta.name.clone(),
                    registered: existing.version().unwrap_or("<none>").to_string(),
                    offered: meta.version.as_deref().unwrap_or("<none>").to_string(),
                });
            }
            let namespace = self.load_one(&meta, dir)?;
            registered.insert(meta.name.clone(), namespace.catalog.registered_types());
            debug!(
                namespace = %meta.name,
                version = ?meta.version,
                types = namespace.catalog.registered_types().len(),
                "loaded namespace"
            );
            self.namespaces.insert(meta.name.clone(), Arc::new(namespace));
        }
        Ok(registered)
    }

    fn load_one(&mut self, meta: &NamespaceMeta, dir: &Path) -> SpecResult<SpecNamespace> {
        let mut catalog = SpecCatalog::new();
        let mut imports = BTreeMap::new();
        for entry in &meta.schema {
            match entry {
                SchemaEntry::Source { source, data_types } => {
                    let path = dir.join(source);
                    let specs = self.load_spec_file(&path)?;
                    for spec in specs.iter() {
                        if let Some(filter) = data_types {
                            match spec.data_type_def() {
                                Some(def) if filter.iter().any(|t| t == def) => {}
                                _ => continue,
                            }
                        }
                        catalog.auto_register(spec, Some(source))?;
                    }
                }
                SchemaEntry::Include {
                    namespace,
                    data_types,
                } => {
                    let dep = self.namespaces.get(namespace).ok_or_else(|| {
                        SpecError::UnknownNamespace {
                            namespace: namespace.clone(),
                        }
                    })?;
                    let wanted = match data_types {
                        Some(list) => list.clone(),
                        None => dep.catalog.registered_types(),
                    };
                    for data_type in wanted {
                        let spec = dep.catalog.get_spec(&data_type).ok_or_else(|| {
                            SpecError::UnknownType {
                                data_type: data_type.clone(),
                            }
                        })?;
                        catalog.register_spec((*spec).clone(), dep.catalog.spec_source(&data_type))?;
                        imports.insert(data_type, namespace.clone());
                    }
                }
            }
        }
        catalog.resolve_all()?;
        Ok(SpecNamespace {
            meta: meta.clone(),
            catalog,
            imports,
        })
    }

    fn load_spec_file(&mut self, path: &Path) -> SpecResult<Arc<Vec<StorageSpec>>> {
        if let Some(cached) = self.file_cache.get(path) {
            return Ok(cached.clone());
        }
        let text = std::fs::read_to_string(path)?;

        #[derive(Deserialize)]
        struct SpecDocument {
            specs: Vec<StorageSpec>,
        }

        let document: SpecDocument = match DocFormat::from_path(path) {
            DocFormat::Yaml => serde_yaml::from_str(&text)?,
            DocFormat::Json => serde_json::from_str(&text)?,
        };
        for spec in &document.specs {
            spec.validate()?;
        }
        let specs = Arc::new(document.specs);
        self.file_cache.insert(path.to_path_buf(), specs.clone());
        Ok(specs)
    }

    /// Register a programmatically assembled namespace.
    pub fn add_namespace(&mut self, namespace: SpecNamespace) -> SpecResult<()> {
        if let Some(existing) = self.namespaces.get(namespace.name()) {
            if existing.version() == namespace.version() {
                return Ok(());
            }
            return Err(SpecError::NamespaceVersionConflict {
                namespace: namespace.name().to_string(),
                registered: existing.version().unwrap_or("<none>").to_string(),
                offered: namespace.version().unwrap_or("<none>").to_string(),
            });
        }
        self.namespaces
            .insert(namespace.name().to_string(), Arc::new(namespace));
        Ok(())
    }

    /// The loaded namespace with the given name, if any.
    pub fn get_namespace(&self, name: &str) -> Option<Arc<SpecNamespace>> {
        self.namespaces.get(name).cloned()
    }

    /// Names of every loaded namespace, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.keys().cloned().collect()
    }

    /// The spec for a type within a namespace.
    pub fn get_spec(&self, namespace: &str, data_type: &str) -> SpecResult<Arc<StorageSpec>> {
        let ns = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| SpecError::UnknownNamespace {
                namespace: namespace.to_string(),
            })?;
        ns.get_spec(data_type).ok_or_else(|| SpecError::UnknownType {
            data_type: data_type.to_string(),
        })
    }

    /// The ancestor chain for a type within a namespace.
    pub fn get_hierarchy(&self, namespace: &str, data_type: &str) -> SpecResult<Arc<[String]>> {
        let ns = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| SpecError::UnknownNamespace {
                namespace: namespace.to_string(),
            })?;
        ns.get_hierarchy(data_type)
    }

    /// Fold another catalog's namespaces into this one. Same-version
    /// duplicates are skipped; version conflicts are errors.
    pub fn merge(&mut self, other: NamespaceCatalog) -> SpecResult<()> {
        for (name, namespace) in other.namespaces {
            match self.namespaces.get(&name) {
                Some(existing) if existing.version() == namespace.version() => {}
                Some(existing) => {
                    return Err(SpecError::NamespaceVersionConflict {
                        namespace: name,
                        registered: existing.version().unwrap_or("<none>").to_string(),
                        offered: namespace.version().unwrap_or("<none>").to_string(),
                    })
                }
                None => {
                    self.namespaces.insert(name, namespace);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const CORE_TYPES: &str = r#"
specs:
- doc: a recording block
  data_type_def: Block
  attributes:
  - name: label
    doc: display label
    dtype: text
  datasets:
  - doc: typed series
    data_type_def: Series
    dtype: float64
- doc: a block with a rate
  data_type_def: TimedBlock
  data_type_inc: Block
  attributes:
  - name: rate
    doc: sampling rate
    dtype: float64
"#;

    const CORE_NAMESPACE: &str = r#"
namespaces:
- name: core
  doc: core test types
  version: "1.0.0"
  author: tester
  schema:
  - source: core.types.yaml
"#;

    fn write_file(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_namespace_and_registers_types() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "core.types.yaml", CORE_TYPES);
        let ns_path = write_file(dir.path(), "core.namespace.yaml", CORE_NAMESPACE);

        let mut catalog = NamespaceCatalog::new();
        let registered = catalog.load_namespace_file(&ns_path).unwrap();
        assert_eq!(
            registered["core"],
            vec!["Block".to_string(), "Series".into(), "TimedBlock".into()]
        );

        let ns = catalog.get_namespace("core").unwrap();
        assert_eq!(ns.version(), Some("1.0.0"));
        assert_eq!(ns.meta().authors, vec!["tester".to_string()]);
        // inheritance resolved during load
        let timed = ns.get_spec("TimedBlock").unwrap();
        assert!(timed.get_attribute("label").is_some());
        assert_eq!(
            catalog.get_hierarchy("core", "TimedBlock").unwrap().as_ref(),
            ["TimedBlock", "Block"]
        );
    }

    #[test]
    fn reload_same_version_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "core.types.yaml", CORE_TYPES);
        let ns_path = write_file(dir.path(), "core.namespace.yaml", CORE_NAMESPACE);

        let mut catalog = NamespaceCatalog::new();
        catalog.load_namespace_file(&ns_path).unwrap();
        let again = catalog.load_namespace_file(&ns_path).unwrap();
        assert_eq!(again["core"].len(), 3);
    }

    #[test]
    fn version_conflict_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "core.types.yaml", CORE_TYPES);
        let ns_path = write_file(dir.path(), "core.namespace.yaml", CORE_NAMESPACE);
        let bumped = CORE_NAMESPACE.replace("1.0.0", "2.0.0");
        let bumped_path = write_file(dir.path(), "core2.namespace.yaml", &bumped);

        let mut catalog = NamespaceCatalog::new();
        catalog.load_namespace_file(&ns_path).unwrap();
        assert!(matches!(
            catalog.load_namespace_file(&bumped_path),
            Err(SpecError::NamespaceVersionConflict { .. })
        ));
    }

    #[test]
    fn include_pulls_types_from_a_registered_namespace() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "core.types.yaml", CORE_TYPES);
        let core_path = write_file(dir.path(), "core.namespace.yaml", CORE_NAMESPACE);
        let ext_namespace = r#"
namespaces:
- name: ext
  doc: extension types
  version: "0.1.0"
  schema:
  - namespace: core
    data_types: [Block]
  - source: ext.types.yaml
"#;
        let ext_types = r#"
specs:
- doc: an annotated block
  data_type_def: AnnotatedBlock
  data_type_inc: Block
"#;
        write_file(dir.path(), "ext.types.yaml", ext_types);
        let ext_path = write_file(dir.path(), "ext.namespace.yaml", ext_namespace);

        let mut catalog = NamespaceCatalog::new();
        catalog.load_namespace_file(&core_path).unwrap();
        let registered = catalog.load_namespace_file(&ext_path).unwrap();
        assert_eq!(
            registered["ext"],
            vec!["AnnotatedBlock".to_string(), "Block".into()]
        );

        let ext = catalog.get_namespace("ext").unwrap();
        assert_eq!(ext.imports().get("Block"), Some(&"core".to_string()));
        // the extension resolves against the imported parent
        let annotated = ext.get_spec("AnnotatedBlock").unwrap();
        assert!(annotated.get_attribute("label").is_some());
    }

    #[test]
    fn missing_include_namespace_fails() {
        let dir = tempfile::tempdir().unwrap();
        let text = r#"
namespaces:
- name: ext
  doc: extension types
  schema:
  - namespace: nowhere
"#;
        let path = write_file(dir.path(), "ext.namespace.yaml", text);
        let mut catalog = NamespaceCatalog::new();
        assert!(matches!(
            catalog.load_namespace_file(&path),
            Err(SpecError::UnknownNamespace { namespace }) if namespace == "nowhere"
        ));
    }

    #[test]
    fn legacy_neurodata_types_key_is_accepted() {
        let entry: SchemaEntry =
            serde_yaml::from_str("source: core.types.yaml\nneurodata_types: [Block]\n").unwrap();
        assert_eq!(
            entry,
            SchemaEntry::Source {
                source: "core.types.yaml".into(),
                data_types: Some(vec!["Block".into()]),
            }
        );
    }

    #[test]
    fn json_namespace_documents_load_too() {
        let dir = tempfile::tempdir().unwrap();
        let types_json = r#"{"specs": [{"doc": "a block", "data_type_def": "Block"}]}"#;
        let ns_json = r#"{"namespaces": [{"name": "core", "doc": "core", "version": "1.0.0",
            "schema": [{"source": "core.types.json"}]}]}"#;
        write_file(dir.path(), "core.types.json", types_json);
        let path = write_file(dir.path(), "core.namespace.json", ns_json);

        let mut catalog = NamespaceCatalog::new();
        let registered = catalog.load_namespace_file(&path).unwrap();
        assert_eq!(registered["core"], vec!["Block".to_string()]);
    }
}
