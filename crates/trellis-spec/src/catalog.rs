use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::error::{SpecError, SpecResult};
use crate::storage::StorageSpec;

/// Registry of storage specs keyed by the data type they define.
///
/// Tracks parent-type relationships (via `data_type_inc`) and per-type
/// source-file provenance, and memoizes type hierarchies.
#[derive(Debug, Default)]
pub struct SpecCatalog {
    specs: BTreeMap<String, Arc<StorageSpec>>,
    parent_types: BTreeMap<String, String>,
    sources: BTreeMap<String, String>,
    hierarchies: RwLock<HashMap<String, Arc<[String]>>>,
}

impl Clone for SpecCatalog {
    fn clone(&self) -> Self {
        Self {
            specs: self.specs.clone(),
            parent_types: self.parent_types.clone(),
            sources: self.sources.clone(),
            // memo is recomputed on demand
            hierarchies: RwLock::new(HashMap::new()),
        }
    }
}

impl SpecCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec under the data type it defines.
    ///
    /// Fails if the spec defines no type or the type name is already
    /// registered in this catalog.
    pub fn register_spec(&mut self, spec: StorageSpec, source: Option<&str>) -> SpecResult<()> {
        spec.validate()?;
        let data_type = spec
            .data_type_def()
            .ok_or_else(|| SpecError::NoTypeDefinition { path: spec.path() })?
            .to_string();
        if self.specs.contains_key(&data_type) {
            return Err(SpecError::AlreadyRegistered { data_type });
        }
        if let Some(inc) = spec.data_type_inc() {
            self.parent_types.insert(data_type.clone(), inc.to_string());
        }
        if let Some(source) = source {
            self.sources.insert(data_type.clone(), source.to_string());
        }
        debug!(data_type = %data_type, source = ?source, "registered spec");
        self.specs.insert(data_type, Arc::new(spec));
        self.invalidate_hierarchies();
        Ok(())
    }

    /// Recursively register every nested node that defines a data type:
    /// a group's typed datasets first, then the group itself, then its
    /// sub-groups.
    pub fn auto_register(&mut self, spec: &StorageSpec, source: Option<&str>) -> SpecResult<()> {
        match spec {
            StorageSpec::Dataset(d) => {
                if d.data_type_def.is_some() {
                    self.register_spec(StorageSpec::Dataset(d.clone()), source)?;
                }
            }
            StorageSpec::Group(g) => {
                for dataset in &g.datasets {
                    if dataset.data_type_def.is_some() {
                        self.register_spec(StorageSpec::Dataset(dataset.clone()), source)?;
                    }
                }
                if g.data_type_def.is_some() {
                    self.register_spec(StorageSpec::Group(g.clone()), source)?;
                }
                for group in &g.groups {
                    self.auto_register(&StorageSpec::Group(group.clone()), source)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve every registered spec against the spec of the type it
    /// extends, ancestors first, so each type carries its full inherited
    /// structure.
    pub fn resolve_all(&mut self) -> SpecResult<()> {
        let types: Vec<String> = self.specs.keys().cloned().collect();
        let mut ordered: Vec<String> = Vec::new();
        for data_type in &types {
            for ancestor in self.get_hierarchy(data_type)?.iter().rev() {
                if self.specs.contains_key(ancestor) && !ordered.contains(ancestor) {
                    ordered.push(ancestor.clone());
                }
            }
        }
        for data_type in ordered {
            let Some(parent_name) = self.parent_types.get(&data_type).cloned() else {
                continue;
            };
            let Some(parent) = self.specs.get(&parent_name).cloned() else {
                continue;
            };
            let mut child = (*self.specs[&data_type]).clone();
            child.resolve_inc(&parent)?;
            self.specs.insert(data_type, Arc::new(child));
        }
        Ok(())
    }

    /// The spec registered for a data type, if any.
    pub fn get_spec(&self, data_type: &str) -> Option<Arc<StorageSpec>> {
        self.specs.get(data_type).cloned()
    }

    /// All registered type names, in sorted order.
    pub fn registered_types(&self) -> Vec<String> {
        self.specs.keys().cloned().collect()
    }

    /// The source file a type was registered from, if recorded.
    pub fn spec_source(&self, data_type: &str) -> Option<&str> {
        self.sources.get(data_type).map(String::as_str)
    }

    /// The type a registered type directly extends, if any.
    pub fn parent_type(&self, data_type: &str) -> Option<&str> {
        self.parent_types.get(data_type).map(String::as_str)
    }

    /// The ordered ancestor chain of a type: itself first, then its
    /// parent, ending at a type with no further `data_type_inc`.
    ///
    /// Memoized; computing one chain backfills the memo for every suffix
    /// so sibling and ancestor queries are O(1) afterwards.
    pub fn get_hierarchy(&self, data_type: &str) -> SpecResult<Arc<[String]>> {
        {
            let memo = self
                .hierarchies
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(chain) = memo.get(data_type) {
                return Ok(chain.clone());
            }
        }
        if !self.specs.contains_key(data_type) {
            return Err(SpecError::UnknownType {
                data_type: data_type.to_string(),
            });
        }
        let mut chain = vec![data_type.to_string()];
        let mut current = data_type.to_string();
        while let Some(parent) = self.parent_types.get(&current) {
            if chain.contains(parent) {
                return Err(SpecError::CyclicHierarchy {
                    data_type: data_type.to_string(),
                });
            }
            chain.push(parent.clone());
            current = parent.clone();
        }
        let mut memo = self
            .hierarchies
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for start in 0..chain.len() {
            memo.entry(chain[start].clone())
                .or_insert_with(|| Arc::from(chain[start..].to_vec()));
        }
        Ok(memo[data_type].clone())
    }

    /// All registered types that extend the given type, directly or
    /// transitively.
    pub fn subtypes_of(&self, data_type: &str) -> Vec<String> {
        self.specs
            .keys()
            .filter(|candidate| {
                candidate.as_str() != data_type
                    && self
                        .get_hierarchy(candidate)
                        .map(|chain| chain.iter().any(|t| t == data_type))
                        .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    fn invalidate_hierarchies(&self) {
        self.hierarchies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
