use serde::{Deserialize, Deserializer, Serialize, Serializer};
use trellis_types::{DType, Value};

use crate::attribute::AttributeSpec;
use crate::dataset::DatasetSpec;
use crate::error::{SpecError, SpecResult};
use crate::group::GroupSpec;
use crate::link::LinkSpec;
use crate::quantity::Quantity;
use crate::shape::{DimsSpec, ShapeSpec};

/// A registrable storage spec: the group or dataset node that defines or
/// includes a data type.
///
/// Document routing is structural: an entry carrying any dataset-only key
/// (`dtype`, `shape`, `dims`, `default_value`) parses as a dataset,
/// anything else as a group.
#[derive(Clone, Debug, PartialEq)]
pub enum StorageSpec {
    Group(GroupSpec),
    Dataset(DatasetSpec),
}

impl StorageSpec {
    /// The fixed name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Group(g) => g.name.as_deref(),
            Self::Dataset(d) => d.name.as_deref(),
        }
    }

    /// The fallback name, if any.
    pub fn default_name(&self) -> Option<&str> {
        match self {
            Self::Group(g) => g.default_name.as_deref(),
            Self::Dataset(d) => d.default_name.as_deref(),
        }
    }

    /// Human-readable description.
    pub fn doc(&self) -> &str {
        match self {
            Self::Group(g) => &g.doc,
            Self::Dataset(d) => &d.doc,
        }
    }

    /// The data type this spec defines, if any.
    pub fn data_type_def(&self) -> Option<&str> {
        match self {
            Self::Group(g) => g.data_type_def.as_deref(),
            Self::Dataset(d) => d.data_type_def.as_deref(),
        }
    }

    /// The data type this spec extends or includes, if any.
    pub fn data_type_inc(&self) -> Option<&str> {
        match self {
            Self::Group(g) => g.data_type_inc.as_deref(),
            Self::Dataset(d) => d.data_type_inc.as_deref(),
        }
    }

    /// The data type this spec identifies as.
    pub fn self_data_type(&self) -> Option<&str> {
        match self {
            Self::Group(g) => g.self_data_type(),
            Self::Dataset(d) => d.self_data_type(),
        }
    }

    /// The allowed instance count.
    pub fn quantity(&self) -> Quantity {
        match self {
            Self::Group(g) => g.quantity,
            Self::Dataset(d) => d.quantity,
        }
    }

    /// The attributes declared or inherited by this spec.
    pub fn attributes(&self) -> &[AttributeSpec] {
        match self {
            Self::Group(g) => &g.attributes,
            Self::Dataset(d) => &d.attributes,
        }
    }

    /// The attribute spec with the given name, if any.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeSpec> {
        match self {
            Self::Group(g) => g.get_attribute(name),
            Self::Dataset(d) => d.get_attribute(name),
        }
    }

    /// The name this spec is keyed under in its parent.
    pub fn key(&self) -> &str {
        match self {
            Self::Group(g) => g.key(),
            Self::Dataset(d) => d.key(),
        }
    }

    /// Diagnostic path token for error messages.
    pub fn path(&self) -> String {
        self.key().to_string()
    }

    /// The group form, if this is a group spec.
    pub fn as_group(&self) -> Option<&GroupSpec> {
        match self {
            Self::Group(g) => Some(g),
            Self::Dataset(_) => None,
        }
    }

    /// The dataset form, if this is a dataset spec.
    pub fn as_dataset(&self) -> Option<&DatasetSpec> {
        match self {
            Self::Group(_) => None,
            Self::Dataset(d) => Some(d),
        }
    }

    /// Check the definition-time invariants, recursively.
    pub fn validate(&self) -> SpecResult<()> {
        match self {
            Self::Group(g) => g.validate(),
            Self::Dataset(d) => d.validate(),
        }
    }

    /// Resolve this spec against the spec of the type it extends.
    ///
    /// Groups resolve against groups and datasets against datasets;
    /// extending across kinds is a schema error.
    pub fn resolve_inc(&mut self, inc: &StorageSpec) -> SpecResult<()> {
        match (self, inc) {
            (Self::Group(child), Self::Group(parent)) => {
                child.resolve_inc(parent);
                Ok(())
            }
            (Self::Dataset(child), Self::Dataset(parent)) => {
                child.resolve_inc(parent);
                Ok(())
            }
            (child, parent) => Err(SpecError::KindMismatch {
                child: child.kind_name().to_string(),
                parent: parent.kind_name().to_string(),
            }),
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            Self::Group(_) => "group",
            Self::Dataset(_) => "dataset",
        }
    }

    /// Parse one spec from a YAML document fragment.
    pub fn from_yaml_str(text: &str) -> SpecResult<Self> {
        let spec: Self = serde_yaml::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse one spec from a JSON document fragment.
    pub fn from_json_str(text: &str) -> SpecResult<Self> {
        let spec: Self = serde_json::from_str(text)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Render the spec as a YAML document fragment.
    pub fn to_yaml_string(&self) -> SpecResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Render the spec as a JSON document fragment.
    pub fn to_json_string(&self) -> SpecResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<GroupSpec> for StorageSpec {
    fn from(g: GroupSpec) -> Self {
        Self::Group(g)
    }
}

impl From<DatasetSpec> for StorageSpec {
    fn from(d: DatasetSpec) -> Self {
        Self::Dataset(d)
    }
}

impl Serialize for StorageSpec {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Group(g) => g.serialize(serializer),
            Self::Dataset(d) => d.serialize(serializer),
        }
    }
}

/// Field union of group and dataset documents, used to route an untyped
/// entry to the right spec kind by the keys it carries.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStorage {
    #[serde(default)]
    name: Option<String>,
    doc: String,
    #[serde(default)]
    default_name: Option<String>,
    #[serde(default)]
    quantity: Quantity,
    #[serde(default)]
    data_type_def: Option<String>,
    #[serde(default)]
    data_type_inc: Option<String>,
    #[serde(default)]
    linkable: Option<bool>,
    #[serde(default)]
    attributes: Vec<AttributeSpec>,
    #[serde(default)]
    dtype: Option<DType>,
    #[serde(default)]
    shape: Option<ShapeSpec>,
    #[serde(default)]
    dims: Option<DimsSpec>,
    #[serde(default)]
    default_value: Option<Value>,
    #[serde(default)]
    groups: Option<Vec<GroupSpec>>,
    #[serde(default)]
    datasets: Option<Vec<DatasetSpec>>,
    #[serde(default)]
    links: Option<Vec<LinkSpec>>,
}

impl<'de> Deserialize<'de> for StorageSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawStorage::deserialize(deserializer)?;
        let has_dataset_keys = raw.dtype.is_some()
            || raw.shape.is_some()
            || raw.dims.is_some()
            || raw.default_value.is_some();
        let has_group_keys =
            raw.groups.is_some() || raw.datasets.is_some() || raw.links.is_some();
        if has_dataset_keys && has_group_keys {
            return Err(serde::de::Error::custom(
                "spec mixes dataset keys (dtype/shape/dims/default_value) with group children",
            ));
        }
        if has_dataset_keys {
            let mut spec = DatasetSpec::new(raw.doc);
            spec.name = raw.name;
            spec.default_name = raw.default_name;
            spec.quantity = raw.quantity;
            spec.data_type_def = raw.data_type_def;
            spec.data_type_inc = raw.data_type_inc;
            spec.linkable = raw.linkable.unwrap_or(true);
            spec.attributes = raw.attributes;
            spec.dtype = raw.dtype;
            spec.shape = raw.shape;
            spec.dims = raw.dims;
            spec.default_value = raw.default_value;
            Ok(Self::Dataset(spec))
        } else {
            let mut spec = GroupSpec::new(raw.doc);
            spec.name = raw.name;
            spec.default_name = raw.default_name;
            spec.quantity = raw.quantity;
            spec.data_type_def = raw.data_type_def;
            spec.data_type_inc = raw.data_type_inc;
            spec.linkable = raw.linkable.unwrap_or(true);
            spec.attributes = raw.attributes;
            spec.groups = raw.groups.unwrap_or_default();
            spec.datasets = raw.datasets.unwrap_or_default();
            spec.links = raw.links.unwrap_or_default();
            Ok(Self::Group(spec))
        }
    }
}
