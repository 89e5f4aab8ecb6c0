use serde::{Deserialize, Serialize};

use crate::attribute::AttributeSpec;
use crate::dataset::{check_reserved, DatasetSpec};
use crate::error::{SpecError, SpecResult};
use crate::link::LinkSpec;
use crate::parent::Parent;
use crate::quantity::Quantity;
use crate::resolve::Inheritance;

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

/// A wildcard-named child matched by data type: either a sub-group or a
/// sub-dataset spec.
#[derive(Clone, Copy, Debug)]
pub enum TypedChild<'a> {
    Group(&'a GroupSpec),
    Dataset(&'a DatasetSpec),
}

impl<'a> TypedChild<'a> {
    /// The data type the child identifies as.
    pub fn self_data_type(&self) -> Option<&'a str> {
        match self {
            Self::Group(g) => g.self_data_type(),
            Self::Dataset(d) => d.self_data_type(),
        }
    }

    /// The child's instance-count declaration.
    pub fn quantity(&self) -> Quantity {
        match self {
            Self::Group(g) => g.quantity,
            Self::Dataset(d) => d.quantity,
        }
    }

    /// The child's lookup key within its parent.
    pub fn key(&self) -> &'a str {
        match self {
            Self::Group(g) => g.key(),
            Self::Dataset(d) => d.key(),
        }
    }
}

/// Spec for a group node: the interior of the storage hierarchy, owning
/// attributes plus named or type-identified sub-groups, datasets, and
/// links.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_name: Option<String>,
    #[serde(default, skip_serializing_if = "Quantity::is_default")]
    pub quantity: Quantity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type_def: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type_inc: Option<String>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub linkable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<AttributeSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<GroupSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<DatasetSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkSpec>,
    #[serde(skip)]
    pub(crate) parent: Parent,
    #[serde(skip)]
    pub(crate) attr_inheritance: Inheritance,
    #[serde(skip)]
    pub(crate) group_inheritance: Inheritance,
    #[serde(skip)]
    pub(crate) dataset_inheritance: Inheritance,
    #[serde(skip)]
    pub(crate) link_inheritance: Inheritance,
    #[serde(skip)]
    pub(crate) resolved: bool,
}

impl GroupSpec {
    /// A wildcard-named, required group spec with no type identity yet.
    pub fn new(doc: impl Into<String>) -> Self {
        Self {
            name: None,
            doc: doc.into(),
            default_name: None,
            quantity: Quantity::One,
            data_type_def: None,
            data_type_inc: None,
            linkable: true,
            attributes: Vec::new(),
            groups: Vec::new(),
            datasets: Vec::new(),
            links: Vec::new(),
            parent: Parent::default(),
            attr_inheritance: Inheritance::default(),
            group_inheritance: Inheritance::default(),
            dataset_inheritance: Inheritance::default(),
            link_inheritance: Inheritance::default(),
            resolved: false,
        }
    }

    /// Fix the group's name within its parent.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Name to fall back on when neither spec nor object fixes one.
    pub fn with_default_name(mut self, name: impl Into<String>) -> Self {
        self.default_name = Some(name.into());
        self
    }

    /// Declare a new data type defined by this spec.
    pub fn with_data_type_def(mut self, def: impl Into<String>) -> Self {
        self.data_type_def = Some(def.into());
        self
    }

    /// Extend or include an existing data type.
    pub fn with_data_type_inc(mut self, inc: impl Into<String>) -> Self {
        self.data_type_inc = Some(inc.into());
        self
    }

    /// Set the allowed instance count.
    pub fn with_quantity(mut self, quantity: Quantity) -> Self {
        self.quantity = quantity;
        self
    }

    /// Forbid links targeting instances of this spec.
    pub fn not_linkable(mut self) -> Self {
        self.linkable = false;
        self
    }

    /// The data type this spec identifies as.
    pub fn self_data_type(&self) -> Option<&str> {
        self.data_type_def
            .as_deref()
            .or(self.data_type_inc.as_deref())
    }

    /// Whether this spec has no fixed name and is identified by type.
    pub fn is_wildcard(&self) -> bool {
        self.name.is_none()
    }

    /// The name this spec is keyed under in its parent.
    pub fn key(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.self_data_type())
            .unwrap_or("?")
    }

    /// Diagnostic path token for error messages.
    pub fn path(&self) -> String {
        self.key().to_string()
    }

    /// Whether at least one instance must be present.
    pub fn required(&self) -> bool {
        self.quantity.required()
    }

    /// The owner spec, if attached.
    pub fn parent(&self) -> Option<&str> {
        self.parent.get()
    }

    // -- child management ---------------------------------------------------

    /// Add or replace an attribute by name, attaching it to this spec.
    pub fn set_attribute(&mut self, mut attr: AttributeSpec) -> SpecResult<()> {
        attr.validate()?;
        attr.parent.set(&attr.name, self.path())?;
        match self.attributes.iter_mut().find(|a| a.name == attr.name) {
            Some(slot) => *slot = attr,
            None => self.attributes.push(attr),
        }
        Ok(())
    }

    /// Add or replace a sub-group. Named groups upsert by name; wildcard
    /// groups register by data type, and a second unnamed child of the
    /// same type is a conflict.
    pub fn set_group(&mut self, mut group: GroupSpec) -> SpecResult<()> {
        group.validate()?;
        if group.is_wildcard() {
            self.check_type_conflict(group.self_data_type())?;
        }
        group.parent.set(&group.path(), self.path())?;
        let key = group.key().to_string();
        match self.groups.iter_mut().find(|g| g.key() == key) {
            Some(slot) => *slot = group,
            None => self.groups.push(group),
        }
        Ok(())
    }

    /// Add or replace a sub-dataset, with the same naming rules as
    /// [`set_group`](Self::set_group).
    pub fn set_dataset(&mut self, mut dataset: DatasetSpec) -> SpecResult<()> {
        dataset.validate()?;
        if dataset.is_wildcard() {
            self.check_type_conflict(dataset.self_data_type())?;
        }
        dataset.parent.set(&dataset.path(), self.path())?;
        let key = dataset.key().to_string();
        match self.datasets.iter_mut().find(|d| d.key() == key) {
            Some(slot) => *slot = dataset,
            None => self.datasets.push(dataset),
        }
        Ok(())
    }

    /// Add or replace a link. Wildcard links register by target type.
    pub fn set_link(&mut self, mut link: LinkSpec) -> SpecResult<()> {
        link.validate()?;
        let key = link.key().to_string();
        link.parent.set(&key, self.path())?;
        match self.links.iter_mut().find(|l| l.key() == key) {
            Some(slot) => *slot = link,
            None => self.links.push(link),
        }
        Ok(())
    }

    /// Chainable forms of the child setters.
    pub fn with_attribute(mut self, attr: AttributeSpec) -> SpecResult<Self> {
        self.set_attribute(attr)?;
        Ok(self)
    }

    pub fn with_group(mut self, group: GroupSpec) -> SpecResult<Self> {
        self.set_group(group)?;
        Ok(self)
    }

    pub fn with_dataset(mut self, dataset: DatasetSpec) -> SpecResult<Self> {
        self.set_dataset(dataset)?;
        Ok(self)
    }

    pub fn with_link(mut self, link: LinkSpec) -> SpecResult<Self> {
        self.set_link(link)?;
        Ok(self)
    }

    fn check_type_conflict(&self, data_type: Option<&str>) -> SpecResult<()> {
        let Some(data_type) = data_type else {
            return Ok(());
        };
        let clash = self
            .groups
            .iter()
            .any(|g| g.is_wildcard() && g.self_data_type() == Some(data_type))
            || self
                .datasets
                .iter()
                .any(|d| d.is_wildcard() && d.self_data_type() == Some(data_type));
        if clash {
            return Err(SpecError::DataTypeConflict {
                data_type: data_type.to_string(),
            });
        }
        Ok(())
    }

    // -- child lookup -------------------------------------------------------

    /// The attribute spec with the given name, if declared or inherited.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The sub-group fixed to the given name, if any.
    pub fn get_group(&self, name: &str) -> Option<&GroupSpec> {
        self.groups.iter().find(|g| g.name.as_deref() == Some(name))
    }

    /// The sub-dataset fixed to the given name, if any.
    pub fn get_dataset(&self, name: &str) -> Option<&DatasetSpec> {
        self.datasets
            .iter()
            .find(|d| d.name.as_deref() == Some(name))
    }

    /// The link keyed under the given name or target type, if any.
    pub fn get_link(&self, key: &str) -> Option<&LinkSpec> {
        self.links.iter().find(|l| l.key() == key)
    }

    /// The wildcard-named child identified by the given data type, if any.
    pub fn get_data_type(&self, data_type: &str) -> Option<TypedChild<'_>> {
        if let Some(g) = self
            .groups
            .iter()
            .find(|g| g.is_wildcard() && g.self_data_type() == Some(data_type))
        {
            return Some(TypedChild::Group(g));
        }
        self.datasets
            .iter()
            .find(|d| d.is_wildcard() && d.self_data_type() == Some(data_type))
            .map(TypedChild::Dataset)
    }

    // -- validation and inheritance ----------------------------------------

    /// Check the definition-time invariants, recursively.
    pub fn validate(&self) -> SpecResult<()> {
        if self.name.is_none() && self.self_data_type().is_none() {
            return Err(SpecError::WildcardWithoutType { path: self.path() });
        }
        if let Some(name) = &self.name {
            if self.quantity.is_many() {
                return Err(SpecError::NamedMultiInstance {
                    name: name.clone(),
                    quantity: self.quantity.to_string(),
                });
            }
        }
        check_reserved(&self.data_type_def, &self.attributes)?;
        for attr in &self.attributes {
            attr.validate()?;
        }
        let mut seen_types = Vec::new();
        for group in &self.groups {
            group.validate()?;
            if group.is_wildcard() {
                Self::note_type(&mut seen_types, group.self_data_type())?;
            }
        }
        for dataset in &self.datasets {
            dataset.validate()?;
            if dataset.is_wildcard() {
                Self::note_type(&mut seen_types, dataset.self_data_type())?;
            }
        }
        for link in &self.links {
            link.validate()?;
        }
        Ok(())
    }

    fn note_type<'a>(seen: &mut Vec<&'a str>, data_type: Option<&'a str>) -> SpecResult<()> {
        let Some(data_type) = data_type else {
            return Ok(());
        };
        if seen.contains(&data_type) {
            return Err(SpecError::DataTypeConflict {
                data_type: data_type.to_string(),
            });
        }
        seen.push(data_type);
        Ok(())
    }

    /// Back-fill attributes, datasets, groups, and links declared by the
    /// extended type, recording inherited versus local names.
    ///
    /// A locally declared child that shadows an inherited one is itself
    /// resolved against the inherited definition, so deep overrides keep
    /// the full inherited structure.
    pub fn resolve_inc(&mut self, inc: &GroupSpec) {
        if self.resolved {
            return;
        }
        self.resolved = true;
        for attr in &inc.attributes {
            if self.get_attribute(&attr.name).is_some() {
                self.attr_inheritance.mark_overridden(&attr.name);
            } else {
                let mut copy = attr.clone();
                copy.parent = Parent::default();
                let _ = copy.parent.set(&copy.name, self.path());
                self.attr_inheritance.mark_inherited(&copy.name);
                self.attributes.push(copy);
            }
        }
        for dataset in &inc.datasets {
            let key = dataset.key().to_string();
            if let Some(local) = self.datasets.iter_mut().find(|d| d.key() == key) {
                self.dataset_inheritance.mark_overridden(&key);
                local.resolve_inc(dataset);
            } else {
                let mut copy = dataset.clone();
                copy.parent = Parent::default();
                let _ = copy.parent.set(&copy.path(), self.path());
                self.dataset_inheritance.mark_inherited(&key);
                self.datasets.push(copy);
            }
        }
        for group in &inc.groups {
            let key = group.key().to_string();
            if self.groups.iter().any(|g| g.key() == key) {
                self.group_inheritance.mark_overridden(&key);
                let inherited = group.clone();
                if let Some(local) = self.groups.iter_mut().find(|g| g.key() == key) {
                    local.resolve_inc(&inherited);
                }
            } else {
                let mut copy = group.clone();
                copy.parent = Parent::default();
                let _ = copy.parent.set(&copy.path(), self.path());
                self.group_inheritance.mark_inherited(&key);
                self.groups.push(copy);
            }
        }
        for link in &inc.links {
            let key = link.key().to_string();
            if self.links.iter().any(|l| l.key() == key) {
                self.link_inheritance.mark_overridden(&key);
            } else {
                let mut copy = link.clone();
                copy.parent = Parent::default();
                let _ = copy.parent.set(&key, self.path());
                self.link_inheritance.mark_inherited(&key);
                self.links.push(copy);
            }
        }
    }

    /// Whether the extended type declares this attribute.
    pub fn is_inherited_attribute(&self, name: &str) -> bool {
        self.attr_inheritance.is_inherited(name)
    }

    /// Whether this spec locally redefines an inherited attribute.
    pub fn is_overridden_attribute(&self, name: &str) -> bool {
        self.attr_inheritance.is_overridden(name)
    }

    /// Whether the extended type declares this sub-group key.
    pub fn is_inherited_group(&self, key: &str) -> bool {
        self.group_inheritance.is_inherited(key)
    }

    pub fn is_overridden_group(&self, key: &str) -> bool {
        self.group_inheritance.is_overridden(key)
    }

    /// Whether the extended type declares this sub-dataset key.
    pub fn is_inherited_dataset(&self, key: &str) -> bool {
        self.dataset_inheritance.is_inherited(key)
    }

    pub fn is_overridden_dataset(&self, key: &str) -> bool {
        self.dataset_inheritance.is_overridden(key)
    }

    /// Whether the extended type declares this link key.
    pub fn is_inherited_link(&self, key: &str) -> bool {
        self.link_inheritance.is_inherited(key)
    }

    pub fn is_overridden_link(&self, key: &str) -> bool {
        self.link_inheritance.is_overridden(key)
    }
}

#[cfg(test)]
mod tests {
    use trellis_types::DType;

    use super::*;

    fn base_type() -> GroupSpec {
        GroupSpec::new("a recording block")
            .with_data_type_def("Block")
            .with_attribute(AttributeSpec::new("label", DType::Text, "display label"))
            .unwrap()
            .with_dataset(
                DatasetSpec::new("sample values")
                    .with_name("values")
                    .with_dtype(DType::Int32),
            )
            .unwrap()
            .with_link(LinkSpec::new("Device", "source device").with_name("device"))
            .unwrap()
    }

    #[test]
    fn second_unnamed_child_of_same_type_conflicts() {
        let mut root = GroupSpec::new("root").with_name("root");
        root.set_group(GroupSpec::new("first").with_data_type_inc("Block"))
            .unwrap();
        let err = root
            .set_group(GroupSpec::new("second").with_data_type_inc("Block"))
            .unwrap_err();
        assert!(matches!(err, SpecError::DataTypeConflict { data_type } if data_type == "Block"));
    }

    #[test]
    fn unnamed_children_of_distinct_types_coexist() {
        let mut root = GroupSpec::new("root").with_name("root");
        root.set_group(GroupSpec::new("blocks").with_data_type_inc("Block"))
            .unwrap();
        root.set_dataset(DatasetSpec::new("series").with_data_type_inc("Series"))
            .unwrap();
        assert!(root.validate().is_ok());
        assert!(matches!(
            root.get_data_type("Block"),
            Some(TypedChild::Group(_))
        ));
        assert!(matches!(
            root.get_data_type("Series"),
            Some(TypedChild::Dataset(_))
        ));
    }

    #[test]
    fn type_conflict_spans_groups_and_datasets() {
        let mut root = GroupSpec::new("root").with_name("root");
        root.set_group(GroupSpec::new("blocks").with_data_type_inc("Block"))
            .unwrap();
        let err = root
            .set_dataset(DatasetSpec::new("also blocks").with_data_type_inc("Block"))
            .unwrap_err();
        assert!(matches!(err, SpecError::DataTypeConflict { .. }));
    }

    #[test]
    fn resolve_inc_backfills_all_child_kinds() {
        let parent = base_type();
        let mut child = GroupSpec::new("a block with extras")
            .with_data_type_def("ExtendedBlock")
            .with_data_type_inc("Block")
            .with_attribute(AttributeSpec::new("rate", DType::Float64, "sampling rate"))
            .unwrap();
        child.resolve_inc(&parent);

        assert!(child.get_attribute("label").is_some());
        assert!(child.get_dataset("values").is_some());
        assert!(child.get_link("device").is_some());
        assert!(child.is_inherited_attribute("label"));
        assert!(child.is_inherited_dataset("values"));
        assert!(child.is_inherited_link("device"));
        assert!(!child.is_inherited_attribute("rate"));
    }

    #[test]
    fn overriding_dataset_resolves_against_inherited_definition() {
        let parent = base_type();
        let mut child = GroupSpec::new("block with documented values")
            .with_data_type_def("DocumentedBlock")
            .with_data_type_inc("Block")
            .with_dataset(
                DatasetSpec::new("values with a unit")
                    .with_name("values")
                    .with_attribute(AttributeSpec::new("unit", DType::Text, "unit"))
                    .unwrap(),
            )
            .unwrap();
        child.resolve_inc(&parent);

        assert!(child.is_overridden_dataset("values"));
        assert!(child.is_inherited_dataset("values"));
        // dtype flows down from the inherited definition
        assert_eq!(
            child.get_dataset("values").unwrap().dtype,
            Some(DType::Int32)
        );
    }

    #[test]
    fn attaching_a_spec_twice_fails() {
        let shared = GroupSpec::new("shared").with_data_type_inc("Block");
        let mut a = GroupSpec::new("a").with_name("a");
        let mut b = GroupSpec::new("b").with_name("b");
        a.set_group(shared.clone()).unwrap();
        // the clone has a fresh parent; attaching the attached one fails
        let attached = a.groups[0].clone();
        assert!(matches!(
            b.set_group(attached),
            Err(SpecError::ParentReassigned { .. })
        ));
    }
}
