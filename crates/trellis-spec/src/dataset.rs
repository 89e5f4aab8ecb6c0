use serde::{Deserialize, Serialize};
use trellis_types::{DType, Value};

use crate::attribute::AttributeSpec;
use crate::error::{SpecError, SpecResult};
use crate::parent::Parent;
use crate::quantity::Quantity;
use crate::resolve::Inheritance;
use crate::shape::{DimsSpec, ShapeSpec};

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

/// Attribute names the engine stamps onto typed builders; typed specs may
/// not declare them.
pub const RESERVED_ATTRIBUTES: &[&str] = &["namespace", "data_type", "object_id"];

pub(crate) fn check_reserved(
    data_type_def: &Option<String>,
    attributes: &[AttributeSpec],
) -> SpecResult<()> {
    if let Some(def) = data_type_def {
        for attr in attributes {
            if RESERVED_ATTRIBUTES.contains(&attr.name.as_str()) {
                return Err(SpecError::ReservedAttribute {
                    name: attr.name.clone(),
                    data_type: def.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Spec for a dataset node: a leaf in the storage hierarchy carrying data
/// of a declared dtype and shape, plus its own attributes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetSpec {
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
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<DimsSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip)]
    pub(crate) parent: Parent,
    #[serde(skip)]
    pub(crate) attr_inheritance: Inheritance,
    #[serde(skip)]
    pub(crate) resolved: bool,
}

impl DatasetSpec {
    /// A wildcard-named, required dataset spec with no type identity yet.
    ///
    /// Callers give it a name, a `data_type_def`, or a `data_type_inc`
    /// before validation; a dataset with none of the three is rejected.
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
            dtype: None,
            shape: None,
            dims: None,
            default_value: None,
            parent: Parent::default(),
            attr_inheritance: Inheritance::default(),
            resolved: false,
        }
    }

    /// Fix the dataset's name within its parent group.
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

    /// Declare the element dtype.
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = Some(dtype);
        self
    }

    /// Constrain the data shape.
    pub fn with_shape(mut self, shape: ShapeSpec) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Label the shape's dimensions.
    pub fn with_dims(mut self, dims: DimsSpec) -> Self {
        self.dims = Some(dims);
        self
    }

    /// Value used when the object supplies no data.
    pub fn with_default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Forbid links targeting instances of this spec.
    pub fn not_linkable(mut self) -> Self {
        self.linkable = false;
        self
    }

    /// Add or replace an attribute by name, attaching it to this spec.
    pub fn set_attribute(&mut self, mut attr: AttributeSpec) -> SpecResult<()> {
        attr.validate()?;
        let owner = self.path();
        attr.parent.set(&attr.name, owner)?;
        match self.attributes.iter_mut().find(|a| a.name == attr.name) {
            Some(slot) => *slot = attr,
            None => self.attributes.push(attr),
        }
        Ok(())
    }

    /// Chainable form of [`set_attribute`](Self::set_attribute).
    pub fn with_attribute(mut self, attr: AttributeSpec) -> SpecResult<Self> {
        self.set_attribute(attr)?;
        Ok(self)
    }

    /// The attribute spec with the given name, if declared or inherited.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeSpec> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The data type this spec identifies as: its definition if it has
    /// one, else the type it includes.
    pub fn self_data_type(&self) -> Option<&str> {
        self.data_type_def
            .as_deref()
            .or(self.data_type_inc.as_deref())
    }

    /// Whether this spec has no fixed name and is identified by type.
    pub fn is_wildcard(&self) -> bool {
        self.name.is_none()
    }

    /// The name this spec is keyed under in its parent: the fixed name if
    /// any, else the data type.
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
        if let (Some(dims), Some(shape)) = (&self.dims, &self.shape) {
            if !dims.matches_shape(shape) {
                return Err(SpecError::DimsShapeMismatch { name: self.path() });
            }
        }
        Ok(())
    }

    /// Back-fill everything the extended type declares and this spec does
    /// not, recording which attribute names are inherited versus local.
    pub fn resolve_inc(&mut self, inc: &DatasetSpec) {
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
                // Attach errors are impossible on a fresh Parent.
                let _ = copy.parent.set(&copy.name, self.path());
                self.attr_inheritance.mark_inherited(&copy.name);
                self.attributes.push(copy);
            }
        }
        if self.dtype.is_none() {
            self.dtype = inc.dtype.clone();
        }
        if self.shape.is_none() {
            self.shape = inc.shape.clone();
            if self.dims.is_none() {
                self.dims = inc.dims.clone();
            }
        }
        if self.default_value.is_none() {
            self.default_value = inc.default_value.clone();
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
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_type() -> DatasetSpec {
        DatasetSpec::new("a labelled series")
            .with_data_type_def("Series")
            .with_dtype(DType::Float64)
            .with_attribute(AttributeSpec::new("unit", DType::Text, "unit of measurement"))
            .unwrap()
    }

    #[test]
    fn wildcard_without_type_is_rejected() {
        let err = DatasetSpec::new("anonymous").validate().unwrap_err();
        assert!(matches!(err, SpecError::WildcardWithoutType { .. }));
    }

    #[test]
    fn named_multi_instance_is_rejected() {
        let spec = DatasetSpec::new("counts")
            .with_name("counts")
            .with_quantity(Quantity::OneOrMany);
        assert!(matches!(
            spec.validate(),
            Err(SpecError::NamedMultiInstance { .. })
        ));
    }

    #[test]
    fn reserved_attributes_are_rejected_on_typed_specs() {
        let spec = base_type()
            .with_attribute(AttributeSpec::new("namespace", DType::Text, "oops"))
            .unwrap();
        assert!(matches!(
            spec.validate(),
            Err(SpecError::ReservedAttribute { ref name, .. }) if name == "namespace"
        ));
    }

    #[test]
    fn set_attribute_upserts_by_name() {
        let mut spec = base_type();
        assert_eq!(spec.attributes.len(), 1);
        spec.set_attribute(AttributeSpec::new("unit", DType::Text, "replacement doc"))
            .unwrap();
        assert_eq!(spec.attributes.len(), 1);
        assert_eq!(spec.get_attribute("unit").unwrap().doc, "replacement doc");
    }

    #[test]
    fn resolve_inc_backfills_attributes_and_dtype() {
        let parent = base_type();
        let mut child = DatasetSpec::new("a labelled series with a gain")
            .with_data_type_def("GainedSeries")
            .with_data_type_inc("Series")
            .with_attribute(AttributeSpec::new("gain", DType::Float64, "amplifier gain"))
            .unwrap();
        child.resolve_inc(&parent);

        assert_eq!(child.dtype, Some(DType::Float64));
        assert!(child.get_attribute("unit").is_some());
        assert!(child.is_inherited_attribute("unit"));
        assert!(!child.is_overridden_attribute("unit"));
        assert!(!child.is_inherited_attribute("gain"));
    }

    #[test]
    fn resolve_inc_marks_overridden_attributes() {
        let parent = base_type();
        let mut child = DatasetSpec::new("series with fixed unit")
            .with_data_type_def("VoltSeries")
            .with_data_type_inc("Series")
            .with_attribute(
                AttributeSpec::new("unit", DType::Text, "always volts").with_value("volts"),
            )
            .unwrap();
        child.resolve_inc(&parent);

        assert!(child.is_inherited_attribute("unit"));
        assert!(child.is_overridden_attribute("unit"));
        assert_eq!(
            child.get_attribute("unit").unwrap().value,
            Some(Value::text("volts"))
        );
    }

    #[test]
    fn key_prefers_name_over_type() {
        let named = DatasetSpec::new("x").with_name("data").with_data_type_inc("Series");
        assert_eq!(named.key(), "data");
        let typed = DatasetSpec::new("x").with_data_type_inc("Series");
        assert_eq!(typed.key(), "Series");
    }
}
