use serde::{Deserialize, Serialize};
use trellis_types::{DType, Value};

use crate::error::{SpecError, SpecResult};
use crate::parent::Parent;
use crate::shape::{DimsSpec, ShapeSpec};

fn default_true() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

/// Leaf spec describing one attribute of a group or dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeSpec {
    pub name: String,
    pub doc: String,
    pub dtype: DType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dims: Option<DimsSpec>,
    #[serde(default = "default_true", skip_serializing_if = "is_true")]
    pub required: bool,
    /// Fixed value every instance must carry; wins over any object field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Value used when the object supplies none. Exclusive with `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip)]
    pub(crate) parent: Parent,
}

impl AttributeSpec {
    /// A required attribute with no shape constraints.
    pub fn new(name: impl Into<String>, dtype: DType, doc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: doc.into(),
            dtype,
            shape: None,
            dims: None,
            required: true,
            value: None,
            default_value: None,
            parent: Parent::default(),
        }
    }

    /// Mark the attribute optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Constrain the value shape.
    pub fn with_shape(mut self, shape: ShapeSpec) -> Self {
        self.shape = Some(shape);
        self
    }

    /// Label the shape's dimensions.
    pub fn with_dims(mut self, dims: DimsSpec) -> Self {
        self.dims = Some(dims);
        self
    }

    /// Fix the attribute to a constant value.
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Give the attribute a default for absent object fields.
    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// The owner spec, if this attribute has been attached.
    pub fn parent(&self) -> Option<&str> {
        self.parent.get()
    }

    /// Check the definition-time invariants.
    pub fn validate(&self) -> SpecResult<()> {
        if self.value.is_some() && self.default_value.is_some() {
            return Err(SpecError::ValueAndDefault {
                name: self.name.clone(),
            });
        }
        if let (Some(dims), Some(shape)) = (&self.dims, &self.shape) {
            if !dims.matches_shape(shape) {
                return Err(SpecError::DimsShapeMismatch {
                    name: self.name.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_required_scalar() {
        let spec = AttributeSpec::new("unit", DType::Text, "unit of measurement");
        assert!(spec.required);
        assert!(spec.shape.is_none());
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn value_and_default_are_exclusive() {
        let spec = AttributeSpec::new("help", DType::Text, "help text")
            .with_value("fixed")
            .with_default("fallback");
        let err = spec.validate().unwrap_err();
        assert!(matches!(err, SpecError::ValueAndDefault { name } if name == "help"));
    }

    #[test]
    fn dims_must_match_shape_arity() {
        let spec = AttributeSpec::new("offsets", DType::Float64, "per-channel offsets")
            .with_shape(ShapeSpec::Single(vec![None, Some(2)]))
            .with_dims(DimsSpec::Single(vec!["channel".into()]));
        assert!(matches!(
            spec.validate(),
            Err(SpecError::DimsShapeMismatch { .. })
        ));
    }

    #[test]
    fn document_roundtrip() {
        let spec = AttributeSpec::new("unit", DType::Text, "unit of measurement")
            .optional()
            .with_default("volts");
        let json = serde_json::to_string(&spec).unwrap();
        let parsed: AttributeSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn missing_doc_is_a_parse_error() {
        let err = serde_json::from_str::<AttributeSpec>(r#"{"name": "x", "dtype": "int32"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("doc"));
    }
}
