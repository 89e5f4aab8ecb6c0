use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dtype::DType;
use crate::error::TypeError;
use crate::id::ContainerId;

/// A single typed scalar carried by a field or attribute.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
}

impl ScalarValue {
    /// The widest dtype this scalar belongs to.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int(_) => DType::Int64,
            Self::UInt(_) => DType::UInt64,
            Self::Float(_) => DType::Float64,
            Self::Text(_) => DType::Text,
            Self::Bytes(_) => DType::Bytes,
            Self::DateTime(_) => DType::IsoDatetime,
        }
    }

    /// Text coercion: render the scalar as a `Text` value.
    ///
    /// Raw bytes are not coercible; everything else has a canonical text
    /// form (datetimes render as RFC 3339).
    pub fn to_text(&self) -> Result<ScalarValue, TypeError> {
        let text = match self {
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::UInt(u) => u.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Text(t) => t.clone(),
            Self::DateTime(dt) => dt.to_rfc3339(),
            Self::Bytes(_) => {
                return Err(TypeError::NotCoercible {
                    from: "bytes".to_string(),
                    to: "text".to_string(),
                })
            }
        };
        Ok(Self::Text(text))
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u64> for ScalarValue {
    fn from(v: u64) -> Self {
        Self::UInt(v)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for ScalarValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

/// Flat element payload of an [`ArrayValue`], one variant per dtype family.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArrayData {
    Bool(Vec<bool>),
    Int(Vec<i64>),
    UInt(Vec<u64>),
    Float(Vec<f64>),
    Text(Vec<String>),
    Bytes(Vec<Vec<u8>>),
    DateTime(Vec<DateTime<Utc>>),
}

impl ArrayData {
    /// Number of elements in the payload.
    pub fn len(&self) -> usize {
        match self {
            Self::Bool(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::UInt(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Text(v) => v.len(),
            Self::Bytes(v) => v.len(),
            Self::DateTime(v) => v.len(),
        }
    }

    /// Returns `true` if the payload holds no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The element dtype of the payload.
    pub fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int(_) => DType::Int64,
            Self::UInt(_) => DType::UInt64,
            Self::Float(_) => DType::Float64,
            Self::Text(_) => DType::Text,
            Self::Bytes(_) => DType::Bytes,
            Self::DateTime(_) => DType::IsoDatetime,
        }
    }

    /// Append another payload of the same variant.
    fn extend(&mut self, other: ArrayData) -> Result<(), TypeError> {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.extend(b),
            (Self::Int(a), Self::Int(b)) => a.extend(b),
            (Self::UInt(a), Self::UInt(b)) => a.extend(b),
            (Self::Float(a), Self::Float(b)) => a.extend(b),
            (Self::Text(a), Self::Text(b)) => a.extend(b),
            (Self::Bytes(a), Self::Bytes(b)) => a.extend(b),
            (Self::DateTime(a), Self::DateTime(b)) => a.extend(b),
            (a, b) => {
                return Err(TypeError::Concat(format!(
                    "element dtype {} vs {}",
                    a.dtype(),
                    b.dtype()
                )))
            }
        }
        Ok(())
    }
}

/// Row-major n-dimensional array value.
///
/// The payload is a flat vector; `shape` gives its logical dimensions and
/// the element count is always the product of the shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArrayValue {
    shape: Vec<usize>,
    data: ArrayData,
}

impl ArrayValue {
    /// Create an array, validating the payload against the shape.
    pub fn new(shape: Vec<usize>, data: ArrayData) -> Result<Self, TypeError> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TypeError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// One-dimensional array over the whole payload.
    pub fn one_dim(data: ArrayData) -> Self {
        Self {
            shape: vec![data.len()],
            data,
        }
    }

    /// Logical dimensions, outermost first.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Flat element payload.
    pub fn data(&self) -> &ArrayData {
        &self.data
    }

    /// Total element count.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for a zero-element array.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Element dtype of the payload.
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Element-wise text coercion; the result has the same shape.
    pub fn to_text(&self) -> Result<ArrayValue, TypeError> {
        let texts = match &self.data {
            ArrayData::Bool(v) => v.iter().map(|e| e.to_string()).collect(),
            ArrayData::Int(v) => v.iter().map(|e| e.to_string()).collect(),
            ArrayData::UInt(v) => v.iter().map(|e| e.to_string()).collect(),
            ArrayData::Float(v) => v.iter().map(|e| e.to_string()).collect(),
            ArrayData::Text(v) => v.clone(),
            ArrayData::DateTime(v) => v.iter().map(|e| e.to_rfc3339()).collect(),
            ArrayData::Bytes(_) => {
                return Err(TypeError::NotCoercible {
                    from: "bytes".to_string(),
                    to: "text".to_string(),
                })
            }
        };
        Ok(Self {
            shape: self.shape.clone(),
            data: ArrayData::Text(texts),
        })
    }

    /// Concatenate row blocks along the first dimension.
    ///
    /// Every part must share the element dtype and the trailing shape
    /// (`shape[1..]`); the result's first dimension is the sum of the
    /// parts' first dimensions. Used to assemble chunked dataset data.
    pub fn concat_rows(parts: Vec<ArrayValue>) -> Result<ArrayValue, TypeError> {
        let mut iter = parts.into_iter();
        let mut acc = iter
            .next()
            .ok_or_else(|| TypeError::Concat("no parts".to_string()))?;
        if acc.rank() == 0 {
            return Err(TypeError::Concat("scalar-shaped part".to_string()));
        }
        for part in iter {
            if part.shape.get(1..) != acc.shape.get(1..) {
                return Err(TypeError::Concat(format!(
                    "trailing shape {:?} vs {:?}",
                    part.shape.get(1..),
                    acc.shape.get(1..)
                )));
            }
            acc.shape[0] += part.shape[0];
            acc.data.extend(part.data)?;
        }
        Ok(acc)
    }
}

/// A container field or builder attribute value.
///
/// Nested domain objects appear as arena handles, never inline, so values
/// stay cheap to clone and compare while the `ContainerStore` keeps sole
/// ownership of the objects themselves.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Scalar(ScalarValue),
    Array(ArrayValue),
    Container(ContainerId),
    ContainerList(Vec<ContainerId>),
}

impl Value {
    /// Text convenience constructor.
    pub fn text(v: impl Into<String>) -> Self {
        Self::Scalar(ScalarValue::Text(v.into()))
    }

    /// The dtype of the carried data, or `None` for container references.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            Self::Scalar(s) => Some(s.dtype()),
            Self::Array(a) => Some(a.dtype()),
            Self::Container(_) | Self::ContainerList(_) => None,
        }
    }

    /// The referenced containers, if this value is a reference value.
    ///
    /// A single reference yields a one-element vector so multi-instance
    /// call sites can treat both forms uniformly.
    pub fn as_containers(&self) -> Option<Vec<ContainerId>> {
        match self {
            Self::Container(id) => Some(vec![*id]),
            Self::ContainerList(ids) => Some(ids.clone()),
            _ => None,
        }
    }

    /// The scalar payload, if any.
    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// The array payload, if any.
    pub fn as_array(&self) -> Option<&ArrayValue> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// The scalar text payload, if any.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Scalar(ScalarValue::Text(t)) => Some(t),
            _ => None,
        }
    }
}

impl From<ScalarValue> for Value {
    fn from(v: ScalarValue) -> Self {
        Self::Scalar(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Scalar(ScalarValue::Bool(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Scalar(ScalarValue::Int(v as i64))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Scalar(ScalarValue::Int(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Scalar(ScalarValue::Float(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Scalar(ScalarValue::Text(v.to_string()))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Scalar(ScalarValue::Text(v))
    }
}

impl From<ArrayValue> for Value {
    fn from(v: ArrayValue) -> Self {
        Self::Array(v)
    }
}

impl From<ContainerId> for Value {
    fn from(v: ContainerId) -> Self {
        Self::Container(v)
    }
}

impl From<Vec<ContainerId>> for Value {
    fn from(v: Vec<ContainerId>) -> Self {
        Self::ContainerList(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_text_coercion() {
        assert_eq!(
            ScalarValue::Int(42).to_text().unwrap(),
            ScalarValue::Text("42".to_string())
        );
        assert_eq!(
            ScalarValue::Bool(true).to_text().unwrap(),
            ScalarValue::Text("true".to_string())
        );
        assert!(ScalarValue::Bytes(vec![0]).to_text().is_err());
    }

    #[test]
    fn array_shape_must_match_payload() {
        let err = ArrayValue::new(vec![2, 3], ArrayData::Int(vec![1, 2, 3])).unwrap_err();
        assert!(matches!(
            err,
            TypeError::ShapeMismatch {
                expected: 6,
                actual: 3,
                ..
            }
        ));
        let ok = ArrayValue::new(vec![2, 3], ArrayData::Int((0..6).collect())).unwrap();
        assert_eq!(ok.rank(), 2);
        assert_eq!(ok.len(), 6);
    }

    #[test]
    fn array_text_coercion_keeps_shape() {
        let arr = ArrayValue::new(vec![2, 2], ArrayData::Float(vec![1.5, 2.0, 3.5, 4.0])).unwrap();
        let texts = arr.to_text().unwrap();
        assert_eq!(texts.shape(), &[2, 2]);
        assert_eq!(
            texts.data(),
            &ArrayData::Text(vec![
                "1.5".to_string(),
                "2".to_string(),
                "3.5".to_string(),
                "4".to_string()
            ])
        );
    }

    #[test]
    fn concat_rows_sums_first_dimension() {
        let a = ArrayValue::new(vec![2, 2], ArrayData::Int(vec![1, 2, 3, 4])).unwrap();
        let b = ArrayValue::new(vec![1, 2], ArrayData::Int(vec![5, 6])).unwrap();
        let joined = ArrayValue::concat_rows(vec![a, b]).unwrap();
        assert_eq!(joined.shape(), &[3, 2]);
        assert_eq!(joined.data(), &ArrayData::Int(vec![1, 2, 3, 4, 5, 6]));
    }

    #[test]
    fn concat_rows_rejects_mismatched_trailing_shape() {
        let a = ArrayValue::new(vec![1, 2], ArrayData::Int(vec![1, 2])).unwrap();
        let b = ArrayValue::new(vec![1, 3], ArrayData::Int(vec![3, 4, 5])).unwrap();
        assert!(matches!(
            ArrayValue::concat_rows(vec![a, b]),
            Err(TypeError::Concat(_))
        ));
    }

    #[test]
    fn concat_rows_rejects_mixed_dtypes() {
        let a = ArrayValue::one_dim(ArrayData::Int(vec![1]));
        let b = ArrayValue::one_dim(ArrayData::Float(vec![2.0]));
        assert!(matches!(
            ArrayValue::concat_rows(vec![a, b]),
            Err(TypeError::Concat(_))
        ));
    }

    #[test]
    fn value_container_helpers() {
        let one = Value::Container(ContainerId::from_index(3));
        assert_eq!(one.as_containers().unwrap(), vec![ContainerId::from_index(3)]);
        let many = Value::ContainerList(vec![
            ContainerId::from_index(1),
            ContainerId::from_index(2),
        ]);
        assert_eq!(many.as_containers().unwrap().len(), 2);
        assert_eq!(one.dtype(), None);
        assert_eq!(Value::from(7i64).dtype(), Some(DType::Int64));
    }
}
