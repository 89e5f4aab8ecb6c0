use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Storage element type declared by a schema spec.
///
/// Primitive dtypes serialize as their canonical name (`"int32"`, `"text"`,
/// …). Reference dtypes serialize as a `{target_type, reftype}` map and
/// compound dtypes as a list of named fields, matching the schema document
/// format.
#[derive(Clone, Debug, PartialEq)]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Text,
    Bytes,
    IsoDatetime,
    /// Object reference to an instance of a registered data type.
    Ref(RefDType),
    /// Table-like compound of named primitive fields.
    Compound(Vec<CompoundField>),
}

/// Reference element type: points at instances of `target_type`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefDType {
    /// The data type the reference must point at.
    pub target_type: String,
    /// Reference flavor; only object references are supported.
    #[serde(default = "RefDType::default_reftype")]
    pub reftype: String,
}

impl RefDType {
    /// Reference to instances of the given type.
    pub fn object(target_type: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            reftype: Self::default_reftype(),
        }
    }

    fn default_reftype() -> String {
        "object".to_string()
    }
}

/// One named field of a compound dtype.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompoundField {
    /// Field name within the compound.
    pub name: String,
    /// Element type of this field.
    pub dtype: DType,
    /// Human-readable description.
    pub doc: String,
}

impl DType {
    /// The canonical name for a primitive dtype, or a descriptive tag for
    /// structured dtypes.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Text => "text",
            Self::Bytes => "bytes",
            Self::IsoDatetime => "isodatetime",
            Self::Ref(_) => "ref",
            Self::Compound(_) => "compound",
        }
    }

    /// Returns `true` for the integer dtypes, signed or unsigned.
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::UInt8
                | Self::UInt16
                | Self::UInt32
                | Self::UInt64
        )
    }

    /// Returns `true` for the floating-point dtypes.
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns `true` if values of `actual` satisfy a spec declaring `self`.
    ///
    /// The check is by numeric family rather than exact width: any integer
    /// value satisfies any integer dtype, floats satisfy floats, and
    /// integers are accepted where a float is declared. Text, bool, bytes,
    /// and datetime must match exactly.
    pub fn accepts(&self, actual: &DType) -> bool {
        match self {
            _ if self == actual => true,
            Self::Float32 | Self::Float64 => actual.is_float() || actual.is_integer(),
            _ if self.is_integer() => actual.is_integer(),
            Self::Text => matches!(actual, Self::IsoDatetime),
            _ => false,
        }
    }
}

impl FromStr for DType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dtype = match s {
            "bool" => Self::Bool,
            "int8" => Self::Int8,
            "int16" | "short" => Self::Int16,
            "int32" | "int" => Self::Int32,
            "int64" | "long" => Self::Int64,
            "uint8" => Self::UInt8,
            "uint16" => Self::UInt16,
            "uint32" | "uint" => Self::UInt32,
            "uint64" => Self::UInt64,
            "float32" | "float" => Self::Float32,
            "float64" | "double" => Self::Float64,
            "text" | "utf" | "utf8" | "utf-8" => Self::Text,
            "bytes" | "ascii" => Self::Bytes,
            "isodatetime" | "datetime" => Self::IsoDatetime,
            other => return Err(TypeError::UnknownDType(other.to_string())),
        };
        Ok(dtype)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ref(r) => write!(f, "ref<{}>", r.target_type),
            Self::Compound(fields) => write!(f, "compound[{}]", fields.len()),
            other => f.write_str(other.name()),
        }
    }
}

/// Serde surface: primitive dtypes are bare strings, references are maps,
/// compounds are lists.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum DTypeRepr {
    Name(String),
    Ref(RefDType),
    Compound(Vec<CompoundField>),
}

impl Serialize for DType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Ref(r) => r.serialize(serializer),
            Self::Compound(fields) => fields.serialize(serializer),
            other => serializer.serialize_str(other.name()),
        }
    }
}

impl<'de> Deserialize<'de> for DType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match DTypeRepr::deserialize(deserializer)? {
            DTypeRepr::Name(name) => name.parse().map_err(serde::de::Error::custom),
            DTypeRepr::Ref(r) => Ok(Self::Ref(r)),
            DTypeRepr::Compound(fields) => Ok(Self::Compound(fields)),
        }
    }
}
