use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// How many instances of a spec may occur under its parent.
///
/// Serializes as the document symbols: `"?"` for zero-or-one, `"*"` for
/// zero-or-many, `"+"` for one-or-many, and a plain integer for exact
/// counts (`1` being the default).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    One,
    ZeroOrOne,
    ZeroOrMany,
    OneOrMany,
    Exactly(u32),
}

impl Quantity {
    /// Whether at least one instance must be present.
    pub fn required(&self) -> bool {
        !matches!(self, Self::ZeroOrOne | Self::ZeroOrMany)
    }

    /// Whether more than one instance may be present.
    pub fn is_many(&self) -> bool {
        match self {
            Self::ZeroOrMany | Self::OneOrMany => true,
            Self::Exactly(n) => *n > 1,
            _ => false,
        }
    }

    /// Serde helper: the default quantity is omitted from documents.
    pub fn is_default(&self) -> bool {
        matches!(self, Self::One)
    }
}

impl Default for Quantity {
    fn default() -> Self {
        Self::One
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::One => write!(f, "1"),
            Self::ZeroOrOne => write!(f, "?"),
            Self::ZeroOrMany => write!(f, "*"),
            Self::OneOrMany => write!(f, "+"),
            Self::Exactly(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum QuantityRepr {
    Symbol(String),
    Count(u32),
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::One => serializer.serialize_u32(1),
            Self::ZeroOrOne => serializer.serialize_str("?"),
            Self::ZeroOrMany => serializer.serialize_str("*"),
            Self::OneOrMany => serializer.serialize_str("+"),
            Self::Exactly(n) => serializer.serialize_u32(*n),
        }
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match QuantityRepr::deserialize(deserializer)? {
            QuantityRepr::Symbol(s) => match s.as_str() {
                "?" => Ok(Self::ZeroOrOne),
                "*" => Ok(Self::ZeroOrMany),
                "+" => Ok(Self::OneOrMany),
                other => Err(serde::de::Error::custom(format!(
                    "invalid quantity symbol {other:?}"
                ))),
            },
            QuantityRepr::Count(1) => Ok(Self::One),
            QuantityRepr::Count(n) => Ok(Self::Exactly(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_and_many() {
        assert!(Quantity::One.required());
        assert!(Quantity::OneOrMany.required());
        assert!(!Quantity::ZeroOrOne.required());
        assert!(!Quantity::ZeroOrMany.required());
        assert!(!Quantity::One.is_many());
        assert!(Quantity::ZeroOrMany.is_many());
        assert!(Quantity::Exactly(3).is_many());
        assert!(!Quantity::Exactly(1).is_many());
    }

    #[test]
    fn serde_symbols_and_counts() {
        assert_eq!(serde_json::to_string(&Quantity::ZeroOrOne).unwrap(), "\"?\"");
        assert_eq!(serde_json::to_string(&Quantity::One).unwrap(), "1");
        assert_eq!(
            serde_json::from_str::<Quantity>("\"*\"").unwrap(),
            Quantity::ZeroOrMany
        );
        assert_eq!(serde_json::from_str::<Quantity>("1").unwrap(), Quantity::One);
        assert_eq!(
            serde_json::from_str::<Quantity>("4").unwrap(),
            Quantity::Exactly(4)
        );
        assert!(serde_json::from_str::<Quantity>("\"x\"").is_err());
    }
}
