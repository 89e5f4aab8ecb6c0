use serde::{Deserialize, Serialize};

/// Declared array shape of an attribute or dataset.
///
/// A `null` dimension means unbounded. A spec may declare a single shape or
/// a list of acceptable alternatives; the document forms are a flat list
/// (`[null, 3]`) and a list of lists respectively.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ShapeSpec {
    Single(Vec<Option<u64>>),
    Alternatives(Vec<Vec<Option<u64>>>),
}

impl ShapeSpec {
    /// The shape alternatives, a single shape counting as one alternative.
    pub fn alternatives(&self) -> Vec<&[Option<u64>]> {
        match self {
            Self::Single(s) => vec![s.as_slice()],
            Self::Alternatives(alts) => alts.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Whether an array of the given concrete shape satisfies any
    /// alternative.
    pub fn matches(&self, shape: &[usize]) -> bool {
        self.alternatives().iter().any(|alt| {
            alt.len() == shape.len()
                && alt
                    .iter()
                    .zip(shape)
                    .all(|(dim, actual)| dim.map_or(true, |d| d == *actual as u64))
        })
    }
}

/// Human-readable labels for the dimensions of a [`ShapeSpec`], with the
/// same single-or-alternatives document split.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DimsSpec {
    Single(Vec<String>),
    Alternatives(Vec<Vec<String>>),
}

impl DimsSpec {
    /// The label alternatives, parallel to [`ShapeSpec::alternatives`].
    pub fn alternatives(&self) -> Vec<&[String]> {
        match self {
            Self::Single(d) => vec![d.as_slice()],
            Self::Alternatives(alts) => alts.iter().map(Vec::as_slice).collect(),
        }
    }

    /// Whether these labels match the shape, alternative by alternative.
    pub fn matches_shape(&self, shape: &ShapeSpec) -> bool {
        let dims = self.alternatives();
        let shapes = shape.alternatives();
        dims.len() == shapes.len()
            && dims.iter().zip(&shapes).all(|(d, s)| d.len() == s.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_shape_matches_concrete_arrays() {
        let shape = ShapeSpec::Single(vec![None, Some(3)]);
        assert!(shape.matches(&[10, 3]));
        assert!(shape.matches(&[0, 3]));
        assert!(!shape.matches(&[10, 4]));
        assert!(!shape.matches(&[10]));
    }

    #[test]
    fn alternatives_match_any_arm() {
        let shape = ShapeSpec::Alternatives(vec![vec![None], vec![None, Some(2)]]);
        assert!(shape.matches(&[7]));
        assert!(shape.matches(&[7, 2]));
        assert!(!shape.matches(&[7, 3]));
    }

    #[test]
    fn dims_arity_check() {
        let shape = ShapeSpec::Single(vec![None, Some(3)]);
        let good = DimsSpec::Single(vec!["time".into(), "xyz".into()]);
        let bad = DimsSpec::Single(vec!["time".into()]);
        assert!(good.matches_shape(&shape));
        assert!(!bad.matches_shape(&shape));
    }

    #[test]
    fn document_forms() {
        let shape: ShapeSpec = serde_json::from_str("[null, 3]").unwrap();
        assert_eq!(shape, ShapeSpec::Single(vec![None, Some(3)]));
        let alts: ShapeSpec = serde_json::from_str("[[null], [null, 2]]").unwrap();
        assert_eq!(
            alts,
            ShapeSpec::Alternatives(vec![vec![None], vec![None, Some(2)]])
        );
    }
}
