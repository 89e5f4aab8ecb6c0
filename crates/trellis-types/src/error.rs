use thiserror::Error;

/// Errors produced by value and data-type operations.
#[derive(Debug, Error, PartialEq)]
pub enum TypeError {
    /// The data-type name is not one the engine knows.
    #[error("unknown dtype: {0}")]
    UnknownDType(String),

    /// An array payload does not match its declared shape.
    #[error("shape mismatch: shape {shape:?} implies {expected} elements, got {actual}")]
    ShapeMismatch {
        shape: Vec<usize>,
        expected: usize,
        actual: usize,
    },

    /// A value's dtype does not satisfy the declared dtype.
    #[error("dtype mismatch: expected {expected}, got {actual}")]
    DTypeMismatch { expected: String, actual: String },

    /// A value cannot be coerced to the requested dtype.
    #[error("cannot coerce {from} to {to}")]
    NotCoercible { from: String, to: String },

    /// Arrays with different dtypes or trailing shapes cannot be joined.
    #[error("cannot concatenate arrays: {0}")]
    Concat(String),
}
