use thiserror::Error;

/// Errors raised by spec construction, catalog registration, and namespace
/// loading. All of these are fatal at schema-definition time; nothing in
/// this crate recovers from a malformed spec.
#[derive(Debug, Error)]
pub enum SpecError {
    /// A wildcard-named spec must declare or extend a data type.
    #[error("spec at {path:?} has no name and neither data_type_def nor data_type_inc")]
    WildcardWithoutType { path: String },

    /// A concretely named spec cannot allow multiple instances.
    #[error("spec {name:?} has a fixed name but multi-instance quantity {quantity}")]
    NamedMultiInstance { name: String, quantity: String },

    /// An attribute may carry a fixed value or a default, not both.
    #[error("attribute {name:?} declares both value and default_value")]
    ValueAndDefault { name: String },

    /// `dims` labels must match the declared shape, alternative by
    /// alternative.
    #[error("spec {name:?}: dims do not match shape arity")]
    DimsShapeMismatch { name: String },

    /// At most one unnamed child per data type within a group.
    #[error("group already contains an unnamed child of data type {data_type:?}")]
    DataTypeConflict { data_type: String },

    /// A type name may be registered once per catalog.
    #[error("data type {data_type:?} is already registered in this catalog")]
    AlreadyRegistered { data_type: String },

    /// A spec's parent back-reference is set exactly once.
    #[error("parent of spec {path:?} is already set")]
    ParentReassigned { path: String },

    /// Typed specs may not declare the engine's reserved attributes.
    #[error("data type {data_type:?} declares reserved attribute {name:?}")]
    ReservedAttribute { name: String, data_type: String },

    /// Only specs that define a data type can be registered.
    #[error("spec {path:?} declares no data_type_def and cannot be registered")]
    NoTypeDefinition { path: String },

    /// A group spec can only resolve against a group, a dataset against a
    /// dataset.
    #[error("cannot resolve {child} spec against {parent} spec")]
    KindMismatch { child: String, parent: String },

    /// The requested type is not registered.
    #[error("unknown data type {data_type:?}")]
    UnknownType { data_type: String },

    /// The requested namespace is not registered.
    #[error("unknown namespace {namespace:?}")]
    UnknownNamespace { namespace: String },

    /// Parent-type links form a cycle.
    #[error("type hierarchy of {data_type:?} is cyclic")]
    CyclicHierarchy { data_type: String },

    /// A namespace name is bound to a different version already.
    #[error(
        "namespace {namespace:?} is registered at version {registered:?}, cannot load {offered:?}"
    )]
    NamespaceVersionConflict {
        namespace: String,
        registered: String,
        offered: String,
    },

    /// A schema or namespace document failed to parse.
    #[error("invalid schema document: {0}")]
    Document(String),

    /// A schema or namespace file could not be read.
    #[error("i/o error reading schema: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for SpecError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Document(err.to_string())
    }
}

impl From<serde_json::Error> for SpecError {
    fn from(err: serde_json::Error) -> Self {
        Self::Document(err.to_string())
    }
}

/// Convenience alias used throughout the spec crate.
pub type SpecResult<T> = Result<T, SpecError>;
