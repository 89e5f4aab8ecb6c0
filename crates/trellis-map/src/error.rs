use thiserror::Error;
use trellis_build::BuilderError;
use trellis_container::ContainerError;
use trellis_spec::SpecError;
use trellis_types::{BuilderId, ContainerId, TypeError};

/// Errors raised by the mapping engine.
///
/// Nothing here is recoverable mid-operation: any error aborts the
/// current build or construct and no partial object is observable.
#[derive(Debug, Error)]
pub enum MapError {
    /// A required attribute, dataset, group, or link has no value.
    #[error("missing required field {field:?} while mapping {data_type}")]
    MissingRequiredField { data_type: String, field: String },

    /// The type cannot be resolved to a registered or synthesizable
    /// factory.
    #[error("cannot resolve type {key} to an implementation")]
    UnresolvedType { key: String },

    /// A builder carries no `namespace`/`data_type` attributes.
    #[error("builder at {path:?} carries no data type")]
    UntypedBuilder { path: String },

    /// A child builder matches no schema node of its parent's spec.
    #[error("no sub-spec of {parent} matches child {child:?}")]
    NoMatchingSubspec { parent: String, child: String },

    /// A field mapped to a typed sub-spec does not hold container
    /// references.
    #[error("field {field:?} must hold container references")]
    NotAContainerValue { field: String },

    /// A value does not satisfy the declared shape.
    #[error("field {field:?}: shape {actual:?} does not satisfy {declared}")]
    ValueShape {
        field: String,
        declared: String,
        actual: Vec<usize>,
    },

    /// The resolved factory rejected its arguments.
    #[error("could not construct {data_type}: {message}")]
    Construction { data_type: String, message: String },

    /// An argument not declared by the factory's fields.
    #[error("{data_type} has no field {argument:?}")]
    UnknownArgument { data_type: String, argument: String },

    /// The container graph loops back on itself.
    #[error("container {container} is part of a reference cycle")]
    ContainerCycle { container: ContainerId },

    /// Builder references loop back on themselves while reading.
    #[error("builder {builder} is part of a reference cycle")]
    BuilderCycle { builder: BuilderId },

    /// Nesting deeper than the configured recursion guard.
    #[error("recursion limit of {limit} exceeded")]
    RecursionLimit { limit: usize },

    /// A builder's recorded object id is not a UUID.
    #[error("invalid object id on builder: {0}")]
    InvalidObjectId(String),

    #[error(transparent)]
    Value(#[from] TypeError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Builder(#[from] BuilderError),
}

/// Convenience alias used throughout the mapping crate.
pub type MapResult<T> = Result<T, MapError>;
