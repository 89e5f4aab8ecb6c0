use thiserror::Error;
use trellis_types::ContainerId;

/// Errors raised by container and arena operations.
#[derive(Debug, Error, PartialEq)]
pub enum ContainerError {
    /// The handle does not belong to this arena.
    #[error("no container for handle {0}")]
    DanglingHandle(ContainerId),

    /// Fields are assigned exactly once.
    #[error("field {field:?} of container {container} is already set")]
    FieldReassigned {
        container: ContainerId,
        field: String,
    },

    /// A container's parent is assigned exactly once.
    #[error("parent of container {container} is already set")]
    ParentReassigned { container: ContainerId },

    /// Parent assignment would make a container its own ancestor.
    #[error("setting parent of {child} to {parent} would create a cycle")]
    ParentCycle {
        child: ContainerId,
        parent: ContainerId,
    },
}

/// Convenience alias used throughout the container crate.
pub type ContainerResult<T> = Result<T, ContainerError>;
