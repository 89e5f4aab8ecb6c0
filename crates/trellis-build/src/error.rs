use thiserror::Error;
use trellis_types::BuilderId;

/// Errors raised by builder-tree operations.
#[derive(Debug, Error, PartialEq)]
pub enum BuilderError {
    /// The handle does not belong to this tree.
    #[error("no builder for handle {0}")]
    DanglingHandle(BuilderId),

    /// A typed accessor was used on a node of another kind.
    #[error("builder {id} is a {actual}, expected a {expected}")]
    KindMismatch {
        id: BuilderId,
        expected: &'static str,
        actual: &'static str,
    },

    /// One name, one kind: a group entry cannot change kind.
    #[error("name {name:?} is already a {existing} in this group, cannot add a {offered}")]
    NameConflict {
        name: String,
        existing: &'static str,
        offered: &'static str,
    },

    /// A builder is owned by at most one parent.
    #[error("builder {child} is already attached to a parent")]
    AlreadyAttached { child: BuilderId },

    /// Chunk blocks must agree on dtype and trailing shape.
    #[error("invalid chunk block: {0}")]
    ChunkShape(String),
}

/// Convenience alias used throughout the build crate.
pub type BuilderResult<T> = Result<T, BuilderError>;
