//! Backend-agnostic builder tree for trellis.
//!
//! The builder tree is the in-memory hierarchical form that sits between
//! domain objects and a storage backend: groups containing sub-groups,
//! datasets, attributes, and links, all addressed by [`BuilderId`]
//! handles into one [`BuilderTree`] arena. [`DataChunkIterator`] lets
//! datasets be written as a lazy sequence of placement-tagged chunks.
//!
//! [`BuilderId`]: trellis_types::BuilderId

pub mod chunks;
pub mod error;
pub mod tree;

pub use chunks::{DataChunk, DataChunkIterator, RowChunkIterator};
pub use error::{BuilderError, BuilderResult};
pub use tree::{
    AttrValue, BuilderKind, BuilderNode, BuilderTree, ChildKind, DatasetData, DatasetValue,
    GroupData, LinkData,
};
