//! Storage backend contract for trellis.
//!
//! A [`StorageBackend`] persists a builder tree and reads one back. The
//! trait carries default `write` and `read` orchestration (map the
//! container through a [`BuildManager`], wrap it under a root group,
//! hand the tree to the backend; on read, find the single typed root
//! child and construct it), so a backend only implements the
//! tree-in/tree-out pair. [`MemoryBackend`] is the reference
//! implementation and the test double for the rest of the stack.
//!
//! [`BuildManager`]: trellis_map::BuildManager

pub mod backend;
pub mod error;
pub mod memory;

pub use backend::{StorageBackend, ROOT_NAME};
pub use error::{IoError, IoResult};
pub use memory::MemoryBackend;
