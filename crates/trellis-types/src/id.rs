use std::fmt;

use serde::{Deserialize, Serialize};

/// Handle to a domain object inside a `ContainerStore` arena.
///
/// Handles are plain indexes: cheap to copy, hashable, and stable for the
/// lifetime of the arena that issued them. Identity comparisons in the
/// build/construct caches are comparisons of these handles.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContainerId(u32);

impl ContainerId {
    /// Create a handle from a raw arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw arena index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerId({})", self.0)
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Handle to a node inside a `BuilderTree` arena.
///
/// The builder tree owns its nodes; a `BuilderId` never keeps a node alive
/// and is only meaningful against the tree that issued it.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BuilderId(u32);

impl BuilderId {
    /// Create a handle from a raw arena index.
    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }

    /// The raw arena index.
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuilderId({})", self.0)
    }
}

impl fmt::Display for BuilderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}
