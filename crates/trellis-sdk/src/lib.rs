//! High-level SDK for trellis.
//!
//! One import surface over the whole stack: spec model, containers,
//! builder tree, object mapping, and storage backends, plus the
//! [`Workspace`] convenience entry point for applications embedding
//! trellis.

pub mod error;
pub mod workspace;

pub use error::{SdkError, SdkResult};
pub use workspace::Workspace;

// Re-export key types
pub use trellis_build::{
    AttrValue, BuilderTree, DataChunk, DataChunkIterator, DatasetValue, RowChunkIterator,
};
pub use trellis_container::{Container, ContainerStore};
pub use trellis_io::{IoError, MemoryBackend, StorageBackend, ROOT_NAME};
pub use trellis_map::{
    BuildManager, BuildOptions, ContainerClass, ContainerFactory, FieldArgs, FieldDescriptor,
    FieldKind, MapError, MapperOverrides, ObjectMapper, TypeMap,
};
pub use trellis_spec::{
    AttributeSpec, DatasetSpec, GroupSpec, LinkSpec, NamespaceCatalog, Quantity, SpecCatalog,
    SpecError, SpecNamespace, StorageSpec,
};
pub use trellis_types::{
    ArrayData, ArrayValue, BuilderId, ContainerId, DType, ScalarValue, TypeKey, Value,
};
