//! Schema-driven object mapping for trellis.
//!
//! This crate is the bridge between domain objects and the builder tree:
//! an [`ObjectMapper`] derived from each type's resolved spec translates
//! containers to builder subtrees (*build*) and back (*construct*),
//! the [`TypeMap`] binds registered data types to implementation
//! factories (synthesizing a [`ContainerClass`] when no hand-written
//! one exists), and the [`BuildManager`] orchestrates a session with
//! identity caches so shared objects map once and round trips preserve
//! identity.

pub mod error;
pub mod manager;
pub mod mapper;
pub mod names;
pub mod synth;
pub mod typemap;
mod walk;

pub use error::{MapError, MapResult};
pub use manager::{BuildManager, BuildOptions};
pub use mapper::{ConstructorArgHook, FieldValueHook, MapperOverrides, ObjectMapper};
pub use names::{camel_to_snake, default_field_name};
pub use synth::{ContainerClass, ContainerFactory, FieldArgs, FieldDescriptor, FieldKind};
pub use typemap::TypeMap;
