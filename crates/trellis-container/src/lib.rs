//! Domain-object arena for trellis.
//!
//! A [`Container`] is a tagged record: a type key naming its registered
//! data type plus named field values. The [`ContainerStore`] arena owns
//! every container of one object graph and enforces set-once fields,
//! set-once parents, and cycle-free ancestry.

pub mod container;
pub mod error;
pub mod store;

pub use container::Container;
pub use error::{ContainerError, ContainerResult};
pub use store::ContainerStore;
