//! Schema spec model for trellis.
//!
//! A *spec* describes one node of a hierarchical storage schema: an
//! attribute, a dataset, a group, or a link. Group and dataset specs can
//! define new data types (`data_type_def`) or extend existing ones
//! (`data_type_inc`); [`SpecCatalog`] registers types and computes their
//! hierarchies, and [`NamespaceCatalog`] loads versioned namespace
//! documents (YAML or JSON) that bundle catalogs together with provenance
//! and cross-namespace includes.

pub mod attribute;
pub mod catalog;
pub mod dataset;
pub mod error;
pub mod group;
pub mod link;
pub mod namespace;
mod parent;
pub mod quantity;
mod resolve;
pub mod shape;
pub mod storage;

pub use attribute::AttributeSpec;
pub use catalog::SpecCatalog;
pub use dataset::{DatasetSpec, RESERVED_ATTRIBUTES};
pub use error::{SpecError, SpecResult};
pub use group::{GroupSpec, TypedChild};
pub use link::LinkSpec;
pub use namespace::{
    DocFormat, NamespaceCatalog, NamespaceDocument, NamespaceMeta, SchemaEntry, SpecNamespace,
};
pub use parent::Parent;
pub use quantity::Quantity;
pub use shape::{DimsSpec, ShapeSpec};
pub use storage::StorageSpec;
