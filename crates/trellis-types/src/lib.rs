//! Foundation types for trellis.
//!
//! This crate provides the handle, data-type, and value types used throughout
//! the trellis mapping engine. Every other trellis crate depends on
//! `trellis-types`.
//!
//! # Key Types
//!
//! - [`ContainerId`] / [`BuilderId`]: arena handles for domain objects and
//!   builder-tree nodes
//! - [`TypeKey`]: fully-qualified name of a registered data type
//! - [`DType`]: storage element type declared by schema specs
//! - [`ScalarValue`] / [`ArrayValue`]: concrete data carried by fields,
//!   attributes, and datasets
//! - [`Value`]: a field value, either data or references to containers

pub mod dtype;
pub mod error;
pub mod id;
pub mod key;
pub mod value;

pub use dtype::{CompoundField, DType, RefDType};
pub use error::TypeError;
pub use id::{BuilderId, ContainerId};
pub use key::TypeKey;
pub use value::{ArrayData, ArrayValue, ScalarValue, Value};
