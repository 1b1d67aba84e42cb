//! Custom profile attribute field definitions
//!
//! `cpa-fields` is the pure schema layer for custom profile attributes. It owns
//! the shape of a field definition, the rules that make one valid, and the
//! merge semantics of partial updates. It performs no I/O; persistence and
//! access control live in `cpa-service`.
//!
//! # Architecture
//!
//! - **Single decode point**: the wire shape ([`RawPropertyField`]) is decoded
//!   once into a typed [`PropertyField`]; type-specific payloads such as select
//!   options become a tagged [`FieldConfig`]
//! - **Separate construct and validate**: values are built first and checked
//!   with `is_valid()` afterwards, so callers can assemble then validate
//! - **Soft delete**: deletion is a timestamp, read through `is_active()`

pub mod attrs;
pub mod error;
pub mod id;
pub mod types;
pub mod validation;

pub use attrs::{Attrs, FieldAttrs, Visibility};
pub use error::{FieldsError, Result};
pub use id::{is_valid_id, new_id, FieldId};
pub use types::{
    FieldConfig, FieldType, PropertyField, PropertyFieldPatch, RawPropertyField,
    SelectFieldConfig, SelectOption,
};
pub use validation::{validate_raw_field, NAME_MAX_CHARS};
