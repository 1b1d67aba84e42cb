//! Custom profile attribute field management
//!
//! Wraps the `cpa-fields` schema layer with storage, configuration and an
//! access-controlled boundary:
//!
//! - [`FieldService`] creates, lists, fetches, patches and soft-deletes field
//!   definitions against a [`FieldStore`]
//! - [`FieldsApi`] adds the feature-flag gate, admin permission checks and an
//!   audit log of mutations
//! - [`FieldsConfig`] is loaded with Figment from defaults, an optional file
//!   and `CPA_` environment variables
//!
//! ```no_run
//! use std::sync::Arc;
//! use cpa_service::{open_store, Actor, FieldService, FieldsApi, FieldsConfig, StaticPermissions};
//!
//! # async fn run() -> cpa_service::Result<()> {
//! let config = FieldsConfig::load()?;
//! let store = open_store(&config).await?;
//! let api = FieldsApi::new(
//!     FieldService::new(store, config),
//!     Arc::new(StaticPermissions::new().with_admin("admin-user-id")),
//! );
//! let fields = api.list_fields(&Actor::Local).await?;
//! # let _ = fields;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod log;
pub mod service;
pub mod store;
pub mod yaml_store;

pub use api::{Actor, FieldsApi, PermissionChecker, StaticPermissions};
pub use config::{
    FeatureFlags, FieldsConfig, ReadPolicy, CUSTOM_PROFILE_ATTRIBUTES, DEFAULT_FIELD_LIMIT,
    ENV_PREFIX,
};
pub use error::{ErrorKind, Result, ServiceError};
pub use log::{LogEntry, LogSink, MemoryLogSink, TracingLogSink};
pub use service::{Clock, FieldService, ManualClock, SystemClock};
pub use store::{open_store, FieldStore, MemoryFieldStore};
pub use yaml_store::YamlFieldStore;
