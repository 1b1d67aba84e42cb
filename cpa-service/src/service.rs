//! Field lifecycle: create, list, get, patch and soft delete.
//!
//! Every operation is a single read-modify-write against the store. A field
//! is only written after it has passed validation, so a rejected create or
//! patch leaves storage exactly as it was.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use cpa_fields::{FieldId, PropertyField, PropertyFieldPatch};
use tracing::{debug, info};

use crate::config::FieldsConfig;
use crate::error::{Result, ServiceError};
use crate::store::FieldStore;

/// Source of timestamps, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start: i64) -> Self {
        Self {
            now: AtomicI64::new(start),
        }
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Orchestrates field validation against a store.
///
/// Authorization is the caller's job (see [`FieldsApi`](crate::FieldsApi));
/// the feature flag is checked here on every call.
pub struct FieldService {
    store: Arc<dyn FieldStore>,
    config: FieldsConfig,
    clock: Arc<dyn Clock>,
}

impl FieldService {
    pub fn new(store: Arc<dyn FieldStore>, config: FieldsConfig) -> Self {
        Self {
            store,
            config,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &FieldsConfig {
        &self.config
    }

    /// Fail with `FeatureDisabled` unless the feature flag is on.
    pub fn ensure_enabled(&self) -> Result<()> {
        if self.config.is_enabled() {
            Ok(())
        } else {
            Err(ServiceError::FeatureDisabled)
        }
    }

    /// Deletion stamps must be non-zero even if the clock reads zero.
    fn now(&self) -> i64 {
        self.clock.now_millis().max(1)
    }

    /// Create a field. The ID and timestamps on `field` are ignored and
    /// replaced; the stored record is returned.
    pub async fn create_field(&self, field: PropertyField) -> Result<PropertyField> {
        self.ensure_enabled()?;

        let mut field = field;
        let now = self.now();
        field.id = FieldId::new();
        field.create_at = now;
        field.update_at = now;
        field.mark_active();
        field.is_valid()?;

        let stored = self
            .store
            .save_within_limit(field, self.config.field_limit)
            .await?;
        info!(id = %stored.id, name = %stored.name, field_type = %stored.field_type(), "field created");
        Ok(stored)
    }

    /// All active fields. Empty when there are none.
    pub async fn list_fields(&self) -> Result<Vec<PropertyField>> {
        self.ensure_enabled()?;
        let mut fields = self.store.get_all_active().await?;
        fields.retain(PropertyField::is_active);
        debug!(count = fields.len(), "listed fields");
        Ok(fields)
    }

    /// A field by ID, deleted or not.
    pub async fn get_field(&self, id: &FieldId) -> Result<PropertyField> {
        self.ensure_enabled()?;
        self.store.get(id).await
    }

    /// Apply `patch` to a stored field.
    pub async fn patch_field(
        &self,
        id: &FieldId,
        patch: &PropertyFieldPatch,
    ) -> Result<PropertyField> {
        self.ensure_enabled()?;

        let existing = self.store.get(id).await?;
        if existing.is_deleted() {
            return Err(ServiceError::FieldDeleted { id: id.to_string() });
        }

        let mut patched = existing.apply_patch(patch)?;
        patched.is_valid()?;
        patched.update_at = self.now().max(existing.update_at);

        let stored = self.store.update(patched).await?;
        info!(id = %stored.id, "field patched");
        Ok(stored)
    }

    /// Soft-delete a field. Deleting a deleted field succeeds and keeps the
    /// original deletion time.
    pub async fn delete_field(&self, id: &FieldId) -> Result<()> {
        self.ensure_enabled()?;

        let existing = self.store.get(id).await?;
        if existing.is_deleted() {
            debug!(%id, "field already deleted");
            return Ok(());
        }

        self.store.soft_delete(id, self.now()).await?;
        info!(%id, "field deleted");
        Ok(())
    }
}
