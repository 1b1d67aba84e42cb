//! Persistence collaborator for field definitions
//!
//! Stores keep every record they are given and never remove one; deletion is
//! a timestamp set through [`FieldStore::soft_delete`]. Each method is atomic
//! with respect to a single record.

use std::sync::Arc;

use async_trait::async_trait;
use cpa_fields::{FieldId, PropertyField};
use indexmap::IndexMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::FieldsConfig;
use crate::error::{Result, ServiceError};
use crate::yaml_store::YamlFieldStore;

/// Trait for field storage backends
#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Persist a new record. Fails with `DuplicateId` if the ID is taken.
    async fn save(&self, field: PropertyField) -> Result<PropertyField>;

    /// Persist a new record unless `limit` records are already active, in
    /// which case fail with `FieldLimitReached`. A `limit` of zero means no
    /// limit. Counting and inserting happen under one lock, so concurrent
    /// calls never leave more than `limit` active records.
    async fn save_within_limit(
        &self,
        field: PropertyField,
        limit: usize,
    ) -> Result<PropertyField>;

    /// Fetch a record regardless of its delete state.
    async fn get(&self, id: &FieldId) -> Result<PropertyField>;

    /// All records that are not deleted, in the store's natural order.
    async fn get_all_active(&self) -> Result<Vec<PropertyField>>;

    /// Replace an existing record.
    async fn update(&self, field: PropertyField) -> Result<PropertyField>;

    /// Mark a record deleted at `when`. Already deleted records keep their
    /// original timestamp.
    async fn soft_delete(&self, id: &FieldId, when: i64) -> Result<()>;

    /// Number of active records
    async fn count_active(&self) -> Result<usize> {
        Ok(self.get_all_active().await?.len())
    }
}

/// In-memory field storage
///
/// Records are kept in insertion order, which is the order listings return.
#[derive(Debug, Default)]
pub struct MemoryFieldStore {
    fields: RwLock<IndexMap<FieldId, PropertyField>>,
}

impl MemoryFieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        fields: &mut IndexMap<FieldId, PropertyField>,
        field: PropertyField,
    ) -> Result<PropertyField> {
        if fields.contains_key(&field.id) {
            return Err(ServiceError::DuplicateId {
                id: field.id.to_string(),
            });
        }
        fields.insert(field.id.clone(), field.clone());
        Ok(field)
    }
}

#[async_trait]
impl FieldStore for MemoryFieldStore {
    async fn save(&self, field: PropertyField) -> Result<PropertyField> {
        let mut fields = self.fields.write().await;
        Self::insert(&mut fields, field)
    }

    async fn save_within_limit(
        &self,
        field: PropertyField,
        limit: usize,
    ) -> Result<PropertyField> {
        let mut fields = self.fields.write().await;
        if limit > 0 && fields.values().filter(|f| f.is_active()).count() >= limit {
            return Err(ServiceError::FieldLimitReached { limit });
        }
        Self::insert(&mut fields, field)
    }

    async fn get(&self, id: &FieldId) -> Result<PropertyField> {
        self.fields
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::not_found(id))
    }

    async fn get_all_active(&self) -> Result<Vec<PropertyField>> {
        Ok(self
            .fields
            .read()
            .await
            .values()
            .filter(|f| f.is_active())
            .cloned()
            .collect())
    }

    async fn update(&self, field: PropertyField) -> Result<PropertyField> {
        let mut fields = self.fields.write().await;
        let slot = fields
            .get_mut(&field.id)
            .ok_or_else(|| ServiceError::not_found(&field.id))?;
        *slot = field.clone();
        Ok(field)
    }

    async fn soft_delete(&self, id: &FieldId, when: i64) -> Result<()> {
        let mut fields = self.fields.write().await;
        let field = fields
            .get_mut(id)
            .ok_or_else(|| ServiceError::not_found(id))?;
        if field.is_active() {
            field.mark_deleted(when);
        }
        Ok(())
    }

    async fn count_active(&self) -> Result<usize> {
        Ok(self
            .fields
            .read()
            .await
            .values()
            .filter(|f| f.is_active())
            .count())
    }
}

/// Pick the backend named by the configuration: the YAML store when
/// `storage_dir` is set, memory otherwise.
pub async fn open_store(config: &FieldsConfig) -> Result<Arc<dyn FieldStore>> {
    match &config.storage_dir {
        Some(dir) => {
            debug!(dir = %dir.display(), "opening yaml field store");
            Ok(Arc::new(YamlFieldStore::open(dir).await?))
        }
        None => {
            debug!("using in-memory field store");
            Ok(Arc::new(MemoryFieldStore::new()))
        }
    }
}
