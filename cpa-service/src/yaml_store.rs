//! YAML-on-disk field storage.
//!
//! One `<id>.yaml` file per field definition under a root directory. Writes
//! go to a temp file that is renamed into place, and are serialised through a
//! mutex so read-modify-write sequences on one record do not interleave.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cpa_fields::{is_valid_id, FieldsError, FieldId, PropertyField};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use ulid::Ulid;

use crate::error::{Result, ServiceError};
use crate::store::FieldStore;

/// Field storage backed by a directory of YAML files.
#[derive(Debug)]
pub struct YamlFieldStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl YamlFieldStore {
    /// Open or create a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        debug!(root = %root.display(), "yaml field store opened");
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// The root directory path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of a record. Only well-formed IDs map to a path, so lookups can
    /// never escape the root directory.
    fn field_path(&self, id: &FieldId) -> Option<PathBuf> {
        is_valid_id(id.as_str()).then(|| self.root.join(format!("{id}.yaml")))
    }

    async fn read_field(&self, path: &Path) -> Result<PropertyField> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_yaml_ng::from_str(&content)?)
    }

    async fn write_field(&self, path: &Path, field: &PropertyField) -> Result<()> {
        let yaml = serde_yaml_ng::to_string(field)?;
        atomic_write(path, yaml.as_bytes()).await
    }

    async fn load_existing(&self, id: &FieldId) -> Result<(PathBuf, PropertyField)> {
        let path = self
            .field_path(id)
            .ok_or_else(|| ServiceError::not_found(id))?;
        if !fs::try_exists(&path).await? {
            return Err(ServiceError::not_found(id));
        }
        let field = self.read_field(&path).await?;
        Ok((path, field))
    }
}

#[async_trait]
impl FieldStore for YamlFieldStore {
    async fn save(&self, field: PropertyField) -> Result<PropertyField> {
        self.save_within_limit(field, 0).await
    }

    async fn save_within_limit(
        &self,
        field: PropertyField,
        limit: usize,
    ) -> Result<PropertyField> {
        let path = self
            .field_path(&field.id)
            .ok_or_else(|| FieldsError::invalid("id is not a valid ID"))?;

        let _guard = self.write_lock.lock().await;
        if limit > 0 && self.get_all_active().await?.len() >= limit {
            return Err(ServiceError::FieldLimitReached { limit });
        }
        if fs::try_exists(&path).await? {
            return Err(ServiceError::DuplicateId {
                id: field.id.to_string(),
            });
        }
        self.write_field(&path, &field).await?;
        debug!(id = %field.id, path = %path.display(), "field written");
        Ok(field)
    }

    async fn get(&self, id: &FieldId) -> Result<PropertyField> {
        let (_, field) = self.load_existing(id).await?;
        Ok(field)
    }

    async fn get_all_active(&self) -> Result<Vec<PropertyField>> {
        let mut fields = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("yaml") {
                continue;
            }
            match self.read_field(&path).await {
                Ok(field) if field.is_active() => fields.push(field),
                Ok(_) => {}
                Err(e) => {
                    warn!(?path, %e, "skipping unreadable field definition");
                }
            }
        }
        // directory order is arbitrary; creation order keeps listings stable
        fields.sort_by(|a, b| {
            a.create_at
                .cmp(&b.create_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(fields)
    }

    async fn update(&self, field: PropertyField) -> Result<PropertyField> {
        let _guard = self.write_lock.lock().await;
        let (path, _) = self.load_existing(&field.id).await?;
        self.write_field(&path, &field).await?;
        Ok(field)
    }

    async fn soft_delete(&self, id: &FieldId, when: i64) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let (path, mut field) = self.load_existing(id).await?;
        if field.is_active() {
            field.mark_deleted(when);
            self.write_field(&path, &field).await?;
        }
        Ok(())
    }
}

/// Write to a temp file then rename for atomic persistence.
async fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "no parent dir"))?;
    let tmp = dir.join(format!(".tmp_{}", Ulid::new()));
    fs::write(&tmp, data).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpa_fields::{FieldAttrs, FieldConfig, SelectFieldConfig, SelectOption, Visibility};
    use tempfile::TempDir;

    fn make_test_field(name: &str, create_at: i64) -> PropertyField {
        let mut field = PropertyField::new(name, FieldConfig::Text)
            .with_attrs(FieldAttrs::new().with_visibility(Visibility::Default));
        field.id = FieldId::new();
        field.create_at = create_at;
        field.update_at = create_at;
        field
    }

    async fn open_temp() -> (TempDir, YamlFieldStore) {
        let tmp = TempDir::new().unwrap();
        let store = YamlFieldStore::open(tmp.path().join("fields")).await.unwrap();
        (tmp, store)
    }

    #[tokio::test]
    async fn open_creates_directory() {
        let (tmp, store) = open_temp().await;
        assert!(tmp.path().join("fields").is_dir());
        assert_eq!(store.root(), tmp.path().join("fields"));
    }

    #[tokio::test]
    async fn save_writes_one_file_per_field() {
        let (_tmp, store) = open_temp().await;
        let field = make_test_field("title", 1);
        let id = field.id.clone();
        store.save(field).await.unwrap();

        let path = store.root().join(format!("{id}.yaml"));
        assert!(path.exists());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("type: text"));
        assert!(content.contains("visibility: default"));
    }

    #[tokio::test]
    async fn save_and_get_select_field() {
        let (_tmp, store) = open_temp().await;
        let mut field = PropertyField::new(
            "Team",
            FieldConfig::Select(SelectFieldConfig::default().option(SelectOption::new("A", "red"))),
        );
        field.id = FieldId::new();
        store.save(field.clone()).await.unwrap();

        let loaded = store.get(&field.id).await.unwrap();
        assert_eq!(loaded, field);
    }

    #[tokio::test]
    async fn save_rejects_malformed_id() {
        let (_tmp, store) = open_temp().await;
        let mut field = make_test_field("x", 1);
        field.id = FieldId::from("../escape");
        let err = store.save(field).await.unwrap_err();
        assert!(matches!(err, ServiceError::Invalid(_)));
    }

    #[tokio::test]
    async fn save_duplicate_errors() {
        let (_tmp, store) = open_temp().await;
        let field = make_test_field("x", 1);
        store.save(field.clone()).await.unwrap();
        let err = store.save(field).await.unwrap_err();
        assert!(matches!(err, ServiceError::DuplicateId { .. }));
    }

    #[tokio::test]
    async fn get_missing_or_malformed_is_not_found() {
        let (_tmp, store) = open_temp().await;
        assert!(matches!(
            store.get(&FieldId::new()).await,
            Err(ServiceError::NotFound { .. })
        ));
        assert!(matches!(
            store.get(&FieldId::from("not-an-id")).await,
            Err(ServiceError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn listing_is_ordered_by_creation_and_skips_deleted() {
        let (_tmp, store) = open_temp().await;
        let late = make_test_field("late", 30);
        let early = make_test_field("early", 10);
        let gone = make_test_field("gone", 20);
        let gone_id = gone.id.clone();
        store.save(late).await.unwrap();
        store.save(early).await.unwrap();
        store.save(gone).await.unwrap();
        store.soft_delete(&gone_id, 99).await.unwrap();

        let names: Vec<_> = store
            .get_all_active()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.name)
            .collect();
        assert_eq!(names, vec!["early", "late"]);
        assert_eq!(store.get(&gone_id).await.unwrap().deleted_at(), Some(99));
    }

    #[tokio::test]
    async fn listing_skips_invalid_files() {
        let (_tmp, store) = open_temp().await;
        store.save(make_test_field("ok", 1)).await.unwrap();
        std::fs::write(store.root().join("broken.yaml"), "type: [").unwrap();
        std::fs::write(store.root().join("notes.txt"), "ignored").unwrap();

        let fields = store.get_all_active().await.unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "ok");
    }

    #[tokio::test]
    async fn update_persists_across_reopen() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("fields");
        let mut field = make_test_field("before", 1);

        {
            let store = YamlFieldStore::open(&root).await.unwrap();
            store.save(field.clone()).await.unwrap();
            field.name = "after".into();
            store.update(field.clone()).await.unwrap();
        }

        let store = YamlFieldStore::open(&root).await.unwrap();
        assert_eq!(store.get(&field.id).await.unwrap().name, "after");
    }

    #[tokio::test]
    async fn soft_delete_is_idempotent() {
        let (_tmp, store) = open_temp().await;
        let field = make_test_field("x", 1);
        let id = field.id.clone();
        store.save(field).await.unwrap();

        store.soft_delete(&id, 5).await.unwrap();
        store.soft_delete(&id, 6).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().deleted_at(), Some(5));
    }

    #[tokio::test]
    async fn soft_delete_at_zero_still_deletes() {
        let (_tmp, store) = open_temp().await;
        let field = make_test_field("x", 1);
        let id = field.id.clone();
        store.save(field).await.unwrap();

        store.soft_delete(&id, 0).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().deleted_at(), Some(1));
        assert!(store.get_all_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_within_limit_rejects_when_full() {
        let (_tmp, store) = open_temp().await;
        store.save_within_limit(make_test_field("a", 1), 1).await.unwrap();
        let err = store
            .save_within_limit(make_test_field("b", 2), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FieldLimitReached { limit: 1 }));
        assert_eq!(store.count_active().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_never_exceed_limit() {
        let (_tmp, store) = open_temp().await;
        let store = std::sync::Arc::new(store);
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .save_within_limit(make_test_field(&format!("f{i}"), i), 2)
                        .await
                })
            })
            .collect();

        let mut saved = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                saved += 1;
            }
        }
        assert_eq!(saved, 2);
        assert_eq!(store.get_all_active().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let (_tmp, store) = open_temp().await;
        store.save(make_test_field("x", 1)).await.unwrap();
        let leftovers = std::fs::read_dir(store.root())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(".tmp_"))
            .count();
        assert_eq!(leftovers, 0);
    }
}
