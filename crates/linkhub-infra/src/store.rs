//! JSON file project store.
//!
//! One pretty-printed JSON file per record under `{data_dir}/projects/`,
//! named after the edit key. Writes go to a dot-prefixed temp file that is
//! then renamed over the target, so readers never observe a partial record.
//! Compare-and-write is serialised by an async mutex.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use linkhub_core::registry::ProjectStore;
use linkhub_types::error::RegistryError;
use linkhub_types::project::{ProjectKey, ProjectRecord};

const RECORD_EXTENSION: &str = "json";

/// File-backed implementation of [`ProjectStore`].
pub struct JsonProjectStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonProjectStore {
    /// Store records under `{data_dir}/projects/`. The directory is created
    /// on first write.
    pub fn new(data_dir: &Path) -> Self {
        Self::at(data_dir.join("projects"))
    }

    /// Store records directly in `dir`.
    pub fn at(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &ProjectKey) -> PathBuf {
        self.dir.join(format!("{key}.{RECORD_EXTENSION}"))
    }

    fn temp_path(&self, key: &ProjectKey) -> PathBuf {
        self.dir.join(format!(".{key}.{RECORD_EXTENSION}.tmp"))
    }

    async fn read_record(&self, path: &Path, key: &str) -> Result<Option<ProjectRecord>, RegistryError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(RegistryError::Storage(format!(
                    "failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let record: ProjectRecord =
            serde_json::from_str(&content).map_err(|e| RegistryError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        if record.key.as_str() != key {
            return Err(RegistryError::Corrupt {
                key: key.to_string(),
                reason: format!("file holds record for key '{}'", record.key),
            });
        }
        Ok(Some(record))
    }
}

fn storage_error(action: &str, path: &Path, e: std::io::Error) -> RegistryError {
    RegistryError::Storage(format!("failed to {action} {}: {e}", path.display()))
}

impl ProjectStore for JsonProjectStore {
    async fn get(&self, key: &ProjectKey) -> Result<Option<ProjectRecord>, RegistryError> {
        self.read_record(&self.record_path(key), key.as_str()).await
    }

    async fn put(
        &self,
        record: &ProjectRecord,
        expected_revision: Option<u64>,
    ) -> Result<(), RegistryError> {
        let _guard = self.write_lock.lock().await;

        let path = self.record_path(&record.key);
        let current = self
            .read_record(&path, record.key.as_str())
            .await?
            .map(|r| r.revision);
        if current != expected_revision {
            return Err(RegistryError::Conflict(format!(
                "record '{}' is at revision {current:?}, expected {expected_revision:?}",
                record.key
            )));
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| storage_error("create", &self.dir, e))?;

        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| RegistryError::Storage(format!("failed to encode record: {e}")))?;
        let temp = self.temp_path(&record.key);
        tokio::fs::write(&temp, json)
            .await
            .map_err(|e| storage_error("write", &temp, e))?;
        tokio::fs::rename(&temp, &path)
            .await
            .map_err(|e| storage_error("replace", &path, e))?;

        tracing::debug!(key = %record.key, revision = record.revision, "Record written");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<ProjectRecord>, RegistryError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(storage_error("list", &self.dir, e)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| storage_error("list", &self.dir, e))?
        {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(key) = name.strip_suffix(&format!(".{RECORD_EXTENSION}")) else {
                continue;
            };
            if key.starts_with('.') {
                continue;
            }
            if let Some(record) = self.read_record(&path, key).await? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkhub_core::registry::ProjectRegistry;
    use linkhub_types::link::{CanonicalLink, LinkField};
    use linkhub_types::logo::LogoSlot;
    use linkhub_types::project::{NewProject, ProjectId};
    use tempfile::TempDir;

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 13];

    fn new_project() -> NewProject {
        let logo = LogoSlot {
            filename: "logo1.png".to_string(),
            bytes: PNG.to_vec(),
        };
        NewProject {
            project_id: ProjectId::new("multilink-a1b2c3"),
            title: "News Hub".to_string(),
            links: [
                CanonicalLink::from_handle("main_bot"),
                CanonicalLink::from_handle("backup_bot"),
                CanonicalLink::from_handle("news_channel"),
            ],
            logos: [logo.clone(), logo.clone(), logo],
        }
    }

    #[tokio::test]
    async fn test_missing_directory_lists_empty() {
        let tmp = TempDir::new().unwrap();
        let store = JsonProjectStore::new(tmp.path());
        assert!(store.list().await.unwrap().is_empty());
        assert!(
            store
                .get(&ProjectKey::parse("abc").unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_records_survive_reopen() {
        let tmp = TempDir::new().unwrap();
        let created = ProjectRegistry::new(JsonProjectStore::new(tmp.path()))
            .create(new_project())
            .await
            .unwrap();

        let reopened = ProjectRegistry::new(JsonProjectStore::new(tmp.path()));
        let collection = reopened.load().await.unwrap();
        assert_eq!(collection.len(), 1);
        assert_eq!(collection[&created.key], created);

        let path = tmp.path().join("projects").join(format!("{}.json", created.key));
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw["project"], "multilink-a1b2c3");
        assert_eq!(raw["link1"], "https://t.me/main_bot");
        assert_eq!(raw["logo1_name"], "logo1.png");
    }

    #[tokio::test]
    async fn test_update_through_registry() {
        let tmp = TempDir::new().unwrap();
        let registry = ProjectRegistry::new(JsonProjectStore::new(tmp.path()));
        let created = registry.create(new_project()).await.unwrap();

        registry
            .update(&created.key, LinkField::Link3, CanonicalLink::from_handle("fresh_channel"))
            .await
            .unwrap();

        let reloaded = registry.get(&created.key).await.unwrap();
        assert_eq!(reloaded.links[2].handle(), "fresh_channel");
        assert_eq!(reloaded.revision, 1);
        assert!(
            !tmp.path()
                .join("projects")
                .join(format!(".{}.json.tmp", created.key))
                .exists()
        );
    }

    #[tokio::test]
    async fn test_put_rejects_stale_revision() {
        let tmp = TempDir::new().unwrap();
        let store = JsonProjectStore::new(tmp.path());
        let record = ProjectRecord::from_new(ProjectKey::generate(), new_project());

        store.put(&record, None).await.unwrap();
        let err = store.put(&record, None).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));

        let mut next = record.clone();
        next.revision = 1;
        store.put(&next, Some(0)).await.unwrap();
        let err = store.put(&next, Some(0)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let store = JsonProjectStore::new(tmp.path());
        std::fs::create_dir_all(store.dir()).unwrap();
        std::fs::write(store.dir().join("deadbeef.json"), "{ not json").unwrap();

        let err = store.list().await.unwrap_err();
        assert!(matches!(err, RegistryError::Corrupt { key, .. } if key == "deadbeef"));
    }

    #[tokio::test]
    async fn test_list_skips_temp_and_foreign_files() {
        let tmp = TempDir::new().unwrap();
        let store = JsonProjectStore::new(tmp.path());
        let record = ProjectRecord::from_new(ProjectKey::generate(), new_project());
        store.put(&record, None).await.unwrap();
        std::fs::write(store.dir().join(".partial.json.tmp"), "{").unwrap();
        std::fs::write(store.dir().join("notes.txt"), "hello").unwrap();

        let records = store.list().await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, record.key);
    }

    #[tokio::test]
    async fn test_concurrent_creates_all_land() {
        let tmp = TempDir::new().unwrap();
        let registry = std::sync::Arc::new(ProjectRegistry::new(JsonProjectStore::new(tmp.path())));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                registry.create(new_project()).await.unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(registry.load().await.unwrap().len(), 8);
    }
}
