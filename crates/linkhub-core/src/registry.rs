//! Project registry.
//!
//! `ProjectStore` is the persistence port: per-key reads and
//! compare-and-write puts guarded by each record's `revision` token.
//! `ProjectRegistry` layers the registry operations on top of it: whole
//! collection load/save, create with a freshly minted key, and single-field
//! update.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::Utc;
use tracing::info;

use linkhub_types::error::RegistryError;
use linkhub_types::link::{CanonicalLink, LinkField};
use linkhub_types::project::{NewProject, ProjectKey, ProjectRecord};

/// All records, ordered by key.
pub type ProjectCollection = BTreeMap<ProjectKey, ProjectRecord>;

/// Persistence interface for project records.
///
/// Implementations live in linkhub-infra (e.g., `JsonProjectStore`).
pub trait ProjectStore: Send + Sync {
    /// Load one record. Returns `None` if the key does not exist.
    fn get(
        &self,
        key: &ProjectKey,
    ) -> impl Future<Output = Result<Option<ProjectRecord>, RegistryError>> + Send;

    /// Write a record if the stored revision still equals `expected_revision`
    /// (`None` means the key must not exist yet). Fails with
    /// `RegistryError::Conflict` otherwise.
    fn put(
        &self,
        record: &ProjectRecord,
        expected_revision: Option<u64>,
    ) -> impl Future<Output = Result<(), RegistryError>> + Send;

    /// Load every record. An absent store is an empty list.
    fn list(&self) -> impl Future<Output = Result<Vec<ProjectRecord>, RegistryError>> + Send;
}

/// Registry operations over a `ProjectStore`.
pub struct ProjectRegistry<S: ProjectStore> {
    store: S,
}

impl<S: ProjectStore> ProjectRegistry<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Access the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read the entire collection.
    pub async fn load(&self) -> Result<ProjectCollection, RegistryError> {
        let records = self.store.list().await?;
        Ok(records.into_iter().map(|r| (r.key.clone(), r)).collect())
    }

    /// Overwrite the store with every record in `collection`.
    ///
    /// Each record replaces whatever is stored under its key, whatever the
    /// stored revision. Keys absent from `collection` are left alone.
    pub async fn save(&self, collection: &ProjectCollection) -> Result<(), RegistryError> {
        for record in collection.values() {
            let current = self.store.get(&record.key).await?.map(|r| r.revision);
            let mut next = record.clone();
            next.revision = current.map_or(0, |rev| rev + 1);
            self.store.put(&next, current).await?;
        }
        Ok(())
    }

    /// Look up a record, treating absence as a normal outcome.
    pub async fn find(&self, key: &ProjectKey) -> Result<Option<ProjectRecord>, RegistryError> {
        self.store.get(key).await
    }

    /// Look up a record that must exist.
    pub async fn get(&self, key: &ProjectKey) -> Result<ProjectRecord, RegistryError> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| RegistryError::KeyNotFound(key.to_string()))
    }

    /// Insert a new record under a freshly minted key.
    ///
    /// A key collision is reported by the store as `Conflict`, never
    /// silently overwritten.
    pub async fn create(&self, project: NewProject) -> Result<ProjectRecord, RegistryError> {
        let record = ProjectRecord::from_new(ProjectKey::generate(), project);
        self.store.put(&record, None).await?;

        info!(key = %record.key, project = %record.project_id, "Project registered");
        Ok(record)
    }

    /// Insert a record under its own key (imports). Fails with `Conflict`
    /// if the key is taken.
    pub async fn insert(&self, record: ProjectRecord) -> Result<ProjectRecord, RegistryError> {
        self.store.put(&record, None).await?;

        info!(key = %record.key, project = %record.project_id, "Project imported");
        Ok(record)
    }

    /// Replace one link of an existing record.
    pub async fn update(
        &self,
        key: &ProjectKey,
        field: LinkField,
        value: CanonicalLink,
    ) -> Result<ProjectRecord, RegistryError> {
        let current = self.get(key).await?;
        self.update_at(key, field, value, current.revision).await
    }

    /// Replace one link, provided the record is still at `expected`.
    ///
    /// Callers that published a copy of the record pass the revision they
    /// read, so a record changed in the meantime fails with `Conflict`
    /// instead of being overwritten.
    pub async fn update_at(
        &self,
        key: &ProjectKey,
        field: LinkField,
        value: CanonicalLink,
        expected: u64,
    ) -> Result<ProjectRecord, RegistryError> {
        let mut record = self.get(key).await?;
        if record.revision != expected {
            return Err(RegistryError::Conflict(format!(
                "record '{key}' is at revision {}, expected {expected}",
                record.revision
            )));
        }

        record.set_link(field, value);
        record.revision = expected + 1;
        record.updated_at = Some(Utc::now());
        self.store.put(&record, Some(expected)).await?;

        info!(key = %key, field = %field, revision = record.revision, "Project updated");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{InMemoryProjectStore, sample_new_project};

    fn registry() -> ProjectRegistry<InMemoryProjectStore> {
        ProjectRegistry::new(InMemoryProjectStore::default())
    }

    #[tokio::test]
    async fn test_create_then_load_round_trips() {
        let registry = registry();
        let submitted = sample_new_project();

        let created = registry.create(submitted.clone()).await.unwrap();
        let loaded = registry.load().await.unwrap();

        assert_eq!(loaded.len(), 1);
        let record = &loaded[&created.key];
        assert_eq!(record, &created);
        assert_eq!(record.project_id, submitted.project_id);
        assert_eq!(record.title, submitted.title);
        assert_eq!(record.links, submitted.links);
        assert_eq!(record.logos, submitted.logos);
        assert_eq!(record.revision, 0);
    }

    #[tokio::test]
    async fn test_create_mints_distinct_keys() {
        let registry = registry();
        let a = registry.create(sample_new_project()).await.unwrap();
        let b = registry.create(sample_new_project()).await.unwrap();
        assert_ne!(a.key, b.key);
        assert_eq!(registry.load().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_load_empty_store() {
        assert!(registry().load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_changes_single_field_and_bumps_revision() {
        let registry = registry();
        let created = registry.create(sample_new_project()).await.unwrap();

        let updated = registry
            .update(&created.key, LinkField::Link3, CanonicalLink::from_handle("fresh_channel"))
            .await
            .unwrap();

        assert_eq!(updated.revision, 1);
        assert_eq!(updated.links[2].handle(), "fresh_channel");
        assert_eq!(updated.links[..2], created.links[..2]);
        assert_eq!(updated.project_id, created.project_id);
        assert_eq!(updated.logos, created.logos);
        assert_eq!(registry.get(&created.key).await.unwrap(), updated);
    }

    #[tokio::test]
    async fn test_update_unknown_key() {
        let registry = registry();
        let key = ProjectKey::parse("0000000000000000").unwrap();

        let err = registry
            .update(&key, LinkField::Link1, CanonicalLink::from_handle("main_bot"))
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::KeyNotFound(k) if k == "0000000000000000"));
        assert!(registry.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_revision_is_rejected() {
        let registry = registry();
        let created = registry.create(sample_new_project()).await.unwrap();
        registry
            .update(&created.key, LinkField::Link1, CanonicalLink::from_handle("other_bot"))
            .await
            .unwrap();

        // A writer still holding revision 0 must not clobber revision 1.
        let mut stale = created.clone();
        stale.revision = 1;
        let err = registry.store().put(&stale, Some(0)).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_at_rejects_outdated_revision() {
        let registry = registry();
        let created = registry.create(sample_new_project()).await.unwrap();
        registry
            .update_at(&created.key, LinkField::Link1, CanonicalLink::from_handle("first_bot"), 0)
            .await
            .unwrap();

        let err = registry
            .update_at(&created.key, LinkField::Link2, CanonicalLink::from_handle("second_bot"), 0)
            .await
            .unwrap_err();

        assert!(matches!(err, RegistryError::Conflict(_)));
        let stored = registry.get(&created.key).await.unwrap();
        assert_eq!(stored.revision, 1);
        assert_eq!(stored.links[0].handle(), "first_bot");
        assert_eq!(stored.links[1], created.links[1]);
    }

    #[tokio::test]
    async fn test_insert_keeps_key_and_refuses_duplicates() {
        let registry = registry();
        let key = ProjectKey::parse("legacy0000000001").unwrap();
        let record = ProjectRecord::from_new(key.clone(), sample_new_project());

        let inserted = registry.insert(record.clone()).await.unwrap();
        assert_eq!(inserted.key, key);

        let err = registry.insert(record).await.unwrap_err();
        assert!(matches!(err, RegistryError::Conflict(_)));
        assert_eq!(registry.load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_overwrites_records() {
        let registry = registry();
        let created = registry.create(sample_new_project()).await.unwrap();

        let mut collection = registry.load().await.unwrap();
        collection.get_mut(&created.key).unwrap().title = "Renamed".to_string();
        registry.save(&collection).await.unwrap();

        let reloaded = registry.get(&created.key).await.unwrap();
        assert_eq!(reloaded.title, "Renamed");
        assert_eq!(reloaded.revision, 1);
    }
}
