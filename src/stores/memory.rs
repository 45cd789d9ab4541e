// In-memory collaborator stores - no external side effects
//
// Working implementations of the template and entity store seams,
// backing integration tests and small embedders that have no database.
// The entity store's compare-and-swap holds its lock across the read
// and the write, so concurrent transitions racing on one entity see
// real at-most-one-winner behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::engine::committer::EntityStore;
use crate::engine::types::{AuditEntry, EntitySnapshot};
use crate::error::StoreError;
use crate::template::store::TemplateStore;
use crate::template::types::FsmTemplate;

#[derive(Clone, Default)]
pub struct InMemoryTemplateStore {
    templates: Arc<Mutex<Vec<FsmTemplate>>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the template with the same id.
    pub fn put(&self, template: FsmTemplate) {
        let mut templates = self.templates.lock().unwrap();
        match templates.iter_mut().find(|t| t.id == template.id) {
            Some(existing) => *existing = template,
            None => templates.push(template),
        }
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn fetch(&self, type_key: &str, scope: &str) -> Result<Option<FsmTemplate>, StoreError> {
        let templates = self.templates.lock().unwrap();
        Ok(templates
            .iter()
            .find(|t| t.type_key == type_key && t.scope == scope)
            .cloned())
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<FsmTemplate>, StoreError> {
        let templates = self.templates.lock().unwrap();
        Ok(templates.iter().find(|t| t.id == id).cloned())
    }
}

#[derive(Default)]
struct EntityStoreInner {
    entities: HashMap<(String, String), EntitySnapshot>,
    audit: Vec<AuditEntry>,
}

#[derive(Clone, Default)]
pub struct InMemoryEntityStore {
    inner: Arc<Mutex<EntityStoreInner>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, snapshot: EntitySnapshot) {
        let mut inner = self.inner.lock().unwrap();
        inner.entities.insert(
            (snapshot.entity_type.clone(), snapshot.entity_id.clone()),
            snapshot,
        );
    }

    pub fn audit_entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().unwrap().audit.clone()
    }

    pub fn state_of(&self, entity_type: &str, entity_id: &str) -> Option<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .entities
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .map(|s| s.state_key.clone())
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn snapshot(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Option<EntitySnapshot>, StoreError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .entities
            .get(&(entity_type.to_string(), entity_id.to_string()))
            .cloned())
    }

    async fn compare_and_swap_state(
        &self,
        entity_type: &str,
        entity_id: &str,
        expected_from: &str,
        new_to: &str,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (entity_type.to_string(), entity_id.to_string());
        match inner.entities.get_mut(&key) {
            Some(snapshot) if snapshot.state_key == expected_from => {
                snapshot.state_key = new_to.to_string();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::QueryFailed {
                message: format!("entity '{entity_id}' vanished during commit"),
            }),
        }
    }

    async fn append_audit(&self, entry: AuditEntry) -> Result<(), StoreError> {
        self.inner.lock().unwrap().audit.push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(id: &str, state: &str) -> EntitySnapshot {
        EntitySnapshot {
            entity_id: id.to_string(),
            entity_type: "task".to_string(),
            state_key: state.to_string(),
            fields: json!({}),
        }
    }

    #[tokio::test]
    async fn cas_succeeds_only_from_expected_state() {
        let store = InMemoryEntityStore::new();
        store.put(snapshot("t1", "todo"));

        assert!(store
            .compare_and_swap_state("task", "t1", "todo", "in_progress")
            .await
            .unwrap());
        assert!(!store
            .compare_and_swap_state("task", "t1", "todo", "in_progress")
            .await
            .unwrap());
        assert_eq!(store.state_of("task", "t1").as_deref(), Some("in_progress"));
    }

    #[tokio::test]
    async fn entities_are_isolated() {
        let store = InMemoryEntityStore::new();
        store.put(snapshot("t1", "todo"));
        store.put(snapshot("t2", "todo"));

        store
            .compare_and_swap_state("task", "t1", "todo", "done")
            .await
            .unwrap();
        assert_eq!(store.state_of("task", "t2").as_deref(), Some("todo"));
    }
}
