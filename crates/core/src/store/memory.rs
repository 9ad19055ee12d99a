use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use jobboard_query::eval::{compare_documents, Matcher};
use jobboard_query::Filter;

use super::{ResourceStore, StoreError, StoreQuery};
use crate::document::model::IS_DELETED;
use crate::document::{Record, RecordId};
use crate::mutation::types::{append, apply};
use crate::mutation::{Deletion, Patch};
use crate::resource::ResourceKind;

type Collection = HashMap<RecordId, Value>;

/// Store keeping every collection in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<ResourceKind, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matcher(filter: &Filter) -> Result<Matcher, StoreError> {
        Matcher::new(filter).map_err(|e| StoreError::InvalidFilter(e.to_string()))
    }

    async fn modify_active(
        &self,
        kind: ResourceKind,
        id: RecordId,
        change: impl FnOnce(&mut Value),
    ) -> Option<Value> {
        let mut collections = self.collections.write().await;
        let doc = collections.get_mut(&kind)?.get_mut(&id)?;
        if is_deleted(doc) {
            return None;
        }
        change(doc);
        Some(doc.clone())
    }
}

fn is_deleted(doc: &Value) -> bool {
    doc.get(IS_DELETED).and_then(Value::as_bool).unwrap_or(false)
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn find(&self, kind: ResourceKind, query: &StoreQuery) -> Result<Vec<Value>, StoreError> {
        let matcher = Self::matcher(&query.filter)?;
        let collections = self.collections.read().await;
        let mut docs: Vec<&Value> = collections
            .get(&kind)
            .map(|c| c.values().filter(|doc| matcher.matches(doc)).collect())
            .unwrap_or_default();
        docs.sort_by(|a, b| compare_documents(a, b, &query.sort));

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(docs.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn count(&self, kind: ResourceKind, filter: &Filter) -> Result<u64, StoreError> {
        let matcher = Self::matcher(filter)?;
        let collections = self.collections.read().await;
        let n = collections
            .get(&kind)
            .map_or(0, |c| c.values().filter(|doc| matcher.matches(doc)).count());
        Ok(n as u64)
    }

    async fn get(&self, kind: ResourceKind, id: RecordId) -> Result<Option<Value>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections.get(&kind).and_then(|c| c.get(&id)).cloned())
    }

    async fn insert(&self, kind: ResourceKind, record: &Record) -> Result<Value, StoreError> {
        let doc = record.to_document()?;
        let mut collections = self.collections.write().await;
        let collection = collections.entry(kind).or_default();
        if collection.contains_key(&record.id) {
            return Err(StoreError::DuplicateId(record.id));
        }
        collection.insert(record.id, doc.clone());
        Ok(doc)
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: RecordId,
        patch: &Patch,
    ) -> Result<Option<Value>, StoreError> {
        let set = patch.stamped_set();
        Ok(self
            .modify_active(kind, id, |doc| {
                apply(doc, set, &patch.unset);
                append(doc, &patch.append);
            })
            .await)
    }

    async fn soft_delete(
        &self,
        kind: ResourceKind,
        id: RecordId,
        deletion: &Deletion,
    ) -> Result<Option<Value>, StoreError> {
        let set = deletion.stamped_set();
        Ok(self.modify_active(kind, id, |doc| apply(doc, set, &[])).await)
    }

    async fn increment(
        &self,
        kind: ResourceKind,
        id: RecordId,
        field: &str,
        by: i64,
    ) -> Result<Option<Value>, StoreError> {
        Ok(self
            .modify_active(kind, id, |doc| {
                let current = doc.get(field).and_then(Value::as_i64).unwrap_or(0);
                let mut set = Map::new();
                set.insert(field.to_string(), Value::from(current.saturating_add(by)));
                apply(doc, set, &[]);
            })
            .await)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Actor;
    use jobboard_query::{Predicate, SortKey};
    use serde_json::json;

    fn record(fields: Value) -> Record {
        let Value::Object(map) = fields else {
            panic!("expected object");
        };
        Record::create(map, &Actor::new("u1", "admin@jobs.io"))
    }

    #[tokio::test]
    async fn find_filters_sorts_and_windows() {
        let store = MemoryStore::new();
        for salary in [300, 100, 200, 400] {
            store
                .insert(ResourceKind::Job, &record(json!({"name": "dev", "salary": salary})))
                .await
                .unwrap();
        }
        let query = StoreQuery::new(Filter::new().and("salary", Predicate::Gte(json!(200))))
            .sorted(vec![SortKey::asc("salary")])
            .window(1, 1);
        let docs = store.find(ResourceKind::Job, &query).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["salary"], 300);
        assert_eq!(
            store.count(ResourceKind::Job, &query.filter).await.unwrap(),
            3
        );
        assert_eq!(store.count(ResourceKind::Skill, &Filter::new()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn writes_skip_deleted_records() {
        let store = MemoryStore::new();
        let actor = Actor::new("u1", "admin@jobs.io");
        let rec = record(json!({"title": "hello", "views": 0}));
        store.insert(ResourceKind::Blog, &rec).await.unwrap();

        let bumped = store
            .increment(ResourceKind::Blog, rec.id, "views", 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(bumped["views"], 1);

        let deletion = Deletion::new(&actor);
        assert!(store
            .soft_delete(ResourceKind::Blog, rec.id, &deletion)
            .await
            .unwrap()
            .is_some());
        assert!(store
            .soft_delete(ResourceKind::Blog, rec.id, &deletion)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .increment(ResourceKind::Blog, rec.id, "views", 1)
            .await
            .unwrap()
            .is_none());

        let raw = store.get(ResourceKind::Blog, rec.id).await.unwrap().unwrap();
        assert_eq!(raw["isDeleted"], true);
        assert_eq!(raw["views"], 1);
    }

    #[tokio::test]
    async fn duplicate_ids_are_rejected() {
        let store = MemoryStore::new();
        let rec = record(json!({"name": "Rust"}));
        store.insert(ResourceKind::Skill, &rec).await.unwrap();
        assert!(matches!(
            store.insert(ResourceKind::Skill, &rec).await,
            Err(StoreError::DuplicateId(_))
        ));
    }

    #[tokio::test]
    async fn update_appends_to_array_fields() {
        let store = MemoryStore::new();
        let actor = Actor::new("u2", "hr@acme.io");
        let rec = record(json!({"email": "a@b.io", "status": "PENDING", "history": [{"status": "PENDING"}]}));
        store.insert(ResourceKind::Resume, &rec).await.unwrap();

        let mut fields = crate::document::validate::ValidatedFields::default();
        fields.set.insert("status".into(), json!("APPROVED"));
        let patch = Patch::new(fields, &actor).with_append("history", json!({"status": "APPROVED"}));
        let doc = store
            .update(ResourceKind::Resume, rec.id, &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["status"], "APPROVED");
        assert_eq!(doc["history"], json!([{"status": "PENDING"}, {"status": "APPROVED"}]));
    }
}
