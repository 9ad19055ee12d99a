//! Per-resource operations.
//!
//! A [`ResourceService`] is built explicitly for one resource and one store.
//! Reads go through the translator, the soft-delete filter, the pagination
//! engine and the assembler, in that order.

use std::sync::Arc;

use serde_json::{Map, Value};

use jobboard_query::{parse, Filter, Pattern, Predicate};

use crate::assembler::{self, stable_sort, ListResult};
use crate::document::model::ID;
use crate::document::validate::{validate_create, validate_patch, Reference};
use crate::document::{Actor, Record, RecordId};
use crate::error::{ServiceError, ServiceResult};
use crate::mutation::types::history_entry;
use crate::mutation::{Deletion, Patch};
use crate::pagination::{PageMeta, PageRequest};
use crate::resource::ResourceKind;
use crate::soft_delete::{self, Visibility};
use crate::store::{ResourceStore, StoreQuery};

#[derive(Clone)]
pub struct ResourceService {
    kind: ResourceKind,
    store: Arc<dyn ResourceStore>,
    default_page_size: u64,
}

impl ResourceService {
    pub fn new(kind: ResourceKind, store: Arc<dyn ResourceStore>, default_page_size: u64) -> Self {
        Self {
            kind,
            store,
            default_page_size: default_page_size.max(1),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    fn not_found(&self, id: impl ToString) -> ServiceError {
        ServiceError::NotFound {
            kind: self.kind,
            id: id.to_string(),
        }
    }

    /// List records matching a raw query string.
    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    pub async fn list(&self, query: &str, visibility: Visibility) -> ServiceResult<ListResult> {
        let descriptor = parse(query, self.kind.searchable_fields());
        let filter = soft_delete::apply(descriptor.filter.clone(), visibility);
        let page = PageRequest::from_hints(&descriptor.page, self.default_page_size);

        let total = self.store.count(self.kind, &filter).await?;
        let meta = PageMeta::new(&page, total);
        let store_query = StoreQuery::new(filter)
            .sorted(stable_sort(self.kind, &descriptor.sort))
            .window(page.skip, page.page_size);

        Ok(assembler::fetch_page(self.store.as_ref(), self.kind, &store_query, &descriptor, meta).await?)
    }

    /// One active record; `query` may carry `populate` and `fields`.
    #[tracing::instrument(skip(self), fields(resource = %self.kind))]
    pub async fn find_one(&self, id: &str, query: &str) -> ServiceResult<Value> {
        let record_id = RecordId::parse(id)?;
        let doc = self
            .store
            .get(self.kind, record_id)
            .await?
            .filter(|doc| soft_delete::is_visible(doc, Visibility::Active))
            .ok_or_else(|| self.not_found(record_id))?;

        let descriptor = parse(query, &[]);
        assembler::shape(self.store.as_ref(), self.kind, vec![doc], &descriptor)
            .await?
            .pop()
            .ok_or_else(|| self.not_found(record_id))
    }

    #[tracing::instrument(skip(self, body, actor), fields(resource = %self.kind, actor = %actor.id))]
    pub async fn create(&self, body: &Value, actor: &Actor) -> ServiceResult<Value> {
        let fields = validate_create(self.kind.schema(), body)?;
        self.check_references(&fields.references).await?;
        self.check_unique(&fields.set, None).await?;

        let mut record = Record::create(fields.set, actor);
        if let Some(rule) = self.kind.history_rule() {
            if let Some(value) = record.fields.get(rule.field).cloned() {
                let entry = history_entry(rule.field, value, actor, &record.created_at);
                record.fields.insert(rule.log.to_string(), Value::Array(vec![entry]));
            }
        }
        let doc = self.store.insert(self.kind, &record).await?;
        tracing::info!(id = %record.id, "record created");
        Ok(doc)
    }

    /// Partial update of an active record.
    #[tracing::instrument(skip(self, body, actor), fields(resource = %self.kind, actor = %actor.id))]
    pub async fn update(&self, id: &str, body: &Value, actor: &Actor) -> ServiceResult<Value> {
        let record_id = RecordId::parse(id)?;
        let fields = validate_patch(self.kind.schema(), body)?;
        self.check_references(&fields.references).await?;
        self.check_unique(&fields.set, Some(record_id)).await?;

        let mut patch = Patch::new(fields, actor);
        if let Some(rule) = self.kind.history_rule() {
            if let Some(value) = patch.set.get(rule.field).cloned() {
                let entry = history_entry(rule.field, value, actor, &patch.at);
                patch = patch.with_append(rule.log, entry);
            }
        }
        let doc = self
            .store
            .update(self.kind, record_id, &patch)
            .await?
            .ok_or_else(|| self.not_found(record_id))?;
        tracing::debug!(id = %record_id, "record updated");
        Ok(doc)
    }

    /// Soft delete. Missing and already deleted records are both not found.
    #[tracing::instrument(skip(self, actor), fields(resource = %self.kind, actor = %actor.id))]
    pub async fn remove(&self, id: &str, actor: &Actor) -> ServiceResult<Value> {
        let record_id = RecordId::parse(id)?;
        let doc = self
            .store
            .soft_delete(self.kind, record_id, &Deletion::new(actor))
            .await?
            .ok_or_else(|| self.not_found(record_id))?;
        tracing::info!(id = %record_id, "record deleted");
        Ok(doc)
    }

    /// Add one to a declared counter field. The actor is only recorded in
    /// the span; a counter bump is not an edit and leaves no stamp.
    #[tracing::instrument(skip(self, actor), fields(resource = %self.kind, actor = %actor.id))]
    pub async fn increment(&self, id: &str, counter: &str, actor: &Actor) -> ServiceResult<Value> {
        if !self.kind.is_counter(counter) {
            return Err(ServiceError::NotACounter {
                kind: self.kind,
                field: counter.to_string(),
            });
        }
        let record_id = RecordId::parse(id)?;
        self.store
            .increment(self.kind, record_id, counter, 1)
            .await?
            .ok_or_else(|| self.not_found(record_id))
    }

    async fn check_references(&self, references: &[Reference]) -> ServiceResult<()> {
        for reference in references {
            let found = self
                .store
                .get(reference.target, reference.id)
                .await?
                .is_some_and(|doc| soft_delete::is_visible(&doc, Visibility::Active));
            if !found {
                return Err(ServiceError::MissingReference {
                    field: reference.field,
                    target: reference.target,
                    id: reference.id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Reject values already held by another active record. For a composite
    /// rule the fields not in `set` are taken from the stored record.
    ///
    /// This is a read before the write, not a constraint: two concurrent
    /// writes of the same value can both pass.
    async fn check_unique(
        &self,
        set: &Map<String, Value>,
        exclude: Option<RecordId>,
    ) -> ServiceResult<()> {
        let Some(rule) = self.kind.unique_rule() else {
            return Ok(());
        };
        if !rule.fields.iter().any(|field| set.contains_key(*field)) {
            return Ok(());
        }
        let current = match exclude {
            Some(id) if rule.fields.len() > 1 => self.store.get(self.kind, id).await?,
            _ => None,
        };

        let mut filter = Filter::new();
        let mut shown = Vec::with_capacity(rule.fields.len());
        for field in rule.fields {
            let Some(value) = set
                .get(*field)
                .or_else(|| current.as_ref().and_then(|doc| doc.get(*field)))
            else {
                return Ok(());
            };
            let predicate = match value.as_str() {
                Some(s) if rule.case_insensitive => {
                    Predicate::Matches(Pattern::equals_ignore_case(s))
                }
                _ => Predicate::Eq(value.clone()),
            };
            filter.push(*field, predicate);
            shown.push(value.to_string());
        }
        if let Some(id) = exclude {
            filter.push(ID, Predicate::Ne(Value::String(id.to_string())));
        }
        let filter = soft_delete::apply(filter, Visibility::Active);

        if self.store.count(self.kind, &filter).await? > 0 {
            return Err(ServiceError::Conflict {
                kind: self.kind,
                fields: rule.fields,
                value: shown.join(", "),
            });
        }
        Ok(())
    }
}
