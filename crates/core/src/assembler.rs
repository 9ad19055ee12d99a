//! Turning stored documents into response documents.
//!
//! A page is fetched, its relations are populated with active target
//! records, population selections are applied, and finally the main
//! projection. Nothing here writes.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use jobboard_query::eval::lookup;
use jobboard_query::{
    Filter, Population, Predicate, Projection, QueryDescriptor, SortDirection, SortKey,
};

use crate::document::model::ID;
use crate::pagination::PageMeta;
use crate::resource::{Relation, ResourceKind};
use crate::soft_delete::{self, Visibility};
use crate::store::{ResourceStore, StoreError, StoreQuery};

/// `{ meta, result }` envelope of a list read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult {
    pub meta: PageMeta,
    pub result: Vec<Value>,
}

/// The requested order, or the resource default, closed with an `_id` key in
/// the direction of the last key.
pub fn stable_sort(kind: ResourceKind, requested: &[SortKey]) -> Vec<SortKey> {
    let mut sort = if requested.is_empty() {
        kind.default_sort()
    } else {
        requested.to_vec()
    };
    let direction = sort.last().map_or(SortDirection::Desc, |key| key.direction);
    sort.retain(|key| key.field != ID);
    sort.push(SortKey {
        field: ID.to_string(),
        direction,
    });
    sort
}

/// Run a paged read and shape its documents.
pub async fn fetch_page(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    query: &StoreQuery,
    descriptor: &QueryDescriptor,
    meta: PageMeta,
) -> Result<ListResult, StoreError> {
    let docs = if query.skip >= meta.total {
        Vec::new()
    } else {
        store.find(kind, query).await?
    };
    let result = shape(store, kind, docs, descriptor).await?;
    Ok(ListResult { meta, result })
}

/// Populate and project already fetched documents.
pub async fn shape(
    store: &dyn ResourceStore,
    kind: ResourceKind,
    mut docs: Vec<Value>,
    descriptor: &QueryDescriptor,
) -> Result<Vec<Value>, StoreError> {
    for population in &descriptor.population {
        match kind.relation(&population.path) {
            Some(relation) => populate(store, relation, population, &mut docs).await?,
            None => {
                tracing::debug!(
                    resource = %kind,
                    path = %population.path,
                    "ignoring population of unknown relation"
                );
            }
        }
    }
    Ok(docs
        .into_iter()
        .map(|doc| project(doc, &descriptor.projection))
        .collect())
}

fn referenced_ids(value: Option<&Value>) -> Vec<&str> {
    match value {
        Some(Value::String(id)) => vec![id.as_str()],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

async fn populate(
    store: &dyn ResourceStore,
    relation: Relation,
    population: &Population,
    docs: &mut [Value],
) -> Result<(), StoreError> {
    let mut ids: Vec<Value> = Vec::new();
    for doc in docs.iter() {
        for id in referenced_ids(lookup(doc, relation.field)) {
            let id = Value::String(id.to_string());
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    if ids.is_empty() {
        return Ok(());
    }

    let filter = soft_delete::apply(
        Filter::new().and(ID, Predicate::In(ids)),
        Visibility::Active,
    );
    let projection = if population.select.is_empty() {
        Projection::All
    } else {
        Projection::Include(population.select.clone())
    };
    let targets: HashMap<String, Value> = store
        .find(relation.target, &StoreQuery::new(filter))
        .await?
        .into_iter()
        .filter_map(|target| {
            let id = target.get(ID)?.as_str()?.to_string();
            Some((id, project(target, &projection)))
        })
        .collect();

    for doc in docs.iter_mut() {
        let Some(slot) = doc.get_mut(relation.field) else {
            continue;
        };
        let resolved = match slot {
            Value::String(id) => targets.get(id.as_str()).cloned().unwrap_or(Value::Null),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .filter_map(|item| item.as_str().and_then(|id| targets.get(id)).cloned())
                    .collect(),
            ),
            _ => continue,
        };
        *slot = resolved;
    }
    Ok(())
}

fn copy_path(src: &Value, dst: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(value) = src.get(path) {
                dst.insert(path.to_string(), value.clone());
            }
        }
        Some((head, rest)) => match src.get(head) {
            Some(inner @ Value::Object(_)) => {
                let entry = dst
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Value::Object(nested) = entry {
                    copy_path(inner, nested, rest);
                }
            }
            Some(Value::Array(items)) => {
                let projected: Vec<Value> = items
                    .iter()
                    .map(|item| {
                        let mut nested = Map::new();
                        copy_path(item, &mut nested, rest);
                        Value::Object(nested)
                    })
                    .collect();
                dst.insert(head.to_string(), Value::Array(projected));
            }
            _ => {}
        },
    }
}

fn remove_path(doc: &mut Value, path: &str) {
    match path.split_once('.') {
        None => {
            if let Value::Object(map) = doc {
                map.remove(path);
            }
        }
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Value::Array(items)) => items.iter_mut().for_each(|item| remove_path(item, rest)),
            Some(inner) => remove_path(inner, rest),
            None => {}
        },
    }
}

/// Apply a projection to one document. Include projections always keep `_id`.
pub fn project(doc: Value, projection: &Projection) -> Value {
    match projection {
        Projection::All => doc,
        Projection::Include(fields) => {
            let mut out = Map::new();
            copy_path(&doc, &mut out, ID);
            for field in fields {
                copy_path(&doc, &mut out, field);
            }
            Value::Object(out)
        }
        Projection::Exclude(fields) => {
            let mut doc = doc;
            for field in fields.iter().filter(|f| f.as_str() != ID) {
                remove_path(&mut doc, field);
            }
            doc
        }
    }
}
