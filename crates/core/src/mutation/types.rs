//! Write operations handed to a store.
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::document::model::{
    now, timestamp_value, Actor, DELETED_AT, DELETED_BY, IS_DELETED, UPDATED_AT, UPDATED_BY,
};
use crate::document::validate::ValidatedFields;

/// A partial update of one record.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub set: Map<String, Value>,
    pub unset: Vec<String>,
    /// Values pushed onto the end of array fields, created when missing.
    pub append: Map<String, Value>,
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

impl Patch {
    pub fn new(fields: ValidatedFields, actor: &Actor) -> Self {
        Self {
            set: fields.set,
            unset: fields.unset,
            append: Map::new(),
            actor: actor.clone(),
            at: now(),
        }
    }

    pub fn with_append(mut self, field: impl Into<String>, value: Value) -> Self {
        self.append.insert(field.into(), value);
        self
    }

    /// Fields to merge into the document, including the update stamp.
    pub fn stamped_set(&self) -> Map<String, Value> {
        let mut set = self.set.clone();
        set.insert(UPDATED_BY.to_string(), actor_value(&self.actor));
        set.insert(UPDATED_AT.to_string(), timestamp_value(&self.at));
        set
    }
}

/// Stamp applied by a soft delete.
#[derive(Debug, Clone, PartialEq)]
pub struct Deletion {
    pub actor: Actor,
    pub at: DateTime<Utc>,
}

impl Deletion {
    pub fn new(actor: &Actor) -> Self {
        Self {
            actor: actor.clone(),
            at: now(),
        }
    }

    pub fn stamped_set(&self) -> Map<String, Value> {
        let mut set = Map::new();
        set.insert(IS_DELETED.to_string(), Value::Bool(true));
        set.insert(DELETED_BY.to_string(), actor_value(&self.actor));
        set.insert(DELETED_AT.to_string(), timestamp_value(&self.at));
        set
    }
}

fn actor_value(actor: &Actor) -> Value {
    let mut map = Map::new();
    map.insert("_id".to_string(), Value::String(actor.id.clone()));
    map.insert("email".to_string(), Value::String(actor.email.clone()));
    Value::Object(map)
}

/// One change-log entry: the new value of `field` with who set it and when.
pub fn history_entry(field: &str, value: Value, actor: &Actor, at: &DateTime<Utc>) -> Value {
    let mut entry = Map::new();
    entry.insert(field.to_string(), value);
    entry.insert(UPDATED_AT.to_string(), timestamp_value(at));
    entry.insert(UPDATED_BY.to_string(), actor_value(actor));
    Value::Object(entry)
}

/// Apply `set` and `unset` to a document in place.
pub fn apply(doc: &mut Value, set: Map<String, Value>, unset: &[String]) {
    if let Value::Object(map) = doc {
        for key in unset {
            map.remove(key);
        }
        map.extend(set);
    }
}

/// Push each value onto its array field. A missing or non-array field
/// becomes a one-element array.
pub fn append(doc: &mut Value, entries: &Map<String, Value>) {
    let Value::Object(map) = doc else {
        return;
    };
    for (key, value) in entries {
        match map.get_mut(key) {
            Some(Value::Array(items)) => items.push(value.clone()),
            _ => {
                map.insert(key.clone(), Value::Array(vec![value.clone()]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn patch_stamps_update_fields() {
        let actor = Actor::new("u1", "hr@acme.io");
        let mut fields = ValidatedFields::default();
        fields.set.insert("salary".into(), json!(2000));
        fields.unset.push("logo".into());
        let patch = Patch::new(fields, &actor);

        let mut doc = json!({"name": "Acme", "salary": 1000, "logo": "a.png"});
        apply(&mut doc, patch.stamped_set(), &patch.unset);

        assert_eq!(doc["salary"], 2000);
        assert!(doc.get("logo").is_none());
        assert_eq!(doc["updatedBy"]["email"], "hr@acme.io");
        assert_eq!(doc["updatedAt"].as_str().map(str::len), Some(24));
    }

    #[test]
    fn deletion_marks_document() {
        let deletion = Deletion::new(&Actor::new("u1", "hr@acme.io"));
        let mut doc = json!({"name": "Acme", "isDeleted": false});
        apply(&mut doc, deletion.stamped_set(), &[]);
        assert_eq!(doc["isDeleted"], true);
        assert_eq!(doc["deletedBy"]["_id"], "u1");
        assert!(doc["deletedAt"].is_string());
    }

    #[test]
    fn appends_grow_history_arrays() {
        let actor = Actor::new("u1", "hr@acme.io");
        let mut fields = ValidatedFields::default();
        fields.set.insert("status".into(), json!("REVIEWING"));
        let patch = Patch::new(fields, &actor);
        let entry = history_entry("status", json!("REVIEWING"), &actor, &patch.at);
        let patch = patch.with_append("history", entry.clone());

        let mut doc = json!({"status": "PENDING", "history": [{"status": "PENDING"}]});
        apply(&mut doc, patch.stamped_set(), &patch.unset);
        append(&mut doc, &patch.append);
        assert_eq!(doc["history"].as_array().map(Vec::len), Some(2));
        assert_eq!(doc["history"][1]["status"], "REVIEWING");
        assert_eq!(doc["history"][1]["updatedBy"]["email"], "hr@acme.io");
        assert_eq!(doc["history"][1]["updatedAt"], doc["updatedAt"]);

        let mut bare = json!({"status": "PENDING"});
        append(&mut bare, &patch.append);
        assert_eq!(bare["history"], json!([entry]));
    }
}
