//! Field-level validation of request bodies against a resource schema.
//!
//! Validation runs before any store access. It returns every problem found,
//! not just the first one.

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use jobboard_query::cast::{format_timestamp, parse_timestamp};

use super::id::RecordId;
use super::model::ENVELOPE_FIELDS;
use crate::resource::ResourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Email,
    Number,
    Integer,
    Boolean,
    Date,
    TextList,
    Reference(ResourceKind),
    ReferenceList(ResourceKind),
}

/// Value a field takes on create when the body omits it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Zero,
    True,
    False,
    Text(&'static str),
}

impl FieldDefault {
    fn value(self) -> Value {
        match self {
            FieldDefault::Zero => Value::from(0),
            FieldDefault::True => Value::Bool(true),
            FieldDefault::False => Value::Bool(false),
            FieldDefault::Text(s) => Value::String(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<FieldDefault>,
    /// Server-managed counter: starts at its default and only moves
    /// through increments, never through a request body.
    pub counter: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: true,
            default: None,
            counter: false,
        }
    }

    pub const fn optional(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            default: None,
            counter: false,
        }
    }

    pub const fn with_default(self, default: FieldDefault) -> Self {
        Self {
            default: Some(default),
            ..self
        }
    }

    pub const fn counter(self) -> Self {
        Self {
            counter: true,
            ..self
        }
    }
}

/// One problem with one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("request body must be a JSON object")]
    NotAnObject,
    #[error("no updatable fields supplied")]
    EmptyPatch,
    #[error("{} invalid field(s)", .0.len())]
    Fields(Vec<FieldError>),
}

impl ValidationError {
    /// Per-field details, if any.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ValidationError::Fields(errors) => errors,
            _ => &[],
        }
    }
}

/// A reference found in a validated body; its target must be checked
/// against the store before the write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub field: &'static str,
    pub target: ResourceKind,
    pub id: RecordId,
}

/// Normalized fields ready to be written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedFields {
    pub set: Map<String, Value>,
    pub unset: Vec<String>,
    pub references: Vec<Reference>,
}

fn normalize(
    spec: &FieldSpec,
    value: &Value,
    references: &mut Vec<Reference>,
) -> Result<Value, String> {
    match (spec.kind, value) {
        (FieldKind::Text, Value::String(s)) => {
            if spec.required && s.trim().is_empty() {
                Err("must not be empty".into())
            } else {
                Ok(Value::String(s.clone()))
            }
        }
        (FieldKind::Email, Value::String(s)) => {
            let email = s.trim();
            match email.split_once('@') {
                Some((local, domain))
                    if !local.is_empty() && !domain.is_empty() && !domain.contains('@') =>
                {
                    Ok(Value::String(email.to_string()))
                }
                _ => Err("must be a valid email address".into()),
            }
        }
        (FieldKind::Number, Value::Number(_)) => Ok(value.clone()),
        (FieldKind::Integer, Value::Number(n)) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        (FieldKind::Boolean, Value::Bool(_)) => Ok(value.clone()),
        (FieldKind::Date, Value::String(s)) => parse_timestamp(s)
            .map(|ts| Value::String(format_timestamp(&ts)))
            .ok_or_else(|| "must be an ISO 8601 date".to_string()),
        (FieldKind::TextList, Value::Array(items)) if items.iter().all(Value::is_string) => {
            Ok(value.clone())
        }
        (FieldKind::Reference(target), Value::String(s)) => {
            let id = RecordId::parse(s).map_err(|e| e.to_string())?;
            references.push(Reference {
                field: spec.name,
                target,
                id,
            });
            Ok(Value::String(id.to_string()))
        }
        (FieldKind::ReferenceList(target), Value::Array(items)) => {
            let mut ids: Vec<RecordId> = Vec::with_capacity(items.len());
            for item in items {
                let id = item
                    .as_str()
                    .ok_or_else(|| "must be a list of ids".to_string())
                    .and_then(|s| RecordId::parse(s).map_err(|e| e.to_string()))?;
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            references.extend(ids.iter().map(|id| Reference {
                field: spec.name,
                target,
                id: *id,
            }));
            Ok(Value::Array(
                ids.iter().map(|id| Value::String(id.to_string())).collect(),
            ))
        }
        (kind, _) => Err(format!("must be {}", describe(kind))),
    }
}

fn describe(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "a string",
        FieldKind::Email => "an email address",
        FieldKind::Number => "a number",
        FieldKind::Integer => "an integer",
        FieldKind::Boolean => "a boolean",
        FieldKind::Date => "an ISO 8601 date",
        FieldKind::TextList => "a list of strings",
        FieldKind::Reference(_) => "an id",
        FieldKind::ReferenceList(_) => "a list of ids",
    }
}

fn as_object(body: &Value) -> Result<&Map<String, Value>, ValidationError> {
    body.as_object().ok_or(ValidationError::NotAnObject)
}

fn log_ignored(body: &Map<String, Value>, schema: &[FieldSpec]) {
    for key in body.keys() {
        if !schema.iter().any(|f| f.name == key.as_str()) {
            let reason = if ENVELOPE_FIELDS.contains(&key.as_str()) {
                "managed field"
            } else {
                "unknown field"
            };
            tracing::debug!(field = %key, reason, "dropping field from request body");
        }
    }
    for spec in schema.iter().filter(|spec| spec.counter) {
        if body.contains_key(spec.name) {
            tracing::debug!(field = spec.name, reason = "counter field", "dropping field from request body");
        }
    }
}

/// Validate a create body: required fields must be present, defaults are
/// filled in, unknown and envelope fields are dropped. Counter fields always
/// start from their default.
pub fn validate_create(schema: &[FieldSpec], body: &Value) -> Result<ValidatedFields, ValidationError> {
    let body = as_object(body)?;
    log_ignored(body, schema);

    let mut out = ValidatedFields::default();
    let mut errors = Vec::new();
    for spec in schema {
        let supplied = if spec.counter { None } else { body.get(spec.name) };
        match supplied {
            None | Some(Value::Null) => {
                if spec.required {
                    errors.push(FieldError::new(spec.name, "is required"));
                } else if let Some(default) = spec.default {
                    out.set.insert(spec.name.to_string(), default.value());
                }
            }
            Some(value) => match normalize(spec, value, &mut out.references) {
                Ok(v) => {
                    out.set.insert(spec.name.to_string(), v);
                }
                Err(message) => errors.push(FieldError::new(spec.name, message)),
            },
        }
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(ValidationError::Fields(errors))
    }
}

/// Validate a partial update: only supplied fields are checked; `null`
/// clears an optional field. Counter fields are dropped.
pub fn validate_patch(schema: &[FieldSpec], body: &Value) -> Result<ValidatedFields, ValidationError> {
    let body = as_object(body)?;
    log_ignored(body, schema);

    let mut out = ValidatedFields::default();
    let mut errors = Vec::new();
    for spec in schema.iter().filter(|spec| !spec.counter) {
        match body.get(spec.name) {
            None => {}
            Some(Value::Null) if spec.required => {
                errors.push(FieldError::new(spec.name, "is required and cannot be cleared"));
            }
            Some(Value::Null) => out.unset.push(spec.name.to_string()),
            Some(value) => match normalize(spec, value, &mut out.references) {
                Ok(v) => {
                    out.set.insert(spec.name.to_string(), v);
                }
                Err(message) => errors.push(FieldError::new(spec.name, message)),
            },
        }
    }

    if !errors.is_empty() {
        return Err(ValidationError::Fields(errors));
    }
    if out.set.is_empty() && out.unset.is_empty() {
        return Err(ValidationError::EmptyPatch);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SCHEMA: &[FieldSpec] = &[
        FieldSpec::required("name", FieldKind::Text),
        FieldSpec::optional("email", FieldKind::Email),
        FieldSpec::optional("salary", FieldKind::Number),
        FieldSpec::optional("views", FieldKind::Integer)
            .with_default(FieldDefault::Zero)
            .counter(),
        FieldSpec::optional("status", FieldKind::Text).with_default(FieldDefault::Text("PENDING")),
        FieldSpec::optional("startDate", FieldKind::Date),
        FieldSpec::optional("skills", FieldKind::ReferenceList(ResourceKind::Skill)),
        FieldSpec::optional("company", FieldKind::Reference(ResourceKind::Company)),
    ];

    #[test]
    fn create_requires_fields_and_fills_defaults() {
        let fields = validate_create(SCHEMA, &json!({"name": "Rust dev", "salary": 1200})).unwrap();
        assert_eq!(fields.set["name"], "Rust dev");
        assert_eq!(fields.set["views"], 0);
        assert_eq!(fields.set["status"], "PENDING");
        assert!(fields.references.is_empty());

        let err = validate_create(SCHEMA, &json!({"salary": "a lot"})).unwrap_err();
        let fields: Vec<&str> = err.field_errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["name", "salary"]);
    }

    #[test]
    fn create_drops_unknown_and_envelope_fields() {
        let fields = validate_create(
            SCHEMA,
            &json!({"name": "Rust dev", "isDeleted": true, "_id": "x", "hack": 1}),
        )
        .unwrap();
        assert!(!fields.set.contains_key("isDeleted"));
        assert!(!fields.set.contains_key("_id"));
        assert!(!fields.set.contains_key("hack"));
    }

    #[test]
    fn references_are_parsed_and_collected() {
        let a = RecordId::new();
        let b = RecordId::new();
        let body = json!({
            "name": "Rust dev",
            "skills": [a.to_string(), b.to_string(), a.to_string()],
            "company": b.to_string(),
        });
        let fields = validate_create(SCHEMA, &body).unwrap();
        assert_eq!(fields.set["skills"], json!([a.to_string(), b.to_string()]));
        assert_eq!(fields.references.len(), 3);
        assert_eq!(fields.references[2].target, ResourceKind::Company);

        let err = validate_create(SCHEMA, &json!({"name": "x", "company": "42"})).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "company");
    }

    #[test]
    fn dates_and_emails_are_normalized() {
        let fields = validate_create(
            SCHEMA,
            &json!({"name": "x", "startDate": "2024-05-01", "email": " hr@acme.io "}),
        )
        .unwrap();
        assert_eq!(fields.set["startDate"], "2024-05-01T00:00:00.000Z");
        assert_eq!(fields.set["email"], "hr@acme.io");

        let err = validate_create(SCHEMA, &json!({"name": "x", "email": "nope"})).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "email");
    }

    #[test]
    fn patch_only_touches_supplied_fields() {
        let fields = validate_patch(SCHEMA, &json!({"salary": 10, "email": null})).unwrap();
        assert_eq!(fields.set.len(), 1);
        assert_eq!(fields.unset, vec!["email".to_string()]);

        let err = validate_patch(SCHEMA, &json!({"name": null})).unwrap_err();
        assert_eq!(err.field_errors()[0].field, "name");

        assert!(matches!(
            validate_patch(SCHEMA, &json!({"unknown": 1})),
            Err(ValidationError::EmptyPatch)
        ));
        assert!(matches!(
            validate_patch(SCHEMA, &json!([1, 2])),
            Err(ValidationError::NotAnObject)
        ));
    }

    #[test]
    fn counters_are_not_client_writable() {
        let fields = validate_create(SCHEMA, &json!({"name": "x", "views": -50})).unwrap();
        assert_eq!(fields.set["views"], 0);

        let fields = validate_create(SCHEMA, &json!({"name": "x", "views": "lots"})).unwrap();
        assert_eq!(fields.set["views"], 0);

        assert!(matches!(
            validate_patch(SCHEMA, &json!({"views": 9999})),
            Err(ValidationError::EmptyPatch)
        ));
        let fields = validate_patch(SCHEMA, &json!({"views": null, "salary": 1})).unwrap();
        assert!(fields.unset.is_empty());
        assert!(!fields.set.contains_key("views"));
    }
}
