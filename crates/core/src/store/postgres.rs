//! PostgreSQL store.
//!
//! All collections share one `records` table; the document lives in a JSONB
//! column and filters are compiled to JSONB path expressions with bound
//! parameters. `is_deleted` mirrors the document flag so writes can be
//! restricted to active rows by an indexed column.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::Postgres;
use sqlx::types::Json;
use sqlx::{PgPool, QueryBuilder};

use jobboard_query::{Condition, Filter, Predicate, SortDirection, SortKey};

use super::{ResourceStore, StoreError, StoreQuery};
use crate::document::{Record, RecordId};
use crate::mutation::{Deletion, Patch};
use crate::resource::ResourceKind;

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

type Sql = QueryBuilder<'static, Postgres>;

fn path_of(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

fn push_path(qb: &mut Sql, path: &[String], op: &str) {
    qb.push("(doc ").push(op).push(" ");
    qb.push_bind(path.to_vec()).push("::text[])");
}

fn push_equals(qb: &mut Sql, path: &[String], value: &Value) {
    if value.is_null() {
        qb.push("(");
        push_path(qb, path, "#>");
        qb.push(" IS NULL OR ");
        push_path(qb, path, "#>");
        qb.push(" = 'null'::jsonb)");
        return;
    }
    qb.push("COALESCE(");
    push_path(qb, path, "#>");
    qb.push(" = ").push_bind(Json(value.clone())).push(" OR (jsonb_typeof(");
    push_path(qb, path, "#>");
    qb.push(") = 'array' AND ");
    push_path(qb, path, "#>");
    qb.push(" @> ")
        .push_bind(Json(Value::Array(vec![value.clone()])))
        .push("), false)");
}

fn push_any_equals(qb: &mut Sql, path: &[String], options: &[Value]) {
    if options.is_empty() {
        qb.push("false");
        return;
    }
    qb.push("(");
    for (i, option) in options.iter().enumerate() {
        if i > 0 {
            qb.push(" OR ");
        }
        push_equals(qb, path, option);
    }
    qb.push(")");
}

fn push_compare(qb: &mut Sql, path: &[String], op: &str, bound: &Value) {
    match bound {
        Value::Number(n) => match n.as_f64() {
            Some(n) => {
                qb.push("CASE WHEN jsonb_typeof(");
                push_path(qb, path, "#>");
                qb.push(") = 'number' THEN ");
                push_path(qb, path, "#>>");
                qb.push("::float8 ").push(op).push(" ").push_bind(n);
                qb.push(" ELSE false END");
            }
            None => {
                qb.push("false");
            }
        },
        Value::String(s) => {
            qb.push("CASE WHEN jsonb_typeof(");
            push_path(qb, path, "#>");
            qb.push(") = 'string' THEN ");
            push_path(qb, path, "#>>");
            qb.push(" COLLATE \"C\" ").push(op).push(" ").push_bind(s.clone());
            qb.push(" ELSE false END");
        }
        _ => {
            qb.push("false");
        }
    }
}

fn push_matches(qb: &mut Sql, path: &[String], source: &str, case_insensitive: bool) {
    let op = if case_insensitive { "~*" } else { "~" };
    qb.push("CASE jsonb_typeof(");
    push_path(qb, path, "#>");
    qb.push(") WHEN 'string' THEN ");
    push_path(qb, path, "#>>");
    qb.push(" ").push(op).push(" ").push_bind(source.to_string());
    qb.push(" WHEN 'array' THEN EXISTS (SELECT 1 FROM jsonb_array_elements(");
    push_path(qb, path, "#>");
    qb.push(") AS e(v) WHERE jsonb_typeof(e.v) = 'string' AND (e.v #>> '{}') ")
        .push(op)
        .push(" ")
        .push_bind(source.to_string());
    qb.push(") ELSE false END");
}

fn push_condition(qb: &mut Sql, condition: &Condition) {
    let path = path_of(&condition.field);
    match &condition.predicate {
        Predicate::Eq(v) => push_equals(qb, &path, v),
        Predicate::Ne(v) => {
            qb.push("NOT ");
            push_equals(qb, &path, v);
        }
        Predicate::Gt(v) => push_compare(qb, &path, ">", v),
        Predicate::Gte(v) => push_compare(qb, &path, ">=", v),
        Predicate::Lt(v) => push_compare(qb, &path, "<", v),
        Predicate::Lte(v) => push_compare(qb, &path, "<=", v),
        Predicate::In(options) => push_any_equals(qb, &path, options),
        Predicate::NotIn(options) => {
            qb.push("NOT ");
            push_any_equals(qb, &path, options);
        }
        Predicate::Matches(p) => push_matches(qb, &path, &p.source, p.case_insensitive),
        Predicate::NotMatches(p) => {
            qb.push("NOT ");
            push_matches(qb, &path, &p.source, p.case_insensitive);
        }
        Predicate::Exists(present) => {
            push_path(qb, &path, "#>");
            qb.push(if *present { " IS NOT NULL" } else { " IS NULL" });
        }
    }
}

/// `WHERE collection = $1 AND ...` for a filter.
fn push_where(qb: &mut Sql, kind: ResourceKind, filter: &Filter) {
    qb.push(" WHERE collection = ").push_bind(kind.collection());
    for condition in &filter.conditions {
        qb.push(" AND (");
        push_condition(qb, condition);
        qb.push(")");
    }
}

fn push_order(qb: &mut Sql, sort: &[SortKey]) {
    qb.push(" ORDER BY ");
    for key in sort {
        push_path(qb, &path_of(&key.field), "#>");
        qb.push(match key.direction {
            SortDirection::Asc => " ASC NULLS FIRST, ",
            SortDirection::Desc => " DESC NULLS LAST, ",
        });
    }
    qb.push("id ASC");
}

fn select_query(kind: ResourceKind, query: &StoreQuery) -> Sql {
    let mut qb = Sql::new("SELECT doc FROM records");
    push_where(&mut qb, kind, &query.filter);
    push_order(&mut qb, &query.sort);
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ")
            .push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    qb.push(" OFFSET ")
        .push_bind(i64::try_from(query.skip).unwrap_or(i64::MAX));
    qb
}

fn count_query(kind: ResourceKind, filter: &Filter) -> Sql {
    let mut qb = Sql::new("SELECT COUNT(*) FROM records");
    push_where(&mut qb, kind, filter);
    qb
}

#[async_trait]
impl ResourceStore for PgStore {
    async fn find(&self, kind: ResourceKind, query: &StoreQuery) -> Result<Vec<Value>, StoreError> {
        let mut qb = select_query(kind, query);
        let rows = qb
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|Json(doc)| doc).collect())
    }

    async fn count(&self, kind: ResourceKind, filter: &Filter) -> Result<u64, StoreError> {
        let mut qb = count_query(kind, filter);
        let n = qb
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    async fn get(&self, kind: ResourceKind, id: RecordId) -> Result<Option<Value>, StoreError> {
        let row: Option<Json<Value>> =
            sqlx::query_scalar("SELECT doc FROM records WHERE collection = $1 AND id = $2")
                .bind(kind.collection())
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn insert(&self, kind: ResourceKind, record: &Record) -> Result<Value, StoreError> {
        let doc = record.to_document()?;
        let result = sqlx::query(
            r#"
            INSERT INTO records (id, collection, doc, is_deleted, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(kind.collection())
        .bind(Json(&doc))
        .bind(record.is_deleted)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(doc),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateId(record.id))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update(
        &self,
        kind: ResourceKind,
        id: RecordId,
        patch: &Patch,
    ) -> Result<Option<Value>, StoreError> {
        let row: Option<Json<Value>> = sqlx::query_scalar(
            r#"
            UPDATE records
            SET doc = (doc - $3::text[]) || $4 || COALESCE((
                    SELECT jsonb_object_agg(
                        pushed.key,
                        CASE WHEN jsonb_typeof(doc -> pushed.key) = 'array'
                            THEN doc -> pushed.key ELSE '[]'::jsonb END
                        || jsonb_build_array(pushed.value)
                    )
                    FROM jsonb_each($6) AS pushed
                ), '{}'::jsonb),
                updated_at = $5
            WHERE collection = $1 AND id = $2 AND NOT is_deleted
            RETURNING doc
            "#,
        )
        .bind(kind.collection())
        .bind(id.as_uuid())
        .bind(patch.unset.clone())
        .bind(Json(Value::Object(patch.stamped_set())))
        .bind(patch.at)
        .bind(Json(Value::Object(patch.append.clone())))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn soft_delete(
        &self,
        kind: ResourceKind,
        id: RecordId,
        deletion: &Deletion,
    ) -> Result<Option<Value>, StoreError> {
        let row: Option<Json<Value>> = sqlx::query_scalar(
            r#"
            UPDATE records
            SET doc = doc || $3, is_deleted = true, deleted_at = $4
            WHERE collection = $1 AND id = $2 AND NOT is_deleted
            RETURNING doc
            "#,
        )
        .bind(kind.collection())
        .bind(id.as_uuid())
        .bind(Json(Value::Object(deletion.stamped_set())))
        .bind(deletion.at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn increment(
        &self,
        kind: ResourceKind,
        id: RecordId,
        field: &str,
        by: i64,
    ) -> Result<Option<Value>, StoreError> {
        let row: Option<Json<Value>> = sqlx::query_scalar(
            r#"
            UPDATE records
            SET doc = jsonb_set(
                doc,
                ARRAY[$3::text],
                to_jsonb(
                    CASE WHEN jsonb_typeof(doc -> $3) = 'number'
                        THEN (doc ->> $3)::numeric ELSE 0 END + $4
                )
            )
            WHERE collection = $1 AND id = $2 AND NOT is_deleted
            RETURNING doc
            "#,
        )
        .bind(kind.collection())
        .bind(id.as_uuid())
        .bind(field)
        .bind(by)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|Json(doc)| doc))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
