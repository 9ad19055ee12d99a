// In-memory filter evaluation and ordering over JSON documents.

use std::cmp::Ordering;

use serde_json::Value;

use crate::ast::{Filter, Pattern, Predicate, SortDirection, SortKey};

#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("invalid pattern on {field}: {reason}")]
    InvalidPattern { field: String, reason: String },
}

/// Resolve a dotted path inside a document.
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

/// Equality with array fields matching when any element is equal.
fn field_equals(field: Option<&Value>, expected: &Value) -> bool {
    match field {
        None => expected.is_null(),
        Some(Value::Array(items)) if !expected.is_array() => {
            items.iter().any(|item| values_equal(item, expected))
        }
        Some(v) => values_equal(v, expected),
    }
}

/// Range comparison: numbers against numbers, strings against strings.
fn comparable(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn field_compares(field: Option<&Value>, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    match field {
        None => false,
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| comparable(item, bound).is_some_and(accept)),
        Some(v) => comparable(v, bound).is_some_and(accept),
    }
}

fn field_matches(field: Option<&Value>, re: &regex::Regex) -> bool {
    match field {
        Some(Value::String(s)) => re.is_match(s),
        Some(Value::Array(items)) => items
            .iter()
            .any(|item| item.as_str().is_some_and(|s| re.is_match(s))),
        _ => false,
    }
}

enum Compiled {
    Plain(Predicate),
    Matches(regex::Regex),
    NotMatches(regex::Regex),
}

/// A filter prepared for repeated evaluation; regexes are compiled once.
pub struct Matcher {
    conditions: Vec<(String, Compiled)>,
}

impl Matcher {
    pub fn new(filter: &Filter) -> Result<Self, EvalError> {
        let conditions = filter
            .conditions
            .iter()
            .map(|c| -> Result<(String, Compiled), EvalError> {
                let compile = |p: &Pattern| {
                    p.compile().map_err(|e| EvalError::InvalidPattern {
                        field: c.field.clone(),
                        reason: e.to_string(),
                    })
                };
                let compiled = match &c.predicate {
                    Predicate::Matches(p) => Compiled::Matches(compile(p)?),
                    Predicate::NotMatches(p) => Compiled::NotMatches(compile(p)?),
                    other => Compiled::Plain(other.clone()),
                };
                Ok((c.field.clone(), compiled))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { conditions })
    }

    /// Whether the document satisfies every condition.
    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|(field, compiled)| {
            let value = lookup(doc, field);
            match compiled {
                Compiled::Matches(re) => field_matches(value, re),
                Compiled::NotMatches(re) => !field_matches(value, re),
                Compiled::Plain(predicate) => eval_predicate(predicate, value),
            }
        })
    }
}

fn eval_predicate(predicate: &Predicate, value: Option<&Value>) -> bool {
    match predicate {
        Predicate::Eq(expected) => field_equals(value, expected),
        Predicate::Ne(expected) => !field_equals(value, expected),
        Predicate::Gt(bound) => field_compares(value, bound, Ordering::is_gt),
        Predicate::Gte(bound) => field_compares(value, bound, Ordering::is_ge),
        Predicate::Lt(bound) => field_compares(value, bound, Ordering::is_lt),
        Predicate::Lte(bound) => field_compares(value, bound, Ordering::is_le),
        Predicate::In(options) => options.iter().any(|o| field_equals(value, o)),
        Predicate::NotIn(options) => !options.iter().any(|o| field_equals(value, o)),
        Predicate::Exists(present) => value.is_some() == *present,
        // Patterns are compiled by `Matcher::new`.
        Predicate::Matches(_) | Predicate::NotMatches(_) => false,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order over optional JSON values used for sorting.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x @ (Value::Object(_) | Value::Array(_))), Some(y)) => {
            x.to_string().cmp(&y.to_string())
        }
        _ => Ordering::Equal,
    }
}

/// Order two documents by a list of sort keys.
pub fn compare_documents(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| {
            let ord = compare_values(lookup(a, &key.field), lookup(b, &key.field));
            match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        })
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}
