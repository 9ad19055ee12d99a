//! Query descriptor types produced by the translator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single predicate applied to one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Predicate {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Matches(Pattern),
    NotMatches(Pattern),
    Exists(bool),
}

/// A regular expression predicate source.
///
/// Kept as source text so the descriptor stays comparable and serializable;
/// each store compiles it in its own dialect. The translator only emits
/// patterns that compile with the `regex` crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub source: String,
    pub case_insensitive: bool,
}

impl Pattern {
    /// Case-insensitive partial match on literal text.
    pub fn contains_ignore_case(text: &str) -> Self {
        Self {
            source: regex::escape(text),
            case_insensitive: true,
        }
    }

    /// Case-insensitive whole-value match on literal text.
    pub fn equals_ignore_case(text: &str) -> Self {
        Self {
            source: format!("^{}$", regex::escape(text)),
            case_insensitive: true,
        }
    }

    /// Compile the pattern with the `regex` crate.
    pub fn compile(&self) -> Result<regex::Regex, regex::Error> {
        regex::RegexBuilder::new(&self.source)
            .case_insensitive(self.case_insensitive)
            .build()
    }
}

/// A predicate bound to a (possibly dotted) field path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub predicate: Predicate,
}

impl Condition {
    pub fn new(field: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            field: field.into(),
            predicate,
        }
    }

    /// Field path split on dots.
    pub fn path(&self) -> Vec<&str> {
        self.field.split('.').collect()
    }
}

/// Conjunction of conditions. An empty filter matches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, builder style.
    pub fn and(mut self, field: impl Into<String>, predicate: Predicate) -> Self {
        self.push(field, predicate);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, predicate: Predicate) {
        self.conditions.push(Condition::new(field, predicate));
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Parse `name` or `-name`.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        let (field, direction) = match spec.strip_prefix('-') {
            Some(rest) => (rest, SortDirection::Desc),
            None => (spec.strip_prefix('+').unwrap_or(spec), SortDirection::Asc),
        };
        is_field_path(field).then(|| Self {
            field: field.to_string(),
            direction,
        })
    }
}

/// Which fields of a record are returned.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// A relationship path to resolve, with an optional sub-field selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Population {
    pub path: String,
    pub select: Vec<String>,
}

impl Population {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            select: Vec::new(),
        }
    }
}

/// Pagination values as they appeared in the query string.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageHints {
    pub current: Option<i64>,
    pub page_size: Option<i64>,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
}

/// Everything the translator extracted from a query string.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub page: PageHints,
    pub population: Vec<Population>,
    pub projection: Projection,
}

impl QueryDescriptor {
    pub fn population_for(&self, path: &str) -> Option<&Population> {
        self.population.iter().find(|p| p.path == path)
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*` segments joined by dots.
pub fn is_field_path(field: &str) -> bool {
    !field.is_empty()
        && field.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
