use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde_json::Value;

use crate::ast::{
    is_field_path, Pattern, Population, Predicate, Projection, QueryDescriptor, SortKey,
};
use crate::cast::{cast, cast_list, cast_scalar, Cast, CastError};
use crate::lexer::{tokenize, LexError, Operator, SpannedToken, Token};

/// Keys that never become filter predicates.
pub const CURRENT_KEY: &str = "current";
pub const PAGE_SIZE_KEY: &str = "pageSize";
pub const SKIP_KEY: &str = "skip";
pub const LIMIT_KEY: &str = "limit";
pub const SORT_KEY: &str = "sort";
pub const FIELDS_KEY: &str = "fields";
pub const POPULATE_KEY: &str = "populate";

const RESERVED_KEYS: &[&str] = &[
    CURRENT_KEY,
    PAGE_SIZE_KEY,
    SKIP_KEY,
    LIMIT_KEY,
    SORT_KEY,
    FIELDS_KEY,
    POPULATE_KEY,
];

/// Why a clause was skipped.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("invalid percent-encoding")]
    Decode,
    #[error("invalid field name: {0:?}")]
    InvalidKey(String),
    #[error("missing value for {0}")]
    MissingValue(String),
    #[error("unexpected token: {found}, expected: {expected}")]
    UnexpectedToken { found: String, expected: String },
    #[error("operator {op} not supported for {key}")]
    UnsupportedOperator { key: String, op: Operator },
    #[error("cast error: {0}")]
    Cast(#[from] CastError),
    #[error("value {0:?} cannot be compared")]
    NotComparable(String),
    #[error("{key} expects an integer, got {value:?}")]
    NotAnInteger { key: String, value: String },
}

/// One clause of the query string.
#[derive(Debug, Clone, PartialEq)]
enum Clause {
    Exists { key: String, present: bool },
    Compare { key: String, op: Operator, value: String },
}

/// Translate a raw query string into a descriptor.
///
/// `searchable` names the fields whose plain `key=value` filters become
/// case-insensitive partial matches. Malformed clauses are skipped.
pub fn parse(input: &str, searchable: &[&str]) -> QueryDescriptor {
    let input = input.strip_prefix('?').unwrap_or(input);
    let mut builder = DescriptorBuilder::new(searchable);
    for raw in input.split('&').filter(|c| !c.is_empty()) {
        if let Err(err) = builder.apply(raw) {
            tracing::debug!(clause = raw, error = %err, "ignoring malformed query clause");
        }
    }
    builder.finish()
}

fn decode(raw: &str) -> Result<Cow<'_, str>, ParseError> {
    if raw.contains('+') {
        let spaced = raw.replace('+', " ");
        return percent_decode_str(&spaced)
            .decode_utf8()
            .map(|s| Cow::Owned(s.into_owned()))
            .map_err(|_| ParseError::Decode);
    }
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|_| ParseError::Decode)
}

struct ClauseParser {
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl ClauseParser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn unexpected(found: &Token, expected: &str) -> ParseError {
        ParseError::UnexpectedToken {
            found: found.to_string(),
            expected: expected.to_string(),
        }
    }

    fn parse_clause(&mut self) -> Result<Clause, ParseError> {
        let negated = if self.peek() == &Token::Bang {
            self.advance();
            true
        } else {
            false
        };

        let key = match self.advance() {
            Token::Key(key) if is_field_path(&key) => key,
            Token::Key(key) => return Err(ParseError::InvalidKey(key)),
            other => return Err(Self::unexpected(&other, "field name")),
        };

        match self.advance() {
            Token::Eof => Ok(Clause::Exists {
                key,
                present: !negated,
            }),
            Token::Op(op) if !negated => match self.advance() {
                Token::Value(value) if value.is_empty() => Err(ParseError::MissingValue(key)),
                Token::Value(value) => Ok(Clause::Compare { key, op, value }),
                other => Err(Self::unexpected(&other, "value")),
            },
            other => Err(Self::unexpected(&other, "end of clause")),
        }
    }
}

fn parse_clause(raw: &str) -> Result<Clause, ParseError> {
    let decoded = decode(raw)?;
    let tokens = tokenize(&decoded)?;
    ClauseParser::new(tokens).parse_clause()
}

struct DescriptorBuilder<'a> {
    searchable: &'a [&'a str],
    descriptor: QueryDescriptor,
    fields: Vec<String>,
}

impl<'a> DescriptorBuilder<'a> {
    fn new(searchable: &'a [&'a str]) -> Self {
        Self {
            searchable,
            descriptor: QueryDescriptor::default(),
            fields: Vec::new(),
        }
    }

    fn apply(&mut self, raw: &str) -> Result<(), ParseError> {
        match parse_clause(raw)? {
            Clause::Exists { key, .. } if RESERVED_KEYS.contains(&key.as_str()) => {
                Err(ParseError::MissingValue(key))
            }
            Clause::Exists { key, present } => {
                self.descriptor.filter.push(key, Predicate::Exists(present));
                Ok(())
            }
            Clause::Compare { key, op, value } if RESERVED_KEYS.contains(&key.as_str()) => {
                if op != Operator::Eq {
                    return Err(ParseError::UnsupportedOperator { key, op });
                }
                self.apply_reserved(&key, &value)
            }
            Clause::Compare { key, op, value } => {
                let predicate = self.predicate(&key, op, &value)?;
                self.descriptor.filter.push(key, predicate);
                Ok(())
            }
        }
    }

    fn apply_reserved(&mut self, key: &str, value: &str) -> Result<(), ParseError> {
        let integer = || {
            value
                .trim()
                .parse::<i64>()
                .map_err(|_| ParseError::NotAnInteger {
                    key: key.to_string(),
                    value: value.to_string(),
                })
        };
        match key {
            CURRENT_KEY => self.descriptor.page.current = Some(integer()?),
            PAGE_SIZE_KEY => self.descriptor.page.page_size = Some(integer()?),
            SKIP_KEY => self.descriptor.page.skip = Some(integer()?),
            LIMIT_KEY => self.descriptor.page.limit = Some(integer()?),
            SORT_KEY => {
                for spec in value.split(',') {
                    match SortKey::parse(spec) {
                        Some(key) => self.descriptor.sort.push(key),
                        None => tracing::debug!(spec, "ignoring invalid sort key"),
                    }
                }
            }
            POPULATE_KEY => {
                for path in value.split(',').map(str::trim) {
                    if !is_field_path(path) {
                        tracing::debug!(path, "ignoring invalid populate path");
                    } else if self.descriptor.population_for(path).is_none() {
                        self.descriptor.population.push(Population::new(path));
                    }
                }
            }
            FIELDS_KEY => self
                .fields
                .extend(value.split(',').map(|f| f.trim().to_string())),
            _ => return Err(ParseError::InvalidKey(key.to_string())),
        }
        Ok(())
    }

    fn predicate(&self, key: &str, op: Operator, raw: &str) -> Result<Predicate, ParseError> {
        let is_list = raw.contains(',') && !raw.starts_with('/') && !raw.starts_with("string(");
        match op {
            Operator::Eq | Operator::Ne if is_list => {
                let values = cast_list(raw).ok_or_else(|| ParseError::NotComparable(raw.into()))?;
                Ok(if op == Operator::Eq {
                    Predicate::In(values)
                } else {
                    Predicate::NotIn(values)
                })
            }
            Operator::Eq => match cast(raw)? {
                Cast::Regex(pattern) => Ok(Predicate::Matches(pattern)),
                Cast::Literal(s) => Ok(Predicate::Eq(Value::String(s))),
                Cast::Scalar(_) if self.searchable.contains(&key) => {
                    Ok(Predicate::Matches(Pattern::contains_ignore_case(raw)))
                }
                Cast::Scalar(v) => Ok(Predicate::Eq(v)),
            },
            Operator::Ne => match cast(raw)? {
                Cast::Regex(pattern) => Ok(Predicate::NotMatches(pattern)),
                Cast::Literal(s) => Ok(Predicate::Ne(Value::String(s))),
                Cast::Scalar(v) => Ok(Predicate::Ne(v)),
            },
            Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
                let value = match cast_scalar(raw) {
                    Some(v @ (Value::Number(_) | Value::String(_))) => v,
                    _ => return Err(ParseError::NotComparable(raw.to_string())),
                };
                Ok(match op {
                    Operator::Gt => Predicate::Gt(value),
                    Operator::Gte => Predicate::Gte(value),
                    Operator::Lt => Predicate::Lt(value),
                    _ => Predicate::Lte(value),
                })
            }
        }
    }

    fn finish(mut self) -> QueryDescriptor {
        let mut include = Vec::new();
        let mut exclude = Vec::new();

        for entry in self.fields.into_iter().filter(|f| !f.is_empty()) {
            if let Some(path) = entry.strip_prefix('-') {
                if is_field_path(path) {
                    exclude.push(path.to_string());
                } else {
                    tracing::debug!(field = %entry, "ignoring invalid projection field");
                }
                continue;
            }
            if !is_field_path(&entry) {
                tracing::debug!(field = %entry, "ignoring invalid projection field");
                continue;
            }
            let populated = entry.split_once('.').and_then(|(head, rest)| {
                self.descriptor
                    .population
                    .iter_mut()
                    .find(|p| p.path == head)
                    .map(|p| (p, rest.to_string()))
            });
            match populated {
                Some((population, sub)) => population.select.push(sub),
                None => include.push(entry),
            }
        }

        self.descriptor.projection = match (include.is_empty(), exclude.is_empty()) {
            (true, true) => Projection::All,
            (false, true) => Projection::Include(include),
            (true, false) => Projection::Exclude(exclude),
            (false, false) => {
                tracing::debug!("ignoring projection mixing included and excluded fields");
                Projection::All
            }
        };
        self.descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Condition, SortDirection};
    use serde_json::json;

    fn conditions(qs: &str) -> Vec<Condition> {
        parse(qs, &["name"]).filter.conditions
    }

    #[test]
    fn empty_query_is_empty_descriptor() {
        assert_eq!(parse("", &[]), QueryDescriptor::default());
        assert_eq!(parse("?", &[]), QueryDescriptor::default());
    }

    #[test]
    fn pagination_keys_leave_the_filter() {
        let d = parse("current=2&pageSize=5&level=senior", &[]);
        assert_eq!(d.page.current, Some(2));
        assert_eq!(d.page.page_size, Some(5));
        assert_eq!(
            d.filter.conditions,
            vec![Condition::new("level", Predicate::Eq(json!("senior")))]
        );
    }

    #[test]
    fn non_numeric_pagination_is_absent() {
        let d = parse("current=abc&pageSize=", &[]);
        assert_eq!(d.page.current, None);
        assert_eq!(d.page.page_size, None);
        assert!(d.filter.is_empty());
    }

    #[test]
    fn searchable_fields_become_partial_matches() {
        let c = conditions("name=acme&level=senior");
        assert_eq!(
            c[0],
            Condition::new("name", Predicate::Matches(Pattern::contains_ignore_case("acme")))
        );
        assert_eq!(c[1], Condition::new("level", Predicate::Eq(json!("senior"))));
    }

    #[test]
    fn searchable_text_is_not_cast() {
        let c = conditions("name=42");
        assert_eq!(
            c[0].predicate,
            Predicate::Matches(Pattern::contains_ignore_case("42"))
        );
    }

    #[test]
    fn comparison_and_list_operators() {
        let c = conditions("salary>=1000&salary<5000&level=junior,senior&status!=closed");
        assert_eq!(c[0].predicate, Predicate::Gte(json!(1000)));
        assert_eq!(c[1].predicate, Predicate::Lt(json!(5000)));
        assert_eq!(
            c[2].predicate,
            Predicate::In(vec![json!("junior"), json!("senior")])
        );
        assert_eq!(c[3].predicate, Predicate::Ne(json!("closed")));
    }

    #[test]
    fn existence_clauses() {
        let c = conditions("logo&!deletedBy");
        assert_eq!(c[0], Condition::new("logo", Predicate::Exists(true)));
        assert_eq!(c[1], Condition::new("deletedBy", Predicate::Exists(false)));
    }

    #[test]
    fn regex_literals_and_decoding() {
        let c = conditions("location=%2F%5Eha%2Fi&address=New+York&createdBy.email=a%40b.io");
        assert_eq!(
            c[0].predicate,
            Predicate::Matches(Pattern {
                source: "^ha".into(),
                case_insensitive: true
            })
        );
        assert_eq!(c[1].predicate, Predicate::Eq(json!("New York")));
        assert_eq!(c[2].field, "createdBy.email");
        assert_eq!(c[2].predicate, Predicate::Eq(json!("a@b.io")));
    }

    #[test]
    fn non_portable_regex_clause_is_skipped() {
        let c = conditions(r"level=/\bsenior\b/i&location=/\p{Lu}/&salary=1000");
        assert_eq!(c, vec![Condition::new("salary", Predicate::Eq(json!(1000)))]);
    }

    #[test]
    fn malformed_clauses_are_ignored() {
        let d = parse(
            "=x&a!b&name=&salary>true&bad%ZZ=1&drop;table=1&title=/(/&level=mid",
            &["name"],
        );
        assert_eq!(
            d.filter.conditions,
            vec![Condition::new("level", Predicate::Eq(json!("mid")))]
        );
    }

    #[test]
    fn sort_keys() {
        let d = parse("sort=-createdAt,name,,bad key", &[]);
        assert_eq!(d.sort.len(), 2);
        assert_eq!(d.sort[0].field, "createdAt");
        assert_eq!(d.sort[0].direction, SortDirection::Desc);
        assert_eq!(d.sort[1].direction, SortDirection::Asc);
    }

    #[test]
    fn population_and_projection() {
        let d = parse("fields=name,company.name,company.logo&populate=company,skills", &[]);
        assert_eq!(d.projection, Projection::Include(vec!["name".into()]));
        let company = d.population_for("company").unwrap();
        assert_eq!(company.select, vec!["name".to_string(), "logo".to_string()]);
        assert!(d.population_for("skills").unwrap().select.is_empty());
    }

    #[test]
    fn exclusion_projection_and_mixed_projection() {
        assert_eq!(
            parse("fields=-description,-updatedBy", &[]).projection,
            Projection::Exclude(vec!["description".into(), "updatedBy".into()])
        );
        assert_eq!(parse("fields=name,-description", &[]).projection, Projection::All);
    }

    #[test]
    fn reserved_keys_reject_other_operators() {
        let d = parse("current>2&sort!=name", &[]);
        assert_eq!(d.page.current, None);
        assert!(d.sort.is_empty());
        assert!(d.filter.is_empty());
    }
}
