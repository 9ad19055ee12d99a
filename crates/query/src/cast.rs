// Query-string value casting.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde_json::Value;

use crate::ast::Pattern;

/// A query-string value after casting.
#[derive(Debug, Clone, PartialEq)]
pub enum Cast {
    /// Number, boolean, null, timestamp or plain string.
    Scalar(Value),
    /// A `/pattern/flags` literal.
    Regex(Pattern),
    /// A `string(...)` wrapped value, never reinterpreted.
    Literal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum CastError {
    #[error("invalid regular expression: {0}")]
    InvalidRegex(String),
    #[error("unsupported regex flag '{0}'")]
    UnsupportedFlag(char),
    #[error("unsupported regex construct {0:?}")]
    UnsupportedConstruct(String),
}

/// Render a timestamp the way records store it: RFC 3339, millisecond
/// precision, `Z` suffix. Fixed width keeps string order chronological.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse `YYYY-MM-DD` (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

fn looks_numeric(raw: &str) -> bool {
    let digits = raw.strip_prefix('-').unwrap_or(raw);
    let mut parts = digits.splitn(2, '.');
    let whole = parts.next().unwrap_or("");
    let frac = parts.next();
    !whole.is_empty()
        && whole.chars().all(|c| c.is_ascii_digit())
        && frac.map_or(true, |f| !f.is_empty() && f.chars().all(|c| c.is_ascii_digit()))
}

fn cast_number(raw: &str) -> Option<Value> {
    if !looks_numeric(raw) {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(Value::from(n));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map(Value::Number)
}

/// Escapes both the `regex` crate and PostgreSQL read the same way.
const PORTABLE_CLASS_ESCAPES: &[char] = &['d', 'D', 's', 'S', 'w', 'W', 'n', 't', 'r'];

/// Reject syntax whose meaning differs between the in-memory matcher and
/// PostgreSQL: letter escapes outside the shared classes (`\b`, `\p{..}`,
/// `\A`, `\z`, ...) and `(?...)` groups and flags.
fn check_portable(source: &str) -> Result<(), CastError> {
    let mut chars = source.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(e) if e.is_ascii_alphanumeric() && !PORTABLE_CLASS_ESCAPES.contains(&e) => {
                    return Err(CastError::UnsupportedConstruct(format!("\\{e}")));
                }
                Some(e) if !e.is_ascii() => {
                    return Err(CastError::UnsupportedConstruct(format!("\\{e}")));
                }
                _ => {}
            },
            '(' if chars.peek() == Some(&'?') => {
                return Err(CastError::UnsupportedConstruct("(?".to_string()));
            }
            _ => {}
        }
    }
    Ok(())
}

fn cast_regex(raw: &str) -> Option<Result<Pattern, CastError>> {
    let body = raw.strip_prefix('/')?;
    let end = body.rfind('/')?;
    let (source, flags) = (&body[..end], &body[end + 1..]);
    let mut case_insensitive = false;
    for flag in flags.chars() {
        match flag {
            'i' => case_insensitive = true,
            other => return Some(Err(CastError::UnsupportedFlag(other))),
        }
    }
    if let Err(e) = check_portable(source) {
        return Some(Err(e));
    }
    let pattern = Pattern {
        source: source.to_string(),
        case_insensitive,
    };
    Some(match pattern.compile() {
        Ok(_) => Ok(pattern),
        Err(e) => Err(CastError::InvalidRegex(e.to_string())),
    })
}

/// Cast a single decoded value.
pub fn cast(raw: &str) -> Result<Cast, CastError> {
    if let Some(inner) = raw
        .strip_prefix("string(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return Ok(Cast::Literal(inner.to_string()));
    }
    if let Some(pattern) = cast_regex(raw) {
        return pattern.map(Cast::Regex);
    }
    let scalar = match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => {
            if let Some(n) = cast_number(raw) {
                n
            } else if let Some(ts) = parse_timestamp(raw) {
                Value::String(format_timestamp(&ts))
            } else {
                Value::String(raw.to_string())
            }
        }
    };
    Ok(Cast::Scalar(scalar))
}

/// Cast a value to a plain JSON value; regex literals are not allowed here.
pub fn cast_scalar(raw: &str) -> Option<Value> {
    match cast(raw).ok()? {
        Cast::Scalar(v) => Some(v),
        Cast::Literal(s) => Some(Value::String(s)),
        Cast::Regex(_) => None,
    }
}

/// Cast a comma-separated list; any uncastable item rejects the whole list.
pub fn cast_list(raw: &str) -> Option<Vec<Value>> {
    raw.split(',').map(|item| cast_scalar(item.trim())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn casts_scalars() {
        assert_eq!(cast("true").unwrap(), Cast::Scalar(json!(true)));
        assert_eq!(cast("null").unwrap(), Cast::Scalar(Value::Null));
        assert_eq!(cast("42").unwrap(), Cast::Scalar(json!(42)));
        assert_eq!(cast("-3.5").unwrap(), Cast::Scalar(json!(-3.5)));
        assert_eq!(cast("acme").unwrap(), Cast::Scalar(json!("acme")));
        assert_eq!(cast("1e5").unwrap(), Cast::Scalar(json!("1e5")));
    }

    #[test]
    fn string_wrapper_prevents_casting() {
        assert_eq!(cast("string(42)").unwrap(), Cast::Literal("42".into()));
    }

    #[test]
    fn casts_dates_to_record_format() {
        assert_eq!(
            cast("2024-03-01").unwrap(),
            Cast::Scalar(json!("2024-03-01T00:00:00.000Z"))
        );
        assert_eq!(
            cast("2024-03-01T10:20:30+02:00").unwrap(),
            Cast::Scalar(json!("2024-03-01T08:20:30.000Z"))
        );
    }

    #[test]
    fn casts_regex_literals() {
        match cast("/^acme/i").unwrap() {
            Cast::Regex(p) => {
                assert_eq!(p.source, "^acme");
                assert!(p.case_insensitive);
            }
            other => panic!("expected regex, got {other:?}"),
        }
        assert!(matches!(cast("/(/"), Err(CastError::InvalidRegex(_))));
        assert!(matches!(cast("/a/g"), Err(CastError::UnsupportedFlag('g'))));
    }

    #[test]
    fn regex_limited_to_portable_syntax() {
        for raw in [
            r"/\bjava\b/i",
            r"/\Bx/",
            r"/\p{Lu}/",
            r"/\PL/",
            r"/^a\z/",
            r"/\Aa/",
            r"/(?i)acme/",
            r"/(?:a|b)c/",
            r"/(?P<n>a)/",
            r"/\x41/",
        ] {
            assert!(
                matches!(cast(raw), Err(CastError::UnsupportedConstruct(_))),
                "{raw} should be rejected"
            );
        }
        for raw in [r"/\d+\.\d/", r"/^\w+\s\S$/i", r"/a\-b\.c/", r"/[a-z]{2,3}(x|y)/"] {
            assert!(matches!(cast(raw), Ok(Cast::Regex(_))), "{raw} should be accepted");
        }
    }

    #[test]
    fn casts_lists() {
        assert_eq!(cast_list("1,two,false"), Some(vec![json!(1), json!("two"), json!(false)]));
        assert_eq!(cast_list("a,/x/"), None);
    }
}
