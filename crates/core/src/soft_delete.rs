//! Hiding soft-deleted records from reads.

use serde_json::Value;

use jobboard_query::{Filter, Predicate};

use crate::document::model::IS_DELETED;

/// Which records a read may see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Visibility {
    /// Only records that are not soft-deleted.
    #[default]
    Active,
    /// Every record. Administrative use only.
    IncludeDeleted,
}

/// Conjoin the visibility condition to a caller filter.
///
/// Caller conditions on `isDeleted` are kept, so `isDeleted=true` under
/// [`Visibility::Active`] matches nothing.
pub fn apply(mut filter: Filter, visibility: Visibility) -> Filter {
    if visibility == Visibility::Active {
        filter.push(IS_DELETED, Predicate::Eq(Value::Bool(false)));
    }
    filter
}

/// Whether a raw document is visible.
pub fn is_visible(doc: &Value, visibility: Visibility) -> bool {
    match visibility {
        Visibility::IncludeDeleted => true,
        Visibility::Active => !doc.get(IS_DELETED).and_then(Value::as_bool).unwrap_or(false),
    }
}
