use crate::document::validate::ValidationError;
use crate::document::InvalidId;
use crate::resource::ResourceKind;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    InvalidId(#[from] InvalidId),

    #[error("{} not found: {id}", .kind.label())]
    NotFound { kind: ResourceKind, id: String },

    #[error("{} with {} {value} already exists", .kind.label(), .fields.join(", "))]
    Conflict {
        kind: ResourceKind,
        fields: &'static [&'static str],
        value: String,
    },

    #[error("{field} references a missing {}: {id}", .target.label())]
    MissingReference {
        field: &'static str,
        target: ResourceKind,
        id: String,
    },

    #[error("{field} is not a counter of {}", .kind.collection())]
    NotACounter { kind: ResourceKind, field: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
