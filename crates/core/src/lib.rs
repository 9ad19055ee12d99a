//! Records, stores and the per-resource service of the job board.

pub mod assembler;
pub mod document;
pub mod error;
pub mod mutation;
pub mod pagination;
pub mod resource;
pub mod service;
pub mod soft_delete;
pub mod store;

pub use assembler::ListResult;
pub use error::{ServiceError, ServiceResult};
pub use resource::ResourceKind;
pub use service::ResourceService;
pub use soft_delete::Visibility;
pub use store::{MemoryStore, PgStore, ResourceStore, StoreError, StoreQuery};
