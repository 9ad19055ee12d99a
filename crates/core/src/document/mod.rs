pub mod id;
pub mod model;
pub mod validate;

pub use id::{InvalidId, RecordId};
pub use model::{Actor, Record};
