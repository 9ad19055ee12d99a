pub mod types;

pub use types::{Deletion, Patch};
