//! Query-string translation for resource listings.
//!
//! [`parser::parse`] turns a raw query string such as
//! `name=acme&salary>=1000&sort=-createdAt&populate=company&current=2`
//! into a [`QueryDescriptor`]; [`eval`] evaluates descriptor filters and
//! orderings against JSON documents for stores that run in memory.

pub mod ast;
pub mod cast;
pub mod eval;
pub mod lexer;
pub mod parser;

pub use ast::{
    Condition, Filter, PageHints, Pattern, Population, Predicate, Projection, QueryDescriptor,
    SortDirection, SortKey,
};
pub use parser::parse;
