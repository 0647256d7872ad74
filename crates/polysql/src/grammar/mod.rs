//! Per-dialect SQL generation.
//!
//! Each capability is a trait ([`query::QueryGrammar`], [`schema::SchemaGrammar`])
//! with one unit struct per dialect. Rules shared by several dialects live as
//! free functions in the `common` module of each side.

pub mod query;
pub mod schema;
