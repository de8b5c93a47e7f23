//! Core abstractions for nl2sql: the connection record, the secure config store
//! contract and its access gate, schema metadata, and the query workflow.
//! Concrete backends (filesystem, MySQL, LLM) live in sibling crates.

pub mod database;
pub mod gate;
pub mod record;
pub mod schema;
pub mod storage;
pub mod workflow;
