//! MySQL implementation of the `Database` contract: reachability checks,
//! schema introspection and ad-hoc query execution.

pub mod introspect;
pub mod mysql;
pub mod statement;
pub mod values;
