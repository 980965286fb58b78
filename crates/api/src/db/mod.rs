//! Shared database schema, migrations, and query builders.
//!
//! Builders return `(sql, values)` pairs for the SQLite backend; the server
//! binds the values and runs them.

pub mod migrations;
pub mod notes;
pub mod reset_tokens;
pub mod tables;
pub mod tenants;
pub mod users;

// Re-export tables for convenience
pub use tables::*;

/// A built statement: SQL text plus positional bind values.
pub type Built = (String, sea_query::Values);
