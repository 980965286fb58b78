//! Canonical migration definitions.

/// A named migration: `(name, sql)`.
pub type Migration = (&'static str, &'static str);

/// Schema migrations, applied in order and recorded by name.
pub const MIGRATIONS: &[Migration] = &[
    (
        "0001_schema",
        include_str!("../../migrations/0001_schema.sql"),
    ),
    (
        "0002_password_reset_tokens",
        include_str!("../../migrations/0002_password_reset_tokens.sql"),
    ),
];
