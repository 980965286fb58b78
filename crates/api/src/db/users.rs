//! User / auth query builders.

use sea_query::{Asterisk, Expr, Func, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Users;
use crate::Role;
use crate::crypto::PasswordHash;

/// Columns selected by user lookups, in row-mapping order:
/// id, email, password_hash, password_salt, password_iterations, role, tenant_id, created_at.
const COLUMNS: [Users; 8] = [
    Users::Id,
    Users::Email,
    Users::PasswordHash,
    Users::PasswordSalt,
    Users::PasswordIterations,
    Users::Role,
    Users::TenantId,
    Users::CreatedAt,
];

// ── User lookups ───────────────────────────────────────────────────────────

/// Find user by id.
pub fn get_by_id(user_id: &str) -> Built {
    Query::select()
        .columns(COLUMNS)
        .from(Users::Table)
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

/// Find user by (normalized) email, for login and invite checks.
pub fn get_by_email(email: &str) -> Built {
    Query::select()
        .columns(COLUMNS)
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

/// Check email existence.
pub fn email_exists(email: &str) -> Built {
    Query::select()
        .expr(Expr::expr(Func::count(Expr::col(Asterisk))).gt(0))
        .from(Users::Table)
        .and_where(Expr::col(Users::Email).eq(email))
        .build(SqliteQueryBuilder)
}

// ── User inserts ───────────────────────────────────────────────────────────

/// Insert a user with an already-hashed password.
pub fn insert(id: &str, email: &str, password: &PasswordHash, role: Role, tenant_id: &str) -> Built {
    Query::insert()
        .into_table(Users::Table)
        .columns([
            Users::Id,
            Users::Email,
            Users::PasswordHash,
            Users::PasswordSalt,
            Users::PasswordIterations,
            Users::Role,
            Users::TenantId,
        ])
        .values_panic([
            id.into(),
            email.into(),
            password.hash.as_str().into(),
            password.salt.as_str().into(),
            i64::from(password.iterations).into(),
            role.as_str().into(),
            tenant_id.into(),
        ])
        .build(SqliteQueryBuilder)
}

// ── User updates ───────────────────────────────────────────────────────────

/// Replace the password hash, salt and cost.
pub fn update_password(user_id: &str, password: &PasswordHash) -> Built {
    Query::update()
        .table(Users::Table)
        .value(Users::PasswordHash, password.hash.as_str())
        .value(Users::PasswordSalt, password.salt.as_str())
        .value(Users::PasswordIterations, i64::from(password.iterations))
        .and_where(Expr::col(Users::Id).eq(user_id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_binds_every_column() {
        let hash = PasswordHash {
            hash: "aa".into(),
            salt: "bb".into(),
            iterations: 10,
        };
        let (sql, values) = insert("u1", "a@b.c", &hash, Role::Admin, "t1");
        assert!(sql.starts_with(r#"INSERT INTO "users""#));
        assert_eq!(values.0.len(), 7);
    }

    #[test]
    fn email_lookup_filters_by_email() {
        let (sql, _) = get_by_email("a@b.c");
        assert!(sql.ends_with(r#"FROM "users" WHERE "email" = ?"#));
    }
}
