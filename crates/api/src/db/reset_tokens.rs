//! Password reset token query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::PasswordResetTokens;

/// Insert a reset token (hash only).
pub fn insert(id: &str, token_hash: &str, user_id: &str, expires_at: &str) -> Built {
    Query::insert()
        .into_table(PasswordResetTokens::Table)
        .columns([
            PasswordResetTokens::Id,
            PasswordResetTokens::TokenHash,
            PasswordResetTokens::UserId,
            PasswordResetTokens::ExpiresAt,
        ])
        .values_panic([
            id.into(),
            token_hash.into(),
            user_id.into(),
            expires_at.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Lookup a token by hash (returns id, user_id, expires_at, used).
pub fn lookup(token_hash: &str) -> Built {
    Query::select()
        .columns([
            PasswordResetTokens::Id,
            PasswordResetTokens::UserId,
            PasswordResetTokens::ExpiresAt,
            PasswordResetTokens::Used,
        ])
        .from(PasswordResetTokens::Table)
        .and_where(Expr::col(PasswordResetTokens::TokenHash).eq(token_hash))
        .build(SqliteQueryBuilder)
}

/// Mark a single token used.
pub fn mark_used(id: &str) -> Built {
    Query::update()
        .table(PasswordResetTokens::Table)
        .value(PasswordResetTokens::Used, true)
        .and_where(Expr::col(PasswordResetTokens::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Mark every outstanding token of a user used.
pub fn invalidate_for_user(user_id: &str) -> Built {
    Query::update()
        .table(PasswordResetTokens::Table)
        .value(PasswordResetTokens::Used, true)
        .and_where(Expr::col(PasswordResetTokens::UserId).eq(user_id))
        .and_where(Expr::col(PasswordResetTokens::Used).eq(false))
        .build(SqliteQueryBuilder)
}

/// Delete tokens that expired at or before `now` (SQLite datetime text).
pub fn delete_expired(now: &str) -> Built {
    Query::delete()
        .from_table(PasswordResetTokens::Table)
        .and_where(Expr::col(PasswordResetTokens::ExpiresAt).lte(now))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_by_hash() {
        let (sql, values) = lookup("abc");
        assert!(sql.ends_with(r#"WHERE "token_hash" = ?"#));
        assert_eq!(values.0.len(), 1);
    }

    #[test]
    fn invalidate_only_touches_unused_tokens() {
        let (sql, values) = invalidate_for_user("u1");
        assert!(sql.contains(r#""user_id" = ?"#));
        assert!(sql.contains(r#""used" = ?"#));
        assert_eq!(values.0.len(), 3);
    }
}
