//! Compile-time-checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Tenants {
    Table,
    Id,
    Name,
    Slug,
    Plan,
    CreatedAt,
}

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    PasswordSalt,
    PasswordIterations,
    Role,
    TenantId,
    CreatedAt,
}

#[derive(Iden)]
pub enum Notes {
    Table,
    Id,
    Title,
    Content,
    UserId,
    TenantId,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum PasswordResetTokens {
    Table,
    Id,
    TokenHash,
    UserId,
    ExpiresAt,
    Used,
    CreatedAt,
}
