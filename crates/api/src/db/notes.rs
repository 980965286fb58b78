//! Note query builders.
//!
//! Every lookup is scoped by tenant; owner scoping is layered on top by the
//! list/count builders and by the handlers.

use sea_query::{Alias, Asterisk, Expr, Func, Order, Query, SelectStatement, SqliteQueryBuilder};

use super::Built;
use super::tables::{Notes, Users};

/// Select notes joined with their owner's email, in row-mapping order:
/// id, title, content, user_id, tenant_id, created_at, updated_at, owner_email.
fn select_with_owner() -> SelectStatement {
    let mut q = Query::select();
    q.column((Notes::Table, Notes::Id))
        .column((Notes::Table, Notes::Title))
        .column((Notes::Table, Notes::Content))
        .column((Notes::Table, Notes::UserId))
        .column((Notes::Table, Notes::TenantId))
        .column((Notes::Table, Notes::CreatedAt))
        .column((Notes::Table, Notes::UpdatedAt))
        .expr_as(Expr::col((Users::Table, Users::Email)), Alias::new("owner_email"))
        .from(Notes::Table)
        .left_join(
            Users::Table,
            Expr::col((Users::Table, Users::Id)).equals((Notes::Table, Notes::UserId)),
        );
    q
}

/// List the notes a user owns within a tenant, newest first.
pub fn list_by_owner(tenant_id: &str, user_id: &str) -> Built {
    select_with_owner()
        .and_where(Expr::col((Notes::Table, Notes::TenantId)).eq(tenant_id))
        .and_where(Expr::col((Notes::Table, Notes::UserId)).eq(user_id))
        .order_by((Notes::Table, Notes::CreatedAt), Order::Desc)
        .order_by_expr(Expr::cust(r#""notes"."rowid""#), Order::Desc)
        .build(SqliteQueryBuilder)
}

/// Find a note by id within a tenant.
pub fn get(id: &str, tenant_id: &str) -> Built {
    select_with_owner()
        .and_where(Expr::col((Notes::Table, Notes::Id)).eq(id))
        .and_where(Expr::col((Notes::Table, Notes::TenantId)).eq(tenant_id))
        .build(SqliteQueryBuilder)
}

/// Insert a note.
pub fn insert(id: &str, title: &str, content: &str, user_id: &str, tenant_id: &str) -> Built {
    Query::insert()
        .into_table(Notes::Table)
        .columns([
            Notes::Id,
            Notes::Title,
            Notes::Content,
            Notes::UserId,
            Notes::TenantId,
        ])
        .values_panic([
            id.into(),
            title.into(),
            content.into(),
            user_id.into(),
            tenant_id.into(),
        ])
        .build(SqliteQueryBuilder)
}

/// Update title and/or content within a tenant and bump `updated_at`.
///
/// Owner and tenant columns are never touched.
pub fn update(id: &str, tenant_id: &str, title: Option<&str>, content: Option<&str>) -> Built {
    let mut q = Query::update();
    q.table(Notes::Table);
    if let Some(title) = title {
        q.value(Notes::Title, title);
    }
    if let Some(content) = content {
        q.value(Notes::Content, content);
    }
    q.value(Notes::UpdatedAt, Expr::cust("datetime('now')"))
        .and_where(Expr::col(Notes::Id).eq(id))
        .and_where(Expr::col(Notes::TenantId).eq(tenant_id))
        .build(SqliteQueryBuilder)
}

/// Delete a note within a tenant.
pub fn delete(id: &str, tenant_id: &str) -> Built {
    Query::delete()
        .from_table(Notes::Table)
        .and_where(Expr::col(Notes::Id).eq(id))
        .and_where(Expr::col(Notes::TenantId).eq(tenant_id))
        .build(SqliteQueryBuilder)
}

/// Count notes in a tenant.
pub fn count_by_tenant(tenant_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Notes::Table)
        .and_where(Expr::col(Notes::TenantId).eq(tenant_id))
        .build(SqliteQueryBuilder)
}

/// Count notes a user owns within a tenant.
pub fn count_by_owner(tenant_id: &str, user_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(Asterisk)))
        .from(Notes::Table)
        .and_where(Expr::col(Notes::TenantId).eq(tenant_id))
        .and_where(Expr::col(Notes::UserId).eq(user_id))
        .build(SqliteQueryBuilder)
}
