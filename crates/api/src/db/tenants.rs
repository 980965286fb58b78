//! Tenant query builders.

use sea_query::{Expr, Query, SqliteQueryBuilder};

use super::Built;
use super::tables::Tenants;
use crate::Plan;

/// Columns selected by every tenant lookup, in row-mapping order:
/// id, name, slug, plan, created_at.
const COLUMNS: [Tenants; 5] = [
    Tenants::Id,
    Tenants::Name,
    Tenants::Slug,
    Tenants::Plan,
    Tenants::CreatedAt,
];

/// Find tenant by id.
pub fn get_by_id(id: &str) -> Built {
    Query::select()
        .columns(COLUMNS)
        .from(Tenants::Table)
        .and_where(Expr::col(Tenants::Id).eq(id))
        .build(SqliteQueryBuilder)
}

/// Find tenant by slug.
pub fn get_by_slug(slug: &str) -> Built {
    Query::select()
        .columns(COLUMNS)
        .from(Tenants::Table)
        .and_where(Expr::col(Tenants::Slug).eq(slug))
        .build(SqliteQueryBuilder)
}

/// Insert a tenant.
pub fn insert(id: &str, name: &str, slug: &str, plan: Plan) -> Built {
    Query::insert()
        .into_table(Tenants::Table)
        .columns([Tenants::Id, Tenants::Name, Tenants::Slug, Tenants::Plan])
        .values_panic([id.into(), name.into(), slug.into(), plan.as_str().into()])
        .build(SqliteQueryBuilder)
}

/// Set the plan of a tenant.
pub fn update_plan(id: &str, plan: Plan) -> Built {
    Query::update()
        .table(Tenants::Table)
        .value(Tenants::Plan, plan.as_str())
        .and_where(Expr::col(Tenants::Id).eq(id))
        .build(SqliteQueryBuilder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lookup_binds_slug() {
        let (sql, values) = get_by_slug("acme");
        assert_eq!(
            sql,
            r#"SELECT "id", "name", "slug", "plan", "created_at" FROM "tenants" WHERE "slug" = ?"#
        );
        assert_eq!(values.0.len(), 1);
    }

    #[test]
    fn upgrade_sets_plan_only() {
        let (sql, values) = update_plan("t1", Plan::Pro);
        assert_eq!(sql, r#"UPDATE "tenants" SET "plan" = ? WHERE "id" = ?"#);
        assert_eq!(values.0.len(), 2);
    }
}
