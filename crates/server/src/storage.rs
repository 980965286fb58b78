use anyhow::{Context, Result};
use rusqlite::types::{Type, Value as SqlValue};
use rusqlite::{Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tenantnotes_api::crypto::PasswordHash;
use tenantnotes_api::db::{self, Built};
use tenantnotes_api::{NoteResponse, Role, TenantResponse};

/// Shared database state
#[derive(Clone)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
}

impl Db {
    /// Lock the connection. Every multi-statement operation that must be
    /// atomic with respect to other requests runs under one guard.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Initialize the database: open connection, enable WAL, run migrations
pub fn init_db(data_dir: &Path) -> Result<Db> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("creating data directory {}", data_dir.display()))?;
    let db_path = data_dir.join("tenantnotes.db");
    let conn = Connection::open(&db_path).context("opening SQLite database")?;

    // Enable WAL mode for better concurrent read performance
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    run_migrations(&conn)?;

    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

/// Open a private in-memory database with the full schema.
#[cfg(test)]
pub fn open_in_memory() -> Result<Db> {
    let conn = Connection::open_in_memory().context("opening in-memory database")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    run_migrations(&conn)?;
    Ok(Db {
        conn: Arc::new(Mutex::new(conn)),
    })
}

fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    for (name, sql) in db::migrations::MIGRATIONS {
        let already_applied: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM _migrations WHERE name = ?1",
            [name],
            |row| row.get(0),
        )?;

        if !already_applied {
            conn.execute_batch(sql)
                .with_context(|| format!("running migration {name}"))?;
            conn.execute("INSERT INTO _migrations (name) VALUES (?1)", [name])?;
            tracing::info!("Applied migration: {name}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// sea-query bindings
// ---------------------------------------------------------------------------

/// Convert `sea_query::Values` into rusqlite bind params.
fn sq_params(values: &sea_query::Values) -> Vec<SqlValue> {
    values
        .0
        .iter()
        .map(|v| match v {
            sea_query::Value::String(Some(s)) => SqlValue::Text(s.as_ref().clone()),
            sea_query::Value::Int(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::BigInt(Some(i)) => SqlValue::Integer(*i),
            sea_query::Value::Unsigned(Some(i)) => SqlValue::Integer(i64::from(*i)),
            sea_query::Value::BigUnsigned(Some(i)) => {
                SqlValue::Integer(tenantnotes_api::saturating_i64(*i))
            }
            sea_query::Value::Bool(Some(b)) => SqlValue::Integer(i64::from(*b)),
            _ => SqlValue::Null,
        })
        .collect()
}

/// Execute a built statement, returning the number of affected rows.
pub fn sq_execute(conn: &Connection, (sql, values): Built) -> rusqlite::Result<usize> {
    conn.execute(&sql, rusqlite::params_from_iter(sq_params(&values)))
}

/// Run a built query expected to return exactly one row.
pub fn sq_query_row<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<T>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    conn.query_row(&sql, rusqlite::params_from_iter(sq_params(&values)), f)
}

/// Run a built query returning at most one row.
pub fn sq_query_opt<T, F>(
    conn: &Connection,
    built: Built,
    f: F,
) -> rusqlite::Result<Option<T>>
where
    F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
{
    sq_query_row(conn, built, f).optional()
}

/// Run a built query and collect every row.
pub fn sq_query_map<T, F>(conn: &Connection, (sql, values): Built, f: F) -> rusqlite::Result<Vec<T>>
where
    F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(sq_params(&values)), f)?;
    rows.collect()
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Map a tenant row (see `db::tenants` column order).
pub fn tenant_from_row(row: &Row<'_>) -> rusqlite::Result<TenantResponse> {
    Ok(TenantResponse {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        plan: parse_column(row, 3)?,
        created_at: row.get(4)?,
    })
}

/// A user row including credentials. Never serialized.
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: PasswordHash,
    pub role: Role,
    pub tenant_id: String,
}

/// Map a user row (see `db::users` column order).
pub fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let iterations: i64 = row.get(4)?;
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password: PasswordHash {
            hash: row.get(2)?,
            salt: row.get(3)?,
            iterations: u32::try_from(iterations).unwrap_or(0),
        },
        role: parse_column(row, 5)?,
        tenant_id: row.get(6)?,
    })
}

/// Map a note row joined with its owner's email (see `db::notes`).
pub fn note_from_row(row: &Row<'_>) -> rusqlite::Result<NoteResponse> {
    Ok(NoteResponse {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        user_id: row.get(3)?,
        tenant_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        owner_email: row.get(7)?,
    })
}

/// A stored reset token (hash lookup result).
pub struct ResetTokenRow {
    pub id: String,
    pub user_id: String,
    pub expires_at: String,
    pub used: bool,
}

pub fn reset_token_from_row(row: &Row<'_>) -> rusqlite::Result<ResetTokenRow> {
    Ok(ResetTokenRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        expires_at: row.get(2)?,
        used: row.get(3)?,
    })
}

// ---------------------------------------------------------------------------
// Shared lookups
// ---------------------------------------------------------------------------

pub fn find_tenant_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<TenantResponse>> {
    sq_query_opt(conn, db::tenants::get_by_id(id), tenant_from_row)
}

pub fn find_tenant_by_slug(conn: &Connection, slug: &str) -> rusqlite::Result<Option<TenantResponse>> {
    sq_query_opt(conn, db::tenants::get_by_slug(slug), tenant_from_row)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<UserRow>> {
    sq_query_opt(conn, db::users::get_by_email(email), user_from_row)
}

pub fn find_user_by_id(conn: &Connection, id: &str) -> rusqlite::Result<Option<UserRow>> {
    sq_query_opt(conn, db::users::get_by_id(id), user_from_row)
}

pub fn email_exists(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    sq_query_row(conn, db::users::email_exists(email), |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantnotes_api::Plan;
    use tenantnotes_api::crypto::hash_password;

    fn seed_tenant(conn: &Connection) -> String {
        let id = "t1".to_string();
        sq_execute(conn, db::tenants::insert(&id, "Acme", "acme", Plan::Free)).unwrap();
        id
    }

    #[test]
    fn test_init_db_on_disk_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = init_db(dir.path()).unwrap();
            seed_tenant(&db.conn());
        }
        // Re-open: migrations must not re-run, data must survive.
        let db = init_db(dir.path()).unwrap();
        let conn = db.conn();
        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, db::migrations::MIGRATIONS.len() as i64);
        assert!(find_tenant_by_slug(&conn, "acme").unwrap().is_some());
    }

    #[test]
    fn test_tenant_roundtrip_and_upgrade() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        let id = seed_tenant(&conn);

        let tenant = find_tenant_by_id(&conn, &id).unwrap().unwrap();
        assert_eq!(tenant.slug, "acme");
        assert_eq!(tenant.plan, Plan::Free);

        sq_execute(&conn, db::tenants::update_plan(&id, Plan::Pro)).unwrap();
        let tenant = find_tenant_by_slug(&conn, "acme").unwrap().unwrap();
        assert_eq!(tenant.plan, Plan::Pro);

        assert!(find_tenant_by_slug(&conn, "globex").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_slug_rejected() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        seed_tenant(&conn);
        let err = sq_execute(&conn, db::tenants::insert("t2", "Other", "acme", Plan::Free));
        assert!(err.is_err());
    }

    #[test]
    fn test_user_roundtrip() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        let tenant_id = seed_tenant(&conn);
        let hash = hash_password("password", 10).unwrap();
        sq_execute(
            &conn,
            db::users::insert("u1", "admin@acme.test", &hash, Role::Admin, &tenant_id),
        )
        .unwrap();

        let user = find_user_by_email(&conn, "admin@acme.test").unwrap().unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.role, Role::Admin);
        assert_eq!(user.password, hash);
        assert!(email_exists(&conn, "admin@acme.test").unwrap());
        assert!(!email_exists(&conn, "nobody@acme.test").unwrap());
        assert!(find_user_by_id(&conn, "u1").unwrap().is_some());
    }

    #[test]
    fn test_user_requires_existing_tenant() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        let hash = hash_password("password", 10).unwrap();
        let result = sq_execute(
            &conn,
            db::users::insert("u1", "a@b.c", &hash, Role::Member, "missing"),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_note_queries_scope_by_tenant_and_owner() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        let tenant_id = seed_tenant(&conn);
        let hash = hash_password("password", 10).unwrap();
        sq_execute(&conn, db::users::insert("u1", "a@acme.test", &hash, Role::Member, &tenant_id)).unwrap();
        sq_execute(&conn, db::users::insert("u2", "b@acme.test", &hash, Role::Member, &tenant_id)).unwrap();

        sq_execute(&conn, db::notes::insert("n1", "first", "x", "u1", &tenant_id)).unwrap();
        sq_execute(&conn, db::notes::insert("n2", "second", "y", "u1", &tenant_id)).unwrap();
        sq_execute(&conn, db::notes::insert("n3", "other", "z", "u2", &tenant_id)).unwrap();

        let mine = sq_query_map(&conn, db::notes::list_by_owner(&tenant_id, "u1"), note_from_row).unwrap();
        assert_eq!(mine.len(), 2);
        // Newest first; same-second inserts fall back to insertion order.
        assert_eq!(mine[0].id, "n2");
        assert_eq!(mine[0].owner_email.as_deref(), Some("a@acme.test"));

        let count: i64 = sq_query_row(&conn, db::notes::count_by_owner(&tenant_id, "u1"), |r| r.get(0)).unwrap();
        assert_eq!(count, 2);
        let count: i64 = sq_query_row(&conn, db::notes::count_by_tenant(&tenant_id), |r| r.get(0)).unwrap();
        assert_eq!(count, 3);

        assert!(sq_query_opt(&conn, db::notes::get("n1", "other-tenant"), note_from_row).unwrap().is_none());

        let updated = sq_execute(&conn, db::notes::update("n1", &tenant_id, None, Some("new"))).unwrap();
        assert_eq!(updated, 1);
        let note = sq_query_row(&conn, db::notes::get("n1", &tenant_id), note_from_row).unwrap();
        assert_eq!(note.title, "first");
        assert_eq!(note.content, "new");
        assert_eq!(note.user_id, "u1");

        assert_eq!(sq_execute(&conn, db::notes::delete("n1", "other-tenant")).unwrap(), 0);
        assert_eq!(sq_execute(&conn, db::notes::delete("n1", &tenant_id)).unwrap(), 1);
    }

    #[test]
    fn test_reset_token_queries() {
        let db = open_in_memory().unwrap();
        let conn = db.conn();
        let tenant_id = seed_tenant(&conn);
        let hash = hash_password("password", 10).unwrap();
        sq_execute(&conn, db::users::insert("u1", "a@acme.test", &hash, Role::Member, &tenant_id)).unwrap();

        sq_execute(&conn, db::reset_tokens::insert("r1", "h1", "u1", "2000-01-01 00:00:00")).unwrap();
        sq_execute(&conn, db::reset_tokens::insert("r2", "h2", "u1", "2999-01-01 00:00:00")).unwrap();

        let token = sq_query_row(&conn, db::reset_tokens::lookup("h2"), reset_token_from_row).unwrap();
        assert_eq!(token.id, "r2");
        assert!(!token.used);

        let removed = sq_execute(&conn, db::reset_tokens::delete_expired("2025-01-01 00:00:00")).unwrap();
        assert_eq!(removed, 1);

        sq_execute(&conn, db::reset_tokens::invalidate_for_user("u1")).unwrap();
        let token = sq_query_row(&conn, db::reset_tokens::lookup("h2"), reset_token_from_row).unwrap();
        assert!(token.used);
    }
}
