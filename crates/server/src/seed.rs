//! Demo tenants and users.

use std::collections::HashMap;
use uuid::Uuid;

use tenantnotes_api::crypto;
use tenantnotes_api::db::{tenants, users};
use tenantnotes_api::{Plan, Role, ServiceError};

use crate::storage::{Db, email_exists, find_tenant_by_slug, sq_execute};

const SEED_TENANTS: [(&str, &str); 2] = [("acme", "Acme"), ("globex", "Globex")];

const SEED_USERS: [(&str, Role, &str); 4] = [
    ("admin@acme.test", Role::Admin, "acme"),
    ("user@acme.test", Role::Member, "acme"),
    ("admin@globex.test", Role::Admin, "globex"),
    ("user@globex.test", Role::Member, "globex"),
];

/// What a seeding run created. Rows that already existed are not listed.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub created_tenants: Vec<String>,
    pub created_users: Vec<String>,
}

/// Ensure the demo tenants and users exist. Safe to run repeatedly.
pub fn seed_database(db: &Db, password: &str, iterations: u32) -> Result<SeedReport, ServiceError> {
    let mut report = SeedReport::default();

    let mut conn = db.conn();
    let tx = conn
        .transaction()
        .map_err(ServiceError::from_db("begin seed transaction"))?;

    let mut tenant_ids = HashMap::new();
    for (slug, name) in SEED_TENANTS {
        let existing =
            find_tenant_by_slug(&tx, slug).map_err(ServiceError::from_db("seed tenant lookup"))?;
        let id = match existing {
            Some(t) => t.id,
            None => {
                let id = Uuid::new_v4().to_string();
                sq_execute(&tx, tenants::insert(&id, name, slug, Plan::Free))
                    .map_err(ServiceError::from_db("seed tenant insert"))?;
                tracing::info!("created tenant: {slug}");
                report.created_tenants.push(slug.to_string());
                id
            }
        };
        tenant_ids.insert(slug, id);
    }

    for (email, role, slug) in SEED_USERS {
        if email_exists(&tx, email).map_err(ServiceError::from_db("seed user lookup"))? {
            tracing::debug!("user already exists: {email}");
            continue;
        }
        let Some(tenant_id) = tenant_ids.get(slug) else {
            return Err(ServiceError::Internal(format!("seed tenant {slug} missing")));
        };
        let hash = crypto::hash_password(password, iterations)?;
        sq_execute(
            &tx,
            users::insert(&Uuid::new_v4().to_string(), email, &hash, role, tenant_id),
        )
        .map_err(ServiceError::from_db("seed user insert"))?;
        tracing::info!("created user: {email} ({role})");
        report.created_users.push(email.to_string());
    }

    tx.commit().map_err(ServiceError::from_db("commit seed"))?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{find_user_by_email, open_in_memory};

    #[test]
    fn seeds_demo_data_once() {
        let db = open_in_memory().unwrap();

        let first = seed_database(&db, "password", 1000).unwrap();
        assert_eq!(first.created_tenants, vec!["acme", "globex"]);
        assert_eq!(first.created_users.len(), 4);

        let second = seed_database(&db, "password", 1000).unwrap();
        assert!(second.created_tenants.is_empty());
        assert!(second.created_users.is_empty());
    }

    #[test]
    fn seeded_users_have_roles_and_tenants() {
        let db = open_in_memory().unwrap();
        seed_database(&db, "hunter22", 1000).unwrap();

        let conn = db.conn();
        let admin = find_user_by_email(&conn, "admin@globex.test").unwrap().unwrap();
        assert_eq!(admin.role, Role::Admin);
        let globex = find_tenant_by_slug(&conn, "globex").unwrap().unwrap();
        assert_eq!(admin.tenant_id, globex.id);
        assert_eq!(globex.plan, Plan::Free);

        let member = find_user_by_email(&conn, "user@acme.test").unwrap().unwrap();
        assert_eq!(member.role, Role::Member);
        assert!(crypto::verify_password(
            "hunter22",
            &member.password.hash,
            &member.password.salt,
            member.password.iterations
        ));
    }

    #[test]
    fn existing_rows_are_left_alone() {
        let db = open_in_memory().unwrap();
        {
            let conn = db.conn();
            sq_execute(&conn, tenants::insert("t-acme", "Acme Corp", "acme", Plan::Pro)).unwrap();
        }

        let report = seed_database(&db, "password", 1000).unwrap();
        assert_eq!(report.created_tenants, vec!["globex"]);

        let conn = db.conn();
        let acme = find_tenant_by_slug(&conn, "acme").unwrap().unwrap();
        assert_eq!(acme.name, "Acme Corp");
        assert_eq!(acme.plan, Plan::Pro);
        let admin = find_user_by_email(&conn, "admin@acme.test").unwrap().unwrap();
        assert_eq!(admin.tenant_id, "t-acme");
    }
}
