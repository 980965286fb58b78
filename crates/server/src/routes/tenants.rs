use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use rusqlite::Connection;
use std::sync::Arc;
use uuid::Uuid;

use tenantnotes_api::crypto;
use tenantnotes_api::db::{reset_tokens, tenants, users};
use tenantnotes_api::service::{self, INVITE_TOKEN_TTL_SECS};
use tenantnotes_api::{
    InviteRequest, InviteResponse, Plan, Role, TenantDetailResponse, TenantResponse,
};

use super::auth::AuthUser;
use super::notes::quota_usage;
use super::{blocking, now_unix};
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::storage::{Db, email_exists, find_tenant_by_id, find_tenant_by_slug, sq_execute};

/// Resolve a slug to the caller's own tenant. Any other tenant reads as missing.
fn own_tenant(conn: &Connection, slug: &str, user: &AuthUser) -> Result<TenantResponse, ApiErr> {
    let tenant = find_tenant_by_slug(conn, slug).map_err(ApiErr::from_db("tenant lookup"))?;
    service::require_own_tenant(tenant.as_ref().map(|t| t.id.as_str()), &user.tenant_id)?;
    tenant.ok_or_else(|| ApiErr::not_found("Tenant not found or access denied"))
}

/// GET /api/tenants/{slug}: tenant info with plan usage, for its members.
pub async fn get_tenant(
    State(db): State<Db>,
    State(config): State<Arc<AppConfig>>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<TenantDetailResponse>, ApiErr> {
    let conn = db.conn();
    let tenant = own_tenant(&conn, &slug, &user)?;
    let note_count = quota_usage(&conn, config.note_limit_scope, &user)
        .map_err(ApiErr::from_db("count notes"))?;

    Ok(Json(TenantDetailResponse {
        note_limit: tenant.plan.note_limit(),
        tenant,
        note_count,
    }))
}

/// POST /api/tenants/{slug}/upgrade: move the tenant to the pro plan.
pub async fn upgrade(
    State(db): State<Db>,
    user: AuthUser,
    Path(slug): Path<String>,
) -> Result<Json<TenantResponse>, ApiErr> {
    service::require_admin(user.role)?;

    let conn = db.conn();
    let tenant = own_tenant(&conn, &slug, &user)?;

    if tenant.plan != Plan::Pro {
        sq_execute(&conn, tenants::update_plan(&tenant.id, Plan::Pro))
            .map_err(ApiErr::from_db("upgrade tenant"))?;
        tracing::info!("tenant {} upgraded to pro by {}", tenant.slug, user.email);
    }

    let tenant = find_tenant_by_id(&conn, &tenant.id)
        .map_err(ApiErr::from_db("reload tenant"))?
        .ok_or_else(|| ApiErr::not_found("Tenant not found or access denied"))?;
    Ok(Json(tenant))
}

/// POST /api/tenants/{slug}/invite: create a user with a pending reset token.
///
/// The invited account gets a random password nobody knows; the reset token
/// is how its owner sets a real one.
pub async fn invite(
    State(db): State<Db>,
    State(config): State<Arc<AppConfig>>,
    user: AuthUser,
    Path(slug): Path<String>,
    body: Result<Json<InviteRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<InviteResponse>), ApiErr> {
    service::require_admin(user.role)?;

    // Foreign tenants read as missing whatever the body holds.
    {
        let conn = db.conn();
        own_tenant(&conn, &slug, &user)?;
    }

    let Json(req) = body?;
    let email = service::validate_email(&req.email)?;
    let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) => r.parse::<Role>()?,
        None => Role::Member,
    };

    let placeholder = crypto::generate_token()?;
    let iterations = config.password_iterations;
    let password = blocking(move || crypto::hash_password(&placeholder, iterations)).await??;
    let bundle = service::prepare_reset_token(now_unix(), INVITE_TOKEN_TTL_SECS)?;
    let user_id = Uuid::new_v4().to_string();

    let mut conn = db.conn();
    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("begin invite transaction"))?;

    if email_exists(&tx, &email).map_err(ApiErr::from_db("invite email check"))? {
        return Err(ApiErr::bad_request("User already exists"));
    }

    sq_execute(&tx, users::insert(&user_id, &email, &password, role, &user.tenant_id))
        .map_err(ApiErr::from_db("insert invited user"))?;
    sq_execute(
        &tx,
        reset_tokens::insert(&bundle.token_id, &bundle.token_hash, &user_id, &bundle.expires_at),
    )
    .map_err(ApiErr::from_db("insert invite token"))?;
    tx.commit().map_err(ApiErr::from_db("commit invite"))?;

    tracing::info!(
        "user invited: {email} as {role} to {} by {}",
        user.tenant_slug,
        user.email
    );
    tracing::debug!("invite reset token for {email}: {}", bundle.token);

    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            message: "User invited successfully. Password reset token created.".to_string(),
            user_id,
            reset_token: config.expose_reset_tokens.then_some(bundle.token),
        }),
    ))
}
