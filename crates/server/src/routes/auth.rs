use axum::{
    Json,
    extract::{FromRef, FromRequestParts, State, rejection::JsonRejection},
    http::{header, request::Parts},
};
use rusqlite::Connection;
use std::sync::Arc;

use tenantnotes_api::crypto;
use tenantnotes_api::db::{reset_tokens, users};
use tenantnotes_api::service::{self, INVALID_RESET_TOKEN, RESET_TOKEN_TTL_SECS};
use tenantnotes_api::{
    LoginRequest, LoginResponse, MeResponse, MessageResponse, RequestResetRequest,
    RequestResetResponse, ResetPasswordRequest, Role, SeedResponse,
};

use super::{blocking, now_unix};
use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::seed;
use crate::storage::{
    Db, ResetTokenRow, find_tenant_by_id, find_user_by_email, find_user_by_id,
    reset_token_from_row, sq_execute, sq_query_opt,
};

const RESET_REQUESTED_MESSAGE: &str = "If the email exists, a reset link will be sent.";

// ---------------------------------------------------------------------------
// Auth extractor
// ---------------------------------------------------------------------------

/// Authenticated caller, taken from the claims of a verified access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub tenant_id: String,
    pub tenant_slug: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    Arc<AppConfig>: FromRef<S>,
{
    type Rejection = ApiErr;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = Arc::<AppConfig>::from_ref(state);

        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let token = service::resolve_bearer(header)?;

        let claims = crypto::verify_jwt(token, &config.jwt_secret, now_unix()).map_err(|e| {
            tracing::debug!("rejected access token: {e}");
            ApiErr::forbidden("Invalid token")
        })?;

        Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.email,
            role: claims.role,
            tenant_id: claims.tenant_id,
            tenant_slug: claims.tenant_slug,
        })
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// POST /api/auth/login: exchange email + password for an access token.
pub async fn login(
    State(db): State<Db>,
    State(config): State<Arc<AppConfig>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiErr> {
    let Json(req) = body?;
    let email = req.email.as_deref().unwrap_or_default().trim().to_lowercase();
    let password = req.password.unwrap_or_default();
    if email.is_empty() || password.is_empty() {
        return Err(ApiErr::bad_request("Email and password are required"));
    }

    let user = {
        let conn = db.conn();
        find_user_by_email(&conn, &email).map_err(ApiErr::from_db("login user lookup"))?
    };

    // Key stretching runs off the async workers.
    let user = blocking(move || {
        user.filter(|u| {
            crypto::verify_password(
                &password,
                &u.password.hash,
                &u.password.salt,
                u.password.iterations,
            )
        })
    })
    .await?;

    let Some(user) = user else {
        tracing::info!("failed login attempt for {email}");
        return Err(ApiErr::unauthorized("Invalid credentials"));
    };

    let tenant = {
        let conn = db.conn();
        find_tenant_by_id(&conn, &user.tenant_id).map_err(ApiErr::from_db("login tenant lookup"))?
    }
    .ok_or_else(|| {
        tracing::error!("user {} references missing tenant {}", user.id, user.tenant_id);
        ApiErr::internal("Tenant not found")
    })?;

    let claims = service::new_claims(
        &user.id,
        &user.email,
        user.role,
        &tenant.id,
        &tenant.slug,
        now_unix(),
    );
    let token = crypto::sign_jwt(&claims, &config.jwt_secret)?;

    tracing::info!("user logged in: {} ({})", user.email, tenant.slug);
    Ok(Json(LoginResponse { token }))
}

/// GET /api/auth/me: the caller's identity and current tenant plan.
pub async fn me(State(db): State<Db>, user: AuthUser) -> Result<Json<MeResponse>, ApiErr> {
    let conn = db.conn();
    let tenant = find_tenant_by_id(&conn, &user.tenant_id)
        .map_err(ApiErr::from_db("me tenant lookup"))?
        .ok_or_else(|| ApiErr::not_found("Tenant not found"))?;

    Ok(Json(MeResponse {
        user_id: user.user_id,
        email: user.email,
        role: user.role,
        tenant_id: tenant.id,
        tenant_slug: tenant.slug,
        plan: tenant.plan,
    }))
}

/// POST /api/auth/seed: admin-only, idempotent demo data seeding.
pub async fn seed(
    State(db): State<Db>,
    State(config): State<Arc<AppConfig>>,
    user: AuthUser,
) -> Result<Json<SeedResponse>, ApiErr> {
    if !user.role.is_admin() {
        return Err(ApiErr::forbidden("Admin access required"));
    }

    let report = blocking(move || {
        seed::seed_database(&db, &config.seed_password, config.password_iterations)
    })
    .await??;
    tracing::info!(
        "database seeded by {}: {} tenants, {} users created",
        user.email,
        report.created_tenants.len(),
        report.created_users.len()
    );

    Ok(Json(SeedResponse {
        message: "Database seeded successfully".to_string(),
        created_tenants: report.created_tenants,
        created_users: report.created_users,
    }))
}

// ---------------------------------------------------------------------------
// Password reset
// ---------------------------------------------------------------------------

/// POST /api/auth/request-reset: issue a one-hour reset token.
///
/// The response is identical for known and unknown emails.
pub async fn request_reset(
    State(db): State<Db>,
    State(config): State<Arc<AppConfig>>,
    body: Result<Json<RequestResetRequest>, JsonRejection>,
) -> Result<Json<RequestResetResponse>, ApiErr> {
    let Json(req) = body?;
    let email = req
        .email
        .as_deref()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| ApiErr::bad_request("Email is required"))?;

    let now = now_unix();
    let conn = db.conn();

    let Some(user) =
        find_user_by_email(&conn, &email).map_err(ApiErr::from_db("reset user lookup"))?
    else {
        tracing::info!("password reset requested for unknown email {email}");
        return Ok(Json(RequestResetResponse {
            message: RESET_REQUESTED_MESSAGE.to_string(),
            reset_token: None,
        }));
    };

    sq_execute(&conn, reset_tokens::delete_expired(&service::sqlite_now(now)?))
        .map_err(ApiErr::from_db("delete expired reset tokens"))?;

    let bundle = service::prepare_reset_token(now, RESET_TOKEN_TTL_SECS)?;
    sq_execute(
        &conn,
        reset_tokens::insert(&bundle.token_id, &bundle.token_hash, &user.id, &bundle.expires_at),
    )
    .map_err(ApiErr::from_db("insert reset token"))?;

    tracing::info!("password reset token issued for {}", user.email);
    tracing::debug!("reset token for {}: {}", user.email, bundle.token);

    Ok(Json(RequestResetResponse {
        message: RESET_REQUESTED_MESSAGE.to_string(),
        reset_token: config.expose_reset_tokens.then_some(bundle.token),
    }))
}

/// POST /api/auth/reset-password: consume a reset token and set a new password.
pub async fn reset_password(
    State(db): State<Db>,
    State(config): State<Arc<AppConfig>>,
    body: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiErr> {
    let Json(req) = body?;
    let (Some(token), Some(new_password)) = (
        req.token.filter(|t| !t.is_empty()),
        req.new_password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiErr::bad_request("Token and new password are required"));
    };
    service::validate_password(&new_password)?;

    let token_hash = crypto::hash_token(&token);

    // Reject unknown, used or expired tokens before paying for the hash.
    {
        let conn = db.conn();
        load_usable_reset_token(&conn, &token_hash)?;
    }

    let iterations = config.password_iterations;
    let password = blocking(move || crypto::hash_password(&new_password, iterations)).await??;

    let mut conn = db.conn();
    let tx = conn
        .transaction()
        .map_err(ApiErr::from_db("begin reset transaction"))?;

    // Checked again: another request may have consumed it meanwhile.
    let row = load_usable_reset_token(&tx, &token_hash)?;

    sq_execute(&tx, users::update_password(&row.user_id, &password))
        .map_err(ApiErr::from_db("update password"))?;
    sq_execute(&tx, reset_tokens::mark_used(&row.id)).map_err(ApiErr::from_db("mark token used"))?;
    sq_execute(&tx, reset_tokens::invalidate_for_user(&row.user_id))
        .map_err(ApiErr::from_db("invalidate reset tokens"))?;
    let email = find_user_by_id(&tx, &row.user_id)
        .map_err(ApiErr::from_db("reset user lookup"))?
        .map(|u| u.email)
        .ok_or_else(|| ApiErr::bad_request(INVALID_RESET_TOKEN))?;
    tx.commit().map_err(ApiErr::from_db("commit password reset"))?;

    tracing::info!("password reset for {email}");
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

fn load_usable_reset_token(conn: &Connection, token_hash: &str) -> Result<ResetTokenRow, ApiErr> {
    let row = sq_query_opt(conn, reset_tokens::lookup(token_hash), reset_token_from_row)
        .map_err(ApiErr::from_db("reset token lookup"))?
        .ok_or_else(|| ApiErr::bad_request(INVALID_RESET_TOKEN))?;
    service::check_reset_token(row.used, &row.expires_at, now_unix())?;
    Ok(row)
}
