//! Shared business logic: framework-agnostic pure functions.
//!
//! Route handlers stay thin adapters: they load rows, call into these rules,
//! and persist the outcome.

use crate::{Claims, Plan, Role, ServiceError};

/// SQLite `datetime('now')` text format used for every timestamp column.
pub const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Validation ─────────────────────────────────────────────────────────────

/// Validate and normalize an email address. Returns the lowercased, trimmed email.
pub fn validate_email(email: &str) -> Result<String, ServiceError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') || email.len() > 254 {
        return Err(ServiceError::BadRequest("invalid email address".into()));
    }
    Ok(email)
}

/// Minimum password length accepted on reset.
pub const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;

/// Validate a new password (6-128 characters).
pub fn validate_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if len < MIN_PASSWORD_LEN {
        return Err(ServiceError::BadRequest(
            "Password must be at least 6 characters long".into(),
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ServiceError::BadRequest(
            "Password must be at most 128 characters long".into(),
        ));
    }
    Ok(())
}

/// Validate and normalize a note title. Returns the trimmed title.
pub fn validate_note_title(title: &str) -> Result<String, ServiceError> {
    let trimmed = title.trim().to_string();
    if trimmed.is_empty() || trimmed.chars().count() > 255 {
        return Err(ServiceError::BadRequest(
            "title must be 1-255 characters".into(),
        ));
    }
    Ok(trimmed)
}

// ─── Plan gate ──────────────────────────────────────────────────────────────

/// What the free-plan note ceiling counts against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteLimitScope {
    /// Each user may own up to the plan limit.
    #[default]
    User,
    /// The whole tenant shares the plan limit.
    Tenant,
}

impl std::str::FromStr for NoteLimitScope {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "tenant" => Ok(Self::Tenant),
            other => Err(ServiceError::BadRequest(format!(
                "invalid note limit scope '{other}' (expected user or tenant)"
            ))),
        }
    }
}

pub const NOTE_LIMIT_MESSAGE: &str = "Free plan limit reached. Upgrade to Pro for unlimited notes.";

/// Reject a note creation once the plan ceiling is reached.
pub fn check_note_quota(plan: Plan, current_count: i64) -> Result<(), ServiceError> {
    match plan.note_limit() {
        Some(limit) if current_count >= 0 && current_count as u64 >= limit => {
            Err(ServiceError::Forbidden(NOTE_LIMIT_MESSAGE.into()))
        }
        _ => Ok(()),
    }
}

// ─── Authorization ──────────────────────────────────────────────────────────

/// Mutation attempted on a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteAction {
    Update,
    Delete,
}

impl NoteAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// Only the owner may mutate a note; roles grant no override.
pub fn authorize_note_mutation(
    note_owner_id: &str,
    caller_id: &str,
    action: NoteAction,
) -> Result<(), ServiceError> {
    if note_owner_id != caller_id {
        return Err(ServiceError::Forbidden(format!(
            "You can only {} your own notes",
            action.as_str()
        )));
    }
    Ok(())
}

/// Owner-only visibility for reads. A foreign note reads as missing.
pub fn note_visible_to(note_owner_id: &str, caller_id: &str) -> Result<(), ServiceError> {
    if note_owner_id != caller_id {
        return Err(ServiceError::NotFound("Note not found".into()));
    }
    Ok(())
}

/// Admin-only gate for tenant management.
pub fn require_admin(role: Role) -> Result<(), ServiceError> {
    if !role.is_admin() {
        return Err(ServiceError::Forbidden("Admin role required".into()));
    }
    Ok(())
}

/// The slug must resolve to the caller's own tenant.
///
/// `tenant_id` is the id the slug resolved to, if any.
pub fn require_own_tenant(tenant_id: Option<&str>, caller_tenant_id: &str) -> Result<(), ServiceError> {
    match tenant_id {
        Some(id) if id == caller_tenant_id => Ok(()),
        _ => Err(ServiceError::NotFound(
            "Tenant not found or access denied".into(),
        )),
    }
}

/// Extract the token from an `Authorization` header value (`<scheme> <token>`).
pub fn resolve_bearer(header: Option<&str>) -> Result<&str, ServiceError> {
    header
        .and_then(|v| v.split(' ').nth(1))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ServiceError::Unauthorized("Access token required".into()))
}

// ─── Access tokens ──────────────────────────────────────────────────────────

/// Build access-token claims for a user in their tenant.
pub fn new_claims(
    user_id: &str,
    email: &str,
    role: Role,
    tenant_id: &str,
    tenant_slug: &str,
    now_unix: u64,
) -> Claims {
    Claims {
        user_id: user_id.to_string(),
        email: email.to_string(),
        role,
        tenant_id: tenant_id.to_string(),
        tenant_slug: tenant_slug.to_string(),
        iat: now_unix,
        exp: now_unix.saturating_add(crate::crypto::JWT_EXPIRY_SECS),
    }
}

// ─── Password reset tokens ──────────────────────────────────────────────────

/// Lifetime of a reset token requested by the user.
pub const RESET_TOKEN_TTL_SECS: i64 = 60 * 60;

/// Lifetime of the reset token issued with an invite.
pub const INVITE_TOKEN_TTL_SECS: i64 = 24 * 60 * 60;

pub const INVALID_RESET_TOKEN: &str = "Invalid or expired reset token";

/// Compute an expiry `ttl_secs` after `now_unix`, in SQLite datetime format.
pub fn token_expiry(now_unix: u64, ttl_secs: i64) -> Result<String, ServiceError> {
    let base = chrono::DateTime::from_timestamp(crate::saturating_i64(now_unix), 0)
        .ok_or_else(|| ServiceError::Internal("invalid timestamp".into()))?;
    Ok(base
        .checked_add_signed(chrono::Duration::seconds(ttl_secs))
        .ok_or_else(|| ServiceError::Internal("timestamp overflow".into()))?
        .format(SQLITE_DATETIME_FORMAT)
        .to_string())
}

/// Format `now_unix` in SQLite datetime format.
pub fn sqlite_now(now_unix: u64) -> Result<String, ServiceError> {
    token_expiry(now_unix, 0)
}

/// A reset token is usable once, and only before it expires.
pub fn check_reset_token(used: bool, expires_at: &str, now_unix: u64) -> Result<(), ServiceError> {
    if used {
        return Err(ServiceError::BadRequest(INVALID_RESET_TOKEN.into()));
    }
    let Ok(expiry) = chrono::NaiveDateTime::parse_from_str(expires_at, SQLITE_DATETIME_FORMAT)
    else {
        return Err(ServiceError::BadRequest(INVALID_RESET_TOKEN.into()));
    };
    if crate::saturating_i64(now_unix) >= expiry.and_utc().timestamp() {
        return Err(ServiceError::BadRequest(INVALID_RESET_TOKEN.into()));
    }
    Ok(())
}

/// Everything needed to persist and hand out a fresh reset token.
///
/// Only `token_hash` is stored; `token` goes to the user.
pub struct ResetTokenBundle {
    /// Raw token (sent to the user).
    pub token: String,
    /// SHA-256 hash of the token (stored in DB).
    pub token_hash: String,
    /// UUID primary key for the password_reset_tokens row.
    pub token_id: String,
    /// `datetime` string for the expiry (DB column value).
    pub expires_at: String,
}

/// Build a [`ResetTokenBundle`] valid for `ttl_secs` from `now_unix`.
pub fn prepare_reset_token(now_unix: u64, ttl_secs: i64) -> Result<ResetTokenBundle, ServiceError> {
    use crate::crypto;

    let token = crypto::generate_token()?;
    let token_hash = crypto::hash_token(&token);
    Ok(ResetTokenBundle {
        token,
        token_hash,
        token_id: uuid::Uuid::new_v4().to_string(),
        expires_at: token_expiry(now_unix, ttl_secs)?,
    })
}
