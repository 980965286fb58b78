use crate::error::ApiErr;

pub mod auth;
pub mod health;
pub mod notes;
pub mod tenants;

/// Current wall-clock time as unix seconds.
pub(crate) fn now_unix() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0)
}

/// Run CPU-bound work (password hashing) on the blocking pool.
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiErr>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(ApiErr::from_db("blocking task"))
}
