use axum::Json;
use tenantnotes_api::HealthResponse;

/// GET /health and GET /api/health: liveness check.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
