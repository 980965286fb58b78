use axum::{
    Router,
    extract::FromRef,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::error::ApiErr;
use crate::routes;
use crate::storage::Db;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub config: Arc<AppConfig>,
}

impl FromRef<AppState> for Db {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

async fn api_not_found() -> ApiErr {
    ApiErr::not_found("Not found")
}

/// Build the full HTTP router: JSON API under `/api`, plus the web bundle.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        // Health
        .route("/health", get(routes::health::health))
        // Auth
        .route("/auth/login", post(routes::auth::login))
        .route("/auth/me", get(routes::auth::me))
        .route("/auth/seed", post(routes::auth::seed))
        .route("/auth/request-reset", post(routes::auth::request_reset))
        .route("/auth/reset-password", post(routes::auth::reset_password))
        // Notes
        .route(
            "/notes",
            get(routes::notes::list_notes).post(routes::notes::create_note),
        )
        .route(
            "/notes/{id}",
            get(routes::notes::get_note)
                .put(routes::notes::update_note)
                .delete(routes::notes::delete_note),
        )
        // Tenants
        .route("/tenants/{slug}", get(routes::tenants::get_tenant))
        .route("/tenants/{slug}/upgrade", post(routes::tenants::upgrade))
        .route("/tenants/{slug}/invite", post(routes::tenants::invite))
        .fallback(api_not_found);

    let mut app = Router::new()
        .nest("/api", api)
        .route("/health", get(routes::health::health));

    // Serve the web bundle if present; unknown paths get index.html.
    let web_dir = &state.config.web_dir;
    if web_dir.exists() {
        tracing::info!("serving static files from {}", web_dir.display());
        let index_html = web_dir.join("index.html");
        app = app.fallback_service(ServeDir::new(web_dir).fallback(ServeFile::new(index_html)));
    }

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
