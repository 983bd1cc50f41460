//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `MODSHELF_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - Public catalog routes under `/api/items`
//! - Upload / download routes under `/api`
//! - Admin routes under `/api/admin` (optionally protected by bearer token)
//! - Static serving of the images subtree under `/uploads/images`

mod admin;
pub mod doc;
mod download;
mod health;
mod items;
mod upload;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Body cap for ordinary JSON endpoints; the upload router installs its
/// own, larger limit.
const JSON_BODY_LIMIT: usize = 2 * 1024 * 1024;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(upload::router(state.clone()))
        .merge(download::router())
        .nest("/api/items", items::router(state.clone()))
        .nest("/api/admin", admin::router(state.clone()));

    let mut app = Router::new()
        .merge(api_router)
        // Thumbnails and screenshots are public; archives only leave
        // through the accounted download endpoint.
        .nest_service("/uploads/images", ServeDir::new(state.blobs.images_dir()));

    // ── Swagger UI ────────────────────────────────────────────────────────────
    // Enabled by default; disable with MODSHELF_ENABLE_SWAGGER=false in
    // production to avoid exposing the API structure to potential attackers.
    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn(trace::trace_middleware))
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state)
}
