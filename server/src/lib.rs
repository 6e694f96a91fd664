//! HTTP boundary for the sandbox control plane: a thin `axum` router over
//! `gbox-service`/`gbox-browser`, plus the connection-hijacking adapter
//! exec streaming needs. Grounded on this codebase's CRI binary shape
//! (`cri/src/main.rs`/`cri/src/server.rs`) retargeted from a gRPC/Unix
//! socket surface to a versioned REST API.

pub mod error;
pub mod routes;
pub mod state;
pub mod stream_adapter;

use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the router; kept separate from `main` so integration tests can
/// exercise it via `tower::ServiceExt::oneshot` without binding a socket.
pub fn app(state: AppState) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route(
            "/api/v1/boxes",
            get(routes::boxes::list)
                .post(routes::boxes::create)
                .delete(routes::boxes::delete_all),
        )
        .route("/api/v1/boxes/reclaim", post(routes::reclaim::reclaim))
        .route(
            "/api/v1/boxes/:id",
            get(routes::boxes::get).delete(routes::boxes::delete),
        )
        .route("/api/v1/boxes/:id/start", post(routes::boxes::start))
        .route("/api/v1/boxes/:id/stop", post(routes::boxes::stop))
        .route("/api/v1/boxes/:id/exec", post(routes::exec::exec))
        .route("/api/v1/boxes/:id/run", post(routes::exec::run))
        .route(
            "/api/v1/boxes/:id/archive",
            get(routes::archive::get)
                .head(routes::archive::head)
                .put(routes::archive::put),
        )
        .route(
            "/api/v1/boxes/:id/browser/contexts",
            post(routes::browser::create_context),
        )
        .route(
            "/api/v1/boxes/:id/browser/contexts/:context_id",
            delete(routes::browser::close_context),
        )
        .route(
            "/api/v1/boxes/:id/browser/contexts/:context_id/tabs",
            get(routes::browser::tab_states),
        )
        .route(
            "/api/v1/boxes/:id/browser/contexts/:context_id/pages",
            post(routes::browser::create_page),
        )
        .route(
            "/api/v1/boxes/:id/browser/contexts/:context_id/pages/:page_id",
            delete(routes::browser::close_page),
        )
        .route(
            "/api/v1/boxes/:id/browser/contexts/:context_id/pages/:page_id/actions",
            post(routes::browser::dispatch_action),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
