//! Router assembly: endpoint table, CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::http::{Method, header};
use axum::routing::{MethodRouter, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use lineuprelay_core::Relay;

use crate::handlers;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub(crate) relay: Arc<Relay>,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }
}

/// Add the bare-`OPTIONS` answer and the JSON 405 to an endpoint.
fn endpoint(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route
        .options(handlers::options)
        .fallback(handlers::method_not_allowed)
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    let api = Router::new()
        .route("/optimize", endpoint(post(handlers::optimize)))
        .route("/upload", endpoint(post(handlers::upload)))
        .route("/upload-nfl", endpoint(post(handlers::upload_nfl)))
        .route(
            "/results",
            endpoint(get(handlers::results_get).post(handlers::results_post)),
        )
        .route("/fetch-lineup", endpoint(get(handlers::fetch_lineup)))
        .route("/tracker", endpoint(post(handlers::tracker)))
        .route("/learner", endpoint(post(handlers::learner)))
        .route("/feedback", endpoint(post(handlers::feedback)))
        .route("/dashboard", endpoint(get(handlers::dashboard)));

    Router::new()
        .nest("/api", api)
        .route("/healthz", get(handlers::healthz))
        .fallback(handlers::not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
