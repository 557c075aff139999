//! HTTP route handlers.

pub mod admin;
pub mod front;
pub mod health;
pub mod helpers;

use axum::Router;
use tower_http::trace::TraceLayer;

use crate::middleware::resolve_cms_page;
use crate::state::AppState;

/// The complete application router.
///
/// Layers (last added = first executed): TraceLayer → page resolution →
/// routes. The admin router carries its own auth layer.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(admin::router(state.clone()))
        .merge(front::router(&state))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            resolve_cms_page,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
