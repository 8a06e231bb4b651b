//! HTTP routes.

pub mod health;
pub mod orders;

use axum::Router;

use crate::state::AppState;

/// Assembles every route under its public prefix.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .nest("/api/v1/orders", orders::router())
        .with_state(state)
}
