use axum::Router;

use crate::AppState;

pub mod auth;
pub mod data;
pub mod form;
pub mod grids;

pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api/auth", auth::router())
        .nest("/api/data", data::router())
        .nest("/api/grids", grids::router())
        .with_state(state)
}
