mod dto;
pub mod estimator;
pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompt;
pub mod repo;
pub mod services;
pub mod tools;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::chat_routes())
        .merge(handlers::plan_routes())
}
