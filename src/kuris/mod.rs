use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod engine;
pub mod handlers;
pub mod model;
pub mod policy;
pub mod repo;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
