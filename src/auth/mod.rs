use crate::state::AppState;
use axum::Router;

pub mod gate;
pub mod handlers;
pub mod jwt;
pub mod verifier;

pub fn router(state: &AppState) -> Router<AppState> {
    if state.config.token_issuance {
        handlers::token_routes()
    } else {
        Router::new()
    }
}
