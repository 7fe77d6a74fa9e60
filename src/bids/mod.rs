pub mod handlers;
mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router(state: &AppState) -> Router<AppState> {
    handlers::bid_routes(state)
}
