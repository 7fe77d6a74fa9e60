use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::{
    auth::jwt::JwtKeys,
    error::ApiResult,
    extract::JsonObject,
    state::AppState,
};

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub fn token_routes() -> Router<AppState> {
    Router::new().route("/getToken", post(issue_token))
}

/// Signs whatever the caller posts. The caller is not authenticated first.
#[instrument(skip(state, claims))]
pub async fn issue_token(
    State(state): State<AppState>,
    JsonObject(claims): JsonObject,
) -> ApiResult<Json<TokenResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let email = claims.get("email").and_then(Value::as_str).map(str::to_owned);
    let token = keys.sign(claims)?;

    info!(email = ?email, "token issued");
    Ok(Json(TokenResponse { token }))
}
