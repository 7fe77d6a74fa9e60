use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, instrument};

use super::repo;
use crate::{
    auth::gate::{gated, GatedRoute},
    error::{ApiError, ApiResult},
    extract::JsonObject,
    state::AppState,
    store::{Document, InsertOneResult},
};

pub const USER_EXISTS: &str = "User already exist!";

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum CreateUserResponse {
    Inserted(InsertOneResult),
    Exists { message: &'static str },
}

pub fn user_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/users", gated(state, GatedRoute::CreateUser, post(create_user)))
        .route("/users", gated(state, GatedRoute::ListUsers, get(list_users)))
}

#[instrument(skip(state, user))]
pub async fn create_user(
    State(state): State<AppState>,
    JsonObject(user): JsonObject,
) -> ApiResult<Json<CreateUserResponse>> {
    let email = match user.get("email") {
        Some(Value::String(email)) if !email.is_empty() => email.clone(),
        _ => return Err(ApiError::bad_request("email is required")),
    };

    match repo::create_unique(state.store.as_ref(), user).await? {
        Some(res) => {
            info!(%email, id = %res.inserted_id, "user created");
            Ok(Json(CreateUserResponse::Inserted(res)))
        }
        None => {
            info!(%email, "user already exists");
            Ok(Json(CreateUserResponse::Exists { message: USER_EXISTS }))
        }
    }
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(repo::list_all(state.store.as_ref()).await?))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::{
        app::build_app,
        store::{memory::MemoryStore, Collection, DocumentStore, Filter, FindQuery},
        test_support::call,
    };

    #[tokio::test]
    async fn duplicate_email_returns_exists_marker_without_inserting() {
        let store = Arc::new(MemoryStore::new());
        let app = build_app(AppState::fake(store.clone()));

        let (status, first) =
            call(&app, "POST", "/users", None, Some(json!({"email": "a@x.io", "name": "Ada"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["acknowledged"], json!(true));
        assert!(first["insertedId"].is_string());

        let (status, second) =
            call(&app, "POST", "/users", None, Some(json!({"email": "a@x.io", "name": "Eve"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second, json!({"message": USER_EXISTS}));

        let same_email = store
            .find(Collection::Users, FindQuery::filtered(Filter::new().eq("email", "a@x.io")))
            .await
            .unwrap();
        assert_eq!(same_email.len(), 1);
        assert_eq!(same_email[0]["name"], json!("Ada"));
    }

    #[tokio::test]
    async fn concurrent_signups_with_one_email_insert_once() {
        let store = Arc::new(MemoryStore::new());
        let app = build_app(AppState::fake(store.clone()));

        let ((s1, r1), (s2, r2)) = tokio::join!(
            call(&app, "POST", "/users", None, Some(json!({"email": "a@x.io", "name": "Ada"}))),
            call(&app, "POST", "/users", None, Some(json!({"email": "a@x.io", "name": "Eve"}))),
        );
        assert_eq!((s1, s2), (StatusCode::OK, StatusCode::OK));
        let markers = [&r1, &r2]
            .into_iter()
            .filter(|r| **r == json!({"message": USER_EXISTS}))
            .count();
        assert_eq!(markers, 1);

        let users = store.find(Collection::Users, FindQuery::all()).await.unwrap();
        assert_eq!(users.len(), 1);
    }

    #[tokio::test]
    async fn create_user_requires_email() {
        let store = Arc::new(MemoryStore::new());
        let app = build_app(AppState::fake(store.clone()));

        let (status, body) = call(&app, "POST", "/users", None, Some(json!({"name": "Ada"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], json!("email is required"));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn list_users_returns_every_user() {
        let store = Arc::new(MemoryStore::new());
        let app = build_app(AppState::fake(store.clone()));
        for email in ["a@x.io", "b@x.io"] {
            call(&app, "POST", "/users", None, Some(json!({ "email": email }))).await;
        }

        let (status, body) = call(&app, "GET", "/users", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        assert!(users.iter().all(|u| u["_id"].is_string()));
    }
}
