use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request},
    http::request::Parts,
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    store::Document,
};

/// `:id` path segment parsed as a store id.
#[derive(Debug, Clone, Copy)]
pub struct DocId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for DocId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::bad_request("missing id"))?;
        parse_id(&raw).map(DocId)
    }
}

pub fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("malformed id {raw:?}")))
}

/// Optional `?email=` scope; an empty value counts as absent.
#[derive(Debug, Default, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

impl EmailQuery {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|e| !e.is_empty())
    }
}

/// JSON request body that must be an object. Every body rejection (bad
/// syntax, wrong content type, non-object) is a `BadRequest`.
#[derive(Debug, Clone)]
pub struct JsonObject(pub Document);

#[async_trait]
impl<S> FromRequest<S> for JsonObject
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
        object_body(body).map(JsonObject)
    }
}

fn object_body(body: Value) -> ApiResult<Document> {
    match body {
        Value::Object(doc) => Ok(doc),
        _ => Err(ApiError::bad_request("request body must be a JSON object")),
    }
}
