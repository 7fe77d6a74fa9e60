use axum::{
    extract::{Query, State},
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::{info, instrument};

use super::{dto::UpdateProductRequest, repo};
use crate::{
    auth::gate::{gated, GatedRoute},
    error::{ApiError, ApiResult},
    extract::{DocId, EmailQuery, JsonObject},
    state::AppState,
    store::{DeleteResult, Document, InsertOneResult, UpdateResult},
};

pub fn product_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/latest-product", gated(state, GatedRoute::LatestProducts, get(latest_products)))
        .route("/products", gated(state, GatedRoute::ListProducts, get(list_products)))
        .route("/products", gated(state, GatedRoute::CreateProduct, post(create_product)))
        .route("/products/:id", gated(state, GatedRoute::GetProduct, get(get_product)))
        .route("/products/:id", gated(state, GatedRoute::UpdateProduct, patch(update_product)))
        .route("/products/:id", gated(state, GatedRoute::DeleteProduct, delete(delete_product)))
}

#[instrument(skip(state))]
pub async fn latest_products(State(state): State<AppState>) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(repo::latest(state.store.as_ref()).await?))
}

#[instrument(skip(state))]
pub async fn list_products(
    State(state): State<AppState>,
    Query(q): Query<EmailQuery>,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(repo::list(state.store.as_ref(), q.email()).await?))
}

/// `null` when no product has this id.
#[instrument(skip(state))]
pub async fn get_product(
    State(state): State<AppState>,
    DocId(id): DocId,
) -> ApiResult<Json<Option<Document>>> {
    Ok(Json(repo::get(state.store.as_ref(), id).await?))
}

#[instrument(skip(state, product))]
pub async fn create_product(
    State(state): State<AppState>,
    JsonObject(product): JsonObject,
) -> ApiResult<Json<InsertOneResult>> {
    let res = repo::insert(state.store.as_ref(), product).await?;
    info!(id = %res.inserted_id, "product created");
    Ok(Json(res))
}

#[instrument(skip(state, body))]
pub async fn update_product(
    State(state): State<AppState>,
    DocId(id): DocId,
    JsonObject(body): JsonObject,
) -> ApiResult<Json<UpdateResult>> {
    let req = UpdateProductRequest::from_document(body)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let res = repo::update(state.store.as_ref(), id, req).await?;
    info!(%id, matched = res.matched_count, modified = res.modified_count, "product updated");
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn delete_product(
    State(state): State<AppState>,
    DocId(id): DocId,
) -> ApiResult<Json<DeleteResult>> {
    let res = repo::delete(state.store.as_ref(), id).await?;
    info!(%id, deleted = res.deleted_count, "product deleted");
    Ok(Json(res))
}
