use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use tracing::{info, instrument};

use super::repo;
use crate::{
    auth::{
        gate::{authorize, gated, GatedRoute},
        verifier::Subject,
    },
    error::ApiResult,
    extract::{DocId, EmailQuery, JsonObject},
    state::AppState,
    store::{DeleteResult, Document, InsertOneResult},
};

pub fn bid_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/bids", gated(state, GatedRoute::ListBids, get(list_bids)))
        .route("/bids", gated(state, GatedRoute::CreateBid, post(create_bid)))
        .route("/bids/:id", gated(state, GatedRoute::DeleteBid, delete(delete_bid)))
        .route(
            "/products/bids/:productsId",
            gated(state, GatedRoute::ProductBids, get(product_bids)),
        )
}

/// When the route is gated a subject is present and the `email` scope must
/// be theirs; ungated, any scope is served.
#[instrument(skip(state, subject))]
pub async fn list_bids(
    State(state): State<AppState>,
    subject: Option<Extension<Subject>>,
    Query(q): Query<EmailQuery>,
) -> ApiResult<Json<Vec<Document>>> {
    if let Some(Extension(subject)) = &subject {
        authorize(q.email(), subject)?;
    }
    Ok(Json(repo::list(state.store.as_ref(), q.email()).await?))
}

#[instrument(skip(state))]
pub async fn product_bids(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> ApiResult<Json<Vec<Document>>> {
    Ok(Json(repo::list_for_product(state.store.as_ref(), &product_id).await?))
}

#[instrument(skip(state, bid))]
pub async fn create_bid(
    State(state): State<AppState>,
    JsonObject(bid): JsonObject,
) -> ApiResult<Json<InsertOneResult>> {
    let res = repo::insert(state.store.as_ref(), bid).await?;
    info!(id = %res.inserted_id, "bid placed");
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn delete_bid(
    State(state): State<AppState>,
    DocId(id): DocId,
) -> ApiResult<Json<DeleteResult>> {
    let res = repo::delete(state.store.as_ref(), id).await?;
    info!(%id, deleted = res.deleted_count, "bid deleted");
    Ok(Json(res))
}
