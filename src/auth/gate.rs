use std::str::FromStr;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::{self, Next},
    response::Response,
    routing::MethodRouter,
};
use tracing::{info, warn};

use super::verifier::{IdentityVerifier, Subject};
use crate::{error::ApiError, state::AppState};

/// Every route the gate table can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatedRoute {
    CreateUser,
    ListUsers,
    LatestProducts,
    ListProducts,
    GetProduct,
    CreateProduct,
    UpdateProduct,
    DeleteProduct,
    ListBids,
    ProductBids,
    CreateBid,
    DeleteBid,
}

impl FromStr for GatedRoute {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "create_user" => Self::CreateUser,
            "list_users" => Self::ListUsers,
            "latest_products" => Self::LatestProducts,
            "list_products" => Self::ListProducts,
            "get_product" => Self::GetProduct,
            "create_product" => Self::CreateProduct,
            "update_product" => Self::UpdateProduct,
            "delete_product" => Self::DeleteProduct,
            "list_bids" => Self::ListBids,
            "product_bids" => Self::ProductBids,
            "create_bid" => Self::CreateBid,
            "delete_bid" => Self::DeleteBid,
            other => anyhow::bail!("unknown gated route {other:?}"),
        })
    }
}

/// Token from `Authorization: Bearer <token>`, if well formed.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))?
        .trim();
    (!token.is_empty()).then_some(token)
}

pub async fn authenticate(
    verifier: &dyn IdentityVerifier,
    headers: &HeaderMap,
) -> Result<Subject, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| {
        warn!("missing or malformed Authorization header");
        ApiError::Unauthorized
    })?;

    verifier.verify(token).await.map_err(|e| {
        warn!(error = %e, "token rejected");
        ApiError::Unauthorized
    })
}

/// A requested `email` scope must belong to the subject.
pub fn authorize(requested_email: Option<&str>, subject: &Subject) -> Result<(), ApiError> {
    match requested_email {
        Some(email) if email != subject.email => {
            warn!(requested = %email, subject = %subject.email, "scope mismatch");
            Err(ApiError::Forbidden)
        }
        _ => Ok(()),
    }
}

/// Authenticates and stashes the `Subject` in request extensions.
pub async fn require_subject(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    info!(method = %req.method(), path = %req.uri().path(), "access gate");
    let subject = authenticate(state.verifier.as_ref(), req.headers()).await?;
    req.extensions_mut().insert(subject);
    Ok(next.run(req).await)
}

/// Wraps `method_router` in the gate when the table lists `route`.
pub fn gated(
    state: &AppState,
    route: GatedRoute,
    method_router: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    if state.config.gated_routes.contains(&route) {
        method_router.route_layer(middleware::from_fn_with_state(state.clone(), require_subject))
    } else {
        method_router
    }
}
