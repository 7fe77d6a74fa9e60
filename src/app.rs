use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, bids, products, users};

pub const LIVENESS: &str = "Smart server is running!";

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { LIVENESS }))
        .merge(auth::router(&state))
        .merge(users::router(&state))
        .merge(products::router(&state))
        .merge(bids::router(&state))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;

    tracing::info!("Smart server is running on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use serde_json::{json, Value};

    use super::*;
    use crate::{store::memory::MemoryStore, test_support::call};

    #[tokio::test]
    async fn root_reports_liveness() {
        let app = build_app(AppState::fake(Arc::new(MemoryStore::new())));
        let (status, body) = call(&app, "GET", "/", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String(LIVENESS.into()));
    }

    #[tokio::test]
    async fn issued_token_opens_gated_routes() {
        let app = build_app(AppState::fake(Arc::new(MemoryStore::new())));

        let (status, body) =
            call(&app, "POST", "/getToken", None, Some(json!({"email": "a@x.io"}))).await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();

        let auth = format!("Bearer {token}");
        let (status, _) = call(&app, "GET", "/bids?email=a@x.io", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn token_issuance_can_be_switched_off() {
        let state = AppState::fake_with(Arc::new(MemoryStore::new()), |cfg| {
            cfg.token_issuance = false;
        });
        let app = build_app(state);
        let (status, _) =
            call(&app, "POST", "/getToken", None, Some(json!({"email": "a@x.io"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn get_token_rejects_non_object_claims() {
        let app = build_app(AppState::fake(Arc::new(MemoryStore::new())));
        let (status, _) = call(&app, "POST", "/getToken", None, Some(json!("a@x.io"))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn gate_table_can_cover_any_route() {
        let store = Arc::new(MemoryStore::new());
        let state = AppState::fake_with(store.clone(), |cfg| {
            cfg.gated_routes.insert(crate::auth::gate::GatedRoute::CreateProduct);
        });
        let auth = state.bearer_for("a@x.io");
        let app = build_app(state);

        let (status, _) = call(&app, "POST", "/products", None, Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(store.calls(), 0);

        let (status, _) =
            call(&app, "POST", "/products", Some(&auth), Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::OK);

        // sibling method on the same path stays open
        let (status, _) = call(&app, "GET", "/products", None, None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
