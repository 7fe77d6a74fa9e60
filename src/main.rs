mod app;
mod auth;
mod bids;
mod config;
mod error;
mod extract;
mod products;
mod state;
mod store;
mod users;

#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "smart_deals=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    match app_state.store.ping().await {
        Ok(()) => tracing::info!("pinged document store; connected"),
        Err(e) => tracing::warn!(error = %e, "document store ping failed"),
    }

    if app_state.config.token_issuance {
        tracing::warn!("POST /getToken signs caller-supplied claims without authenticating the caller");
    }
    tracing::info!(gated = ?app_state.config.gated_routes, "access gate table");

    let host = app_state.config.host.clone();
    let port = app_state.config.port;
    app::serve(app::build_app(app_state), &host, port).await
}
