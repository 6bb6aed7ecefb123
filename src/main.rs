use anyhow::Context;

mod app;
mod config;
mod db;
mod error;
mod state;
mod users;

use crate::{config::AppConfig, state::AppState};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "userdesk=debug,axum=info,tower_http=info".to_string());
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
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    let app_state = AppState::init(&config).await?;

    app_state
        .db
        .create_schema()
        .await
        .context("create database schema")?;
    tracing::info!("startup complete");

    let served = app::serve(app::build_app(app_state.clone()), &config.listen_addr()).await;

    app_state.db.close().await;
    tracing::info!("shutdown complete, database pool closed");

    served
}
