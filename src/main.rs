use anyhow::Context;

mod app;
mod auth;
mod availability;
mod calendar;
mod checkout;
mod config;
mod confirmation;
mod discounts;
mod error;
mod menu;
mod orders;
mod payments;
mod pricing;
mod state;
mod storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "bakehouse=debug,axum=info,tower_http=info".to_string());
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

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;

    let sweep = orders::services::spawn_fulfillment_sweep(app_state.clone());

    let addr = app_state.config.server.socket_addr()?;
    let result = app::serve(app::build_app(app_state), addr).await;
    sweep.abort();
    result
}
