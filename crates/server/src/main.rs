mod bootstrap;
mod crm;
mod health;
mod knowledge;
mod llm;
mod pipeline;
mod routes;
mod scheduler;

use std::time::Duration;

use anyhow::Result;
use secrecy::ExposeSecret;
use venta_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use tracing::Level;
    use venta_core::config::LogFormat::*;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.db_pool.clone(),
    )
    .await?;

    scheduler::spawn_dispatcher(
        app.db_pool.clone(),
        app.messenger.clone(),
        Duration::from_secs(app.config.scheduler.poll_interval_secs),
    );

    let webhook_state = routes::WebhookState {
        pipeline: app.pipeline.clone(),
        verify_token: app.config.whatsapp.verify_token.expose_secret().to_string(),
        app_secret: app
            .config
            .whatsapp
            .app_secret
            .as_ref()
            .map(|secret| secret.expose_secret().to_string()),
    };

    tracing::info!(
        crm_enabled = app.config.crm.enabled,
        webhook_port = app.config.server.webhook_port,
        "venta-server started"
    );

    routes::serve(
        &app.config.server.bind_address,
        app.config.server.webhook_port,
        webhook_state,
    )
    .await?;

    tracing::info!("venta-server stopping");
    Ok(())
}
