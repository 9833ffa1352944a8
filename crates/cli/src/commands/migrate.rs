use crate::commands::CommandResult;
use venta_core::config::{AppConfig, LoadOptions};
use venta_db::{connect_with_settings, migrations};

struct MigrateFailure {
    class: &'static str,
    message: String,
    exit_code: u8,
}

/// Applies pending migrations against the configured database. Exit codes
/// distinguish config (2), runtime (3), connection (4), and migration (5)
/// failures.
pub fn run() -> CommandResult {
    match apply() {
        Ok(summary) => CommandResult::success("migrate", summary),
        Err(failure) => {
            CommandResult::failure("migrate", failure.class, failure.message, failure.exit_code)
        }
    }
}

fn apply() -> Result<String, MigrateFailure> {
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| MigrateFailure {
        class: "config_validation",
        message: format!("configuration issue: {error}"),
        exit_code: 2,
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            MigrateFailure {
                class: "runtime_init",
                message: format!("failed to initialize async runtime: {error}"),
                exit_code: 3,
            }
        })?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| MigrateFailure {
            class: "db_connectivity",
            message: error.to_string(),
            exit_code: 4,
        })?;

        let outcome = migrations::run_pending(&pool).await.map_err(|error| MigrateFailure {
            class: "migration",
            message: error.to_string(),
            exit_code: 5,
        });
        pool.close().await;
        outcome?;

        Ok(format!("schema up to date for {}", config.database.url))
    })
}
