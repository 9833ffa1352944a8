use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use venta_agent::crm::{CrmSync, DisabledCrm};
use venta_agent::engine::{Capabilities, SalesWorkflow};
use venta_core::config::{AppConfig, ConfigError, LoadOptions};
use venta_db::{connect_with_settings, migrations, DbPool};
use venta_whatsapp::client::{CloudApiClient, OutboundMessenger};

use crate::crm::HubSpotCrm;
use crate::knowledge::DbKnowledgeBase;
use crate::llm::OpenAiClient;
use crate::pipeline::MessagePipeline;
use crate::scheduler::DbFollowUpScheduler;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub pipeline: Arc<MessagePipeline>,
    pub messenger: Arc<dyn OutboundMessenger>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Client(#[from] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let messenger: Arc<dyn OutboundMessenger> =
        Arc::new(CloudApiClient::new(&config.whatsapp)?);

    let crm: Arc<dyn CrmSync> = match HubSpotCrm::from_config(&config.crm)? {
        Some(hubspot) => {
            info!("crm sync enabled");
            Arc::new(hubspot)
        }
        None => Arc::new(DisabledCrm),
    };

    let capabilities = Capabilities {
        llm: Arc::new(OpenAiClient::new(&config.llm)?),
        knowledge: Arc::new(DbKnowledgeBase::new(db_pool.clone())),
        crm,
        scheduler: Arc::new(DbFollowUpScheduler::new(db_pool.clone())),
    };

    let pipeline = Arc::new(MessagePipeline::new(
        SalesWorkflow::new(capabilities),
        db_pool.clone(),
        messenger.clone(),
        config.scheduler.history_limit,
    ));

    Ok(Application { config, db_pool, pipeline, messenger })
}
