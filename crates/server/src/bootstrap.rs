use std::sync::Arc;

use restock_agent::{build_gateway, GatewayError, PlanOrchestrator};
use restock_core::config::{AppConfig, ConfigError, LoadOptions};
use restock_db::{connect_with_config, migrations, DbPool, SqlPlanCache};
use thiserror::Error;
use tracing::info;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub orchestrator: Arc<PlanOrchestrator>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("reasoning engine gateway could not be built: {0}")]
    Gateway(#[source] GatewayError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_config(&config.database)
        .await
        .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let gateway = build_gateway(&config.llm).map_err(BootstrapError::Gateway)?;
    info!(
        event_name = "system.bootstrap.gateway_ready",
        correlation_id = "bootstrap",
        gateway = gateway.name(),
        provider = config.llm.provider.as_str(),
        model = %config.llm.model,
        "reasoning engine gateway configured"
    );

    let orchestrator = PlanOrchestrator::from_config(
        &config,
        Arc::from(gateway),
        Arc::new(SqlPlanCache::new(db_pool.clone())),
    );

    Ok(Application { config, db_pool, orchestrator: Arc::new(orchestrator) })
}
