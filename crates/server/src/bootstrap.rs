use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use tarifario_core::config::{AppConfig, ConfigError, LoadOptions};
use tarifario_core::engine::cache::InMemoryCalculationCache;
use tarifario_core::engine::{EngineStores, TariffEngine};
use tarifario_db::{
    connect_with_settings, migrations, DbPool, SqlAuditStore, SqlDirectoryStore,
    SqlDistanceStore, SqlRuleStore, SqlTariffStore,
};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub engine: Arc<TariffEngine>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    let settings = config.engine_settings();
    let stores = EngineStores {
        tariffs: Arc::new(SqlTariffStore::new(db_pool.clone())),
        directory: Arc::new(SqlDirectoryStore::new(db_pool.clone())),
        distances: Arc::new(SqlDistanceStore::new(db_pool.clone())),
        rules: Arc::new(SqlRuleStore::new(db_pool.clone())),
        audit: Arc::new(SqlAuditStore::new(db_pool.clone())),
    };
    let cache = Arc::new(InMemoryCalculationCache::new(settings.cache_ttl));
    let engine = Arc::new(TariffEngine::new(stores, cache, settings));
    info!(event_name = "system.bootstrap.engine_ready", "tariff engine initialized");

    Ok(Application { config, db_pool, engine })
}
