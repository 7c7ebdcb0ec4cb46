use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::commands::{self, CommandResult};
use tarifario_core::domain::context::CalculationRequest;
use tarifario_core::engine::cache::InMemoryCalculationCache;
use tarifario_core::engine::{EngineStores, TariffEngine};
use tarifario_db::{
    connect_with_settings, migrations, SqlAuditStore, SqlDirectoryStore, SqlDistanceStore,
    SqlRuleStore, SqlTariffStore,
};

/// Runs one calculation against the configured database and prints the full
/// result payload. The attempt is audited like any API call.
pub fn run(path: &Path) -> CommandResult {
    let config = match commands::load_config("calculate") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let request: CalculationRequest = match fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str(&raw) {
            Ok(request) => request,
            Err(error) => {
                return CommandResult::failure(
                    "calculate",
                    "request_parse",
                    format!("could not parse `{}`: {error}", path.display()),
                    2,
                );
            }
        },
        Err(error) => {
            return CommandResult::failure(
                "calculate",
                "request_read",
                format!("could not read `{}`: {error}", path.display()),
                2,
            );
        }
    };

    let runtime = match commands::build_runtime("calculate") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity".to_string(), error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration".to_string(), error.to_string(), 5u8))?;

        let settings = config.engine_settings();
        let stores = EngineStores {
            tariffs: Arc::new(SqlTariffStore::new(pool.clone())),
            directory: Arc::new(SqlDirectoryStore::new(pool.clone())),
            distances: Arc::new(SqlDistanceStore::new(pool.clone())),
            rules: Arc::new(SqlRuleStore::new(pool.clone())),
            audit: Arc::new(SqlAuditStore::new(pool.clone())),
        };
        let engine = TariffEngine::new(
            stores,
            Arc::new(InMemoryCalculationCache::new(settings.cache_ttl)),
            settings,
        );

        let outcome = engine
            .calculate(&request)
            .await
            .map_err(|error| (error.code().to_string(), error.user_safe_message(), 6u8));

        pool.close().await;
        outcome
    });

    match result {
        Ok(calculation) => match serde_json::to_string_pretty(&calculation) {
            Ok(payload) => CommandResult::success("calculate", payload),
            Err(error) => CommandResult::failure(
                "calculate",
                "serialization",
                format!("could not serialize result: {error}"),
                3,
            ),
        },
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("calculate", &error_class, message, exit_code)
        }
    }
}
