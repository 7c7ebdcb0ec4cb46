use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::commands::CommandResult;
use tarifario_core::config::{AppConfig, LoadOptions};
use tarifario_core::domain::context::CalculationRequest;
use tarifario_core::domain::rule::BusinessRule;
use tarifario_core::domain::tariff::{
    CalculationMethod, ClientId, SiteId, TariffRecord, TariffRecordId,
};
use tarifario_core::engine::cache::InMemoryCalculationCache;
use tarifario_core::engine::{EngineSettings, EngineStores, TariffEngine};
use tarifario_core::stores::{
    InMemoryAuditStore, InMemoryDirectoryStore, InMemoryDistanceStore, InMemoryRuleStore,
    InMemoryTariffStore,
};
use tarifario_db::{connect_with_settings, migrations};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let config = match timed_check(|| AppConfig::load(LoadOptions::default())) {
        Ok((elapsed_ms, config)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: "configuration loaded and validated".to_string(),
            });
            config
        }
        Err((elapsed_ms, error)) => {
            checks.push(SmokeCheck {
                name: "config_validation",
                status: SmokeStatus::Fail,
                elapsed_ms,
                message: error.to_string(),
            });
            checks.push(skipped("db_connectivity"));
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("engine_calculation"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("engine_calculation"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let db_started = Instant::now();
    let db_result = runtime.block_on(async {
        connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
    });

    let pool = match db_result {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Pass,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("connected using `{}`", config.database.url),
            });
            pool
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("failed to connect: {error}"),
            });
            checks.push(skipped("migration_visibility"));
            checks.push(skipped("engine_calculation"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let migration_started = Instant::now();
    let migration_result = runtime.block_on(async { migrations::run_pending(&pool).await });
    runtime.block_on(async {
        pool.close().await;
    });

    match migration_result {
        Ok(()) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Pass,
            elapsed_ms: migration_started.elapsed().as_millis() as u64,
            message: "migrations are visible and executable".to_string(),
        }),
        Err(error) => checks.push(SmokeCheck {
            name: "migration_visibility",
            status: SmokeStatus::Fail,
            elapsed_ms: migration_started.elapsed().as_millis() as u64,
            message: format!("migration execution failed: {error}"),
        }),
    }

    checks.push(engine_calculation_check(&runtime));

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

/// Deterministic end-to-end pipeline over in-memory stores: calculate, repeat
/// for a cache hit, then confirm both attempts were audited. Does not touch
/// the configured database.
fn engine_calculation_check(runtime: &tokio::runtime::Runtime) -> SmokeCheck {
    use rust_decimal::Decimal;

    use tarifario_core::domain::audit::AuditQuery;

    let check_started = Instant::now();

    let record = TariffRecord {
        id: TariffRecordId("smoke-tramo".to_owned()),
        client: ClientId("smoke-cliente".to_owned()),
        origin: SiteId("smoke-origen".to_owned()),
        destination: SiteId("smoke-destino".to_owned()),
        route_kind: "TRMC".to_owned(),
        calculation_method: CalculationMethod::Fixed,
        unit_value: Decimal::new(10_000, 2),
        toll_value: Decimal::new(1_500, 2),
        valid_from: chrono::NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
        valid_until: chrono::NaiveDate::from_ymd_opt(2099, 12, 31).unwrap_or_default(),
    };
    let stores = EngineStores {
        tariffs: Arc::new(InMemoryTariffStore::with_records(vec![record])),
        directory: Arc::new(InMemoryDirectoryStore::with_entries(
            vec![ClientId("smoke-cliente".to_owned())],
            vec![SiteId("smoke-origen".to_owned()), SiteId("smoke-destino".to_owned())],
        )),
        distances: Arc::new(InMemoryDistanceStore::with_distances(vec![])),
        rules: Arc::new(InMemoryRuleStore::with_rules(Vec::<BusinessRule>::new())),
        audit: Arc::new(InMemoryAuditStore::default()),
    };
    let engine = TariffEngine::new(
        stores,
        Arc::new(InMemoryCalculationCache::default()),
        EngineSettings::default(),
    );

    let request = CalculationRequest {
        cliente_id: Some("smoke-cliente".to_owned()),
        origen_id: Some("smoke-origen".to_owned()),
        destino_id: Some("smoke-destino".to_owned()),
        tipo_unidad: Some("rampla".to_owned()),
        ..CalculationRequest::default()
    };

    let result = runtime.block_on(async {
        let first = engine.calculate(&request).await?;
        let second = engine.calculate(&request).await?;
        let audit = engine.query_audit(AuditQuery::default(), None).await?;
        Ok::<_, tarifario_core::errors::EngineError>((first, second, audit))
    });
    let elapsed_ms = check_started.elapsed().as_millis() as u64;

    let fail = |message: String| SmokeCheck {
        name: "engine_calculation",
        status: SmokeStatus::Fail,
        elapsed_ms,
        message,
    };

    match result {
        Ok((first, second, audit)) => {
            if first.total != Decimal::new(11_500, 2) {
                return fail(format!("unexpected total {} (expected 115.00)", first.total));
            }
            if first.cache_hit || !second.cache_hit {
                return fail(format!(
                    "cache behaved unexpectedly (first hit: {}, second hit: {})",
                    first.cache_hit, second.cache_hit
                ));
            }
            if audit.statistics.total != 2 {
                return fail(format!(
                    "expected 2 audit entries, found {}",
                    audit.statistics.total
                ));
            }
            SmokeCheck {
                name: "engine_calculation",
                status: SmokeStatus::Pass,
                elapsed_ms,
                message: format!(
                    "fixed tariff calculated, cached and audited: total {}",
                    first.total
                ),
            }
        }
        Err(error) => fail(format!("calculation failed: {error}")),
    }
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
