//! The calculation engine façade. One entry point per exposed operation;
//! stores and the cache are injected as trait objects so the HTTP server,
//! the CLI smoke command, and tests all drive the identical pipeline.

pub mod audit;
pub mod cache;
pub mod conflict;
pub mod methods;
pub mod resolver;
pub mod rules;
pub mod simulation;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::audit::{AuditEntry, AuditError, AuditGroupBy, AuditQuery};
use crate::domain::calculation::{BreakdownStage, CalculationResult, ResultMetadata};
use crate::domain::context::{CalculationContext, CalculationRequest};
use crate::domain::tariff::{CalculationMethod, ClientId, RouteKind, TariffRecordId};
use crate::errors::EngineError;
use crate::stores::{AuditStore, DirectoryStore, DistanceStore, RuleStore, TariffStore};

use audit::{entry_statistics, group_entries, AuditGroupBucket, AuditStatistics};
use cache::{CacheStats, CalculationCache, ClearOutcome};
use conflict::{
    detect_conflicts, ConflictFilter, ConflictReport, CorrectionOutcome, CorrectionReport,
    CorrectionStatus,
};
use simulation::{
    summarize, ScenarioFailure, ScenarioOutcome, SimulationConfig, SimulationInfo,
    SimulationMeta, SimulationReport, SimulationRequest, SimulationScenario,
};

const RULE_FAILURE_CODE: &str = "rule_evaluation_failed";

#[derive(Clone, Debug)]
pub struct EngineSettings {
    pub max_scenarios: usize,
    pub audit_default_limit: u32,
    pub audit_max_limit: u32,
    pub cache_ttl: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_scenarios: 20,
            audit_default_limit: 100,
            audit_max_limit: 1_000,
            cache_ttl: None,
        }
    }
}

/// The five persistence seams the engine needs. Grouped so constructor call
/// sites stay readable.
#[derive(Clone)]
pub struct EngineStores {
    pub tariffs: Arc<dyn TariffStore>,
    pub directory: Arc<dyn DirectoryStore>,
    pub distances: Arc<dyn DistanceStore>,
    pub rules: Arc<dyn RuleStore>,
    pub audit: Arc<dyn AuditStore>,
}

/// Audit query response in the upstream wire shape: the echoed filters, the
/// matched entries, optional grouping, derived statistics, current cache
/// counters, and response metadata.
#[derive(Clone, Debug, Serialize)]
pub struct AuditReport {
    #[serde(rename = "consulta")]
    pub query: AuditQuery,
    #[serde(rename = "auditorias")]
    pub entries: Vec<AuditEntry>,
    #[serde(rename = "agrupacion", skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<AuditGroupBucket>>,
    #[serde(rename = "estadisticas")]
    pub statistics: AuditStatistics,
    pub cache: CacheStats,
    #[serde(rename = "metadatos")]
    pub metadata: AuditReportMeta,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct AuditReportMeta {
    #[serde(rename = "consultadoEn")]
    pub queried_at: DateTime<Utc>,
    #[serde(rename = "duracionMs")]
    pub duration_ms: i64,
}

pub struct TariffEngine {
    stores: EngineStores,
    cache: Arc<dyn CalculationCache>,
    settings: EngineSettings,
}

impl TariffEngine {
    pub fn new(
        stores: EngineStores,
        cache: Arc<dyn CalculationCache>,
        settings: EngineSettings,
    ) -> Self {
        Self { stores, cache, settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Runs one calculation end to end. Every attempt is audited, including
    /// ones that fail before a context exists; audit persistence failures are
    /// logged and never fail the calculation itself.
    pub async fn calculate(
        &self,
        request: &CalculationRequest,
    ) -> Result<CalculationResult, EngineError> {
        let started = Instant::now();
        let today = Utc::now().date_naive();

        let context = match request.normalize(today) {
            Ok(context) => context,
            Err(error) => {
                let client = request
                    .cliente_id
                    .as_deref()
                    .map(str::trim)
                    .filter(|raw| !raw.is_empty())
                    .map(|raw| ClientId(raw.to_owned()));
                self.record_failure(started, client, None, &error).await;
                return Err(error);
            }
        };

        match self.calculate_in_context(&context, started).await {
            Ok((result, rule_failures)) => {
                let entry = AuditEntry::success(
                    elapsed_ms(started),
                    context,
                    result.clone(),
                    rule_failures,
                );
                self.append_audit(entry).await;
                Ok(result)
            }
            Err(error) => {
                self.record_failure(started, Some(context.client.clone()), Some(context), &error)
                    .await;
                Err(error)
            }
        }
    }

    async fn calculate_in_context(
        &self,
        context: &CalculationContext,
        started: Instant,
    ) -> Result<(CalculationResult, Vec<AuditError>), EngineError> {
        if !self.stores.directory.client_exists(&context.client).await? {
            return Err(EngineError::not_found("cliente", &context.client.0));
        }
        if !self.stores.directory.site_exists(&context.origin).await? {
            return Err(EngineError::not_found("sitio", &context.origin.0));
        }
        if !self.stores.directory.site_exists(&context.destination).await? {
            return Err(EngineError::not_found("sitio", &context.destination.0));
        }

        let fingerprint = context.fingerprint();
        if context.use_cache {
            if let Some(mut cached) = self.cache.get(&fingerprint) {
                cached.cache_hit = true;
                return Ok((cached, Vec::new()));
            }
        }

        let candidates = self
            .stores
            .tariffs
            .find_candidates(&context.client, &context.origin, &context.destination)
            .await?;
        let resolution = resolver::resolve(candidates, context.route_kind_hint, context.date)?;
        let record = resolution.record;
        let method = record.calculation_method;

        let distance_km = if method == CalculationMethod::Kilometer {
            self.stores.distances.distance_km(&context.origin, &context.destination).await?
        } else {
            None
        };

        let strategy = methods::strategy_for(method);
        let output = strategy.compute(&record, context, distance_km)?;
        let mut warnings = output.warnings;

        let (running_total, applied_rules, rule_failures) = if context.apply_rules {
            let active =
                self.stores.rules.active_rules(&context.client, context.date).await?;
            if active.is_empty() {
                warnings.push("no active business rules for this client and date".to_owned());
            }
            let outcome = rules::apply_rules(output.base_value, &active, context, method);
            warnings.extend(outcome.warnings);
            let failures = outcome
                .failures
                .into_iter()
                .map(|failure| AuditError {
                    code: RULE_FAILURE_CODE.to_owned(),
                    message: format!("rule {}: {}", failure.code, failure.message),
                })
                .collect();
            (outcome.total, outcome.applied, failures)
        } else {
            (output.base_value, Vec::new(), Vec::new())
        };

        // Toll is rule-exempt and enters after the rule stage.
        let total = running_total + record.toll_value;

        let breakdown = context.include_breakdown.then(|| {
            let mut stages = vec![BreakdownStage {
                stage: "base".to_owned(),
                value: output.base_value,
                description: output.formula_applied.clone(),
            }];
            for applied in &applied_rules {
                stages.push(BreakdownStage {
                    stage: format!("regla {}", applied.code),
                    value: applied.delta,
                    description: applied.name.clone(),
                });
            }
            stages.push(BreakdownStage {
                stage: "peaje".to_owned(),
                value: record.toll_value,
                description: "toll, exempt from rules".to_owned(),
            });
            stages.push(BreakdownStage {
                stage: "total".to_owned(),
                value: total,
                description: "base + reglas + peaje".to_owned(),
            });
            stages
        });

        let result = CalculationResult {
            base_value: output.base_value,
            toll_value: record.toll_value,
            total,
            method_used: method,
            formula_applied: output.formula_applied,
            rules_applied: applied_rules,
            context_used: context.clone(),
            breakdown,
            warnings,
            cache_hit: false,
            metadata: ResultMetadata {
                execution_time_ms: elapsed_ms(started),
                resolution: resolution.outcome,
                fingerprint: fingerprint.clone(),
                calculated_at: Utc::now(),
                engine_version: crate::ENGINE_VERSION.to_owned(),
            },
        };

        if context.use_cache {
            self.cache.put(&fingerprint, result.clone());
        }

        Ok((result, rule_failures))
    }

    /// Runs a what-if batch. Scenario failures are isolated per scenario;
    /// only batch-shape problems abort the whole simulation.
    pub async fn simulate(
        &self,
        request: &SimulationRequest,
    ) -> Result<SimulationReport, EngineError> {
        if request.scenarios.is_empty() {
            return Err(EngineError::EmptyScenarioSet);
        }
        if request.scenarios.len() > self.settings.max_scenarios {
            return Err(EngineError::TooManyScenarios {
                requested: request.scenarios.len(),
                max_allowed: self.settings.max_scenarios,
            });
        }

        let started = Instant::now();
        let mut outcomes = Vec::new();
        let mut failures = Vec::new();

        for scenario in &request.scenarios {
            let effective = scenario_request(scenario, &request.config);
            match self.calculate(&effective).await {
                Ok(result) => {
                    outcomes.push(ScenarioOutcome { label: scenario.label.clone(), result });
                }
                Err(error) => failures.push(ScenarioFailure {
                    label: scenario.label.clone(),
                    code: error.code().to_owned(),
                    message: error.user_safe_message(),
                }),
            }
        }

        let summary = summarize(&outcomes, &failures, request.config.compare_methods);
        Ok(SimulationReport {
            info: SimulationInfo {
                id: Uuid::new_v4().to_string(),
                scenario_count: request.scenarios.len(),
                config: request.config.clone(),
            },
            outcomes,
            failures,
            summary,
            metadata: SimulationMeta {
                executed_at: Utc::now(),
                duration_ms: elapsed_ms(started),
                engine_version: crate::ENGINE_VERSION.to_owned(),
            },
        })
    }

    pub async fn detect_conflicts(
        &self,
        filter: &ConflictFilter,
    ) -> Result<ConflictReport, EngineError> {
        let records = self.stores.tariffs.list_for_conflicts(filter).await?;
        Ok(detect_conflicts(records))
    }

    /// Bulk route-kind correction. Per-id outcomes; never atomic, never
    /// rolled back.
    pub async fn correct_conflicts(
        &self,
        ids: &[TariffRecordId],
        target_kind: RouteKind,
    ) -> Result<CorrectionReport, EngineError> {
        if ids.is_empty() {
            return Err(EngineError::validation("tramoIds must not be empty"));
        }

        let mut outcomes = Vec::new();
        let mut corrected = 0;
        let mut failed = 0;

        for id in ids {
            let outcome = match self.stores.tariffs.set_route_kind(id, target_kind).await {
                Ok(true) => {
                    corrected += 1;
                    CorrectionOutcome {
                        id: id.clone(),
                        status: CorrectionStatus::Corrected,
                        detail: format!("route kind set to {}", target_kind.as_str()),
                    }
                }
                Ok(false) => {
                    failed += 1;
                    CorrectionOutcome {
                        id: id.clone(),
                        status: CorrectionStatus::NotFound,
                        detail: "no record with this id".to_owned(),
                    }
                }
                Err(error) => {
                    failed += 1;
                    tracing::warn!(id = %id, error = %error, "route kind correction failed");
                    CorrectionOutcome {
                        id: id.clone(),
                        status: CorrectionStatus::Failed,
                        detail: "store update failed".to_owned(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        Ok(CorrectionReport { target_kind, outcomes, corrected, failed })
    }

    pub async fn query_audit(
        &self,
        mut query: AuditQuery,
        group_by: Option<AuditGroupBy>,
    ) -> Result<AuditReport, EngineError> {
        let started = Instant::now();
        if query.limite == 0 {
            query.limite = self.settings.audit_default_limit;
        }
        query.limite = query.limite.min(self.settings.audit_max_limit);

        let mut entries = self.stores.audit.query(&query).await?;
        // Statistics and grouping read the full entries before any slimming.
        let statistics = entry_statistics(&entries);
        let groups = group_by.map(|dimension| group_entries(&entries, dimension));
        if !query.include_context {
            for entry in &mut entries {
                entry.context = None;
                entry.result = None;
            }
        }

        Ok(AuditReport {
            cache: self.cache.stats(),
            metadata: AuditReportMeta {
                queried_at: Utc::now(),
                duration_ms: elapsed_ms(started),
            },
            query,
            entries,
            statistics,
            groups,
        })
    }

    pub fn clear_cache(&self) -> ClearOutcome {
        self.cache.clear()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    async fn record_failure(
        &self,
        started: Instant,
        client: Option<ClientId>,
        context: Option<CalculationContext>,
        error: &EngineError,
    ) {
        let entry = AuditEntry::failure(
            elapsed_ms(started),
            client,
            context,
            vec![AuditError { code: error.code().to_owned(), message: error.user_safe_message() }],
        );
        self.append_audit(entry).await;
    }

    async fn append_audit(&self, entry: AuditEntry) {
        if let Err(error) = self.stores.audit.append(entry).await {
            tracing::warn!(error = %error, "failed to persist audit entry");
        }
    }
}

/// Batch config folds into each scenario request without clobbering what the
/// scenario set explicitly. Caching defaults off inside a simulation.
fn scenario_request(
    scenario: &SimulationScenario,
    config: &SimulationConfig,
) -> CalculationRequest {
    let mut request = scenario.request.clone();
    if request.usar_cache.is_none() {
        request.usar_cache = Some(false);
    }
    if request.incluir_desglose.is_none() {
        request.incluir_desglose = Some(config.include_breakdown);
    }
    if request.aplicar_reglas.is_none() {
        request.aplicar_reglas = config.apply_rules;
    }
    request
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}
