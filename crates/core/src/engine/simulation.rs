//! Simulation batch types and the pure summary pass. The engine runs each
//! scenario through the ordinary calculation pipeline with per-scenario
//! isolation; this module only shapes the inputs and aggregates the outputs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::calculation::CalculationResult;
use crate::domain::context::CalculationRequest;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationScenario {
    #[serde(rename = "etiqueta")]
    pub label: String,
    #[serde(rename = "solicitud")]
    pub request: CalculationRequest,
}

/// Batch-level knobs. Scenarios run uncached unless a scenario request opts
/// in explicitly; a stale shared-cache read would defeat the point of a
/// what-if comparison.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(rename = "compararMetodos", default)]
    pub compare_methods: bool,
    #[serde(rename = "incluirDesglose", default)]
    pub include_breakdown: bool,
    #[serde(rename = "aplicarReglas")]
    pub apply_rules: Option<bool>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct SimulationRequest {
    #[serde(rename = "escenarios")]
    pub scenarios: Vec<SimulationScenario>,
    #[serde(rename = "configuracion", default)]
    pub config: SimulationConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    #[serde(rename = "etiqueta")]
    pub label: String,
    #[serde(rename = "resultado")]
    pub result: CalculationResult,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFailure {
    #[serde(rename = "etiqueta")]
    pub label: String,
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "mensaje")]
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRanking {
    #[serde(rename = "etiqueta")]
    pub label: String,
    pub total: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodAggregate {
    pub total: usize,
    #[serde(rename = "promedioTotal")]
    pub avg_total: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    #[serde(rename = "totalEscenarios")]
    pub total_scenarios: usize,
    #[serde(rename = "exitosos")]
    pub succeeded: usize,
    #[serde(rename = "fallidos")]
    pub failed: usize,
    #[serde(rename = "masBarato", skip_serializing_if = "Option::is_none")]
    pub cheapest: Option<ScenarioRanking>,
    #[serde(rename = "masCaro", skip_serializing_if = "Option::is_none")]
    pub most_expensive: Option<ScenarioRanking>,
    #[serde(rename = "promedio", skip_serializing_if = "Option::is_none")]
    pub avg_total: Option<Decimal>,
    #[serde(rename = "variacion", skip_serializing_if = "Option::is_none")]
    pub swing: Option<Decimal>,
    #[serde(rename = "porMetodo", skip_serializing_if = "Option::is_none")]
    pub per_method: Option<BTreeMap<String, MethodAggregate>>,
}

/// Batch identity echoed back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SimulationInfo {
    pub id: String,
    #[serde(rename = "totalEscenarios")]
    pub scenario_count: usize,
    #[serde(rename = "configuracion")]
    pub config: SimulationConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SimulationMeta {
    #[serde(rename = "ejecutadoEn")]
    pub executed_at: DateTime<Utc>,
    #[serde(rename = "duracionMs")]
    pub duration_ms: i64,
    #[serde(rename = "versionMotor")]
    pub engine_version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SimulationReport {
    #[serde(rename = "simulacion")]
    pub info: SimulationInfo,
    #[serde(rename = "resultados")]
    pub outcomes: Vec<ScenarioOutcome>,
    #[serde(rename = "errores")]
    pub failures: Vec<ScenarioFailure>,
    #[serde(rename = "resumen")]
    pub summary: SimulationSummary,
    #[serde(rename = "metadatos")]
    pub metadata: SimulationMeta,
}

/// Aggregates a finished batch. Rankings consider successful scenarios only;
/// an all-failed batch still summarizes with empty rankings. The per-method
/// comparison is opt-in via `compararMetodos`.
pub fn summarize(
    outcomes: &[ScenarioOutcome],
    failures: &[ScenarioFailure],
    compare_methods: bool,
) -> SimulationSummary {
    let succeeded = outcomes.len();
    let failed = failures.len();

    let mut cheapest: Option<ScenarioRanking> = None;
    let mut most_expensive: Option<ScenarioRanking> = None;
    let mut sum = Decimal::ZERO;
    let mut per_method_sums: BTreeMap<String, (usize, Decimal)> = BTreeMap::new();

    for outcome in outcomes {
        let total = outcome.result.total;
        let ranking = ScenarioRanking { label: outcome.label.clone(), total };

        if cheapest.as_ref().map_or(true, |current| total < current.total) {
            cheapest = Some(ranking.clone());
        }
        if most_expensive.as_ref().map_or(true, |current| total > current.total) {
            most_expensive = Some(ranking);
        }

        sum += total;
        let slot = per_method_sums
            .entry(outcome.result.method_used.as_str().to_owned())
            .or_insert((0, Decimal::ZERO));
        slot.0 += 1;
        slot.1 += total;
    }

    let avg_total =
        (succeeded > 0).then(|| sum / Decimal::from(succeeded));
    let swing = match (&cheapest, &most_expensive) {
        (Some(low), Some(high)) => Some(high.total - low.total),
        _ => None,
    };

    let per_method = compare_methods.then(|| {
        per_method_sums
            .into_iter()
            .map(|(method, (count, method_sum))| {
                (method, MethodAggregate { total: count, avg_total: method_sum / Decimal::from(count) })
            })
            .collect()
    });

    SimulationSummary {
        total_scenarios: succeeded + failed,
        succeeded,
        failed,
        cheapest,
        most_expensive,
        avg_total,
        swing,
        per_method,
    }
}
