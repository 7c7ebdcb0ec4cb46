use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::context::CalculationContext;
use crate::domain::rule::{RuleBasis, RuleCode};
use crate::domain::tariff::{CalculationMethod, TariffRecordId};

/// One rule's traced contribution: the signed delta it added and the basis
/// the delta was computed against.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AppliedRule {
    #[serde(rename = "codigo")]
    pub code: RuleCode,
    #[serde(rename = "nombre")]
    pub name: String,
    pub delta: Decimal,
    #[serde(rename = "baseCalculo")]
    pub basis: RuleBasis,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BreakdownStage {
    #[serde(rename = "etapa")]
    pub stage: String,
    #[serde(rename = "valor")]
    pub value: Decimal,
    #[serde(rename = "descripcion")]
    pub description: String,
}

/// How the vigency resolver arrived at the chosen record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionOutcome {
    #[serde(rename = "tramoId")]
    pub record_id: TariffRecordId,
    #[serde(rename = "candidatos")]
    pub candidates: usize,
    #[serde(rename = "criterio")]
    pub strategy: ResolutionStrategy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    SingleMatch,
    HintMatch,
    LatestValidFrom,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
    #[serde(rename = "tiempoEjecucionMs")]
    pub execution_time_ms: i64,
    #[serde(rename = "resolucion")]
    pub resolution: ResolutionOutcome,
    pub fingerprint: String,
    #[serde(rename = "calculadoEn")]
    pub calculated_at: DateTime<Utc>,
    #[serde(rename = "versionMotor")]
    pub engine_version: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculationResult {
    #[serde(rename = "valorBase")]
    pub base_value: Decimal,
    #[serde(rename = "valorPeaje")]
    pub toll_value: Decimal,
    pub total: Decimal,
    #[serde(rename = "metodoUtilizado")]
    pub method_used: CalculationMethod,
    #[serde(rename = "formulaAplicada")]
    pub formula_applied: String,
    #[serde(rename = "reglasAplicadas")]
    pub rules_applied: Vec<AppliedRule>,
    #[serde(rename = "contextoUtilizado")]
    pub context_used: CalculationContext,
    #[serde(rename = "desglose", skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<Vec<BreakdownStage>>,
    #[serde(rename = "advertencias")]
    pub warnings: Vec<String>,
    #[serde(rename = "cacheHit")]
    pub cache_hit: bool,
    #[serde(rename = "metadatos")]
    pub metadata: ResultMetadata,
}
