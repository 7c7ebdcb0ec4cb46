pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod stores;

/// Reported in calculation metadata so cached results can be traced back to
/// the engine build that produced them.
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub use domain::audit::{AuditEntry, AuditError, AuditGroupBy, AuditQuery};
pub use domain::calculation::{
    AppliedRule, BreakdownStage, CalculationResult, ResolutionOutcome, ResultMetadata,
};
pub use domain::context::{CalculationContext, CalculationRequest, ExtraItem, Urgency};
pub use domain::rule::{BusinessRule, ModificationKind, RuleBasis, RuleCode};
pub use domain::tariff::{
    CalculationMethod, ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId,
};
pub use engine::cache::{CacheStats, CalculationCache, ClearOutcome, InMemoryCalculationCache};
pub use engine::conflict::{ConflictFilter, ConflictGroup, ConflictReport, CorrectionReport};
pub use engine::simulation::{
    SimulationConfig, SimulationReport, SimulationRequest, SimulationScenario,
};
pub use engine::{AuditReport, EngineSettings, EngineStores, TariffEngine};
pub use errors::EngineError;
pub use stores::{
    AuditStore, DirectoryStore, DistanceStore, RuleStore, StoreError, TariffStore,
};
