use serde_json::Value;
use thiserror::Error;

use crate::domain::tariff::TariffRecordId;
use crate::stores::StoreError;

/// Fatal calculation errors. Anything that prevents producing a price ends up
/// here; sub-step anomalies (a bad rule, an ignored quantity) degrade to
/// warnings instead and never abort the calculation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid calculation input: {message}")]
    Validation { message: String, received: Option<Value> },
    #[error("{resource} `{id}` was not found")]
    NotFound { resource: String, id: String },
    #[error("multiple tariff records remain applicable after tie-break")]
    AmbiguousTariff { candidates: Vec<TariffRecordId> },
    #[error("no distance is registered for route {origin} -> {destination}")]
    MissingDistance { origin: String, destination: String },
    #[error("operation requires elevated permission: {message}")]
    Permission { message: String },
    #[error("simulation requires at least one scenario")]
    EmptyScenarioSet,
    #[error("simulation received {requested} scenarios but max allowed is {max_allowed}")]
    TooManyScenarios { requested: usize, max_allowed: usize },
    #[error("store failure: {0}")]
    Store(String),
    #[error("internal engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), received: None }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound { resource: resource.into(), id: id.into() }
    }

    /// Stable machine-readable code, persisted in audit entries and returned
    /// in error response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation_error",
            Self::NotFound { .. } => "not_found",
            Self::AmbiguousTariff { .. } => "ambiguous_tariff",
            Self::MissingDistance { .. } => "missing_distance",
            Self::Permission { .. } => "permission_denied",
            Self::EmptyScenarioSet => "empty_scenario_set",
            Self::TooManyScenarios { .. } => "too_many_scenarios",
            Self::Store(_) => "store_failure",
            Self::Internal(_) => "internal_error",
        }
    }

    pub fn user_safe_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::NotFound { resource, id } => format!("{resource} `{id}` does not exist."),
            Self::AmbiguousTariff { candidates } => format!(
                "More than one tariff record is applicable ({} candidates); correct the overlapping windows before calculating.",
                candidates.len()
            ),
            Self::MissingDistance { origin, destination } => format!(
                "The route {origin} -> {destination} has no registered distance, required by the per-kilometer method."
            ),
            Self::Permission { .. } => "You do not have permission for this operation.".to_string(),
            Self::EmptyScenarioSet => "Provide at least one scenario to simulate.".to_string(),
            Self::TooManyScenarios { max_allowed, .. } => {
                format!("You can simulate up to {max_allowed} scenarios at once.")
            }
            Self::Store(_) | Self::Internal(_) => {
                "An unexpected internal error occurred.".to_string()
            }
        }
    }
}

impl From<StoreError> for EngineError {
    fn from(value: StoreError) -> Self {
        Self::Store(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::tariff::TariffRecordId;
    use crate::stores::StoreError;

    use super::EngineError;

    #[test]
    fn codes_are_stable_per_variant() {
        assert_eq!(EngineError::validation("missing clienteId").code(), "validation_error");
        assert_eq!(EngineError::not_found("cliente", "c-9").code(), "not_found");
        assert_eq!(
            EngineError::AmbiguousTariff {
                candidates: vec![TariffRecordId("t-1".to_owned()), TariffRecordId("t-2".to_owned())]
            }
            .code(),
            "ambiguous_tariff"
        );
        assert_eq!(
            EngineError::MissingDistance {
                origin: "s-1".to_owned(),
                destination: "s-2".to_owned()
            }
            .code(),
            "missing_distance"
        );
    }

    #[test]
    fn store_errors_degrade_to_internal_class() {
        let mapped = EngineError::from(StoreError::Unavailable("lock timeout".to_owned()));
        assert_eq!(mapped.code(), "store_failure");
        assert_eq!(mapped.user_safe_message(), "An unexpected internal error occurred.");
    }

    #[test]
    fn user_messages_never_leak_internals() {
        let internal = EngineError::Internal("panic in strategy table".to_owned());
        assert!(!internal.user_safe_message().contains("strategy table"));
    }
}
