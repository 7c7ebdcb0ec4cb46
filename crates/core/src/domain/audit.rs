use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::calculation::CalculationResult;
use crate::domain::context::CalculationContext;
use crate::domain::tariff::{CalculationMethod, ClientId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditError {
    #[serde(rename = "codigo")]
    pub code: String,
    #[serde(rename = "mensaje")]
    pub message: String,
}

/// Append-only record of one calculation attempt, successful or not. Client
/// and method are denormalized so failed attempts (which may lack a
/// normalized context) still support filtering and grouping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "tiempoEjecucionMs")]
    pub execution_time_ms: i64,
    #[serde(rename = "clienteId")]
    pub client: Option<ClientId>,
    #[serde(rename = "metodo")]
    pub method: Option<CalculationMethod>,
    #[serde(rename = "contexto", skip_serializing_if = "Option::is_none")]
    pub context: Option<CalculationContext>,
    #[serde(rename = "resultado", skip_serializing_if = "Option::is_none")]
    pub result: Option<CalculationResult>,
    #[serde(rename = "errores")]
    pub errors: Vec<AuditError>,
    #[serde(rename = "cacheHit")]
    pub cache_hit: bool,
}

impl AuditEntry {
    pub fn success(
        execution_time_ms: i64,
        context: CalculationContext,
        result: CalculationResult,
        errors: Vec<AuditError>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            execution_time_ms,
            client: Some(context.client.clone()),
            method: Some(result.method_used),
            cache_hit: result.cache_hit,
            context: Some(context),
            result: Some(result),
            errors,
        }
    }

    pub fn failure(
        execution_time_ms: i64,
        client: Option<ClientId>,
        context: Option<CalculationContext>,
        errors: Vec<AuditError>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            execution_time_ms,
            client,
            method: None,
            context,
            result: None,
            errors,
            cache_hit: false,
        }
    }

    pub fn failed(&self) -> bool {
        self.result.is_none()
    }
}

/// Validated audit query filters. Limits are clamped by the engine settings
/// before this type is built. `include_context` controls the response shape
/// only: entries come back as summaries unless the full context and result
/// payloads are requested.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditQuery {
    pub desde: Option<NaiveDate>,
    pub hasta: Option<NaiveDate>,
    #[serde(rename = "clienteId")]
    pub client: Option<ClientId>,
    #[serde(rename = "conErrores")]
    pub only_failed: bool,
    pub limite: u32,
    #[serde(rename = "incluirContexto", default)]
    pub include_context: bool,
}

impl AuditQuery {
    pub fn matches(&self, entry: &AuditEntry) -> bool {
        if let Some(desde) = self.desde {
            if entry.timestamp.date_naive() < desde {
                return false;
            }
        }
        if let Some(hasta) = self.hasta {
            if entry.timestamp.date_naive() > hasta {
                return false;
            }
        }
        if let Some(client) = &self.client {
            if entry.client.as_ref() != Some(client) {
                return false;
            }
        }
        if self.only_failed && !entry.failed() {
            return false;
        }
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditGroupBy {
    Cliente,
    Metodo,
    Fecha,
    Hora,
}

impl AuditGroupBy {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cliente" => Some(Self::Cliente),
            "metodo" => Some(Self::Metodo),
            "fecha" => Some(Self::Fecha),
            "hora" => Some(Self::Hora),
            _ => None,
        }
    }
}
