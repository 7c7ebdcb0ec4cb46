use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::domain::tariff::{ClientId, RouteKind, SiteId};
use crate::errors::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Normal,
    #[serde(alias = "urgent")]
    Urgente,
    #[serde(alias = "critical")]
    Critica,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Urgente => "urgente",
            Self::Critica => "critica",
        }
    }

    /// Severity ordering used by rule conditions with an urgency floor.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Normal => 0,
            Self::Urgente => 1,
            Self::Critica => 2,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraItem {
    pub id: String,
    #[serde(rename = "cantidad")]
    pub quantity: u32,
}

/// Wire-shaped calculation request as received by the HTTP surface. All
/// optional fields resolve to defaults exactly once, in [`Self::normalize`];
/// downstream stages only ever see the normalized context.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationRequest {
    #[serde(rename = "clienteId")]
    pub cliente_id: Option<String>,
    #[serde(rename = "origenId")]
    pub origen_id: Option<String>,
    #[serde(rename = "destinoId")]
    pub destino_id: Option<String>,
    #[serde(rename = "fecha")]
    pub fecha: Option<NaiveDate>,
    #[serde(rename = "tipoTramo")]
    pub tipo_tramo: Option<String>,
    #[serde(rename = "tipoUnidad")]
    pub tipo_unidad: Option<String>,
    pub pallets: Option<u32>,
    #[serde(rename = "pesoKg")]
    pub peso_kg: Option<Decimal>,
    #[serde(rename = "volumenM3")]
    pub volumen_m3: Option<Decimal>,
    #[serde(rename = "cantidadBultos")]
    pub cantidad_bultos: Option<u32>,
    pub urgencia: Option<Urgency>,
    pub extras: Option<Vec<ExtraItem>>,
    #[serde(rename = "aplicarReglas")]
    pub aplicar_reglas: Option<bool>,
    #[serde(rename = "usarCache")]
    pub usar_cache: Option<bool>,
    #[serde(rename = "incluirDesglose")]
    pub incluir_desglose: Option<bool>,
}

/// Immutable, fully-defaulted input to one calculation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalculationContext {
    #[serde(rename = "clienteId")]
    pub client: ClientId,
    #[serde(rename = "origenId")]
    pub origin: SiteId,
    #[serde(rename = "destinoId")]
    pub destination: SiteId,
    #[serde(rename = "fecha")]
    pub date: NaiveDate,
    #[serde(rename = "tipoTramo")]
    pub route_kind_hint: RouteKind,
    #[serde(rename = "tipoUnidad")]
    pub vehicle_type: String,
    pub pallets: u32,
    #[serde(rename = "pesoKg")]
    pub weight_kg: Option<Decimal>,
    #[serde(rename = "volumenM3")]
    pub volume_m3: Option<Decimal>,
    #[serde(rename = "cantidadBultos")]
    pub package_count: Option<u32>,
    pub urgency: Urgency,
    pub extras: Vec<ExtraItem>,
    #[serde(rename = "aplicarReglas")]
    pub apply_rules: bool,
    #[serde(rename = "usarCache")]
    pub use_cache: bool,
    #[serde(rename = "incluirDesglose")]
    pub include_breakdown: bool,
}

impl CalculationRequest {
    /// Normalizes into a [`CalculationContext`], resolving defaults and
    /// rejecting structurally invalid input. `today` is injected so callers
    /// (and tests) control what "now" means.
    pub fn normalize(&self, today: NaiveDate) -> Result<CalculationContext, EngineError> {
        let client = required_id("clienteId", self.cliente_id.as_deref())?;
        let origin = required_id("origenId", self.origen_id.as_deref())?;
        let destination = required_id("destinoId", self.destino_id.as_deref())?;
        let vehicle_type = required_id("tipoUnidad", self.tipo_unidad.as_deref())?;

        if origin == destination {
            return Err(EngineError::Validation {
                message: "origenId and destinoId must differ".to_owned(),
                received: Some(json!({ "origenId": origin, "destinoId": destination })),
            });
        }

        let route_kind_hint = match self.tipo_tramo.as_deref() {
            None => RouteKind::Trmc,
            Some(raw) => RouteKind::normalize(raw).ok_or_else(|| EngineError::Validation {
                message: "tipoTramo must be TRMC or TRMI".to_owned(),
                received: Some(json!({ "tipoTramo": raw })),
            })?,
        };

        if let Some(weight) = self.peso_kg {
            if weight < Decimal::ZERO {
                return Err(EngineError::Validation {
                    message: "pesoKg must not be negative".to_owned(),
                    received: Some(json!({ "pesoKg": weight.to_string() })),
                });
            }
        }
        if let Some(volume) = self.volumen_m3 {
            if volume < Decimal::ZERO {
                return Err(EngineError::Validation {
                    message: "volumenM3 must not be negative".to_owned(),
                    received: Some(json!({ "volumenM3": volume.to_string() })),
                });
            }
        }

        let mut extras = self.extras.clone().unwrap_or_default();
        for extra in &extras {
            if extra.id.trim().is_empty() {
                return Err(EngineError::validation("extras entries require a non-empty id"));
            }
        }
        extras.sort_by(|left, right| left.id.cmp(&right.id));

        Ok(CalculationContext {
            client: ClientId(client),
            origin: SiteId(origin),
            destination: SiteId(destination),
            date: self.fecha.unwrap_or(today),
            route_kind_hint,
            vehicle_type,
            pallets: self.pallets.unwrap_or(0),
            weight_kg: self.peso_kg,
            volume_m3: self.volumen_m3,
            package_count: self.cantidad_bultos,
            urgency: self.urgencia.unwrap_or(Urgency::Normal),
            extras,
            apply_rules: self.aplicar_reglas.unwrap_or(true),
            use_cache: self.usar_cache.unwrap_or(true),
            include_breakdown: self.incluir_desglose.unwrap_or(false),
        })
    }
}

impl CalculationContext {
    /// Deterministic cache key over every field that affects the numeric
    /// outcome. `incluirDesglose` and `usarCache` only change response
    /// verbosity and caching behavior, so they are excluded; `aplicarReglas`
    /// changes the number and is included. Extras are sorted by id at
    /// normalization, so serialization order is stable.
    pub fn fingerprint(&self) -> String {
        let canonical = json!({
            "clienteId": self.client.0,
            "origenId": self.origin.0,
            "destinoId": self.destination.0,
            "fecha": self.date.to_string(),
            "tipoTramo": self.route_kind_hint.as_str(),
            "tipoUnidad": self.vehicle_type,
            "pallets": self.pallets,
            "pesoKg": self.weight_kg.map(|value| value.normalize().to_string()),
            "volumenM3": self.volume_m3.map(|value| value.normalize().to_string()),
            "cantidadBultos": self.package_count,
            "urgencia": self.urgency.as_str(),
            "extras": self.extras.iter()
                .map(|extra| json!({ "id": extra.id, "cantidad": extra.quantity }))
                .collect::<Vec<_>>(),
            "aplicarReglas": self.apply_rules,
        });

        let digest = Sha256::digest(canonical.to_string().as_bytes());
        digest.iter().map(|byte| format!("{byte:02x}")).collect()
    }

    /// One-line summary for audit views that omit the full context payload.
    pub fn summary(&self) -> String {
        format!(
            "{} {} -> {} on {} ({})",
            self.client, self.origin, self.destination, self.date, self.vehicle_type
        )
    }
}

fn required_id(field: &str, value: Option<&str>) -> Result<String, EngineError> {
    match value.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => Ok(trimmed.to_owned()),
        other => Err(EngineError::Validation {
            message: format!("{field} is required"),
            received: Some(json!({ field: other })),
        }),
    }
}
