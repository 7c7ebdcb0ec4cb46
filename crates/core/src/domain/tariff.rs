use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TariffRecordId(pub String);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for SiteId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::fmt::Display for TariffRecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The two recognized route-leg classifications. Persisted records may carry
/// arbitrary raw strings; [`RouteKind::normalize`] is the single place that
/// decides whether a raw value maps to a known kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RouteKind {
    Trmc,
    Trmi,
}

impl RouteKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trmc => "TRMC",
            Self::Trmi => "TRMI",
        }
    }

    pub fn normalize(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRMC" => Some(Self::Trmc),
            "TRMI" => Some(Self::Trmi),
            _ => None,
        }
    }
}

impl std::fmt::Display for RouteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CalculationMethod {
    #[serde(rename = "KILOMETRO")]
    Kilometer,
    #[serde(rename = "PALLET")]
    Pallet,
    #[serde(rename = "FIJO")]
    Fixed,
}

impl CalculationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Kilometer => "KILOMETRO",
            Self::Pallet => "PALLET",
            Self::Fixed => "FIJO",
        }
    }

    /// Accepts the wire spellings the upstream API used plus their English
    /// equivalents, case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "KILOMETRO" | "KILOMETER" | "KM" => Some(Self::Kilometer),
            "PALLET" | "PALET" => Some(Self::Pallet),
            "FIJO" | "FIXED" => Some(Self::Fixed),
            _ => None,
        }
    }
}

impl std::fmt::Display for CalculationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A priced route ("tramo") for a client within a validity window.
///
/// `route_kind` is kept as the raw persisted string: overlapping records with
/// divergent kinds are a detectable conflict rather than a hard constraint,
/// and the conflict detector must be able to report values that fail to
/// normalize. Records are read-only from the engine's perspective.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffRecord {
    pub id: TariffRecordId,
    #[serde(rename = "clienteId")]
    pub client: ClientId,
    #[serde(rename = "origenId")]
    pub origin: SiteId,
    #[serde(rename = "destinoId")]
    pub destination: SiteId,
    #[serde(rename = "tipo")]
    pub route_kind: String,
    #[serde(rename = "metodoCalculo")]
    pub calculation_method: CalculationMethod,
    #[serde(rename = "valorUnitario")]
    pub unit_value: Decimal,
    #[serde(rename = "valorPeaje")]
    pub toll_value: Decimal,
    #[serde(rename = "vigenciaDesde")]
    pub valid_from: NaiveDate,
    #[serde(rename = "vigenciaHasta")]
    pub valid_until: NaiveDate,
}

impl TariffRecord {
    pub fn normalized_kind(&self) -> Option<RouteKind> {
        RouteKind::normalize(&self.route_kind)
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.valid_from <= date && date <= self.valid_until
    }

    pub fn overlaps(&self, other: &TariffRecord) -> bool {
        self.valid_from <= other.valid_until && other.valid_from <= self.valid_until
    }
}
