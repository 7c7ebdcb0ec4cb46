//! Conflict detector: a standalone diagnostic pass over the tariff record
//! store, independent of live calculation. Overlapping records with divergent
//! route kinds co-exist legitimately pending manual correction; this module
//! finds them and the companion bulk-correct fixes them id by id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::tariff::{
    CalculationMethod, ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictFilter {
    #[serde(rename = "clienteId")]
    pub client: ClientId,
    #[serde(rename = "origenId")]
    pub origin: Option<SiteId>,
    #[serde(rename = "destinoId")]
    pub destination: Option<SiteId>,
    #[serde(rename = "metodo")]
    pub method: Option<CalculationMethod>,
}

impl ConflictFilter {
    pub fn matches(&self, record: &TariffRecord) -> bool {
        if record.client != self.client {
            return false;
        }
        if let Some(origin) = &self.origin {
            if &record.origin != origin {
                return false;
            }
        }
        if let Some(destination) = &self.destination {
            if &record.destination != destination {
                return false;
            }
        }
        if let Some(method) = self.method {
            if record.calculation_method != method {
                return false;
            }
        }
        true
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictGroupKey {
    #[serde(rename = "origenId")]
    pub origin: SiteId,
    #[serde(rename = "destinoId")]
    pub destination: SiteId,
    #[serde(rename = "metodo")]
    pub method: CalculationMethod,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictGroup {
    #[serde(rename = "clave")]
    pub key: ConflictGroupKey,
    #[serde(rename = "tipos")]
    pub route_kinds: Vec<RouteKind>,
    /// Whether at least two records of different kinds share validity days.
    #[serde(rename = "ventanasSuperpuestas")]
    pub overlapping_windows: bool,
    #[serde(rename = "tramos")]
    pub records: Vec<TariffRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    #[serde(rename = "totalTramos")]
    pub total_records: usize,
    #[serde(rename = "conflictos")]
    pub groups: Vec<ConflictGroup>,
    /// Records whose raw route kind maps to neither known value. Counted
    /// separately from true conflicts.
    #[serde(rename = "sinNormalizar")]
    pub unnormalized: Vec<TariffRecord>,
}

impl ConflictReport {
    pub fn conflict_count(&self) -> usize {
        self.groups.len()
    }
}

/// Groups records by (origin, destination, method) and reports every group
/// whose set of normalized route kinds has more than one member. Declarative
/// and side-effect-free; BTree collections keep output order deterministic.
pub fn detect_conflicts(records: Vec<TariffRecord>) -> ConflictReport {
    let total_records = records.len();

    let mut unnormalized = Vec::new();
    let mut groups: BTreeMap<(SiteId, SiteId, CalculationMethod), Vec<TariffRecord>> =
        BTreeMap::new();

    for record in records {
        if record.normalized_kind().is_none() {
            unnormalized.push(record);
            continue;
        }
        groups
            .entry((record.origin.clone(), record.destination.clone(), record.calculation_method))
            .or_default()
            .push(record);
    }
    unnormalized.sort_by(|left, right| left.id.cmp(&right.id));

    let mut conflict_groups = Vec::new();
    for ((origin, destination, method), mut members) in groups {
        let kinds: BTreeSet<RouteKind> =
            members.iter().filter_map(TariffRecord::normalized_kind).collect();
        if kinds.len() <= 1 {
            continue;
        }

        members.sort_by(|left, right| left.id.cmp(&right.id));
        let overlapping_windows = members.iter().enumerate().any(|(index, left)| {
            members.iter().skip(index + 1).any(|right| {
                left.normalized_kind() != right.normalized_kind() && left.overlaps(right)
            })
        });

        conflict_groups.push(ConflictGroup {
            key: ConflictGroupKey { origin, destination, method },
            route_kinds: kinds.into_iter().collect(),
            overlapping_windows,
            records: members,
        });
    }

    ConflictReport { total_records, groups: conflict_groups, unnormalized }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionStatus {
    Corrected,
    NotFound,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionOutcome {
    #[serde(rename = "tramoId")]
    pub id: TariffRecordId,
    #[serde(rename = "estado")]
    pub status: CorrectionStatus,
    #[serde(rename = "detalle")]
    pub detail: String,
}

/// Per-id outcomes of a bulk correction. Not atomic across ids: partial
/// success is expected and reported, never rolled back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionReport {
    #[serde(rename = "tipoDestino")]
    pub target_kind: RouteKind,
    #[serde(rename = "resultados")]
    pub outcomes: Vec<CorrectionOutcome>,
    #[serde(rename = "corregidos")]
    pub corrected: usize,
    #[serde(rename = "fallidos")]
    pub failed: usize,
}
