//! Read-side helpers over audit entries: overall statistics and the optional
//! grouping dimension of the audit query endpoint. Pure functions over
//! already-fetched entries; the store handles filtering and the row cap.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::audit::{AuditEntry, AuditGroupBy};

const UNKNOWN_KEY: &str = "desconocido";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditGroupBucket {
    #[serde(rename = "clave")]
    pub key: String,
    pub total: usize,
    #[serde(rename = "conErrores")]
    pub failures: usize,
    #[serde(rename = "cacheHits")]
    pub cache_hits: usize,
    #[serde(rename = "promedioEjecucionMs")]
    pub avg_execution_ms: f64,
    #[serde(rename = "promedioTotal", skip_serializing_if = "Option::is_none")]
    pub avg_total: Option<Decimal>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditStatistics {
    pub total: usize,
    #[serde(rename = "conErrores")]
    pub failures: usize,
    #[serde(rename = "cacheHits")]
    pub cache_hits: usize,
    #[serde(rename = "promedioEjecucionMs")]
    pub avg_execution_ms: f64,
}

fn group_key(entry: &AuditEntry, dimension: AuditGroupBy) -> String {
    match dimension {
        AuditGroupBy::Cliente => entry
            .client
            .as_ref()
            .map(|client| client.0.clone())
            .unwrap_or_else(|| UNKNOWN_KEY.to_owned()),
        AuditGroupBy::Metodo => entry
            .method
            .map(|method| method.as_str().to_owned())
            .unwrap_or_else(|| UNKNOWN_KEY.to_owned()),
        AuditGroupBy::Fecha => entry.timestamp.date_naive().to_string(),
        AuditGroupBy::Hora => entry.timestamp.format("%Y-%m-%dT%H:00").to_string(),
    }
}

/// Buckets `entries` along one dimension. Keys sort lexicographically, which
/// is chronological for the date and hour dimensions.
pub fn group_entries(entries: &[AuditEntry], dimension: AuditGroupBy) -> Vec<AuditGroupBucket> {
    let mut buckets: BTreeMap<String, Vec<&AuditEntry>> = BTreeMap::new();
    for entry in entries {
        buckets.entry(group_key(entry, dimension)).or_default().push(entry);
    }

    buckets
        .into_iter()
        .map(|(key, members)| {
            let total = members.len();
            let failures = members.iter().filter(|entry| entry.failed()).count();
            let cache_hits = members.iter().filter(|entry| entry.cache_hit).count();
            let execution_sum: i64 =
                members.iter().map(|entry| entry.execution_time_ms).sum();

            let totals: Vec<Decimal> = members
                .iter()
                .filter_map(|entry| entry.result.as_ref())
                .map(|result| result.total)
                .collect();
            let avg_total = if totals.is_empty() {
                None
            } else {
                let count = Decimal::from(totals.len());
                Some(totals.iter().sum::<Decimal>() / count)
            };

            AuditGroupBucket {
                key,
                total,
                failures,
                cache_hits,
                avg_execution_ms: execution_sum as f64 / total as f64,
                avg_total,
            }
        })
        .collect()
}

pub fn entry_statistics(entries: &[AuditEntry]) -> AuditStatistics {
    let total = entries.len();
    let failures = entries.iter().filter(|entry| entry.failed()).count();
    let cache_hits = entries.iter().filter(|entry| entry.cache_hit).count();
    let avg_execution_ms = if total == 0 {
        0.0
    } else {
        let sum: i64 = entries.iter().map(|entry| entry.execution_time_ms).sum();
        Decimal::from(sum)
            .checked_div(Decimal::from(total))
            .and_then(|average| average.to_f64())
            .unwrap_or(0.0)
    };

    AuditStatistics { total, failures, cache_hits, avg_execution_ms }
}
