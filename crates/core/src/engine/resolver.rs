//! Vigency resolver: picks the single applicable tariff record for a
//! calculation, or refuses deterministically.

use chrono::NaiveDate;

use crate::domain::calculation::{ResolutionOutcome, ResolutionStrategy};
use crate::domain::tariff::{RouteKind, TariffRecord};
use crate::errors::EngineError;

#[derive(Debug)]
pub struct Resolution {
    pub record: TariffRecord,
    pub outcome: ResolutionOutcome,
}

/// Filters `candidates` down to records whose window covers `date`, then
/// tie-breaks: exact route-kind match to the hint first, latest `validFrom`
/// second. Two records that survive both steps are an ambiguity, reported
/// rather than guessed at. Pure; no side effects.
pub fn resolve(
    candidates: Vec<TariffRecord>,
    hint: RouteKind,
    date: NaiveDate,
) -> Result<Resolution, EngineError> {
    let mut vigent: Vec<TariffRecord> =
        candidates.into_iter().filter(|record| record.covers(date)).collect();
    // Stable order so the reported candidate list is deterministic.
    vigent.sort_by(|left, right| left.id.cmp(&right.id));

    if vigent.is_empty() {
        return Err(EngineError::not_found("tramo vigente", date.to_string()));
    }

    if vigent.len() == 1 {
        let record = vigent.remove(0);
        return Ok(Resolution {
            outcome: ResolutionOutcome {
                record_id: record.id.clone(),
                candidates: 1,
                strategy: ResolutionStrategy::SingleMatch,
            },
            record,
        });
    }

    let total = vigent.len();

    let hinted: Vec<TariffRecord> =
        vigent.iter().filter(|record| record.normalized_kind() == Some(hint)).cloned().collect();
    let (pool, hint_applied) = if hinted.is_empty() { (vigent, false) } else { (hinted, true) };

    if pool.len() == 1 {
        let record = pool.into_iter().next().ok_or_else(|| {
            EngineError::Internal("resolver pool emptied unexpectedly".to_owned())
        })?;
        return Ok(Resolution {
            outcome: ResolutionOutcome {
                record_id: record.id.clone(),
                candidates: total,
                strategy: ResolutionStrategy::HintMatch,
            },
            record,
        });
    }

    let latest_from = pool
        .iter()
        .map(|record| record.valid_from)
        .max()
        .ok_or_else(|| EngineError::Internal("resolver pool emptied unexpectedly".to_owned()))?;
    let latest: Vec<TariffRecord> =
        pool.into_iter().filter(|record| record.valid_from == latest_from).collect();

    if latest.len() == 1 {
        let record = latest.into_iter().next().ok_or_else(|| {
            EngineError::Internal("resolver pool emptied unexpectedly".to_owned())
        })?;
        return Ok(Resolution {
            outcome: ResolutionOutcome {
                record_id: record.id.clone(),
                candidates: total,
                strategy: if hint_applied {
                    ResolutionStrategy::HintMatch
                } else {
                    ResolutionStrategy::LatestValidFrom
                },
            },
            record,
        });
    }

    Err(EngineError::AmbiguousTariff {
        candidates: latest.into_iter().map(|record| record.id).collect(),
    })
}
