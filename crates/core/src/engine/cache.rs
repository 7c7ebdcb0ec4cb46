//! Fingerprint-keyed result cache. The key is the canonical context
//! fingerprint, so two requests differing only in presentation flags share an
//! entry. Entries are not invalidated when tariff or rule data changes; the
//! TTL and the explicit clear endpoint are the only staleness bounds.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::domain::calculation::CalculationResult;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    #[serde(rename = "entradas")]
    pub entries: usize,
    #[serde(rename = "aciertos")]
    pub hits: u64,
    #[serde(rename = "fallos")]
    pub misses: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearOutcome {
    #[serde(rename = "antes")]
    pub before: usize,
    #[serde(rename = "despues")]
    pub after: usize,
}

pub trait CalculationCache: Send + Sync {
    fn get(&self, fingerprint: &str) -> Option<CalculationResult>;
    fn put(&self, fingerprint: &str, result: CalculationResult);
    fn clear(&self) -> ClearOutcome;
    fn stats(&self) -> CacheStats;
}

struct CacheSlot {
    result: CalculationResult,
    stored_at: Instant,
}

struct CacheState {
    slots: HashMap<String, CacheSlot>,
    hits: u64,
    misses: u64,
}

pub struct InMemoryCalculationCache {
    state: Mutex<CacheState>,
    ttl: Option<Duration>,
}

impl InMemoryCalculationCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            state: Mutex::new(CacheState { slots: HashMap::new(), hits: 0, misses: 0 }),
            ttl,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for InMemoryCalculationCache {
    fn default() -> Self {
        Self::new(None)
    }
}

impl CalculationCache for InMemoryCalculationCache {
    fn get(&self, fingerprint: &str) -> Option<CalculationResult> {
        let mut state = self.lock();
        let expired = match (state.slots.get(fingerprint), self.ttl) {
            (Some(slot), Some(ttl)) => slot.stored_at.elapsed() > ttl,
            _ => false,
        };
        if expired {
            state.slots.remove(fingerprint);
        }
        let found = state.slots.get(fingerprint).map(|slot| slot.result.clone());
        match found {
            Some(result) => {
                state.hits += 1;
                Some(result)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    fn put(&self, fingerprint: &str, result: CalculationResult) {
        self.lock()
            .slots
            .insert(fingerprint.to_owned(), CacheSlot { result, stored_at: Instant::now() });
    }

    fn clear(&self) -> ClearOutcome {
        let mut state = self.lock();
        let before = state.slots.len();
        state.slots.clear();
        ClearOutcome { before, after: 0 }
    }

    fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats { entries: state.slots.len(), hits: state.hits, misses: state.misses }
    }
}
