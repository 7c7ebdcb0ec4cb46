//! In-memory store implementations used by engine unit tests, server route
//! tests, and the CLI smoke command. The SQL-backed versions live in the db
//! crate and are what the server wires at bootstrap.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::domain::audit::{AuditEntry, AuditQuery};
use crate::domain::rule::BusinessRule;
use crate::domain::tariff::{ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId};
use crate::engine::conflict::ConflictFilter;
use crate::stores::{
    AuditStore, DirectoryStore, DistanceStore, RuleStore, StoreError, TariffStore,
};

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Clone, Default)]
pub struct InMemoryTariffStore {
    records: Arc<Mutex<Vec<TariffRecord>>>,
}

impl InMemoryTariffStore {
    pub fn with_records(records: Vec<TariffRecord>) -> Self {
        Self { records: Arc::new(Mutex::new(records)) }
    }

    pub fn push(&self, record: TariffRecord) {
        lock_or_recover(&self.records).push(record);
    }

    pub fn records(&self) -> Vec<TariffRecord> {
        lock_or_recover(&self.records).clone()
    }
}

#[async_trait]
impl TariffStore for InMemoryTariffStore {
    async fn find_candidates(
        &self,
        client: &ClientId,
        origin: &SiteId,
        destination: &SiteId,
    ) -> Result<Vec<TariffRecord>, StoreError> {
        Ok(lock_or_recover(&self.records)
            .iter()
            .filter(|record| {
                &record.client == client
                    && &record.origin == origin
                    && &record.destination == destination
            })
            .cloned()
            .collect())
    }

    async fn list_for_conflicts(
        &self,
        filter: &ConflictFilter,
    ) -> Result<Vec<TariffRecord>, StoreError> {
        Ok(lock_or_recover(&self.records)
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn set_route_kind(
        &self,
        id: &TariffRecordId,
        kind: RouteKind,
    ) -> Result<bool, StoreError> {
        let mut records = lock_or_recover(&self.records);
        match records.iter_mut().find(|record| &record.id == id) {
            Some(record) => {
                record.route_kind = kind.as_str().to_owned();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDirectoryStore {
    clients: Arc<Mutex<Vec<ClientId>>>,
    sites: Arc<Mutex<Vec<SiteId>>>,
}

impl InMemoryDirectoryStore {
    pub fn with_entries(clients: Vec<ClientId>, sites: Vec<SiteId>) -> Self {
        Self { clients: Arc::new(Mutex::new(clients)), sites: Arc::new(Mutex::new(sites)) }
    }
}

#[async_trait]
impl DirectoryStore for InMemoryDirectoryStore {
    async fn client_exists(&self, id: &ClientId) -> Result<bool, StoreError> {
        Ok(lock_or_recover(&self.clients).contains(id))
    }

    async fn site_exists(&self, id: &SiteId) -> Result<bool, StoreError> {
        Ok(lock_or_recover(&self.sites).contains(id))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDistanceStore {
    distances: Arc<Mutex<BTreeMap<(SiteId, SiteId), Decimal>>>,
}

impl InMemoryDistanceStore {
    pub fn with_distances(entries: Vec<(SiteId, SiteId, Decimal)>) -> Self {
        let mut distances = BTreeMap::new();
        for (origin, destination, km) in entries {
            distances.insert((origin, destination), km);
        }
        Self { distances: Arc::new(Mutex::new(distances)) }
    }
}

#[async_trait]
impl DistanceStore for InMemoryDistanceStore {
    async fn distance_km(
        &self,
        origin: &SiteId,
        destination: &SiteId,
    ) -> Result<Option<Decimal>, StoreError> {
        Ok(lock_or_recover(&self.distances)
            .get(&(origin.clone(), destination.clone()))
            .copied())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryRuleStore {
    rules: Arc<Mutex<Vec<BusinessRule>>>,
}

impl InMemoryRuleStore {
    pub fn with_rules(rules: Vec<BusinessRule>) -> Self {
        Self { rules: Arc::new(Mutex::new(rules)) }
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn active_rules(
        &self,
        _client: &ClientId,
        _date: NaiveDate,
    ) -> Result<Vec<BusinessRule>, StoreError> {
        let mut rules: Vec<BusinessRule> =
            lock_or_recover(&self.rules).iter().filter(|rule| rule.active).cloned().collect();
        rules.sort_by(|left, right| {
            (left.priority, &left.code).cmp(&(right.priority, &right.code))
        });
        Ok(rules)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditStore {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl InMemoryAuditStore {
    pub fn entries(&self) -> Vec<AuditEntry> {
        lock_or_recover(&self.entries).clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        lock_or_recover(&self.entries).push(entry);
        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let entries = lock_or_recover(&self.entries);
        let mut matched: Vec<AuditEntry> =
            entries.iter().filter(|entry| query.matches(entry)).cloned().collect();
        matched.sort_by(|left, right| right.timestamp.cmp(&left.timestamp));
        matched.truncate(query.limite as usize);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::domain::audit::{AuditEntry, AuditError, AuditQuery};
    use crate::domain::tariff::{
        CalculationMethod, ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId,
    };
    use crate::stores::{AuditStore, TariffStore};

    use super::{InMemoryAuditStore, InMemoryTariffStore};

    fn record(id: &str, client: &str) -> TariffRecord {
        TariffRecord {
            id: TariffRecordId(id.to_owned()),
            client: ClientId(client.to_owned()),
            origin: SiteId("s-1".to_owned()),
            destination: SiteId("s-2".to_owned()),
            route_kind: "TRMC".to_owned(),
            calculation_method: CalculationMethod::Fixed,
            unit_value: Decimal::new(40_000, 2),
            toll_value: Decimal::ZERO,
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"),
            valid_until: NaiveDate::from_ymd_opt(2026, 12, 31).expect("date"),
        }
    }

    #[tokio::test]
    async fn candidates_are_scoped_to_the_route_triple() {
        let store = InMemoryTariffStore::with_records(vec![
            record("t-1", "c-1"),
            record("t-2", "c-2"),
        ]);

        let found = store
            .find_candidates(
                &ClientId("c-1".to_owned()),
                &SiteId("s-1".to_owned()),
                &SiteId("s-2".to_owned()),
            )
            .await
            .expect("find");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id.0, "t-1");
    }

    #[tokio::test]
    async fn set_route_kind_reports_missing_records() {
        let store = InMemoryTariffStore::with_records(vec![record("t-1", "c-1")]);

        let updated = store
            .set_route_kind(&TariffRecordId("t-1".to_owned()), RouteKind::Trmi)
            .await
            .expect("update");
        assert!(updated);
        assert_eq!(store.records()[0].route_kind, "TRMI");

        let missing = store
            .set_route_kind(&TariffRecordId("t-9".to_owned()), RouteKind::Trmi)
            .await
            .expect("update");
        assert!(!missing);
    }

    #[tokio::test]
    async fn audit_query_filters_failures_and_caps_results() {
        let store = InMemoryAuditStore::default();
        for index in 0..5 {
            store
                .append(AuditEntry::failure(
                    3,
                    Some(ClientId(format!("c-{index}"))),
                    None,
                    vec![AuditError {
                        code: "not_found".to_owned(),
                        message: "tramo missing".to_owned(),
                    }],
                ))
                .await
                .expect("append");
        }

        let limited = store
            .query(&AuditQuery { only_failed: true, limite: 3, ..AuditQuery::default() })
            .await
            .expect("query");
        assert_eq!(limited.len(), 3);
        assert!(limited.iter().all(AuditEntry::failed));
    }
}
