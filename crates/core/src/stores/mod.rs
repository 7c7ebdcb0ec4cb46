pub mod memory;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::audit::{AuditEntry, AuditQuery};
use crate::domain::rule::BusinessRule;
use crate::domain::tariff::{ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId};
use crate::engine::conflict::ConflictFilter;

pub use memory::{
    InMemoryAuditStore, InMemoryDirectoryStore, InMemoryDistanceStore, InMemoryRuleStore,
    InMemoryTariffStore,
};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("stored value failed to decode: {0}")]
    Decode(String),
}

/// Read-only access to priced routes, plus the diagnostic listing and
/// bulk-correction primitive used by the conflict tooling.
#[async_trait]
pub trait TariffStore: Send + Sync {
    /// All records for the client/origin/destination triple, regardless of
    /// validity window; the vigency resolver applies the date filter so the
    /// tie-break logic stays in one testable place.
    async fn find_candidates(
        &self,
        client: &ClientId,
        origin: &SiteId,
        destination: &SiteId,
    ) -> Result<Vec<TariffRecord>, StoreError>;

    async fn list_for_conflicts(
        &self,
        filter: &ConflictFilter,
    ) -> Result<Vec<TariffRecord>, StoreError>;

    /// Returns `false` when the record does not exist. Bulk correction calls
    /// this per id; partial success is expected and reported by the caller.
    async fn set_route_kind(
        &self,
        id: &TariffRecordId,
        kind: RouteKind,
    ) -> Result<bool, StoreError>;
}

/// Existence checks only; the engine carries no client/site business logic.
#[async_trait]
pub trait DirectoryStore: Send + Sync {
    async fn client_exists(&self, id: &ClientId) -> Result<bool, StoreError>;
    async fn site_exists(&self, id: &SiteId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait DistanceStore: Send + Sync {
    async fn distance_km(
        &self,
        origin: &SiteId,
        destination: &SiteId,
    ) -> Result<Option<Decimal>, StoreError>;
}

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Active rules applicable to the client on the given date, sorted by
    /// (priority, code) so evaluation order is deterministic.
    async fn active_rules(
        &self,
        client: &ClientId,
        date: NaiveDate,
    ) -> Result<Vec<BusinessRule>, StoreError>;
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError>;
    /// Newest-first, capped at `query.limite`. Read-only; never mutates
    /// entries.
    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError>;
}
