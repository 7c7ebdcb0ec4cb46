pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod stores;

pub use connection::{connect, connect_with_settings, DbPool};
pub use fixtures::{SeedDataset, SeedResult, VerificationResult};
pub use stores::{
    SqlAuditStore, SqlDirectoryStore, SqlDistanceStore, SqlRuleStore, SqlTariffStore,
};
