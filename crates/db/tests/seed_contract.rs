//! Contract tests for the development seed dataset: the fixture must load
//! onto a freshly migrated database, satisfy its own verification, and feed
//! the engine's stores with usable data.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use tarifario_core::domain::tariff::{ClientId, SiteId};
use tarifario_core::engine::conflict::{detect_conflicts, ConflictFilter};
use tarifario_core::stores::{DistanceStore, RuleStore, TariffStore};
use tarifario_db::{
    connect_with_settings, migrations, SeedDataset, SqlDistanceStore, SqlRuleStore,
    SqlTariffStore,
};

async fn seeded_pool() -> sqlx::SqlitePool {
    let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
    migrations::run_pending(&pool).await.expect("migrations");
    SeedDataset::load(&pool).await.expect("seed");
    pool
}

#[tokio::test]
async fn seed_loads_and_verifies_on_a_fresh_database() {
    let pool = seeded_pool().await;

    let verification = SeedDataset::verify(&pool).await.expect("verify");
    for (check, present) in &verification.checks {
        assert!(*present, "seed check `{check}` failed");
    }
    assert!(verification.all_present);
}

#[tokio::test]
async fn seeded_kilometer_route_has_candidates_and_distance() {
    let pool = seeded_pool().await;
    let tariffs = SqlTariffStore::new(pool.clone());
    let distances = SqlDistanceStore::new(pool);

    let candidates = tariffs
        .find_candidates(
            &ClientId("c-acme".to_owned()),
            &SiteId("s-cd-norte".to_owned()),
            &SiteId("s-cd-sur".to_owned()),
        )
        .await
        .expect("candidates");
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].unit_value, Decimal::new(1_250, 2));

    let km = distances
        .distance_km(&SiteId("s-cd-norte".to_owned()), &SiteId("s-cd-sur".to_owned()))
        .await
        .expect("distance");
    assert_eq!(km, Some(Decimal::new(825, 1)));
}

#[tokio::test]
async fn seeded_conflict_pair_is_detectable() {
    let pool = seeded_pool().await;
    let tariffs = SqlTariffStore::new(pool);

    let records = tariffs
        .list_for_conflicts(&ConflictFilter {
            client: ClientId("c-lider".to_owned()),
            origin: None,
            destination: None,
            method: None,
        })
        .await
        .expect("list");

    let report = detect_conflicts(records);
    assert_eq!(report.conflict_count(), 1);
    assert!(report.groups[0].overlapping_windows);
    assert_eq!(report.unnormalized.len(), 1);
    assert_eq!(report.unnormalized[0].id.0, "tr-012");
}

#[tokio::test]
async fn seeded_rules_cover_both_modification_kinds() {
    let pool = seeded_pool().await;
    let rules = SqlRuleStore::new(pool);

    let date = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
    let active = rules
        .active_rules(&ClientId("c-acme".to_owned()), date)
        .await
        .expect("active rules");

    let codes: Vec<&str> = active.iter().map(|rule| rule.code.0.as_str()).collect();
    assert_eq!(codes, vec!["R-URGENCIA", "R-VOLUMEN", "R-FIN-SEMANA"]);
    assert!(active.iter().all(|rule| rule.active));
}
