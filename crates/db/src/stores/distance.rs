use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;

use tarifario_core::domain::tariff::SiteId;
use tarifario_core::stores::{DistanceStore, StoreError};

use super::{get_decimal, map_sqlx};
use crate::DbPool;

/// Directed distance lookups. A -> B and B -> A are distinct rows; an absent
/// row means the route has no registered distance, which the per-kilometer
/// method treats as a calculation error.
pub struct SqlDistanceStore {
    pool: DbPool,
}

impl SqlDistanceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn upsert(
        &self,
        origin: &SiteId,
        destination: &SiteId,
        km: Decimal,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tramo_distancia (origen_id, destino_id, distancia_km)
             VALUES (?, ?, ?)
             ON CONFLICT(origen_id, destino_id) DO UPDATE SET
                 distancia_km = excluded.distancia_km",
        )
        .bind(&origin.0)
        .bind(&destination.0)
        .bind(km.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}

#[async_trait]
impl DistanceStore for SqlDistanceStore {
    async fn distance_km(
        &self,
        origin: &SiteId,
        destination: &SiteId,
    ) -> Result<Option<Decimal>, StoreError> {
        let row: Option<SqliteRow> = sqlx::query(
            "SELECT distancia_km FROM tramo_distancia WHERE origen_id = ? AND destino_id = ?",
        )
        .bind(&origin.0)
        .bind(&destination.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;

        row.map(|row| get_decimal(&row, "distancia_km")).transpose()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use tarifario_core::domain::tariff::SiteId;
    use tarifario_core::stores::DistanceStore;

    use super::SqlDistanceStore;
    use crate::{connect_with_settings, migrations};

    #[tokio::test]
    async fn distances_are_directed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        for id in ["s-1", "s-2"] {
            sqlx::query("INSERT INTO sitio (id, nombre) VALUES (?, ?)")
                .bind(id)
                .bind(id)
                .execute(&pool)
                .await
                .expect("insert sitio");
        }

        let store = SqlDistanceStore::new(pool);
        let origin = SiteId("s-1".to_owned());
        let destination = SiteId("s-2".to_owned());

        store.upsert(&origin, &destination, Decimal::new(825, 1)).await.expect("upsert");

        let forward = store.distance_km(&origin, &destination).await.expect("forward");
        assert_eq!(forward, Some(Decimal::new(825, 1)));

        let reverse = store.distance_km(&destination, &origin).await.expect("reverse");
        assert_eq!(reverse, None);
    }
}
