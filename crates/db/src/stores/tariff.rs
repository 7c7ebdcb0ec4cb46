use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;

use tarifario_core::domain::tariff::{
    CalculationMethod, ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId,
};
use tarifario_core::engine::conflict::ConflictFilter;
use tarifario_core::stores::{StoreError, TariffStore};

use super::{get_date, get_decimal, get_text, map_sqlx};
use crate::DbPool;

pub struct SqlTariffStore {
    pool: DbPool,
}

impl SqlTariffStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, record: &TariffRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO tramo (id, cliente_id, origen_id, destino_id, tipo, metodo_calculo,
                                valor_unitario, valor_peaje, vigencia_desde, vigencia_hasta)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 tipo = excluded.tipo,
                 metodo_calculo = excluded.metodo_calculo,
                 valor_unitario = excluded.valor_unitario,
                 valor_peaje = excluded.valor_peaje,
                 vigencia_desde = excluded.vigencia_desde,
                 vigencia_hasta = excluded.vigencia_hasta",
        )
        .bind(&record.id.0)
        .bind(&record.client.0)
        .bind(&record.origin.0)
        .bind(&record.destination.0)
        .bind(&record.route_kind)
        .bind(record.calculation_method.as_str())
        .bind(record.unit_value.to_string())
        .bind(record.toll_value.to_string())
        .bind(record.valid_from.to_string())
        .bind(record.valid_until.to_string())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}

fn row_to_record(row: &SqliteRow) -> Result<TariffRecord, StoreError> {
    let method_raw = get_text(row, "metodo_calculo")?;
    let calculation_method = CalculationMethod::parse(&method_raw)
        .ok_or_else(|| StoreError::Decode(format!("metodo_calculo `{method_raw}`")))?;

    Ok(TariffRecord {
        id: TariffRecordId(get_text(row, "id")?),
        client: ClientId(get_text(row, "cliente_id")?),
        origin: SiteId(get_text(row, "origen_id")?),
        destination: SiteId(get_text(row, "destino_id")?),
        route_kind: get_text(row, "tipo")?,
        calculation_method,
        unit_value: get_decimal(row, "valor_unitario")?,
        toll_value: get_decimal(row, "valor_peaje")?,
        valid_from: get_date(row, "vigencia_desde")?,
        valid_until: get_date(row, "vigencia_hasta")?,
    })
}

const RECORD_COLUMNS: &str = "id, cliente_id, origen_id, destino_id, tipo, metodo_calculo,
                              valor_unitario, valor_peaje, vigencia_desde, vigencia_hasta";

#[async_trait]
impl TariffStore for SqlTariffStore {
    async fn find_candidates(
        &self,
        client: &ClientId,
        origin: &SiteId,
        destination: &SiteId,
    ) -> Result<Vec<TariffRecord>, StoreError> {
        let rows: Vec<SqliteRow> = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM tramo
             WHERE cliente_id = ? AND origen_id = ? AND destino_id = ?
             ORDER BY id",
        ))
        .bind(&client.0)
        .bind(&origin.0)
        .bind(&destination.0)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn list_for_conflicts(
        &self,
        filter: &ConflictFilter,
    ) -> Result<Vec<TariffRecord>, StoreError> {
        let rows: Vec<SqliteRow> = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS}
             FROM tramo
             WHERE cliente_id = ?1
               AND (?2 IS NULL OR origen_id = ?2)
               AND (?3 IS NULL OR destino_id = ?3)
               AND (?4 IS NULL OR metodo_calculo = ?4)
             ORDER BY id",
        ))
        .bind(&filter.client.0)
        .bind(filter.origin.as_ref().map(|site| site.0.clone()))
        .bind(filter.destination.as_ref().map(|site| site.0.clone()))
        .bind(filter.method.map(|method| method.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(row_to_record).collect()
    }

    async fn set_route_kind(
        &self,
        id: &TariffRecordId,
        kind: RouteKind,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE tramo SET tipo = ? WHERE id = ?")
            .bind(kind.as_str())
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use tarifario_core::domain::tariff::{
        CalculationMethod, ClientId, RouteKind, SiteId, TariffRecord, TariffRecordId,
    };
    use tarifario_core::engine::conflict::ConflictFilter;
    use tarifario_core::stores::TariffStore;

    use super::SqlTariffStore;
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        seed_directory(&pool).await;
        pool
    }

    async fn seed_directory(pool: &sqlx::SqlitePool) {
        sqlx::query("INSERT INTO cliente (id, nombre) VALUES ('c-1', 'Cliente Uno')")
            .execute(pool)
            .await
            .expect("insert cliente");
        for (id, nombre) in [("s-1", "CD Norte"), ("s-2", "CD Sur"), ("s-3", "Planta Este")] {
            sqlx::query("INSERT INTO sitio (id, nombre) VALUES (?, ?)")
                .bind(id)
                .bind(nombre)
                .execute(pool)
                .await
                .expect("insert sitio");
        }
    }

    fn record(id: &str, destination: &str, kind: &str) -> TariffRecord {
        TariffRecord {
            id: TariffRecordId(id.to_owned()),
            client: ClientId("c-1".to_owned()),
            origin: SiteId("s-1".to_owned()),
            destination: SiteId(destination.to_owned()),
            route_kind: kind.to_owned(),
            calculation_method: CalculationMethod::Pallet,
            unit_value: Decimal::new(12_345, 2),
            toll_value: Decimal::new(500, 2),
            valid_from: NaiveDate::from_ymd_opt(2026, 1, 1).expect("date"),
            valid_until: NaiveDate::from_ymd_opt(2026, 12, 31).expect("date"),
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_decimals_and_dates() {
        let pool = setup().await;
        let store = SqlTariffStore::new(pool);

        let original = record("t-1", "s-2", "TRMC");
        store.insert(&original).await.expect("insert");

        let found = store
            .find_candidates(
                &ClientId("c-1".to_owned()),
                &SiteId("s-1".to_owned()),
                &SiteId("s-2".to_owned()),
            )
            .await
            .expect("find");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0], original);
    }

    #[tokio::test]
    async fn candidates_exclude_other_destinations() {
        let pool = setup().await;
        let store = SqlTariffStore::new(pool);

        store.insert(&record("t-1", "s-2", "TRMC")).await.expect("insert t-1");
        store.insert(&record("t-2", "s-3", "TRMC")).await.expect("insert t-2");

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
    async fn conflict_listing_honors_optional_filters() {
        let pool = setup().await;
        let store = SqlTariffStore::new(pool);

        store.insert(&record("t-1", "s-2", "TRMC")).await.expect("insert t-1");
        store.insert(&record("t-2", "s-2", "TRMI")).await.expect("insert t-2");
        store.insert(&record("t-3", "s-3", "TRMC")).await.expect("insert t-3");

        let all = store
            .list_for_conflicts(&ConflictFilter {
                client: ClientId("c-1".to_owned()),
                origin: None,
                destination: None,
                method: None,
            })
            .await
            .expect("list all");
        assert_eq!(all.len(), 3);

        let scoped = store
            .list_for_conflicts(&ConflictFilter {
                client: ClientId("c-1".to_owned()),
                origin: None,
                destination: Some(SiteId("s-2".to_owned())),
                method: Some(CalculationMethod::Pallet),
            })
            .await
            .expect("list scoped");
        assert_eq!(scoped.len(), 2);
    }

    #[tokio::test]
    async fn set_route_kind_updates_and_reports_missing() {
        let pool = setup().await;
        let store = SqlTariffStore::new(pool);

        store.insert(&record("t-1", "s-2", "TRM?")).await.expect("insert");

        let updated = store
            .set_route_kind(&TariffRecordId("t-1".to_owned()), RouteKind::Trmi)
            .await
            .expect("update");
        assert!(updated);

        let found = store
            .find_candidates(
                &ClientId("c-1".to_owned()),
                &SiteId("s-1".to_owned()),
                &SiteId("s-2".to_owned()),
            )
            .await
            .expect("find");
        assert_eq!(found[0].route_kind, "TRMI");

        let missing = store
            .set_route_kind(&TariffRecordId("t-9".to_owned()), RouteKind::Trmi)
            .await
            .expect("update missing");
        assert!(!missing);
    }
}
