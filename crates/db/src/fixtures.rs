use sqlx::Executor;

use tarifario_core::stores::StoreError;

use crate::connection::DbPool;

const SEED_CLIENT_IDS: &[&str] = &["c-acme", "c-lider"];

const SEED_SITE_IDS: &[&str] = &["s-cd-norte", "s-cd-sur", "s-planta-este", "s-puerto"];

const SEED_TARIFF_IDS: &[&str] = &["tr-001", "tr-002", "tr-003", "tr-010", "tr-011", "tr-012"];

const SEED_ACTIVE_RULE_CODES: &[&str] = &["R-URGENCIA", "R-VOLUMEN", "R-FIN-SEMANA"];

/// Ids of the seeded TRMC/TRMI conflict pair; the conflict endpoints and the
/// smoke command both lean on it.
pub const SEED_CONFLICT_PAIR: (&str, &str) = ("tr-010", "tr-011");

#[derive(Clone, Debug)]
pub struct SeedResult {
    pub clients: usize,
    pub sites: usize,
    pub tariff_records: usize,
    pub rules: usize,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

/// Deterministic development dataset: one tramo per calculation method, a
/// route-kind conflict pair, an unnormalized legacy record, and a small rule
/// set covering both modification kinds.
pub struct SeedDataset;

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/engine_seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, StoreError> {
        let mut tx = pool.begin().await.map_err(map_sqlx)?;
        tx.execute(sqlx::query(Self::SQL)).await.map_err(map_sqlx)?;
        tx.commit().await.map_err(map_sqlx)?;

        Ok(SeedResult {
            clients: SEED_CLIENT_IDS.len(),
            sites: SEED_SITE_IDS.len(),
            tariff_records: SEED_TARIFF_IDS.len(),
            rules: SEED_ACTIVE_RULE_CODES.len() + 1,
        })
    }

    /// Checks the dataset against its contract without mutating anything.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, StoreError> {
        let mut checks = Vec::new();

        let client_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM cliente WHERE id IN {} AND activo = 1",
            sql_array(SEED_CLIENT_IDS)
        ))
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;
        checks.push(("clientes", client_count == SEED_CLIENT_IDS.len() as i64));

        let site_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM sitio WHERE id IN {} AND activo = 1",
            sql_array(SEED_SITE_IDS)
        ))
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;
        checks.push(("sitios", site_count == SEED_SITE_IDS.len() as i64));

        let tariff_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM tramo WHERE id IN {}",
            sql_array(SEED_TARIFF_IDS)
        ))
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;
        checks.push(("tramos", tariff_count == SEED_TARIFF_IDS.len() as i64));

        let rule_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(1) FROM regla WHERE codigo IN {} AND activa = 1",
            sql_array(SEED_ACTIVE_RULE_CODES)
        ))
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;
        checks.push(("reglas-activas", rule_count == SEED_ACTIVE_RULE_CODES.len() as i64));

        let conflict_kinds: i64 = sqlx::query_scalar(
            "SELECT COUNT(DISTINCT tipo) FROM tramo WHERE id IN (?1, ?2)",
        )
        .bind(SEED_CONFLICT_PAIR.0)
        .bind(SEED_CONFLICT_PAIR.1)
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;
        checks.push(("conflicto-tipos", conflict_kinds == 2));

        let kilometer_has_distance: i64 = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM tramo t
                 JOIN tramo_distancia d
                   ON d.origen_id = t.origen_id AND d.destino_id = t.destino_id
                 WHERE t.id = 'tr-001' AND t.metodo_calculo = 'KILOMETRO'
             )",
        )
        .fetch_one(pool)
        .await
        .map_err(map_sqlx)?;
        checks.push(("distancia-kilometro", kilometer_has_distance == 1));

        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }
}

fn sql_array(ids: &[&str]) -> String {
    let quoted: Vec<String> = ids.iter().map(|id| format!("'{id}'")).collect();
    format!("({})", quoted.join(", "))
}

fn map_sqlx(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}
