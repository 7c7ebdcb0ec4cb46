use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tarifario_core::domain::audit::{AuditEntry, AuditQuery};
use tarifario_core::domain::tariff::{CalculationMethod, ClientId};
use tarifario_core::stores::{AuditStore, StoreError};

use super::{get_text, map_sqlx};
use crate::DbPool;

/// Append-only audit persistence. Context and result payloads are stored as
/// JSON text; the denormalized `cliente_id` and `metodo` columns exist so
/// filtering never has to parse payloads.
pub struct SqlAuditStore {
    pool: DbPool,
}

impl SqlAuditStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_entry(row: &SqliteRow) -> Result<AuditEntry, StoreError> {
    let timestamp_raw = get_text(row, "timestamp")?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp_raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| StoreError::Decode(format!("timestamp `{timestamp_raw}`: {error}")))?;

    let method_raw: Option<String> =
        row.try_get("metodo").map_err(|error| StoreError::Decode(format!("metodo: {error}")))?;
    let method = match method_raw {
        Some(raw) => Some(
            CalculationMethod::parse(&raw)
                .ok_or_else(|| StoreError::Decode(format!("metodo `{raw}`")))?,
        ),
        None => None,
    };

    let context_raw: Option<String> = row
        .try_get("contexto")
        .map_err(|error| StoreError::Decode(format!("contexto: {error}")))?;
    let context = context_raw
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|error| StoreError::Decode(format!("contexto: {error}")))
        })
        .transpose()?;

    let result_raw: Option<String> = row
        .try_get("resultado")
        .map_err(|error| StoreError::Decode(format!("resultado: {error}")))?;
    let result = result_raw
        .map(|raw| {
            serde_json::from_str(&raw)
                .map_err(|error| StoreError::Decode(format!("resultado: {error}")))
        })
        .transpose()?;

    let errors_raw = get_text(row, "errores")?;
    let errors = serde_json::from_str(&errors_raw)
        .map_err(|error| StoreError::Decode(format!("errores: {error}")))?;

    let client_raw: Option<String> = row
        .try_get("cliente_id")
        .map_err(|error| StoreError::Decode(format!("cliente_id: {error}")))?;

    Ok(AuditEntry {
        id: get_text(row, "id")?,
        timestamp,
        execution_time_ms: row
            .try_get("tiempo_ejecucion_ms")
            .map_err(|error| StoreError::Decode(format!("tiempo_ejecucion_ms: {error}")))?,
        client: client_raw.map(ClientId),
        method,
        context,
        result,
        errors,
        cache_hit: row
            .try_get("cache_hit")
            .map_err(|error| StoreError::Decode(format!("cache_hit: {error}")))?,
    })
}

#[async_trait]
impl AuditStore for SqlAuditStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), StoreError> {
        let context = entry
            .context
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| StoreError::Decode(format!("contexto: {error}")))?;
        let result = entry
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|error| StoreError::Decode(format!("resultado: {error}")))?;
        let errors = serde_json::to_string(&entry.errors)
            .map_err(|error| StoreError::Decode(format!("errores: {error}")))?;

        sqlx::query(
            "INSERT INTO engine_audit (id, timestamp, tiempo_ejecucion_ms, cliente_id, metodo,
                                       contexto, resultado, errores, cache_hit)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.id)
        .bind(entry.timestamp.to_rfc3339())
        .bind(entry.execution_time_ms)
        .bind(entry.client.as_ref().map(|client| client.0.clone()))
        .bind(entry.method.map(|method| method.as_str()))
        .bind(context)
        .bind(result)
        .bind(errors)
        .bind(entry.cache_hit)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }

    async fn query(&self, query: &AuditQuery) -> Result<Vec<AuditEntry>, StoreError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT id, timestamp, tiempo_ejecucion_ms, cliente_id, metodo,
                    contexto, resultado, errores, cache_hit
             FROM engine_audit
             WHERE (?1 IS NULL OR date(timestamp) >= ?1)
               AND (?2 IS NULL OR date(timestamp) <= ?2)
               AND (?3 IS NULL OR cliente_id = ?3)
               AND (?4 = 0 OR resultado IS NULL)
             ORDER BY timestamp DESC
             LIMIT ?5",
        )
        .bind(query.desde.map(|date| date.to_string()))
        .bind(query.hasta.map(|date| date.to_string()))
        .bind(query.client.as_ref().map(|client| client.0.clone()))
        .bind(query.only_failed)
        .bind(query.limite)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(row_to_entry).collect()
    }
}
