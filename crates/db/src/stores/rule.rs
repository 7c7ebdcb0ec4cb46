use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tarifario_core::domain::rule::{BusinessRule, ModificationKind, RuleBasis, RuleCode};
use tarifario_core::domain::tariff::ClientId;
use tarifario_core::stores::{RuleStore, StoreError};

use super::{get_decimal, get_text, map_sqlx};
use crate::DbPool;

pub struct SqlRuleStore {
    pool: DbPool,
}

impl SqlRuleStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, rule: &BusinessRule) -> Result<(), StoreError> {
        let condition = serde_json::to_string(&rule.condition)
            .map_err(|error| StoreError::Decode(format!("condicion: {error}")))?;

        sqlx::query(
            "INSERT INTO regla (codigo, nombre, condicion, tipo_modificacion, magnitud,
                                base_calculo, prioridad, activa)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(codigo) DO UPDATE SET
                 nombre = excluded.nombre,
                 condicion = excluded.condicion,
                 tipo_modificacion = excluded.tipo_modificacion,
                 magnitud = excluded.magnitud,
                 base_calculo = excluded.base_calculo,
                 prioridad = excluded.prioridad,
                 activa = excluded.activa",
        )
        .bind(&rule.code.0)
        .bind(&rule.name)
        .bind(condition)
        .bind(modification_as_str(rule.modification))
        .bind(rule.magnitude.to_string())
        .bind(rule.basis.as_str())
        .bind(rule.priority)
        .bind(rule.active)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(())
    }
}

fn modification_as_str(kind: ModificationKind) -> &'static str {
    match kind {
        ModificationKind::Percentage => "percentage",
        ModificationKind::Absolute => "absolute",
    }
}

fn parse_modification(raw: &str) -> Option<ModificationKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "percentage" | "porcentaje" => Some(ModificationKind::Percentage),
        "absolute" | "absoluto" => Some(ModificationKind::Absolute),
        _ => None,
    }
}

fn row_to_rule(row: &SqliteRow) -> Result<BusinessRule, StoreError> {
    let condition_raw = get_text(row, "condicion")?;
    let condition = serde_json::from_str(&condition_raw)
        .map_err(|error| StoreError::Decode(format!("condicion `{condition_raw}`: {error}")))?;

    let modification_raw = get_text(row, "tipo_modificacion")?;
    let modification = parse_modification(&modification_raw)
        .ok_or_else(|| StoreError::Decode(format!("tipo_modificacion `{modification_raw}`")))?;

    let basis_raw = get_text(row, "base_calculo")?;
    let basis = RuleBasis::parse(&basis_raw)
        .ok_or_else(|| StoreError::Decode(format!("base_calculo `{basis_raw}`")))?;

    Ok(BusinessRule {
        code: RuleCode(get_text(row, "codigo")?),
        name: get_text(row, "nombre")?,
        condition,
        modification,
        magnitude: get_decimal(row, "magnitud")?,
        basis,
        priority: row
            .try_get("prioridad")
            .map_err(|error| StoreError::Decode(format!("prioridad: {error}")))?,
        active: row
            .try_get("activa")
            .map_err(|error| StoreError::Decode(format!("activa: {error}")))?,
    })
}

#[async_trait]
impl RuleStore for SqlRuleStore {
    /// Client and date scoping happen inside the condition JSON, so the SQL
    /// filter only excludes inactive rules; `BusinessRule::matches` does the
    /// rest per calculation.
    async fn active_rules(
        &self,
        _client: &ClientId,
        _date: NaiveDate,
    ) -> Result<Vec<BusinessRule>, StoreError> {
        let rows: Vec<SqliteRow> = sqlx::query(
            "SELECT codigo, nombre, condicion, tipo_modificacion, magnitud,
                    base_calculo, prioridad, activa
             FROM regla
             WHERE activa = 1
             ORDER BY prioridad, codigo",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        rows.iter().map(row_to_rule).collect()
    }
}
