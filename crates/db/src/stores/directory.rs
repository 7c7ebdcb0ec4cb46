use async_trait::async_trait;
use sqlx::Row;

use tarifario_core::domain::tariff::{ClientId, SiteId};
use tarifario_core::stores::{DirectoryStore, StoreError};

use super::map_sqlx;
use crate::DbPool;

/// Existence checks against the `cliente` and `sitio` directory tables.
/// Inactive entries count as absent so a deactivated client stops pricing
/// immediately.
pub struct SqlDirectoryStore {
    pool: DbPool,
}

impl SqlDirectoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryStore for SqlDirectoryStore {
    async fn client_exists(&self, id: &ClientId) -> Result<bool, StoreError> {
        let count = sqlx::query(
            "SELECT COUNT(*) AS count FROM cliente WHERE id = ? AND activo = 1",
        )
        .bind(&id.0)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?
        .get::<i64, _>("count");

        Ok(count > 0)
    }

    async fn site_exists(&self, id: &SiteId) -> Result<bool, StoreError> {
        let count =
            sqlx::query("SELECT COUNT(*) AS count FROM sitio WHERE id = ? AND activo = 1")
                .bind(&id.0)
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx)?
                .get::<i64, _>("count");

        Ok(count > 0)
    }
}
