//! SQL-backed implementations of the core store traits. Decimals live as
//! TEXT and dates as ISO-8601 TEXT; every decode failure maps to
//! `StoreError::Decode` with the offending column named.

pub mod audit;
pub mod directory;
pub mod distance;
pub mod rule;
pub mod tariff;

use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use tarifario_core::stores::StoreError;

pub use audit::SqlAuditStore;
pub use directory::SqlDirectoryStore;
pub use distance::SqlDistanceStore;
pub use rule::SqlRuleStore;
pub use tariff::SqlTariffStore;

fn map_sqlx(error: sqlx::Error) -> StoreError {
    StoreError::Unavailable(error.to_string())
}

fn get_text(row: &SqliteRow, column: &str) -> Result<String, StoreError> {
    row.try_get(column).map_err(|error| StoreError::Decode(format!("{column}: {error}")))
}

fn get_decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StoreError> {
    let raw = get_text(row, column)?;
    Decimal::from_str(raw.trim())
        .map_err(|error| StoreError::Decode(format!("{column} `{raw}`: {error}")))
}

fn get_date(row: &SqliteRow, column: &str) -> Result<NaiveDate, StoreError> {
    let raw = get_text(row, column)?;
    raw.trim()
        .parse()
        .map_err(|error| StoreError::Decode(format!("{column} `{raw}`: {error}")))
}
