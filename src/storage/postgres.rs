//! Postgres store repository.
//!
//! # Table
//!
//! `stores`, created by [`PgStoreRepository::ensure_schema`]. The CHECK
//! constraint mirrors [`StoreRecord::check`] so rows written by other tools
//! keep the installed/token invariant.

use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{StorageError, StoreRecord, StoreRepository, StoreUpdate};
use crate::config::StoreName;

const CREATE_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS stores (
    id           BIGSERIAL PRIMARY KEY,
    name         TEXT        NOT NULL UNIQUE,
    nonce        TEXT        NOT NULL DEFAULT '',
    access_token TEXT,
    installed    BOOLEAN     NOT NULL DEFAULT FALSE,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT stores_installed_has_token
        CHECK (NOT installed OR (access_token IS NOT NULL AND access_token <> ''))
)";

const COLUMNS: &str = "name, nonce, access_token, installed, created_at, updated_at";

/// Internal row type for database queries.
#[derive(Debug, sqlx::FromRow)]
struct StoreRow {
    name: String,
    nonce: String,
    access_token: Option<String>,
    installed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StoreRow> for StoreRecord {
    type Error = StorageError;

    fn try_from(row: StoreRow) -> Result<Self, Self::Error> {
        let name = StoreName::new(&row.name).map_err(|e| {
            StorageError::DataCorruption(format!("invalid store name in database: {e}"))
        })?;
        let record = Self {
            name,
            nonce: row.nonce,
            access_token: row.access_token,
            installed: row.installed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        };
        record
            .check()
            .map_err(|e| StorageError::DataCorruption(e.to_string()))?;
        Ok(record)
    }
}

/// Store records in a Postgres `stores` table.
#[derive(Clone, Debug)]
pub struct PgStoreRepository {
    pool: PgPool,
}

impl PgStoreRepository {
    /// Wraps an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a pool against `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the connection cannot be
    /// established.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates the `stores` table if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Database`] if the statement fails.
    pub async fn ensure_schema(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn map_write_error(name: &StoreName, error: sqlx::Error) -> StorageError {
    match error {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            StorageError::Conflict { name: name.clone() }
        }
        sqlx::Error::Database(ref db_err) if db_err.is_check_violation() => StorageError::Invariant(
            format!("store {name} is marked installed without an access token"),
        ),
        other => StorageError::Database(other),
    }
}

impl StoreRepository for PgStoreRepository {
    async fn get(&self, name: &StoreName) -> Result<Option<StoreRecord>, StorageError> {
        let row: Option<StoreRow> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM stores WHERE name = $1"))
                .bind(name.as_ref())
                .fetch_optional(&self.pool)
                .await?;
        row.map(StoreRecord::try_from).transpose()
    }

    async fn create(&self, record: StoreRecord) -> Result<StoreRecord, StorageError> {
        record.check()?;
        let row: StoreRow = sqlx::query_as(&format!(
            "INSERT INTO stores (name, nonce, access_token, installed, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {COLUMNS}"
        ))
        .bind(record.name.as_ref())
        .bind(&record.nonce)
        .bind(record.access_token.as_deref())
        .bind(record.installed)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_write_error(&record.name, e))?;
        row.try_into()
    }

    async fn update(
        &self,
        name: &StoreName,
        update: StoreUpdate,
    ) -> Result<StoreRecord, StorageError> {
        let row: Option<StoreRow> = sqlx::query_as(&format!(
            "UPDATE stores SET \
                nonce = COALESCE($2, nonce), \
                access_token = COALESCE($3, access_token), \
                installed = COALESCE($4, installed), \
                updated_at = now() \
             WHERE name = $1 RETURNING {COLUMNS}"
        ))
        .bind(name.as_ref())
        .bind(update.nonce.as_deref())
        .bind(update.access_token.as_deref())
        .bind(update.installed)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_write_error(name, e))?;

        row.ok_or_else(|| StorageError::NotFound { name: name.clone() })?
            .try_into()
    }

    async fn delete(&self, name: &StoreName) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM stores WHERE name = $1")
            .bind(name.as_ref())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound { name: name.clone() });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, installed: bool, token: Option<&str>) -> StoreRow {
        StoreRow {
            name: name.to_string(),
            nonce: "nonce".to_string(),
            access_token: token.map(str::to_string),
            installed,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_converts_to_record() {
        let record = StoreRecord::try_from(row("shop.example.com", true, Some("t"))).unwrap();
        assert_eq!(record.name.as_ref(), "shop.example.com");
        assert!(record.installed);
    }

    #[test]
    fn test_invalid_rows_are_data_corruption() {
        assert!(matches!(
            StoreRecord::try_from(row("not a host", false, None)),
            Err(StorageError::DataCorruption(_))
        ));
        assert!(matches!(
            StoreRecord::try_from(row("shop.example.com", true, None)),
            Err(StorageError::DataCorruption(_))
        ));
    }
}
