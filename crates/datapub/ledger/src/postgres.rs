//! PostgreSQL ledger adapter.
//!
//! The transactional source of truth for minted identifiers. Uniqueness of
//! `(prefix_id, suffix_id)` and of `(site_id, entity_kind, entity_id)` is
//! enforced by UNIQUE constraints, so a check-then-insert race between two
//! concurrent reservations is decided by the database: the losing insert
//! comes back as a conflict, never as a duplicate row.

use crate::model::LedgerRecord;
use crate::traits::LedgerStore;
use crate::{ConflictScope, StoreError, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datapub_types::EntityKind;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

/// PostgreSQL-backed ledger adapter.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Connect to PostgreSQL and initialize the ledger schema.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Backend(format!("failed to connect postgres: {e}")))?;
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Create an adapter from an existing pool.
    pub async fn from_pool(pool: PgPool) -> StoreResult<Self> {
        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn init_schema(&self) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS doi_realisation (
                prefix_id TEXT NOT NULL,
                suffix_id TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                entity_kind TEXT NOT NULL,
                entity_name TEXT NOT NULL,
                owner_user TEXT NOT NULL,
                site_id TEXT NOT NULL,
                metadata JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                PRIMARY KEY (prefix_id, suffix_id),
                UNIQUE (site_id, entity_kind, entity_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(format!("schema init failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresLedgerStore {
    async fn insert(&self, record: LedgerRecord) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO doi_realisation
                (prefix_id, suffix_id, entity_id, entity_kind, entity_name,
                 owner_user, site_id, metadata, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&record.prefix)
        .bind(&record.suffix)
        .bind(&record.entity_id)
        .bind(record.entity_kind.as_str())
        .bind(&record.entity_name)
        .bind(&record.owner_user)
        .bind(&record.site_id)
        .bind(&record.metadata)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(&record, e))?;

        Ok(())
    }

    async fn find_by_entity(
        &self,
        site_id: &str,
        entity_kind: EntityKind,
        entity_id: &str,
    ) -> StoreResult<Option<LedgerRecord>> {
        let row = sqlx::query(
            r#"
            SELECT prefix_id, suffix_id, entity_id, entity_kind, entity_name,
                   owner_user, site_id, metadata, created_at
              FROM doi_realisation
             WHERE site_id = $1 AND entity_kind = $2 AND entity_id = $3
            "#,
        )
        .bind(site_id)
        .bind(entity_kind.as_str())
        .bind(entity_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(row_to_record).transpose()
    }

    async fn find_by_identifier(
        &self,
        prefix: &str,
        suffix: &str,
    ) -> StoreResult<Option<LedgerRecord>> {
        let row = sqlx::query(
            r#"
            SELECT prefix_id, suffix_id, entity_id, entity_kind, entity_name,
                   owner_user, site_id, metadata, created_at
              FROM doi_realisation
             WHERE prefix_id = $1 AND suffix_id = $2
            "#,
        )
        .bind(prefix)
        .bind(suffix)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(row_to_record).transpose()
    }
}

fn map_insert_error(record: &LedgerRecord, err: sqlx::Error) -> StoreError {
    let Some(dbe) = err.as_database_error() else {
        return StoreError::Backend(err.to_string());
    };
    if !dbe.is_unique_violation() {
        return StoreError::Backend(err.to_string());
    }
    // The entity-uniqueness constraint is the named UNIQUE on
    // (site_id, entity_kind, entity_id); the primary key covers the
    // identifier pair.
    match dbe.constraint() {
        Some(name) if name.contains("entity") => StoreError::Conflict {
            scope: ConflictScope::Entity,
            detail: format!(
                "{} {} already has a ledger record",
                record.entity_kind, record.entity_id
            ),
        },
        _ => StoreError::Conflict {
            scope: ConflictScope::Identifier,
            detail: format!(
                "identifier {}/{} already minted",
                record.prefix, record.suffix
            ),
        },
    }
}

fn row_to_record(row: sqlx::postgres::PgRow) -> StoreResult<LedgerRecord> {
    let kind: String = row
        .try_get("entity_kind")
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let entity_kind = match kind.as_str() {
        "dataset" => EntityKind::Dataset,
        "resource" => EntityKind::Resource,
        other => {
            return Err(StoreError::Serialization(format!(
                "unknown entity kind in ledger: {other}"
            )))
        }
    };

    Ok(LedgerRecord {
        prefix: get(&row, "prefix_id")?,
        suffix: get(&row, "suffix_id")?,
        entity_id: get(&row, "entity_id")?,
        entity_kind,
        entity_name: get(&row, "entity_name")?,
        owner_user: get(&row, "owner_user")?,
        site_id: get(&row, "site_id")?,
        metadata: row
            .try_get::<serde_json::Value, _>("metadata")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
        created_at: row
            .try_get::<DateTime<Utc>, _>("created_at")
            .map_err(|e| StoreError::Backend(e.to_string()))?,
    })
}

fn get(row: &sqlx::postgres::PgRow, column: &str) -> StoreResult<String> {
    row.try_get(column)
        .map_err(|e| StoreError::Backend(e.to_string()))
}
