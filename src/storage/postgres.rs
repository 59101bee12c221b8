//! PostgreSQL-backed `PageStore`. The table is created on connect; upsert
//! rides `INSERT .. ON CONFLICT` keyed on `path`.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::debug;

use crate::config::StorageSettings;
use crate::error::StoreError;
use crate::storage::page_store::{PageStore, SiteRecord};

pub struct PostgresStore {
    pool: Pool<Postgres>,
    table: String,
}

impl PostgresStore {
    pub async fn connect(settings: &StorageSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&settings.database_url)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let store = Self {
            pool,
            table: settings.table_name.clone(),
        };
        store.ensure_table().await?;

        debug!("Connected to page store table {}", store.table);

        Ok(store)
    }

    async fn ensure_table(&self) -> Result<(), StoreError> {
        let query = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                client_id TEXT NOT NULL,
                path TEXT NOT NULL,
                title TEXT NOT NULL,
                description TEXT,
                content TEXT NOT NULL,
                links TEXT NOT NULL,
                level INTEGER NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (path)
            )",
            self.table
        );

        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Connection(format!("create table {}: {e}", self.table)))?;

        Ok(())
    }
}

#[async_trait]
impl PageStore for PostgresStore {
    async fn upsert(&self, record: &SiteRecord) -> Result<(), StoreError> {
        let query = format!(
            "INSERT INTO {} (client_id, path, title, description, content, links, level)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (path) DO UPDATE
             SET client_id = $1, title = $3, description = $4, content = $5,
                 links = $6, level = $7, updated_at = NOW()",
            self.table
        );

        sqlx::query(&query)
            .bind(&record.client_id)
            .bind(&record.path)
            .bind(&record.title)
            .bind(&record.description)
            .bind(&record.content)
            .bind(&record.links_csv)
            .bind(record.level as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Write(format!("{}: {e}", record.path)))?;

        debug!("Stored page {}", record.path);

        Ok(())
    }
}
