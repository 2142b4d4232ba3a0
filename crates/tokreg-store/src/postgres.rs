//! # Postgres Document Store
//!
//! Durable [`DocumentStore`] backend over Postgres via `sqlx`. Documents
//! live in a single `registry_documents` table keyed by
//! `(collection, id)` with a `jsonb` payload; append-only collections get
//! their own `registry_append_log` table ordered by a sequence column.
//!
//! Single-document atomicity for [`DocumentStore::update`] comes from a
//! `SELECT ... FOR UPDATE` row lock inside a transaction. Queries fetch
//! the collection and filter client-side, matching the memory backend;
//! collections here are small (thousands, not millions) and the filter
//! surface is conjunctive equality only.

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use tokreg_core::StoreError;

use crate::document::{Document, DocumentStore, Query, UpdateFn};

/// Postgres-backed [`DocumentStore`].
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to Postgres and ensure the document tables exist.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(to_store_error)?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Wrap an existing pool (tests, shared pools).
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS registry_documents (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                doc JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(to_store_error)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS registry_append_log (
                seq BIGSERIAL PRIMARY KEY,
                collection TEXT NOT NULL,
                doc JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(to_store_error)?;

        Ok(())
    }
}

fn to_store_error(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row =
            sqlx::query("SELECT doc FROM registry_documents WHERE collection = $1 AND id = $2")
                .bind(collection)
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(to_store_error)?;
        Ok(row.map(|r| r.get::<Document, _>("doc")))
    }

    async fn put(&self, collection: &str, id: &str, doc: Document) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO registry_documents (collection, id, doc)
             VALUES ($1, $2, $3)
             ON CONFLICT (collection, id)
             DO UPDATE SET doc = EXCLUDED.doc, updated_at = NOW()",
        )
        .bind(collection)
        .bind(id)
        .bind(doc)
        .execute(&self.pool)
        .await
        .map_err(to_store_error)?;
        Ok(())
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        apply: UpdateFn,
    ) -> Result<Option<Document>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(to_store_error)?;

        let row = sqlx::query(
            "SELECT doc FROM registry_documents
             WHERE collection = $1 AND id = $2 FOR UPDATE",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(to_store_error)?;

        let Some(row) = row else {
            tx.rollback().await.map_err(to_store_error)?;
            return Ok(None);
        };

        let mut doc: Document = row.get("doc");
        apply(&mut doc)?;

        sqlx::query(
            "UPDATE registry_documents SET doc = $3, updated_at = NOW()
             WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .bind(&doc)
        .execute(&mut *tx)
        .await
        .map_err(to_store_error)?;

        tx.commit().await.map_err(to_store_error)?;
        Ok(Some(doc))
    }

    async fn find(&self, query: Query) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query("SELECT doc FROM registry_documents WHERE collection = $1")
            .bind(&query.collection)
            .fetch_all(&self.pool)
            .await
            .map_err(to_store_error)?;

        Ok(rows
            .into_iter()
            .map(|r| r.get::<Document, _>("doc"))
            .filter(|doc| query.matches(doc))
            .collect())
    }

    async fn append(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO registry_append_log (collection, doc) VALUES ($1, $2)")
            .bind(collection)
            .bind(doc)
            .execute(&self.pool)
            .await
            .map_err(to_store_error)?;
        Ok(())
    }

    async fn list_appended(&self, collection: &str) -> Result<Vec<Document>, StoreError> {
        let rows = sqlx::query(
            "SELECT doc FROM registry_append_log WHERE collection = $1 ORDER BY seq ASC",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(to_store_error)?;
        Ok(rows.into_iter().map(|r| r.get::<Document, _>("doc")).collect())
    }
}
