//! Persistence store for pipeline state.
//!
//! Work items are upserted by the post's natural identifier. The upsert
//! keeps already-recorded ledger identifiers authoritative: an update
//! carrying an empty hash or market id never erases a stored one.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::types::{ResultCode, WorkItem};

/// Audit row written after a successful resolution submission.
#[derive(Debug, Clone)]
pub struct ResolutionRow {
    pub market_id: String,
    pub result_code: ResultCode,
    pub tx_hash: String,
    pub graded_at: DateTime<Utc>,
}

#[async_trait]
pub trait MarketStore: Send + Sync {
    async fn upsert_work_item(&self, item: &WorkItem) -> Result<()>;
    async fn load_work_item(&self, post_id: &str) -> Result<Option<WorkItem>>;
    async fn record_resolution(
        &self,
        market_id: &str,
        code: ResultCode,
        tx_hash: &str,
    ) -> Result<()>;
}

/// Postgres-backed store.
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub async fn connect(cfg: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url)
            .await
            .context("connecting to database")?;

        let store = Self {
            pool: Arc::new(pool),
        };
        store.init().await?;
        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS work_items (
                post_id TEXT PRIMARY KEY,
                payload TEXT NOT NULL,
                question TEXT,
                tx_hash TEXT,
                market_id TEXT,
                should_process BOOLEAN NOT NULL,
                skip_reason TEXT,
                created_at TIMESTAMPTZ DEFAULT NOW(),
                updated_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await
        .context("creating work_items table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS resolutions (
                market_id TEXT PRIMARY KEY,
                result_code SMALLINT NOT NULL,
                tx_hash TEXT NOT NULL,
                graded_at TIMESTAMPTZ DEFAULT NOW()
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await
        .context("creating resolutions table")?;

        info!("store tables initialized");
        Ok(())
    }
}

#[async_trait]
impl MarketStore for PostgresStore {
    async fn upsert_work_item(&self, item: &WorkItem) -> Result<()> {
        let payload = serde_json::to_string(item).context("serializing work item")?;

        // COALESCE(NULLIF(...)) keeps a stored ledger id when the update
        // carries none.
        sqlx::query(
            r#"
            INSERT INTO work_items (post_id, payload, question, tx_hash, market_id, should_process, skip_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (post_id) DO UPDATE SET
                payload = EXCLUDED.payload,
                question = EXCLUDED.question,
                tx_hash = COALESCE(NULLIF(EXCLUDED.tx_hash, ''), work_items.tx_hash),
                market_id = COALESCE(NULLIF(EXCLUDED.market_id, ''), work_items.market_id),
                should_process = EXCLUDED.should_process,
                skip_reason = EXCLUDED.skip_reason,
                updated_at = NOW()
            "#,
        )
        .bind(&item.post.id)
        .bind(payload)
        .bind(&item.question)
        .bind(&item.transaction_hash)
        .bind(&item.market_id)
        .bind(item.should_process)
        .bind(&item.skip_reason)
        .execute(self.pool.as_ref())
        .await
        .context("upserting work item")?;

        Ok(())
    }

    async fn load_work_item(&self, post_id: &str) -> Result<Option<WorkItem>> {
        let row = sqlx::query(
            "SELECT payload, tx_hash, market_id FROM work_items WHERE post_id = $1",
        )
        .bind(post_id)
        .fetch_optional(self.pool.as_ref())
        .await
        .context("loading work item")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let payload: String = row.get("payload");
        let mut item: WorkItem =
            serde_json::from_str(&payload).context("deserializing work item payload")?;

        // Ledger id columns are authoritative over the payload copy.
        let tx_hash: Option<String> = row.get("tx_hash");
        let market_id: Option<String> = row.get("market_id");
        if tx_hash.as_deref().map(|s| !s.is_empty()).unwrap_or(false) {
            item.transaction_hash = tx_hash;
        }
        if market_id.as_deref().map(|s| !s.is_empty()).unwrap_or(false) {
            item.market_id = market_id;
        }

        Ok(Some(item))
    }

    async fn record_resolution(
        &self,
        market_id: &str,
        code: ResultCode,
        tx_hash: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resolutions (market_id, result_code, tx_hash)
            VALUES ($1, $2, $3)
            ON CONFLICT (market_id) DO NOTHING
            "#,
        )
        .bind(market_id)
        .bind(code.as_u8() as i16)
        .bind(tx_hash)
        .execute(self.pool.as_ref())
        .await
        .context("recording resolution")?;

        Ok(())
    }
}

/// In-memory store used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    items: RwLock<HashMap<String, WorkItem>>,
    resolutions: RwLock<Vec<ResolutionRow>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolutions(&self) -> Vec<ResolutionRow> {
        self.resolutions.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl MarketStore for MemoryStore {
    async fn upsert_work_item(&self, item: &WorkItem) -> Result<()> {
        let mut items = self.items.write().await;
        let merged = match items.remove(&item.post.id) {
            Some(prior) => prior.absorb(item.clone()),
            None => item.clone(),
        };
        items.insert(item.post.id.clone(), merged);
        Ok(())
    }

    async fn load_work_item(&self, post_id: &str) -> Result<Option<WorkItem>> {
        Ok(self.items.read().await.get(post_id).cloned())
    }

    async fn record_resolution(
        &self,
        market_id: &str,
        code: ResultCode,
        tx_hash: &str,
    ) -> Result<()> {
        self.resolutions.write().await.push(ResolutionRow {
            market_id: market_id.to_string(),
            result_code: code,
            tx_hash: tx_hash.to_string(),
            graded_at: Utc::now(),
        });
        Ok(())
    }
}
