//! Store Adapter (§4.H): schema bootstrap, batch upsert, status sweep, and
//! the deal-history query, wrapped behind one `Store` handle owning the
//! pooled MySQL connection.

pub mod history;
pub mod schema;
pub mod upsert;

use std::collections::HashMap;

use anyhow::{Context, Result};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

use crate::config::DbConfig;
use crate::models::domain::{Auction, BidRecord, HistoryRow, Pigeon, Section};

pub use history::BidStatistics;

#[derive(Clone)]
pub struct Store {
    pool: MySqlPool,
}

impl Store {
    pub async fn connect(cfg: &DbConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(cfg.pool_size)
            .connect(&cfg.connection_url())
            .await
            .context("connecting to MySQL store")?;
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    pub async fn ensure_schema(&self) -> Result<()> {
        schema::ensure_schema(&self.pool)
            .await
            .context("bootstrapping store schema")
    }

    pub async fn upsert_auctions(&self, rows: &[Auction]) -> Result<()> {
        upsert::upsert_auctions(&self.pool, rows).await.map_err(Into::into)
    }

    pub async fn upsert_sections(&self, rows: &[Section]) -> Result<()> {
        upsert::upsert_sections(&self.pool, rows).await.map_err(Into::into)
    }

    pub async fn upsert_pigeons(&self, rows: &[Pigeon]) -> Result<()> {
        upsert::upsert_pigeons(&self.pool, rows).await.map_err(Into::into)
    }

    pub async fn upsert_bid_records(&self, rows: &[BidRecord]) -> Result<()> {
        upsert::upsert_bid_records(&self.pool, rows).await.map_err(Into::into)
    }

    pub async fn sweep_finished_auctions(&self, live_ids: &[i64]) -> Result<u64> {
        upsert::sweep_finished(&self.pool, "auctions", live_ids, None)
            .await
            .map_err(Into::into)
    }

    pub async fn sweep_finished_sections(&self, auction_id: i64, live_ids: &[i64]) -> Result<u64> {
        upsert::sweep_finished(&self.pool, "sections", live_ids, Some(auction_id))
            .await
            .map_err(Into::into)
    }

    pub async fn sweep_finished_pigeons(&self, auction_id: i64, live_ids: &[i64]) -> Result<u64> {
        upsert::sweep_finished(&self.pool, "pigeons", live_ids, Some(auction_id))
            .await
            .map_err(Into::into)
    }

    pub async fn query_bid_statistics_and_deals(
        &self,
        user_codes: &[String],
        auction_id: i64,
    ) -> Result<(HashMap<String, BidStatistics>, HashMap<String, Vec<HistoryRow>>)> {
        history::query_bid_statistics_and_deals(&self.pool, user_codes, auction_id, None, None)
            .await
            .map_err(Into::into)
    }
}
