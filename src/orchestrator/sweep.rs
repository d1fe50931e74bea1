//! Periodic sweep (§4.K): auctions → status sweep → sections for unfinished
//! auctions → pigeons for those sections → upsert. Independent of the
//! reactive chain — doesn't touch the Snapshot Bus. Grounded on
//! `examples/original_source/dao/gongpeng_dao.py::get_unfinished_ids`
//! (status_name comparison) and `crawl_all`/`fetchall_sections`/
//! `fetchall_pigeons` in `examples/original_source/sniffer/crawlers/*`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::{EndpointConfig, SpiderConfig};
use crate::crawler::{CrawlerPool, CrawlerSession};
use crate::models::domain::{Auction, Pigeon, Section};
use crate::record::{build_batch, AUCTION_DESCRIPTOR, PIGEON_DESCRIPTOR, SECTION_DESCRIPTOR};
use crate::record::pipeline::Strictness;
use crate::store::Store;

const FINISHED_MARKERS: &[&str] = &["finished", "已完成", "closed", "ended", "已结拍"];

fn is_unfinished(status_name: &Option<String>) -> bool {
    match status_name {
        Some(s) => !FINISHED_MARKERS.contains(&s.as_str()),
        None => true,
    }
}

fn to_typed<T: serde::de::DeserializeOwned>(rows: Vec<serde_json::Map<String, Value>>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|m| match serde_json::from_value(Value::Object(m)) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(error = %e, "sweep: dropping row that failed typed conversion");
                None
            }
        })
        .collect()
}

async fn crawl_auctions(pool: &CrawlerPool, cfg: Arc<EndpointConfig>) -> Vec<Value> {
    pool.run_on_slot(Arc::new(move |session: &CrawlerSession| {
        crate::crawler::endpoints::crawl_all_auctions(session, &cfg)
    }))
    .await
    .unwrap_or_default()
}

async fn crawl_sections(pool: &CrawlerPool, cfg: Arc<EndpointConfig>, auction_id: i64) -> Vec<Value> {
    pool.run_on_slot(Arc::new(move |session: &CrawlerSession| {
        crate::crawler::endpoints::fetch_sections(session, &cfg, auction_id)
    }))
    .await
    .unwrap_or_default()
}

async fn crawl_pigeons(
    pool: &CrawlerPool,
    cfg: Arc<EndpointConfig>,
    auction_id: i64,
    section_id: i64,
) -> Vec<Value> {
    pool.run_on_slot(Arc::new(move |session: &CrawlerSession| {
        crate::crawler::endpoints::fetch_pigeons(session, &cfg, auction_id, section_id)
    }))
    .await
    .unwrap_or_default()
}

/// One pass of the sweep. Failures in any stage are logged and isolated —
/// they never propagate to the reactive flow.
pub async fn run_once(pool: &Arc<CrawlerPool>, spider: &SpiderConfig, store: &Store) {
    let auction_cfg = Arc::new(spider.gongpeng.clone());
    let raw_auctions = crawl_auctions(pool, auction_cfg).await;
    if raw_auctions.is_empty() {
        tracing::debug!("sweep: auction list fetch returned nothing, skipping this pass");
        return;
    }

    let built = match build_batch(&raw_auctions, &AUCTION_DESCRIPTOR, Strictness::Lenient) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "sweep: auction batch build failed");
            return;
        }
    };
    let auctions: Vec<Auction> = to_typed(built);
    if let Err(e) = store.upsert_auctions(&auctions).await {
        tracing::error!(error = %e, "sweep: auction upsert failed");
    }

    let live_auction_ids: Vec<i64> = auctions.iter().map(|a| a.id).collect();
    if let Err(e) = store.sweep_finished_auctions(&live_auction_ids).await {
        tracing::error!(error = %e, "sweep: auction status sweep failed");
    }

    let unfinished: Vec<&Auction> = auctions.iter().filter(|a| is_unfinished(&a.status_name)).collect();

    for auction in unfinished {
        let section_cfg = Arc::new(spider.auction_sections.clone());
        let raw_sections = crawl_sections(pool, section_cfg, auction.id).await;
        let built = match build_batch(&raw_sections, &SECTION_DESCRIPTOR, Strictness::Lenient) {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(auction_id = auction.id, error = %e, "sweep: section batch build failed");
                continue;
            }
        };
        let sections: Vec<Section> = to_typed(built);
        if let Err(e) = store.upsert_sections(&sections).await {
            tracing::error!(auction_id = auction.id, error = %e, "sweep: section upsert failed");
        }
        let live_section_ids: Vec<i64> = sections.iter().map(|s| s.id).collect();
        if let Err(e) = store.sweep_finished_sections(auction.id, &live_section_ids).await {
            tracing::error!(auction_id = auction.id, error = %e, "sweep: section status sweep failed");
        }

        for section in &sections {
            let pigeon_cfg = Arc::new(spider.auction_pigeons.clone());
            let raw_pigeons = crawl_pigeons(pool, pigeon_cfg, auction.id, section.id).await;
            let built = match build_batch(&raw_pigeons, &PIGEON_DESCRIPTOR, Strictness::Lenient) {
                Ok(b) => b,
                Err(e) => {
                    tracing::error!(section_id = section.id, error = %e, "sweep: pigeon batch build failed");
                    continue;
                }
            };
            let pigeons: Vec<Pigeon> = to_typed(built);
            if let Err(e) = store.upsert_pigeons(&pigeons).await {
                tracing::error!(section_id = section.id, error = %e, "sweep: pigeon upsert failed");
            }
            let live_pigeon_ids: Vec<i64> = pigeons.iter().map(|p| p.id).collect();
            if let Err(e) = store.sweep_finished_pigeons(auction.id, &live_pigeon_ids).await {
                tracing::error!(section_id = section.id, error = %e, "sweep: pigeon status sweep failed");
            }
        }
    }
}

/// Runs `run_once` on a fixed cadence until `shutdown` fires. Spawned once at
/// startup alongside the reactive flow.
pub async fn run_loop(
    pool: Arc<CrawlerPool>,
    spider: SpiderConfig,
    store: Store,
    interval: Duration,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                tracing::info!("sweep: starting periodic pass");
                run_once(&pool, &spider, &store).await;
            }
            _ = shutdown.changed() => {
                tracing::debug!("sweep: shutdown signal received, exiting loop");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_marker_is_recognized() {
        assert!(!is_unfinished(&Some("已完成".to_string())));
        assert!(!is_unfinished(&Some("finished".to_string())));
    }

    #[test]
    fn absent_status_is_unfinished() {
        assert!(is_unfinished(&None));
    }

    #[test]
    fn running_status_is_unfinished() {
        assert!(is_unfinished(&Some("running".to_string())));
    }
}
