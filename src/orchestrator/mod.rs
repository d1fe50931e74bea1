//! Flow Orchestrator (§4.K): wires the crawler pool, record pipeline,
//! enrichment engine and snapshot bus into the one reactive chain the
//! system exists to run, plus the startup hook and periodic sweep that
//! bookend it. Grounded on
//! `examples/original_source/sniffer/flows/pigeon_handlers.py` and
//! `pigeon_flow.py`.

pub mod context;
pub mod debounce;
pub mod sweep;

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::bus::trigger::{StartupHook, Trigger};
use crate::config::{AppConfig, EndpointConfig};
use crate::crawler::CrawlerPool;
use crate::enrich;
use crate::models::domain::{BidRecord, CurrentLot, Snapshot};
use crate::record::{build_batch, BID_RECORD_DESCRIPTOR};
use crate::record::pipeline::Strictness;
use crate::snapshot::SnapshotBus;
use crate::store::Store;

use context::ContextMap;
use debounce::Debouncer;

pub const TOPIC_PATTERN: &str = r"^pigeon/auctions/(?P<auction>\d+)/pigeons/(?P<pigeon>\d+)$";

pub struct FlowOrchestrator {
    crawler_pool: Arc<CrawlerPool>,
    store: Arc<Store>,
    bus: Arc<SnapshotBus>,
    current_cfg: Arc<EndpointConfig>,
    ledger_cfg: Arc<EndpointConfig>,
    context: ContextMap,
    debouncer: Debouncer,
    fuzzy_threshold: f64,
}

fn current_ts_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn typed_bid_records(raw_rows: &[Value]) -> Vec<BidRecord> {
    let built = match build_batch(raw_rows, &BID_RECORD_DESCRIPTOR, Strictness::Lenient) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "bid-record batch build failed");
            return Vec::new();
        }
    };
    built
        .into_iter()
        .filter_map(|m| match serde_json::from_value(Value::Object(m)) {
            Ok(rec) => Some(rec),
            Err(e) => {
                tracing::warn!(error = %e, "dropping bid record that failed typed conversion");
                None
            }
        })
        .collect()
}

impl FlowOrchestrator {
    pub fn new(
        crawler_pool: Arc<CrawlerPool>,
        store: Arc<Store>,
        bus: Arc<SnapshotBus>,
        app_cfg: &AppConfig,
    ) -> Self {
        let context = context::load(app_cfg.flow.context_csv_path.as_deref());
        Self {
            crawler_pool,
            store,
            bus,
            current_cfg: Arc::new(app_cfg.spider.current_pigeons.clone()),
            ledger_cfg: Arc::new(app_cfg.spider.pid_pigeons.clone()),
            context,
            debouncer: Debouncer::new(Duration::from_secs_f64(app_cfg.flow.cooldown_sec)),
            fuzzy_threshold: enrich::DEFAULT_FUZZY_THRESHOLD,
        }
    }

    /// `crawler_pool.run_current_once() -> annotate_counts -> build_batch ->
    /// enrich() -> Snapshot -> bus.publish()`. Shared by the reactive handler
    /// and the startup hook; the only difference between the two is the
    /// debounce check each wraps this in.
    async fn run_chain(&self) -> anyhow::Result<()> {
        let Some((info, mut raw_ledger)) = self
            .crawler_pool
            .run_current_once(Arc::clone(&self.current_cfg), Arc::clone(&self.ledger_cfg))
            .await
        else {
            tracing::debug!("no current lot, nothing to publish this round");
            return Ok(());
        };

        crate::record::annotate_counts(&mut raw_ledger);
        let mut records = typed_bid_records(&raw_ledger);

        let auction_id = records.first().map(|r| r.auction_id).unwrap_or(0);
        let consignor_name = info.matchername.clone().unwrap_or_default();

        records = enrich::enrich(records, &consignor_name, &self.store, auction_id, self.fuzzy_threshold).await;

        let content = info
            .footring
            .as_deref()
            .and_then(|ring| context::lookup(&self.context, ring))
            .cloned();

        let current_id = Some(CurrentLot {
            id: info.id,
            footring: info.footring,
            matchername: info.matchername,
            content,
        });

        let snapshot = Snapshot::new(current_ts_ms(), current_id, records);
        self.bus.publish(snapshot);
        Ok(())
    }

    /// Reactive entry point: debounced per pid.
    pub async fn handle_pigeon_event(&self, pid: i64) -> anyhow::Result<()> {
        if !self.debouncer.should_run(pid) {
            tracing::debug!(pid, "dropped: inside debounce cooldown");
            return Ok(());
        }
        self.run_chain().await
    }

    /// Startup entry point: same chain, no debounce, so the first SSE
    /// subscriber always has something to see.
    pub async fn run_startup(&self) -> anyhow::Result<()> {
        self.run_chain().await
    }
}

/// Registers the reactive handler and the startup hook on `trigger`.
pub async fn register(trigger: &Arc<Trigger>, orchestrator: Arc<FlowOrchestrator>) -> anyhow::Result<()> {
    let handler_orchestrator = Arc::clone(&orchestrator);
    trigger
        .on_topic(
            TOPIC_PATTERN,
            Arc::new(move |topic_match| {
                let orchestrator = Arc::clone(&handler_orchestrator);
                Box::pin(async move {
                    let pid = topic_match
                        .captures
                        .get("pigeon")
                        .and_then(|s| s.parse::<i64>().ok());
                    match pid {
                        Some(pid) => orchestrator.handle_pigeon_event(pid).await,
                        None => {
                            tracing::warn!("topic matched but pigeon capture group failed to parse");
                            Ok(())
                        }
                    }
                })
            }),
        )
        .await?;

    let startup_hook: StartupHook = Arc::new(move || {
        let orchestrator = Arc::clone(&orchestrator);
        Box::pin(async move { orchestrator.run_startup().await })
    });
    trigger.on_startup(startup_hook).await;
    Ok(())
}
