//! Pigeon Pulse: taps a site's MQTT-over-WebSocket bid stream, enriches it
//! against deal history, and republishes a ranked snapshot over SSE.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;

use pigeon_pulse::bus::{DropHeadQueue, Trigger};
use pigeon_pulse::config::AppConfig;
use pigeon_pulse::crawler::{CrawlerConfig, CrawlerPool};
use pigeon_pulse::decoder::DecoderConfig;
use pigeon_pulse::ingest::ws_ingest_handler;
use pigeon_pulse::orchestrator::{self, FlowOrchestrator};
use pigeon_pulse::snapshot::SnapshotBus;
use pigeon_pulse::store::Store;

#[derive(Parser, Debug)]
#[command(name = "pigeon-pulse", about = "Live pigeon-auction bid snapshot service")]
struct Cli {
    #[arg(long, env = "SPIDER_CONFIG_PATH", default_value = "config/spider.yaml")]
    spider_config: PathBuf,

    #[arg(long, env = "DB_CONFIG_PATH", default_value = "config/db_config.yaml")]
    db_config: PathBuf,
}

fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    tracing::info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let app_cfg = AppConfig::load(&cli.spider_config, &cli.db_config)
        .context("loading configuration")?;

    let store = Arc::new(Store::connect(&app_cfg.db).await.context("connecting to store")?);

    let (delay_ms, timeout_ms, max_retries) = app_cfg.spider.pooled_crawler_timing();
    tracing::info!(delay_ms, timeout_ms, max_retries, "resolved pooled crawler timing");
    let crawler_cfg_factory = {
        let spider = app_cfg.spider.clone();
        move || CrawlerConfig {
            user_agents: spider.user_agents.clone(),
            proxies: spider.proxies.clone(),
            min_delay: std::time::Duration::from_millis(delay_ms),
            max_delay: std::time::Duration::from_millis(delay_ms + 2500),
            timeout: std::time::Duration::from_millis(timeout_ms),
            max_retries,
            ..CrawlerConfig::default()
        }
    };
    let crawler_pool = CrawlerPool::new(app_cfg.flow.crawler_pool_size, crawler_cfg_factory);

    let queue = DropHeadQueue::new(app_cfg.flow.queue_cap);
    let decoder_cfg = DecoderConfig {
        min_bin_len: app_cfg.flow.min_bin_len,
        surface_binary: true,
        surface_text: false,
    };
    let trigger = Trigger::new(queue, decoder_cfg, app_cfg.flow.max_concurrency);

    let bus = Arc::new(SnapshotBus::new());
    let flow = Arc::new(FlowOrchestrator::new(
        Arc::clone(&crawler_pool),
        Arc::clone(&store),
        Arc::clone(&bus),
        &app_cfg,
    ));
    orchestrator::register(&trigger, Arc::clone(&flow))
        .await
        .context("registering orchestrator topic handler")?;

    let worker_handles = trigger.spawn_workers();
    trigger.run_startup_hooks().await;

    let (sweep_shutdown_tx, sweep_shutdown_rx) = tokio::sync::watch::channel(false);
    let sweep_handle = tokio::spawn(orchestrator::sweep::run_loop(
        Arc::clone(&crawler_pool),
        app_cfg.spider.clone(),
        (*store).clone(),
        std::time::Duration::from_secs(app_cfg.flow.sweep_interval_sec),
        sweep_shutdown_rx,
    ));

    let app = Router::new()
        .route("/ws/ingest", axum::routing::get(ws_ingest_handler))
        .with_state(Arc::clone(&trigger))
        .merge(pigeon_pulse::snapshot::router(Arc::clone(&bus)))
        .layer(axum::middleware::from_fn(
            pigeon_pulse::middleware::request_logging_simple,
        ))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&app_cfg.flow.bind_addr)
        .await
        .with_context(|| format!("binding {}", app_cfg.flow.bind_addr))?;
    tracing::info!(addr = %app_cfg.flow.bind_addr, "pigeon-pulse listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    tracing::info!("shutting down");
    let _ = sweep_shutdown_tx.send(true);
    trigger.shutdown().await;
    for h in worker_handles {
        let _ = h.await;
    }
    let _ = sweep_handle.await;
    crawler_pool.close().await;

    Ok(())
}
