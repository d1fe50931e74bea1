//! Configuration loading.
//!
//! Layered like the reference backend's `Config::from_env`, but two layers
//! deep: `config/spider.yaml` + `config/db_config.yaml` provide the base
//! values, and the environment variables in SPEC_FULL.md §6 override
//! individual fields on top. Missing/unparseable config is a fatal startup
//! error per §7.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub url_template: String,
    #[serde(default)]
    pub params_template: HashMap<String, String>,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_pagesize")]
    pub pagesize: u32,
}

fn default_delay_ms() -> u64 {
    500
}
fn default_timeout_ms() -> u64 {
    15_000
}
fn default_max_retries() -> u32 {
    3
}
fn default_pagesize() -> u32 {
    50
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpiderConfig {
    pub gongpeng: EndpointConfig,
    pub auction_sections: EndpointConfig,
    pub auction_pigeons: EndpointConfig,
    pub current_pigeons: EndpointConfig,
    pub pid_pigeons: EndpointConfig,
    #[serde(default)]
    pub user_agents: Vec<String>,
    #[serde(default)]
    pub proxies: Vec<String>,
}

impl SpiderConfig {
    fn endpoints(&self) -> [&EndpointConfig; 5] {
        [
            &self.gongpeng,
            &self.auction_sections,
            &self.auction_pigeons,
            &self.current_pigeons,
            &self.pid_pigeons,
        ]
    }

    /// The crawler pool shares one `CrawlerSession` config across every slot
    /// (§4.F), but each endpoint carries its own `delay_ms`/`timeout_ms`/
    /// `max_retries`. Reconciles the five into one: the slowest timeout wins
    /// (no endpoint gets cut off early), the most cautious delay wins (never
    /// hammer a host at a rate meant for a stricter endpoint), and the
    /// highest retry budget wins.
    pub fn pooled_crawler_timing(&self) -> (u64, u64, u32) {
        let eps = self.endpoints();
        let delay_ms = eps.iter().map(|e| e.delay_ms).max().unwrap_or_else(default_delay_ms);
        let timeout_ms = eps.iter().map(|e| e.timeout_ms).max().unwrap_or_else(default_timeout_ms);
        let max_retries = eps.iter().map(|e| e.max_retries).max().unwrap_or_else(default_max_retries);
        (delay_ms, timeout_ms, max_retries)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DbConfig {
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

fn default_db_port() -> u16 {
    3306
}
fn default_pool_size() -> u32 {
    10
}

impl DbConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// Everything else: env-var-driven knobs with defaults, per SPEC_FULL.md §6.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub max_concurrency: usize,
    pub cooldown_sec: f64,
    pub bootstrap_pids: Vec<u64>,
    pub bootstrap_use_current: bool,
    pub debug: bool,
    pub sse_interval_ms: u64,
    pub queue_cap: usize,
    pub min_bin_len: usize,
    pub crawler_pool_size: usize,
    pub sweep_interval_sec: u64,
    pub context_csv_path: Option<String>,
    pub bind_addr: String,
}

impl FlowConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self {
            max_concurrency: env_parse("PIGEON_FLOW_MAX_CONCURRENCY", 4),
            cooldown_sec: env_parse("PIGEON_FLOW_COOLDOWN_SEC", 2.0),
            bootstrap_pids: std::env::var("PIGEON_BOOTSTRAP_PIDS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .filter_map(|s| s.trim().parse::<u64>().ok())
                        .collect()
                })
                .unwrap_or_default(),
            bootstrap_use_current: env_bool("PIGEON_BOOTSTRAP_USE_CURRENT", true),
            debug: env_bool("PIGEON_FLOW_DEBUG", false),
            sse_interval_ms: env_parse("PIGEON_SSE_INTERVAL_MS", 500),
            queue_cap: env_parse("QUEUE_CAP", 1024),
            min_bin_len: env_parse("MIN_BIN_LEN", 10),
            crawler_pool_size: env_parse("PIGEON_CRAWLER_POOL_SIZE", 4),
            sweep_interval_sec: env_parse("PIGEON_SWEEP_INTERVAL_SEC", 3600),
            context_csv_path: std::env::var("CONTEXT_CSV_PATH").ok(),
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "y"),
        Err(_) => default,
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub spider: SpiderConfig,
    pub db: DbConfig,
    pub flow: FlowConfig,
}

impl AppConfig {
    pub fn load(spider_path: &Path, db_path: &Path) -> Result<Self> {
        let spider_raw = std::fs::read_to_string(spider_path)
            .with_context(|| format!("reading spider config at {}", spider_path.display()))?;
        let spider: SpiderConfig = serde_yaml::from_str(&spider_raw)
            .with_context(|| format!("parsing spider config at {}", spider_path.display()))?;

        let db_raw = std::fs::read_to_string(db_path)
            .with_context(|| format!("reading db config at {}", db_path.display()))?;
        let db: DbConfig = serde_yaml::from_str(&db_raw)
            .with_context(|| format!("parsing db config at {}", db_path.display()))?;

        Ok(Self {
            spider,
            db,
            flow: FlowConfig::from_env(),
        })
    }
}
</content>
