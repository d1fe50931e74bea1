//! HTTP Crawler Base, per §4.D.
//!
//! Grounded on `examples/original_source/commons/base_crawler.py`: same
//! throttle formula, retry/backoff policy, session-recreation triggers and
//! hook shape. Runs exclusively on its slot's dedicated thread (see
//! `crawler::pool`), so interior mutability here uses `RefCell`/`Cell`
//! rather than a lock — there is never more than one caller.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

const RETRY_STATUS: &[u16] = &[408, 421, 429, 500, 502, 503, 504];
const BLOCK_STATUS: &[u16] = &[403, 429, 503];

pub struct CrawlerConfig {
    pub base_headers: HashMap<String, String>,
    pub proxies: Vec<String>,
    pub user_agents: Vec<String>,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub timeout: Duration,
    pub max_retries: u32,
    pub backoff_factor: f64,
    pub recreate_session_on_block: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_headers: HashMap::new(),
            proxies: Vec::new(),
            user_agents: Vec::new(),
            min_delay: Duration::from_millis(500),
            max_delay: Duration::from_millis(3000),
            timeout: Duration::from_secs(15),
            max_retries: 3,
            backoff_factor: 0.5,
            recreate_session_on_block: true,
        }
    }
}

pub struct CrawlerSession {
    config: CrawlerConfig,
    client: RefCell<Client>,
    last_request_ts: Cell<Instant>,
}

impl CrawlerSession {
    pub fn new(config: CrawlerConfig) -> Self {
        let client = build_client(&config);
        Self {
            config,
            client: RefCell::new(client),
            last_request_ts: Cell::new(Instant::now() - Duration::from_secs(3600)),
        }
    }

    fn recreate_session(&self) {
        let new_client = build_client(&self.config);
        *self.client.borrow_mut() = new_client;
    }

    fn throttle(&self) {
        let elapsed = self.last_request_ts.get().elapsed();
        let wait_min = self.config.min_delay.saturating_sub(elapsed);
        let jitter = if self.config.max_delay > self.config.min_delay {
            let span = (self.config.max_delay - self.config.min_delay).as_secs_f64();
            Duration::from_secs_f64(rand::thread_rng().gen_range(0.0..span))
        } else {
            Duration::ZERO
        };
        let sleep_for = wait_min + jitter;
        if !sleep_for.is_zero() {
            std::thread::sleep(sleep_for);
        }
    }

    fn pick_user_agent(&self) -> Option<&str> {
        self.config
            .user_agents
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    fn pick_proxy(&self) -> Option<&str> {
        self.config
            .proxies
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
    }

    /// GET with retry/backoff/throttle/UA rotation. Returns `None` ("absent
    /// response") once the retry policy is exhausted; never panics across
    /// the API boundary.
    pub fn fetch(
        &self,
        url: &str,
        params: &[(&str, &str)],
        allow_status: &[u16],
    ) -> Option<Response> {
        self.request("GET", url, params, None, allow_status)
    }

    pub fn fetch_post(
        &self,
        url: &str,
        json_body: Option<&serde_json::Value>,
        allow_status: &[u16],
    ) -> Option<Response> {
        self.request("POST", url, &[], json_body, allow_status)
    }

    fn request(
        &self,
        method: &str,
        url: &str,
        params: &[(&str, &str)],
        json_body: Option<&serde_json::Value>,
        allow_status: &[u16],
    ) -> Option<Response> {
        let mut attempt = 0u32;
        let result = loop {
            self.throttle();

            let ua = self.pick_user_agent().map(str::to_string);
            let proxy = self.pick_proxy().map(str::to_string);

            let outcome = {
                let client = self.client.borrow();
                let mut builder = match method {
                    "GET" => client.get(url),
                    "POST" => client.post(url),
                    other => unreachable!("unsupported method {other}"),
                };
                for (k, v) in &self.config.base_headers {
                    builder = builder.header(k, v);
                }
                if let Some(ua) = &ua {
                    builder = builder.header("User-Agent", ua);
                }
                if !params.is_empty() {
                    builder = builder.query(params);
                }
                if let Some(body) = json_body {
                    builder = builder.json(body);
                }
                builder.timeout(self.config.timeout).send()
            };
            self.last_request_ts.set(Instant::now());

            match outcome {
                Ok(resp) => {
                    let status = resp.status();
                    let ok = status.is_success() || allow_status.contains(&status.as_u16());
                    if ok {
                        break Some(resp);
                    }
                    tracing::warn!(method, url, status = status.as_u16(), "bad status");
                    if self.config.recreate_session_on_block
                        && BLOCK_STATUS.contains(&status.as_u16())
                    {
                        self.recreate_session();
                    }
                    if RETRY_STATUS.contains(&status.as_u16()) && attempt < self.config.max_retries
                    {
                        backoff_sleep(&resp, attempt, self.config.backoff_factor);
                        attempt += 1;
                        continue;
                    }
                    break None;
                }
                Err(e) => {
                    tracing::warn!(method, url, error = %e, "transport error");
                    if self.config.recreate_session_on_block {
                        self.recreate_session();
                    }
                    if attempt < self.config.max_retries {
                        std::thread::sleep(backoff_duration(attempt, self.config.backoff_factor));
                        attempt += 1;
                        continue;
                    }
                    break None;
                }
            }
        };
        result
    }
}

fn build_client(config: &CrawlerConfig) -> Client {
    Client::builder()
        .timeout(config.timeout)
        .build()
        .unwrap_or_else(|_| Client::new())
}

fn backoff_duration(attempt: u32, factor: f64) -> Duration {
    Duration::from_secs_f64(factor * 2f64.powi(attempt as i32))
}

fn backoff_sleep(resp: &Response, attempt: u32, factor: f64) {
    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs);
    std::thread::sleep(retry_after.unwrap_or_else(|| backoff_duration(attempt, factor)));
}

/// Sanity helper so callers don't need to depend on `reqwest::StatusCode` directly.
pub fn is_retryable_status(code: u16) -> bool {
    RETRY_STATUS.contains(&code) || StatusCode::from_u16(code).is_err()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_never_panics_on_equal_min_max() {
        let cfg = CrawlerConfig {
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(10),
            ..Default::default()
        };
        let session = CrawlerSession::new(cfg);
        let start = Instant::now();
        session.throttle();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn retryable_status_set_matches_spec() {
        for code in [408, 421, 429, 500, 502, 503, 504] {
            assert!(is_retryable_status(code));
        }
        assert!(!is_retryable_status(404));
    }
}
</content>
