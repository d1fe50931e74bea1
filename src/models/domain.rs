//! Domain types, per SPEC_FULL.md §3.
//!
//! These are the typed records the Data Model Runtime (`crate::record`)
//! constructs from raw JSON mappings. Field names match the wire/DB column
//! names directly so `serde_json::from_value` can deserialize the pipeline's
//! output without an extra rename layer.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: i64,
    pub name: String,
    pub organizer_name: Option<String>,
    pub organizer_phone: Option<String>,
    pub customer_service_phone: Option<String>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub status_name: Option<String>,
    pub live_status_name: Option<String>,
}

impl Auction {
    /// `end_ts >= start_ts` when both present.
    pub fn is_valid(&self) -> bool {
        match (self.start_ts, self.end_ts) {
            (Some(s), Some(e)) => e >= s,
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: i64,
    pub auction_id: i64,
    pub name: String,
    pub match_id: Option<i64>,
    pub start_rank: Option<i64>,
    pub end_rank: Option<i64>,
    pub count: Option<i64>,
    pub sort_type: Option<SortType>,
    pub start_price: Option<f64>,
    pub create_ts: Option<i64>,
    pub status_name: Option<String>,
}

impl Section {
    pub fn is_valid(&self) -> bool {
        let rank_ok = match (self.start_rank, self.end_rank) {
            (Some(s), Some(e)) => s <= e,
            _ => true,
        };
        let count_ok = self.count.map(|c| c >= 0).unwrap_or(true);
        let price_ok = self.start_price.map(|p| p >= 0.0).unwrap_or(true);
        rank_ok && count_ok && price_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pigeon {
    pub id: i64,
    pub code: String,
    pub auction_id: i64,
    pub section_id: i64,
    pub name: String,
    pub foot_ring: Option<String>,
    pub feather_color: Option<String>,
    pub matcher_name: Option<String>,
    pub start_price: Option<f64>,
    pub start_ts: Option<i64>,
    pub end_ts: Option<i64>,
    pub status_name: Option<String>,
    pub bid_user_code: Option<String>,
    pub bid_user_nickname: Option<String>,
    pub bid_quote: Option<f64>,
    pub bid_time: Option<i64>,
    pub order_no: Option<String>,
    pub view_count: i64,
}

impl Pigeon {
    pub fn is_valid(&self) -> bool {
        let ts_ok = match (self.start_ts, self.end_ts) {
            (Some(s), Some(e)) => e >= s,
            _ => true,
        };
        let price_ok = self.start_price.map(|p| p >= 0.0).unwrap_or(true);
        ts_ok && price_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRow {
    pub matcher_name: Option<String>,
    pub name: Option<String>,
    pub foot_ring: Option<String>,
    pub quote: Option<f64>,
    pub auction_id: Option<i64>,
    pub status_name: Option<String>,

    #[serde(default, rename = "_match_score")]
    pub match_score: f64,
    #[serde(default, rename = "_match_exact")]
    pub match_exact: bool,
    #[serde(default, rename = "_match_hit")]
    pub match_hit: bool,
    #[serde(default, rename = "_match_spans")]
    pub match_spans: Vec<(usize, usize)>,
    #[serde(default, rename = "_agg_count")]
    pub agg_count: i64,
    #[serde(default, rename = "_agg_total")]
    pub agg_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidRecord {
    pub id: i64,
    pub code: Option<String>,
    pub auction_id: i64,
    pub pigeon_id: i64,
    pub quote: f64,
    pub margin: Option<f64>,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
    pub user_id: Option<i64>,
    pub user_code: Option<String>,
    pub user_nickname: Option<String>,
    pub create_ts: Option<i64>,
    pub update_ts: Option<i64>,
    pub cancel_ts: Option<i64>,
    pub cancel_reason: Option<String>,

    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub results: HashMap<String, Vec<HistoryRow>>,
    #[serde(default)]
    pub auction_bid_count: i64,
    #[serde(default)]
    pub auction_total_price: f64,
    #[serde(default)]
    pub auction_highest_price: Option<f64>,
    #[serde(default)]
    pub auction_second_highest_price: Option<f64>,
    #[serde(default)]
    pub auction_bid_count_all: i64,
    #[serde(default)]
    pub auction_total_price_all: f64,
    #[serde(default)]
    pub auction_highest_price_all: Option<f64>,
    #[serde(default)]
    pub auction_second_highest_price_all: Option<f64>,
    #[serde(default)]
    pub match_score: f64,
}

impl BidRecord {
    /// `start_price` validator doesn't apply here (lives on Pigeon); this enforces
    /// `margin_ratio = margin/quote in [0,1]` when both are present, per SPEC_FULL.md §3.
    pub fn is_valid(&self) -> bool {
        match self.margin {
            Some(m) if self.quote != 0.0 => {
                let ratio = m / self.quote;
                (0.0..=1.0).contains(&ratio)
            }
            _ => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MqttPublish,
    Binary,
    WsText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub ts: i64,
    pub kind: EventKind,
    pub url: String,
    pub topic: Option<String>,
    pub payload_preview: Option<String>,
    pub length: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRow {
    pub ring: String,
    pub name: String,
    pub phone: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentLot {
    pub id: i64,
    pub footring: Option<String>,
    pub matchername: Option<String>,
    pub content: Option<ContextRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub schema_version: &'static str,
    pub ts: i64,
    pub current_id: Option<CurrentLot>,
    pub items: Vec<BidRecord>,
}

impl Snapshot {
    pub fn new(ts: i64, current_id: Option<CurrentLot>, items: Vec<BidRecord>) -> Self {
        Self {
            kind: "pigeon/bids",
            schema_version: "1.0",
            ts,
            current_id,
            items,
        }
    }
}
</content>
