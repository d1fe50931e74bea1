//! Deal-history query (§4.H `query_bid_statistics_and_deals`), grounded on
//! `examples/original_source/sniffer/pigeon_pids_query/pigeon_bis_query.py`'s
//! use of a bid-history lookup by user code, with the eight-aggregate
//! statistics shape specified fresh from SPEC_FULL.md §4.H prose (no
//! retrieved original implementation computes these aggregates).

use std::collections::HashMap;

use serde::Deserialize;
use sqlx::MySqlPool;

use crate::error::StoreError;
use crate::models::domain::HistoryRow;

const DEFAULT_CHUNK_SIZE: usize = 100;
const DEFAULT_WHITELIST: &[&str] = &["completed", "settled"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BidStatistics {
    pub deal_count: i64,
    pub total_price: f64,
    pub highest_price: Option<f64>,
    pub second_highest_price: Option<f64>,
    pub deal_count_all: i64,
    pub total_price_all: f64,
    pub highest_price_all: Option<f64>,
    pub second_highest_price_all: Option<f64>,
}

#[derive(sqlx::FromRow)]
struct DealRow {
    matcher_name: Option<String>,
    name: Option<String>,
    foot_ring: Option<String>,
    quote: Option<f64>,
    auction_id: Option<i64>,
    status_name: Option<String>,
    user_code: String,
}

/// Folds one quote into the running top-two, without a sort.
fn fold_top_two(highest: &mut Option<f64>, second: &mut Option<f64>, quote: f64) {
    match *highest {
        None => *highest = Some(quote),
        Some(h) if quote >= h => {
            *second = Some(h);
            *highest = Some(quote);
        }
        Some(h) => {
            if quote < h && second.map(|s| quote > s).unwrap_or(true) {
                *second = Some(quote);
            }
        }
    }
}

fn chunked(items: &[String], size: usize) -> impl Iterator<Item = &[String]> {
    items.chunks(size.max(1))
}

/// Returns `(statistics, deals)` keyed by `user_code`. `deals[code]` is sorted
/// by `quote DESC`; `statistics[code]` carries the eight aggregates described
/// in SPEC_FULL.md §4.H, the current-auction ones restricted to `auction_id`.
pub async fn query_bid_statistics_and_deals(
    pool: &MySqlPool,
    user_codes: &[String],
    auction_id: i64,
    status_whitelist: Option<&[&str]>,
    chunk_size: Option<usize>,
) -> Result<(HashMap<String, BidStatistics>, HashMap<String, Vec<HistoryRow>>), StoreError> {
    let whitelist = status_whitelist.unwrap_or(DEFAULT_WHITELIST);
    let mut deals: HashMap<String, Vec<HistoryRow>> = HashMap::new();
    let mut raw_quotes: HashMap<String, Vec<(i64, f64)>> = HashMap::new();

    for chunk in chunked(user_codes, chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE)) {
        if chunk.is_empty() {
            continue;
        }
        let code_placeholders = chunk.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let status_placeholders = whitelist.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT p.matcher_name, p.name, p.foot_ring, b.quote, b.auction_id, \
             b.status AS status_name, b.user_code \
             FROM bid_records b JOIN pigeons p ON b.pigeon_id = p.id \
             WHERE b.user_code IN ({code_placeholders}) AND b.status IN ({status_placeholders}) \
             ORDER BY b.quote DESC"
        );
        let mut query = sqlx::query_as::<_, DealRow>(&sql);
        for code in chunk {
            query = query.bind(code);
        }
        for status in whitelist {
            query = query.bind(*status);
        }
        let rows = query.fetch_all(pool).await?;
        for row in rows {
            let quote = row.quote.unwrap_or(0.0);
            raw_quotes
                .entry(row.user_code.clone())
                .or_default()
                .push((row.auction_id.unwrap_or(0), quote));
            deals.entry(row.user_code.clone()).or_default().push(HistoryRow {
                matcher_name: row.matcher_name,
                name: row.name,
                foot_ring: row.foot_ring,
                quote: row.quote,
                auction_id: row.auction_id,
                status_name: row.status_name,
                match_score: 0.0,
                match_exact: false,
                match_hit: false,
                match_spans: Vec::new(),
                agg_count: 0,
                agg_total: 0.0,
            });
        }
    }

    let mut statistics = HashMap::new();
    for (code, quotes) in &raw_quotes {
        let mut stats = BidStatistics::default();
        for (qid, quote) in quotes {
            stats.deal_count_all += 1;
            stats.total_price_all += quote;
            fold_top_two(&mut stats.highest_price_all, &mut stats.second_highest_price_all, *quote);
            if *qid == auction_id {
                stats.deal_count += 1;
                stats.total_price += quote;
                fold_top_two(&mut stats.highest_price, &mut stats.second_highest_price, *quote);
            }
        }
        statistics.insert(code.clone(), stats);
    }

    Ok((statistics, deals))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_two_folds_without_sorting() {
        let mut highest = None;
        let mut second = None;
        for q in [30.0, 10.0, 50.0, 20.0, 50.0] {
            fold_top_two(&mut highest, &mut second, q);
        }
        assert_eq!(highest, Some(50.0));
        assert_eq!(second, Some(50.0));
    }

    #[test]
    fn top_two_with_single_value() {
        let mut highest = None;
        let mut second = None;
        fold_top_two(&mut highest, &mut second, 42.0);
        assert_eq!(highest, Some(42.0));
        assert_eq!(second, None);
    }
}
