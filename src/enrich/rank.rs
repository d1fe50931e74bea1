//! Name normalization, per-matcher aggregation, and the composite sort key,
//! grounded on `pigeon_bis_query.py`'s `_normalize_name` and
//! `_apply_custom_sort_rules_with_fuzzy`. The hyphen widen/narrow step is a
//! supplement named explicitly in SPEC_FULL.md §4.I; the source only
//! collapses whitespace and lower-cases.

use std::collections::HashMap;

use crate::enrich::similarity::{lcs_highlight_spans, ratio};
use crate::models::domain::HistoryRow;

const WIDE_HYPHENS: &[char] = &['－', '‐', '‑', '–', '—', '﹣'];

/// Collapses internal whitespace, trims, lower-cases, and narrows full-width
/// / typographic hyphen variants to ASCII `-` before comparison.
pub fn norm(s: &str) -> String {
    let narrowed: String = s
        .chars()
        .map(|c| if WIDE_HYPHENS.contains(&c) { '-' } else { c })
        .collect();
    narrowed.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

struct Agg {
    count: i64,
    total: f64,
}

fn aggregate_by_matcher(rows: &[HistoryRow]) -> HashMap<String, Agg> {
    let mut agg: HashMap<String, Agg> = HashMap::new();
    for row in rows {
        let key = row.matcher_name.as_deref().unwrap_or("").trim().to_string();
        let entry = agg.entry(key).or_insert(Agg { count: 0, total: 0.0 });
        entry.count += 1;
        entry.total += row.quote.unwrap_or(0.0);
    }
    agg
}

/// Populates `_match_*` / `_agg_*` fields on every row and sorts by
/// `(-exact, -hit, -score, -agg_count, -agg_total)`, stable within ties.
/// Returns the best score seen, for `BidRecord::match_score`.
pub fn rank_history(rows: &mut Vec<HistoryRow>, consignor_name: &str, threshold: f64) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let norm_consignor = norm(consignor_name);
    let agg = aggregate_by_matcher(rows);

    for row in rows.iter_mut() {
        let raw_matcher = row.matcher_name.as_deref().unwrap_or("").trim().to_string();
        let norm_matcher = norm(&raw_matcher);

        let score = if !norm_matcher.is_empty() && !norm_consignor.is_empty() {
            ratio(&norm_matcher, &norm_consignor)
        } else {
            0.0
        };
        let exact = !norm_matcher.is_empty() && norm_matcher == norm_consignor;
        let hit = score >= threshold;
        let spans = if !raw_matcher.is_empty() && !consignor_name.is_empty() {
            lcs_highlight_spans(&raw_matcher, consignor_name)
        } else {
            Vec::new()
        };

        row.match_score = score;
        row.match_exact = exact;
        row.match_hit = hit;
        row.match_spans = spans;

        let a = agg.get(&raw_matcher);
        row.agg_count = a.map(|a| a.count).unwrap_or(0);
        row.agg_total = a.map(|a| a.total).unwrap_or(0.0);
    }

    rows.sort_by(|a, b| {
        let key = |r: &HistoryRow| {
            (
                std::cmp::Reverse(r.match_exact),
                std::cmp::Reverse(r.match_hit),
                std::cmp::Reverse((r.match_score * 1e9) as i64),
                std::cmp::Reverse(r.agg_count),
                std::cmp::Reverse((r.agg_total * 1e2) as i64),
            )
        };
        key(a).cmp(&key(b))
    });

    rows.iter().map(|r| r.match_score).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(matcher: &str, quote: f64) -> HistoryRow {
        HistoryRow {
            matcher_name: Some(matcher.to_string()),
            name: None,
            foot_ring: None,
            quote: Some(quote),
            auction_id: None,
            status_name: None,
            match_score: 0.0,
            match_exact: false,
            match_hit: false,
            match_spans: Vec::new(),
            agg_count: 0,
            agg_total: 0.0,
        }
    }

    #[test]
    fn norm_collapses_whitespace_and_lowercases() {
        assert_eq!(norm("  Zhang   San  "), "zhang san");
    }

    #[test]
    fn norm_narrows_fullwidth_hyphen() {
        assert_eq!(norm("Li－Hua"), "li-hua");
    }

    #[test]
    fn exact_match_sorts_first() {
        let mut rows = vec![row("Someone Else", 10.0), row("Zhang San", 5.0)];
        rank_history(&mut rows, "Zhang San", 0.8);
        assert_eq!(rows[0].matcher_name.as_deref(), Some("Zhang San"));
        assert!(rows[0].match_exact);
    }

    #[test]
    fn ties_break_by_aggregate_count_then_total() {
        let mut rows = vec![row("Wang Wu", 10.0), row("Wang Wu", 20.0), row("Li Si", 5.0)];
        let best = rank_history(&mut rows, "Nobody", 0.8);
        assert_eq!(rows[0].matcher_name.as_deref(), Some("Wang Wu"));
        assert_eq!(rows[0].agg_count, 2);
        assert!(best >= 0.0);
    }

    #[test]
    fn empty_rows_returns_zero_score() {
        let mut rows: Vec<HistoryRow> = Vec::new();
        assert_eq!(rank_history(&mut rows, "anyone", 0.8), 0.0);
    }
}
