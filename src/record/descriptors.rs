//! Concrete per-type descriptors, grounded on
//! `examples/original_source/mydataclass/record.py` (BidRecord's FIELD_MAPPING/
//! DEFAULTS/CONVERTERS) and the field lists in SPEC_FULL.md §3.

use serde_json::{json, Map, Value};

use crate::models::normalize;
use crate::record::pipeline::{Converter, DefaultFn, RecordDescriptor, Validator};

fn conv_ts(v: Value) -> Result<Value, String> {
    Ok(normalize::ts_to_seconds(v))
}
fn conv_float(v: Value) -> Result<Value, String> {
    Ok(normalize::to_float_or_absent(v))
}
fn conv_empty(v: Value) -> Result<Value, String> {
    Ok(normalize::empty_to_absent(v))
}

fn default_zero_i64() -> Value {
    json!(0)
}
fn default_null() -> Value {
    Value::Null
}

fn get_i64(row: &Map<String, Value>, key: &str) -> Option<i64> {
    row.get(key).and_then(Value::as_i64)
}
fn get_f64(row: &Map<String, Value>, key: &str) -> Option<f64> {
    row.get(key).and_then(Value::as_f64)
}

/// `end_ts >= start_ts` when both present. Shared across Auction/Section/Pigeon.
pub fn validate_ts_order(row: &Map<String, Value>) -> Result<(), String> {
    match (get_i64(row, "start_ts"), get_i64(row, "end_ts")) {
        (Some(s), Some(e)) if e < s => Err(format!("end_ts {e} < start_ts {s}")),
        _ => Ok(()),
    }
}

pub fn validate_start_price_nonneg(row: &Map<String, Value>) -> Result<(), String> {
    match get_f64(row, "start_price") {
        Some(p) if p < 0.0 => Err(format!("start_price {p} < 0")),
        _ => Ok(()),
    }
}

pub fn validate_margin_ratio(row: &Map<String, Value>) -> Result<(), String> {
    let quote = get_f64(row, "quote");
    let margin = get_f64(row, "margin");
    match (quote, margin) {
        (Some(q), Some(m)) if q != 0.0 => {
            let ratio = m / q;
            if !(0.0..=1.0).contains(&ratio) {
                Err(format!("margin_ratio {ratio} out of [0,1]"))
            } else {
                Ok(())
            }
        }
        _ => Ok(()),
    }
}

pub static AUCTION_DESCRIPTOR: RecordDescriptor = RecordDescriptor {
    name: "Auction",
    field_mapping: &[
        ("auctionId", "id"),
        ("auctionName", "name"),
        ("organizerName", "organizer_name"),
        ("organizerPhone", "organizer_phone"),
        ("customerServicePhone", "customer_service_phone"),
        ("startTs", "start_ts"),
        ("endTs", "end_ts"),
        ("statusName", "status_name"),
        ("liveStatusName", "live_status_name"),
    ],
    defaults: &[
        ("status_name", default_null as DefaultFn),
        ("live_status_name", default_null as DefaultFn),
    ],
    converters: &[
        ("start_ts", conv_ts as Converter),
        ("end_ts", conv_ts as Converter),
        ("status_name", conv_empty as Converter),
        ("organizer_name", conv_empty as Converter),
    ],
    validators: &[validate_ts_order as Validator],
    schema_keys: &[
        "id",
        "name",
        "organizer_name",
        "organizer_phone",
        "customer_service_phone",
        "start_ts",
        "end_ts",
        "status_name",
        "live_status_name",
    ],
};

pub static SECTION_DESCRIPTOR: RecordDescriptor = RecordDescriptor {
    name: "Section",
    field_mapping: &[
        ("sectionId", "id"),
        ("auctionId", "auction_id"),
        ("sectionName", "name"),
        ("matchId", "match_id"),
        ("startRank", "start_rank"),
        ("endRank", "end_rank"),
        ("sortType", "sort_type"),
        ("startPrice", "start_price"),
        ("createTs", "create_ts"),
        ("statusName", "status_name"),
    ],
    defaults: &[("count", default_zero_i64 as DefaultFn)],
    converters: &[
        ("start_price", conv_float as Converter),
        ("create_ts", conv_ts as Converter),
        ("status_name", conv_empty as Converter),
    ],
    validators: &[validate_start_price_nonneg as Validator],
    schema_keys: &[
        "id",
        "auction_id",
        "name",
        "match_id",
        "start_rank",
        "end_rank",
        "count",
        "sort_type",
        "start_price",
        "create_ts",
        "status_name",
    ],
};

pub static PIGEON_DESCRIPTOR: RecordDescriptor = RecordDescriptor {
    name: "Pigeon",
    field_mapping: &[
        ("pigeonId", "id"),
        ("pigeonCode", "code"),
        ("auctionId", "auction_id"),
        ("sectionId", "section_id"),
        ("pigeonName", "name"),
        ("footRing", "foot_ring"),
        ("footring", "foot_ring"),
        ("featherColor", "feather_color"),
        ("matcherName", "matcher_name"),
        ("startPrice", "start_price"),
        ("startTs", "start_ts"),
        ("endTs", "end_ts"),
        ("statusName", "status_name"),
        ("bidUserCode", "bid_user_code"),
        ("bidUserNickname", "bid_user_nickname"),
        ("bidQuote", "bid_quote"),
        ("bidTime", "bid_time"),
        ("orderNo", "order_no"),
        ("viewCount", "view_count"),
    ],
    defaults: &[("view_count", default_zero_i64 as DefaultFn)],
    converters: &[
        ("start_price", conv_float as Converter),
        ("bid_quote", conv_float as Converter),
        ("start_ts", conv_ts as Converter),
        ("end_ts", conv_ts as Converter),
        ("bid_time", conv_ts as Converter),
        ("foot_ring", conv_empty as Converter),
        ("matcher_name", conv_empty as Converter),
    ],
    validators: &[validate_ts_order as Validator, validate_start_price_nonneg as Validator],
    schema_keys: &[
        "id",
        "code",
        "auction_id",
        "section_id",
        "name",
        "foot_ring",
        "feather_color",
        "matcher_name",
        "start_price",
        "start_ts",
        "end_ts",
        "status_name",
        "bid_user_code",
        "bid_user_nickname",
        "bid_quote",
        "bid_time",
        "order_no",
        "view_count",
    ],
};

pub static BID_RECORD_DESCRIPTOR: RecordDescriptor = RecordDescriptor {
    name: "BidRecord",
    field_mapping: &[
        ("bidId", "id"),
        ("bidCode", "code"),
        ("auctionId", "auction_id"),
        ("pigeonId", "pigeon_id"),
        ("usercode", "user_code"),
        ("userCode", "user_code"),
        ("userId", "user_id"),
        ("userNickname", "user_nickname"),
        ("bidType", "type"),
        ("bidStatus", "status"),
        ("createTs", "create_ts"),
        ("updateTs", "update_ts"),
        ("cancelTs", "cancel_ts"),
        ("cancelReason", "cancel_reason"),
    ],
    defaults: &[("count", default_zero_i64 as DefaultFn)],
    converters: &[
        ("quote", conv_float as Converter),
        ("margin", conv_float as Converter),
        ("create_ts", conv_ts as Converter),
        ("update_ts", conv_ts as Converter),
        ("cancel_ts", conv_ts as Converter),
        ("user_code", conv_empty as Converter),
    ],
    validators: &[validate_margin_ratio as Validator],
    schema_keys: &[
        "id",
        "code",
        "auction_id",
        "pigeon_id",
        "quote",
        "margin",
        "type",
        "status",
        "user_id",
        "user_code",
        "user_nickname",
        "create_ts",
        "update_ts",
        "cancel_ts",
        "cancel_reason",
        "count",
    ],
};

/// Computes per-bidder `count` over the whole batch before records are typed,
/// mirroring `record.py`'s overridden `from_list` (a `Counter` over
/// `user_code`). Must run before converters drop the raw `usercode` key's
/// casing variants, so this operates on the raw JSON rows, not the built
/// records.
pub fn annotate_counts(raw_rows: &mut [Value]) {
    use std::collections::HashMap;
    let mut counts: HashMap<String, i64> = HashMap::new();
    for row in raw_rows.iter() {
        if let Some(code) = row
            .get("usercode")
            .or_else(|| row.get("userCode"))
            .or_else(|| row.get("user_code"))
            .and_then(Value::as_str)
        {
            *counts.entry(code.to_string()).or_insert(0) += 1;
        }
    }
    for row in raw_rows.iter_mut() {
        let code = row
            .get("usercode")
            .or_else(|| row.get("userCode"))
            .or_else(|| row.get("user_code"))
            .and_then(Value::as_str)
            .map(str::to_string);
        if let Some(code) = code {
            if let Some(obj) = row.as_object_mut() {
                obj.insert("count".to_string(), json!(counts.get(&code).copied().unwrap_or(0)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::pipeline::{build_batch, Strictness};

    #[test]
    fn bid_record_counts_are_annotated_per_batch() {
        let mut rows = vec![
            json!({"bidId": 1, "usercode": "A", "auctionId": 1, "pigeonId": 1, "quote": 10}),
            json!({"bidId": 2, "usercode": "A", "auctionId": 1, "pigeonId": 1, "quote": 20}),
            json!({"bidId": 3, "usercode": "B", "auctionId": 1, "pigeonId": 1, "quote": 30}),
        ];
        annotate_counts(&mut rows);
        let built = build_batch(&rows, &BID_RECORD_DESCRIPTOR, Strictness::Lenient).unwrap();
        let count_for = |id: i64| {
            built
                .iter()
                .find(|r| r.get("id").and_then(Value::as_i64) == Some(id))
                .and_then(|r| r.get("count"))
                .and_then(Value::as_i64)
                .unwrap()
        };
        assert_eq!(count_for(1), 2);
        assert_eq!(count_for(2), 2);
        assert_eq!(count_for(3), 1);
    }

    #[test]
    fn margin_ratio_validator_drops_bad_rows() {
        let rows = vec![json!({
            "bidId": 1, "auctionId": 1, "pigeonId": 1, "quote": 100, "margin": 200
        })];
        let built = build_batch(&rows, &BID_RECORD_DESCRIPTOR, Strictness::Lenient).unwrap();
        assert!(built.is_empty());
    }
}
</content>
