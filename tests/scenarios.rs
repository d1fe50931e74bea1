//! End-to-end literal-input scenarios, independent of any running database.

use std::time::Duration;

use pigeon_pulse::decoder::mqtt::encode_publish;
use pigeon_pulse::decoder::{decode, DecoderConfig, RawFrame, RawFrameData};
use pigeon_pulse::enrich::rank::rank_history;
use pigeon_pulse::models::domain::{Event, EventKind, HistoryRow};
use pigeon_pulse::orchestrator::debounce::Debouncer;
use pigeon_pulse::snapshot::SnapshotBus;

fn history_row(matcher: &str) -> HistoryRow {
    HistoryRow {
        matcher_name: Some(matcher.to_string()),
        name: None,
        foot_ring: None,
        quote: Some(1000.0),
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
fn scenario_heartbeat_drop() {
    let cfg = DecoderConfig::default();
    for byte0 in [0xC0u8, 0xD0u8] {
        let frame = RawFrame {
            url: "ws://x".into(),
            data: RawFrameData::Binary(vec![byte0, 0x00]),
        };
        assert!(decode(&frame, &cfg).is_none());
    }
}

#[test]
fn scenario_publish_decode() {
    let cfg = DecoderConfig::default();
    let raw = encode_publish(
        "pigeon/auctions/245/pigeons/187099",
        br#"{"bidid":1}"#,
        0,
    );
    let frame = RawFrame {
        url: "ws://x".into(),
        data: RawFrameData::Binary(raw),
    };
    let event: Event = decode(&frame, &cfg).expect("publish frame should decode");
    assert_eq!(event.kind, EventKind::MqttPublish);
    assert_eq!(
        event.topic.as_deref(),
        Some("pigeon/auctions/245/pigeons/187099")
    );
    assert_eq!(event.payload_preview.as_deref(), Some(r#"{"bidid":1}"#));
}

#[test]
fn scenario_ranking_orders_by_similarity_to_consignor() {
    let mut rows = vec![
        history_row("Li Ming"),
        history_row("li  ming"),
        history_row("Liu Ming"),
        history_row("Zhang"),
    ];

    rank_history(&mut rows, "Li Ming", 0.8);

    let order: Vec<&str> = rows
        .iter()
        .map(|r| r.matcher_name.as_deref().unwrap())
        .collect();
    assert_eq!(order, vec!["Li Ming", "li  ming", "Liu Ming", "Zhang"]);
    assert!(rows[0].match_exact);
}

#[tokio::test(start_paused = true)]
async fn scenario_debounce_drops_rapid_repeats_but_allows_after_cooldown() {
    let debouncer = Debouncer::new(Duration::from_secs(2));
    let pid = 187099;

    assert!(debouncer.should_run(pid));
    tokio::time::advance(Duration::from_millis(500)).await;
    assert!(!debouncer.should_run(pid));

    tokio::time::advance(Duration::from_millis(2_600)).await;
    assert!(debouncer.should_run(pid));
}

#[tokio::test(start_paused = true)]
async fn scenario_sse_keep_alive_with_no_publishes() {
    let bus = SnapshotBus::new();
    let mut rx = bus.subscribe();

    let first = SnapshotBus::wait_update(&mut rx, Duration::from_secs(16)).await;
    assert!(first.is_none(), "no publish occurred, wait_update should time out");
}
