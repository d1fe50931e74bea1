//! SSE transport (§4.J), grounded on
//! `examples/original_source/pigeon_socket/sse_runner.py::_sse`: emit the
//! current snapshot immediately on connect, then stream updates with a
//! keep-alive comment on idle, and turn any setup failure into a single
//! `event: error` frame instead of a broken connection.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use crate::models::domain::Snapshot;
use crate::snapshot::bus::SnapshotBus;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);
const MIN_CLIENT_INTERVAL_MS: u64 = 50;
const DEFAULT_CLIENT_INTERVAL_MS: u64 = 500;

#[derive(Debug, Deserialize)]
struct SseParams {
    interval_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
struct ErrorPayload {
    code: &'static str,
    message: String,
    ts: i64,
}

enum SseItem {
    Bids(Snapshot),
    Error(ErrorPayload),
}

fn to_event(item: SseItem) -> Event {
    match item {
        SseItem::Bids(snap) => Event::default()
            .event("bids")
            .json_data(snap)
            .unwrap_or_else(|_| Event::default().event("error").data("{\"message\":\"serialization failed\"}")),
        SseItem::Error(err) => Event::default()
            .event("error")
            .json_data(err)
            .unwrap_or_else(|_| Event::default().event("error").data("{\"message\":\"error payload serialization failed\"}")),
    }
}

async fn sse_handler(
    State(bus): State<Arc<SnapshotBus>>,
    Query(params): Query<SseParams>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let requested = params.interval_ms.unwrap_or(DEFAULT_CLIENT_INTERVAL_MS);
    let interval_ms = requested.max(MIN_CLIENT_INTERVAL_MS);
    tracing::info!(requested_ms = requested, clamped_ms = interval_ms, "sse client interval");

    let rx = bus.subscribe();
    let initial = bus.peek();

    let initial_stream: std::pin::Pin<Box<dyn Stream<Item = SseItem> + Send>> = match initial {
        Some(snap) => Box::pin(stream::once(async move { SseItem::Bids(snap) })),
        None => Box::pin(stream::empty()),
    };

    let updates = stream::unfold(Some(rx), move |state| async move {
        let mut rx = state?;
        match rx.changed().await {
            Ok(()) => rx.borrow().clone().map(|snap| (SseItem::Bids(snap), Some(rx))),
            Err(_) => Some((
                SseItem::Error(ErrorPayload {
                    code: "bus_closed",
                    message: "snapshot bus shut down".to_string(),
                    ts: current_ts_ms(),
                }),
                None,
            )),
        }
    });

    let combined = initial_stream.chain(updates).map(|item| Ok(to_event(item)));

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

fn current_ts_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

async fn trigger_handler(State(bus): State<Arc<SnapshotBus>>) -> impl IntoResponse {
    use axum::http::StatusCode;
    use axum::Json;

    match bus.peek() {
        Some(snap) => (StatusCode::OK, Json(serde_json::to_value(snap).unwrap_or_default())),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "error": "no snapshot yet" })),
        ),
    }
}

async fn healthz() -> impl IntoResponse {
    axum::Json(serde_json::json!({ "ok": true }))
}

/// Router exposing `/sse/pigeon`, `/api/trigger`, and `/healthz`, permissive
/// CORS on GET per SPEC_FULL.md §4.J.
pub fn router(bus: Arc<SnapshotBus>) -> Router {
    Router::new()
        .route("/sse/pigeon", get(sse_handler))
        .route("/api/trigger", axum::routing::post(trigger_handler))
        .route("/healthz", get(healthz))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(bus)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_payload_serializes_with_code_and_ts() {
        let err = ErrorPayload {
            code: "bus_closed",
            message: "x".into(),
            ts: 123,
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["code"], "bus_closed");
        assert_eq!(v["ts"], 123);
    }
}
