//! Realizes the out-of-scope "browser pushes `{url,kind,data}`" interface
//! (SPEC_FULL.md §6) as an inbound WebSocket endpoint: the browser-automation
//! layer connects here and streams one JSON frame per message.
//!
//! Grounded on the client-loop idiom in
//! `examples/cooprefr-bettersys/.../scrapers/polymarket_ws.rs`, adapted from
//! an outbound `connect_async` client to an inbound axum server handler,
//! since this system is the receiving end of the socket the spec describes.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use base64::Engine;
use serde::Deserialize;

use crate::bus::Trigger;
use crate::decoder::{RawFrame, RawFrameData};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireKind {
    Text,
    Binary,
}

#[derive(Debug, Deserialize)]
struct WireFrame {
    url: String,
    kind: WireKind,
    data: String,
}

pub async fn ws_ingest_handler(
    ws: WebSocketUpgrade,
    State(trigger): State<Arc<Trigger>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, trigger))
}

async fn handle_socket(mut socket: WebSocket, trigger: Arc<Trigger>) {
    while let Some(msg) = socket.recv().await {
        let msg = match msg {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "ingest socket read error, closing");
                break;
            }
        };
        match msg {
            Message::Text(text) => {
                if let Some(frame) = parse_wire_frame(&text) {
                    trigger.push_frame(frame).await;
                } else {
                    tracing::debug!("dropping unparseable ingest frame");
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

fn parse_wire_frame(text: &str) -> Option<RawFrame> {
    let wire: WireFrame = serde_json::from_str(text).ok()?;
    let data = match wire.kind {
        WireKind::Text => RawFrameData::Text(wire.data),
        WireKind::Binary => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(wire.data)
                .ok()?;
            RawFrameData::Binary(bytes)
        }
    };
    Some(RawFrame { url: wire.url, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_base64_binary_frame() {
        let payload = base64::engine::general_purpose::STANDARD.encode([0xC0, 0x00]);
        let text = format!(r#"{{"url":"ws://x","kind":"binary","data":"{payload}"}}"#);
        let frame = parse_wire_frame(&text).unwrap();
        match frame.data {
            RawFrameData::Binary(b) => assert_eq!(b, vec![0xC0, 0x00]),
            _ => panic!("expected binary"),
        }
    }

    #[test]
    fn parses_text_frame() {
        let text = r#"{"url":"ws://x","kind":"text","data":"hello"}"#;
        let frame = parse_wire_frame(text).unwrap();
        match frame.data {
            RawFrameData::Text(s) => assert_eq!(s, "hello"),
            _ => panic!("expected text"),
        }
    }
}
</content>
