//! Turns a raw `{url, kind, data}` frame (SPEC_FULL.md §6) into a domain
//! `Event`, per §4.A.

use crate::decoder::mqtt::{self, PUBLISH_TYPE};
use crate::models::{Event, EventKind};

#[derive(Debug, Clone)]
pub enum RawFrameData {
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct RawFrame {
    pub url: String,
    pub data: RawFrameData,
}

#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub min_bin_len: usize,
    pub surface_binary: bool,
    pub surface_text: bool,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            min_bin_len: 10,
            surface_binary: false,
            surface_text: false,
        }
    }
}

fn lenient_utf8_preview(bytes: &[u8], max_len: usize) -> String {
    let slice = &bytes[..bytes.len().min(max_len)];
    String::from_utf8_lossy(slice).trim().to_string()
}

fn now_ts() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Decodes a raw frame into an `Event`, or returns `None` to drop it silently
/// (heartbeats, too-short buffers, un-surfaced frame kinds).
pub fn decode(frame: &RawFrame, cfg: &DecoderConfig) -> Option<Event> {
    match &frame.data {
        RawFrameData::Binary(buf) => decode_binary(&frame.url, buf, cfg),
        RawFrameData::Text(text) => {
            if !cfg.surface_text {
                return None;
            }
            let preview: String = text.chars().take(256).collect();
            Some(Event {
                ts: now_ts(),
                kind: EventKind::WsText,
                url: frame.url.clone(),
                topic: None,
                payload_preview: Some(preview),
                length: Some(text.len()),
            })
        }
    }
}

fn decode_binary(url: &str, buf: &[u8], cfg: &DecoderConfig) -> Option<Event> {
    if mqtt::is_heartbeat(buf) {
        tracing::debug!(url, "dropping mqtt heartbeat frame");
        return None;
    }
    if buf.len() < cfg.min_bin_len {
        tracing::debug!(url, len = buf.len(), min = cfg.min_bin_len, "frame too short, dropping");
        return None;
    }

    let high_nibble = buf[0] >> 4;
    if high_nibble == PUBLISH_TYPE {
        return match mqtt::decode_publish(buf) {
            Ok(publish) => Some(Event {
                ts: now_ts(),
                kind: EventKind::MqttPublish,
                url: url.to_string(),
                topic: Some(publish.topic),
                payload_preview: Some(lenient_utf8_preview(&publish.payload, 64)),
                length: Some(publish.payload.len()),
            }),
            Err(e) => {
                tracing::debug!(url, error = %e, "malformed mqtt publish frame, dropping");
                None
            }
        };
    }

    if cfg.surface_binary {
        Some(Event {
            ts: now_ts(),
            kind: EventKind::Binary,
            url: url.to_string(),
            topic: None,
            payload_preview: None,
            length: Some(buf.len()),
        })
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::mqtt::encode_publish;

    #[test]
    fn heartbeats_drop_even_when_short_buffer_allowed() {
        let cfg = DecoderConfig {
            min_bin_len: 1,
            ..Default::default()
        };
        let frame = RawFrame {
            url: "ws://x".into(),
            data: RawFrameData::Binary(vec![0xC0, 0x00]),
        };
        assert!(decode(&frame, &cfg).is_none());
    }

    #[test]
    fn short_non_heartbeat_buffer_drops() {
        let cfg = DecoderConfig::default();
        let frame = RawFrame {
            url: "ws://x".into(),
            data: RawFrameData::Binary(vec![0x30, 0x02, 0x00, 0x01]),
        };
        assert!(decode(&frame, &cfg).is_none());
    }

    #[test]
    fn publish_decodes_to_mqtt_event() {
        let cfg = DecoderConfig::default();
        let raw = encode_publish("pigeon/auctions/245/pigeons/187099", br#"{"bidid":1}"#, 0);
        let frame = RawFrame {
            url: "ws://x".into(),
            data: RawFrameData::Binary(raw),
        };
        let event = decode(&frame, &cfg).expect("should decode");
        assert_eq!(event.kind, EventKind::MqttPublish);
        assert_eq!(event.topic.as_deref(), Some("pigeon/auctions/245/pigeons/187099"));
        assert_eq!(event.payload_preview.as_deref(), Some(r#"{"bidid":1}"#));
    }
}
</content>
