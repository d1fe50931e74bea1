//! Snapshot Bus (§4.J), grounded on
//! `examples/original_source/pigeon_socket/bus.py::SnapshotBus`: a
//! single-value store with wake-all-waiters publish semantics. `tokio::sync
//! ::watch` gives this natively — `Sender::send` replaces the value and
//! wakes every receiver, and `Receiver::changed()` is exactly "wait for the
//! next publish" — so no hand-rolled event/lock pair is needed here, unlike
//! the source's `asyncio.Event`-swap idiom.

use std::time::Duration;

use tokio::sync::watch;

use crate::models::domain::Snapshot;

pub struct SnapshotBus {
    tx: watch::Sender<Option<Snapshot>>,
}

impl Default for SnapshotBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotBus {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replaces the stored snapshot and wakes every waiter.
    pub fn publish(&self, snapshot: Snapshot) {
        let _ = self.tx.send(Some(snapshot));
    }

    /// Returns the last published snapshot, or `None` if nothing has been
    /// published yet.
    pub fn peek(&self) -> Option<Snapshot> {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Snapshot>> {
        self.tx.subscribe()
    }

    /// Waits on `rx` for the next publish, up to `timeout`. Returns `None` on
    /// timeout — the SSE endpoint turns that into a keep-alive comment.
    pub async fn wait_update(
        rx: &mut watch::Receiver<Option<Snapshot>>,
        timeout: Duration,
    ) -> Option<Snapshot> {
        match tokio::time::timeout(timeout, rx.changed()).await {
            Ok(Ok(())) => rx.borrow().clone(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::Snapshot;

    fn snap(ts: i64) -> Snapshot {
        Snapshot::new(ts, None, Vec::new())
    }

    #[test]
    fn peek_is_none_before_first_publish() {
        let bus = SnapshotBus::new();
        assert!(bus.peek().is_none());
    }

    #[tokio::test]
    async fn publish_wakes_waiter() {
        let bus = SnapshotBus::new();
        let mut rx = bus.subscribe();
        bus.publish(snap(1));
        let got = SnapshotBus::wait_update(&mut rx, Duration::from_secs(1)).await;
        assert_eq!(got.unwrap().ts, 1);
    }

    #[tokio::test]
    async fn wait_update_times_out_when_idle() {
        let bus = SnapshotBus::new();
        let mut rx = bus.subscribe();
        let got = SnapshotBus::wait_update(&mut rx, Duration::from_millis(20)).await;
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn later_publish_coalesces_to_latest_value() {
        let bus = SnapshotBus::new();
        let mut rx = bus.subscribe();
        bus.publish(snap(1));
        bus.publish(snap(2));
        let got = SnapshotBus::wait_update(&mut rx, Duration::from_secs(1)).await;
        assert_eq!(got.unwrap().ts, 2);
    }
}
