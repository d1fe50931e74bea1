//! Trigger / Bus: worker pool draining the Drop-Head Queue, dispatching
//! decoded events to regex-matched handlers, per §4.C.
//!
//! Grounded on `examples/original_source/sniffer/trigger.py`,
//! `event_factory.py` and `handler_bus.py`. `registry.py`'s router invokes
//! only the first matching handler; SPEC_FULL.md §4.C is explicit that every
//! matching handler fires concurrently, so that's what's implemented here.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use regex::Regex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::bus::queue::DropHeadQueue;
use crate::decoder::{self, DecoderConfig, RawFrame};
use crate::models::Event;

/// A decoded event plus the named capture groups from whichever topic
/// pattern matched it.
#[derive(Debug, Clone)]
pub struct TopicMatch {
    pub event: Event,
    pub captures: std::collections::HashMap<String, String>,
}

pub type Handler = Arc<dyn Fn(TopicMatch) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;
pub type StartupHook = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

pub enum QueueItem {
    Frame(RawFrame),
    Shutdown,
}

pub struct Trigger {
    queue: Arc<DropHeadQueue<QueueItem>>,
    handlers: RwLock<Vec<(Regex, Handler)>>,
    startup_hooks: RwLock<Vec<StartupHook>>,
    decoder_cfg: DecoderConfig,
    worker_count: usize,
}

impl Trigger {
    pub fn new(
        queue: Arc<DropHeadQueue<QueueItem>>,
        decoder_cfg: DecoderConfig,
        worker_count: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            handlers: RwLock::new(Vec::new()),
            startup_hooks: RwLock::new(Vec::new()),
            decoder_cfg,
            worker_count: worker_count.max(1),
        })
    }

    pub async fn on_topic(&self, pattern: &str, handler: Handler) -> anyhow::Result<()> {
        let re = Regex::new(pattern)?;
        self.handlers.write().await.push((re, handler));
        Ok(())
    }

    pub async fn on_startup(&self, hook: StartupHook) {
        self.startup_hooks.write().await.push(hook);
    }

    /// Invoked once after workers are running and before traffic is served.
    pub async fn run_startup_hooks(&self) {
        let hooks = self.startup_hooks.read().await;
        for hook in hooks.iter() {
            if let Err(e) = hook().await {
                tracing::error!(error = %e, "startup hook failed");
            }
        }
    }

    pub fn spawn_workers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        (0..self.worker_count)
            .map(|id| {
                let this = Arc::clone(self);
                tokio::spawn(async move { this.worker_loop(id).await })
            })
            .collect()
    }

    async fn worker_loop(self: Arc<Self>, worker_id: usize) {
        loop {
            let item = self.queue.get().await;
            let frame = match item {
                QueueItem::Shutdown => {
                    tracing::debug!(worker_id, "trigger worker received shutdown sentinel");
                    return;
                }
                QueueItem::Frame(f) => f,
            };

            let Some(event) = decoder::decode(&frame, &self.decoder_cfg) else {
                continue;
            };
            if event.kind != crate::models::EventKind::MqttPublish {
                continue;
            }
            let Some(topic) = event.topic.clone() else {
                continue;
            };

            let handlers = self.handlers.read().await;
            let mut matched = Vec::new();
            for (re, handler) in handlers.iter() {
                if let Some(caps) = re.captures(&topic) {
                    let mut named = std::collections::HashMap::new();
                    for name in re.capture_names().flatten() {
                        if let Some(m) = caps.name(name) {
                            named.insert(name.to_string(), m.as_str().to_string());
                        }
                    }
                    matched.push((Arc::clone(handler), named));
                }
            }
            drop(handlers);

            for (handler, captures) in matched {
                let event = event.clone();
                tokio::spawn(async move {
                    let topic_match = TopicMatch { event, captures };
                    if let Err(e) = handler(topic_match).await {
                        tracing::warn!(error = %e, "handler failed");
                    }
                });
            }
        }
    }

    pub async fn shutdown(&self) {
        for _ in 0..self.worker_count {
            self.queue.put(QueueItem::Shutdown).await;
        }
    }

    pub async fn push_frame(&self, frame: RawFrame) {
        self.queue.put(QueueItem::Frame(frame)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::mqtt::encode_publish;
    use crate::decoder::RawFrameData;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn matching_handlers_fire_and_capture_groups_are_passed() {
        let queue = DropHeadQueue::new(16);
        let trigger = Trigger::new(queue, DecoderConfig::default(), 2);

        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        trigger
            .on_topic(
                r"^pigeon/auctions/(?P<auction>\d+)/pigeons/(?P<pigeon>\d+)$",
                Arc::new(move |m: TopicMatch| {
                    let hits = Arc::clone(&hits2);
                    Box::pin(async move {
                        assert_eq!(m.captures.get("pigeon").map(String::as_str), Some("187099"));
                        hits.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    })
                }),
            )
            .await
            .unwrap();

        let handles = trigger.spawn_workers();
        let raw = encode_publish("pigeon/auctions/245/pigeons/187099", b"{}", 0);
        trigger
            .push_frame(RawFrame {
                url: "ws://x".into(),
                data: RawFrameData::Binary(raw),
            })
            .await;

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        trigger.shutdown().await;
        for h in handles {
            let _ = h.await;
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
</content>
