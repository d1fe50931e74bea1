//! Crawler Pool (§4.F): fixed-size pool of thread-affine, serialized slots.
//!
//! Grounded on `examples/original_source/sniffer/flows/crawler_pool.py`
//! (slot/serialize/round-robin/self-heal design), adapted to Rust's
//! ownership model per SPEC_FULL.md §9 "thread-affine execution of blocking
//! code": one dedicated OS thread per slot, reached over a
//! `std::sync::mpsc` channel, bridged back to the async caller with a
//! `tokio::sync::oneshot`. A per-slot `tokio::sync::Mutex` serializes
//! concurrent dispatch onto the same slot without blocking other slots —
//! this is the "at most one in-flight scrape per slot" invariant in §4.F.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::crawler::base::{CrawlerConfig, CrawlerSession};
use crate::crawler::endpoints::CurrentLotInfo;

type BoxedResult = Box<dyn Any + Send>;
type BoxedTask = Box<dyn FnOnce(&CrawlerSession) -> BoxedResult + Send>;

struct Job {
    task: BoxedTask,
    reply: oneshot::Sender<BoxedResult>,
}

struct SlotInner {
    tx: std_mpsc::Sender<Job>,
}

fn spawn_slot_thread(
    factory: Arc<dyn Fn() -> CrawlerSession + Send + Sync>,
) -> std_mpsc::Sender<Job> {
    let (tx, rx) = std_mpsc::channel::<Job>();
    std::thread::spawn(move || {
        let session = factory();
        while let Ok(job) = rx.recv() {
            let result = (job.task)(&session);
            let _ = job.reply.send(result);
        }
    });
    tx
}

struct Slot {
    inner: Mutex<SlotInner>,
    factory: Arc<dyn Fn() -> CrawlerSession + Send + Sync>,
}

impl Slot {
    fn new(factory: Arc<dyn Fn() -> CrawlerSession + Send + Sync>) -> Self {
        let tx = spawn_slot_thread(Arc::clone(&factory));
        Self {
            inner: Mutex::new(SlotInner { tx }),
            factory,
        }
    }

    /// Runs `f` on this slot's dedicated thread, serialized against any other
    /// concurrent call onto the same slot. Rebuilds the slot transparently if
    /// its thread has died (self-heal, §4.F).
    async fn run<F, R>(&self, f: Arc<F>) -> Option<R>
    where
        F: Fn(&CrawlerSession) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        let mut guard = self.inner.lock().await;
        for attempt in 0..2 {
            let (reply_tx, reply_rx) = oneshot::channel();
            let f_for_job = Arc::clone(&f);
            let task: BoxedTask = Box::new(move |s| Box::new(f_for_job(s)) as BoxedResult);
            let job = Job { task, reply: reply_tx };

            if guard.tx.send(job).is_err() {
                tracing::warn!(attempt, "crawler slot thread is gone, rebuilding");
                guard.tx = spawn_slot_thread(Arc::clone(&self.factory));
                continue;
            }

            match reply_rx.await {
                Ok(boxed) => return boxed.downcast::<R>().ok().map(|b| *b),
                Err(_) => {
                    tracing::warn!(attempt, "crawler slot thread died mid-job, rebuilding");
                    guard.tx = spawn_slot_thread(Arc::clone(&self.factory));
                    continue;
                }
            }
        }
        None
    }

    /// Tears down the slot's thread by dropping its sender (causing the
    /// thread's `recv` loop to end) and spawning a fresh one so the slot
    /// remains usable. Idempotent in the sense that calling it repeatedly is
    /// harmless.
    async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        let (dead_tx, _dead_rx) = std_mpsc::channel::<Job>();
        guard.tx = dead_tx;
    }
}

pub struct CrawlerPool {
    slots: Vec<Slot>,
    current_slot: Slot,
    counter: AtomicUsize,
}

impl CrawlerPool {
    pub fn new(size: usize, config_factory: impl Fn() -> CrawlerConfig + Send + Sync + 'static) -> Arc<Self> {
        let config_factory = Arc::new(config_factory);
        let factory: Arc<dyn Fn() -> CrawlerSession + Send + Sync> = {
            let cf = Arc::clone(&config_factory);
            Arc::new(move || CrawlerSession::new(cf()))
        };
        let slots = (0..size.max(1))
            .map(|_| Slot::new(Arc::clone(&factory)))
            .collect();
        let current_slot = Slot::new(Arc::clone(&factory));
        Arc::new(Self {
            slots,
            current_slot,
            counter: AtomicUsize::new(0),
        })
    }

    fn pick_slot(&self) -> &Slot {
        if self.slots.len() == 1 {
            return &self.slots[0];
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % self.slots.len();
        &self.slots[idx]
    }

    /// Runs an arbitrary blocking closure on the next slot, round-robin. Used
    /// by the periodic sweep (§4.K) for the auction/section/pigeon list
    /// endpoints, which don't need a dedicated method of their own.
    pub async fn run_on_slot<F, R>(&self, f: Arc<F>) -> Option<R>
    where
        F: Fn(&CrawlerSession) -> R + Send + Sync + 'static,
        R: Send + 'static,
    {
        self.pick_slot().run(f).await
    }

    /// Schedules a per-pigeon ledger scrape on the next slot, round-robin.
    pub async fn run_pid(
        &self,
        pid: i64,
        cfg: Arc<crate::config::EndpointConfig>,
    ) -> Option<Vec<serde_json::Value>> {
        let slot = self.pick_slot();
        let f = Arc::new(move |session: &CrawlerSession| {
            crate::crawler::endpoints::get_bids_for_pigeon(session, &cfg, pid)
        });
        slot.run(f).await
    }

    /// Probes the currently-live lot on the dedicated "current" slot.
    pub async fn get_current_pid(
        &self,
        cfg: Arc<crate::config::EndpointConfig>,
    ) -> Option<CurrentLotInfo> {
        let f = Arc::new(move |session: &CrawlerSession| {
            crate::crawler::endpoints::fetch_current_lot(session, &cfg)
        });
        self.current_slot.run(f).await.flatten()
    }

    /// `get_current_pid` then `run_pid`; empty result when there is no current pid.
    pub async fn run_current_once(
        &self,
        current_cfg: Arc<crate::config::EndpointConfig>,
        ledger_cfg: Arc<crate::config::EndpointConfig>,
    ) -> Option<(CurrentLotInfo, Vec<serde_json::Value>)> {
        let info = self.get_current_pid(current_cfg).await?;
        let ledger = self.run_pid(info.id, ledger_cfg).await.unwrap_or_default();
        Some((info, ledger))
    }

    /// Idempotent: tears down every slot's thread and the current slot's.
    pub async fn close(&self) {
        for slot in &self.slots {
            slot.shutdown().await;
        }
        self.current_slot.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    #[tokio::test]
    async fn round_robin_dispatch_visits_every_slot() {
        let pool = CrawlerPool::new(3, CrawlerConfig::default);
        let visited = Arc::new(std::sync::Mutex::new(Vec::new()));
        for _ in 0..6 {
            let slot = pool.pick_slot();
            let v = Arc::clone(&visited);
            let f = Arc::new(move |_: &CrawlerSession| {
                v.lock().unwrap().push(());
            });
            slot.run(f).await;
        }
        assert_eq!(visited.lock().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn same_slot_calls_never_overlap() {
        let pool = CrawlerPool::new(1, CrawlerConfig::default);
        let in_flight = Arc::new(AtomicBool::new(false));
        let violation = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let pool = Arc::clone(&pool);
            let in_flight = Arc::clone(&in_flight);
            let violation = Arc::clone(&violation);
            handles.push(tokio::spawn(async move {
                let slot = pool.pick_slot();
                let in_flight2 = Arc::clone(&in_flight);
                let violation2 = Arc::clone(&violation);
                let f = Arc::new(move |_: &CrawlerSession| {
                    if in_flight2.swap(true, Ordering::SeqCst) {
                        violation2.store(true, Ordering::SeqCst);
                    }
                    std::thread::sleep(Duration::from_millis(10));
                    in_flight2.store(false, Ordering::SeqCst);
                });
                slot.run(f).await;
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert!(!violation.load(Ordering::SeqCst));
    }
}
</content>
