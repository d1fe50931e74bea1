//! Bounded, drop-oldest-on-overflow FIFO queue, per §4.B.
//!
//! Grounded on `examples/original_source/sniffer/drop_head_queue.py`. The
//! critical section spans an await point (`Notify::notified().await`), so a
//! tokio mutex is used here rather than `parking_lot` (reserved elsewhere in
//! this crate for short, synchronous sections, e.g. the debounce map).

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};

pub struct DropHeadQueue<T> {
    capacity: usize,
    inner: Mutex<VecDeque<T>>,
    not_empty: Notify,
}

impl<T> DropHeadQueue<T> {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            not_empty: Notify::new(),
        })
    }

    /// Enqueues `item`, discarding the oldest element first if the queue is
    /// already at capacity. Never suspends indefinitely.
    pub async fn put(&self, item: T) {
        let mut guard = self.inner.lock().await;
        if guard.len() >= self.capacity {
            guard.pop_front();
        }
        guard.push_back(item);
        drop(guard);
        self.not_empty.notify_one();
    }

    /// Waits until an item is available, then removes and returns it.
    pub async fn get(&self) -> T {
        loop {
            {
                let mut guard = self.inner.lock().await;
                if let Some(item) = guard.pop_front() {
                    return item;
                }
            }
            self.not_empty.notified().await;
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn drop_head_monotonicity() {
        let q = DropHeadQueue::<i32>::new(4);
        for i in 0..4 {
            q.put(i).await;
        }
        for i in 4..7 {
            q.put(i).await;
        }
        // Capacity 4, enqueued 0..7: last 4 items (3,4,5,6) survive, in order.
        let mut drained = Vec::new();
        for _ in 0..4 {
            drained.push(q.get().await);
        }
        assert_eq!(drained, vec![3, 4, 5, 6]);
    }

    #[tokio::test]
    async fn get_waits_for_put() {
        let q = DropHeadQueue::<i32>::new(4);
        let q2 = q.clone();
        let handle = tokio::spawn(async move { q2.get().await });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        q.put(42).await;
        let got = handle.await.unwrap();
        assert_eq!(got, 42);
    }
}
</content>
