//! Per-PID debounce (§4.K), grounded on
//! `examples/original_source/sniffer/flows/pigeon_handlers.py::handle_pigeon_bid`
//! (`time.monotonic()` window check), upgraded to `tokio::time::Instant` per
//! SPEC_FULL.md §9 open question #5 — `pigeon_flow.py`'s older variant uses
//! wall-clock `time.time()`, which a system clock step can corrupt.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// `Idle -> Cooling -> Running -> Idle` per pid. `should_run` is the single
/// entry point: it atomically checks and (if allowed) records the new run
/// timestamp, so callers never race each other on the same pid.
pub struct Debouncer {
    last_run: Mutex<HashMap<i64, Instant>>,
    cooldown: Duration,
}

impl Debouncer {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            last_run: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// Returns `true` (and marks `pid` as just-run) if `pid` is outside its
    /// cooldown window; `false` if the call should be dropped.
    pub fn should_run(&self, pid: i64) -> bool {
        let now = Instant::now();
        let mut guard = self.last_run.lock();
        let allowed = match guard.get(&pid) {
            Some(last) => now.saturating_duration_since(*last) >= self.cooldown,
            None => true,
        };
        if allowed {
            guard.insert(pid, now);
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_always_runs() {
        let d = Debouncer::new(Duration::from_secs(2));
        assert!(d.should_run(1));
    }

    #[test]
    fn repeated_call_within_window_is_dropped() {
        let d = Debouncer::new(Duration::from_secs(2));
        assert!(d.should_run(1));
        assert!(!d.should_run(1));
    }

    #[test]
    fn different_pids_are_independent() {
        let d = Debouncer::new(Duration::from_secs(2));
        assert!(d.should_run(1));
        assert!(d.should_run(2));
    }

    #[tokio::test(start_paused = true)]
    async fn call_after_cooldown_elapses_runs_again() {
        let d = Debouncer::new(Duration::from_millis(100));
        assert!(d.should_run(1));
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(d.should_run(1));
    }
}
