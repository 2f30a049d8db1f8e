//! Time-windowed deduplication gate.
//!
//! Suppresses repeated events carrying the same identity key inside a
//! sliding window. State is in-memory only: duplicates across a process
//! restart are not suppressed, which is accepted semantics for this
//! pipeline.
//!
//! # Key design
//!
//! - Keys: composite identity strings (`workflow:anomaly:status` for
//!   healing events, `workflow:anomaly:user` for notifications)
//! - Values: last-admitted instant
//! - Memory is bounded by a periodic sweep that evicts entries old enough
//!   that they can no longer influence an admission decision

use metrics::gauge;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Admissions between eviction sweeps.
const SWEEP_INTERVAL: u32 = 256;

/// Entries older than this many windows are evicted on sweep. Anything
/// past one window is already admissible again, so 4x is comfortably
/// outside the decision horizon.
const EVICT_WINDOW_MULTIPLIER: u32 = 4;

struct GateState {
    seen: HashMap<String, Instant>,
    admissions_since_sweep: u32,
}

/// Sliding-window duplicate suppressor.
///
/// Thread-safe: can be shared across concurrent handlers; the internal
/// lock closes the check-then-record race that would otherwise double-bill
/// an event.
pub struct DedupGate {
    window: Duration,
    inner: Mutex<GateState>,
}

impl DedupGate {
    /// Create a gate with the given suppression window.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            inner: Mutex::new(GateState {
                seen: HashMap::new(),
                admissions_since_sweep: 0,
            }),
        }
    }

    /// The configured suppression window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Admit or suppress an event with this identity key.
    ///
    /// Returns `true` (admit) if the key is unseen or its last admission
    /// is older than the window; the current instant is then recorded.
    /// Returns `false` (suppress) otherwise, leaving the stored timestamp
    /// untouched so a steady stream of duplicates stays suppressed.
    pub fn admit(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut state = self.inner.lock();

        if let Some(last) = state.seen.get(key) {
            if now.duration_since(*last) <= self.window {
                return false;
            }
        }

        state.seen.insert(key.to_string(), now);
        state.admissions_since_sweep += 1;

        if state.admissions_since_sweep >= SWEEP_INTERVAL {
            state.admissions_since_sweep = 0;
            Self::sweep_locked(&mut state.seen, self.window, now);
        }

        true
    }

    /// Evict entries older than `EVICT_WINDOW_MULTIPLIER` windows.
    ///
    /// Runs automatically every [`SWEEP_INTERVAL`] admissions; exposed for
    /// callers that want to sweep on their own schedule. Returns the
    /// number of entries evicted.
    pub fn sweep(&self) -> usize {
        let mut state = self.inner.lock();
        Self::sweep_locked(&mut state.seen, self.window, Instant::now())
    }

    fn sweep_locked(
        seen: &mut HashMap<String, Instant>,
        window: Duration,
        now: Instant,
    ) -> usize {
        let horizon = window * EVICT_WINDOW_MULTIPLIER;
        let before = seen.len();
        seen.retain(|_, last| now.duration_since(*last) <= horizon);
        let evicted = before - seen.len();

        if evicted > 0 {
            debug!(evicted, remaining = seen.len(), "dedup gate sweep");
        }
        gauge!("dedup_keys").set(seen.len() as f64);

        evicted
    }

    /// Number of identity keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.inner.lock().seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_first_admission_always_passes() {
        let gate = DedupGate::new(Duration::from_secs(6));
        assert!(gate.admit("wf:anomaly:success"));
    }

    #[test]
    fn test_duplicate_inside_window_suppressed() {
        let gate = DedupGate::new(Duration::from_secs(6));
        assert!(gate.admit("k"));
        assert!(!gate.admit("k"));
        assert!(!gate.admit("k"));
    }

    #[test]
    fn test_distinct_keys_independent() {
        let gate = DedupGate::new(Duration::from_secs(6));
        assert!(gate.admit("a"));
        assert!(gate.admit("b"));
        assert!(!gate.admit("a"));
    }

    #[test]
    fn test_admitted_again_after_window() {
        let gate = DedupGate::new(Duration::from_millis(20));
        assert!(gate.admit("k"));
        thread::sleep(Duration::from_millis(40));
        assert!(gate.admit("k"));
    }

    #[test]
    fn test_suppression_does_not_extend_window() {
        // A steady stream of duplicates must not keep resetting the clock:
        // the stored timestamp is only updated on admission.
        let gate = DedupGate::new(Duration::from_millis(50));
        assert!(gate.admit("k"));
        thread::sleep(Duration::from_millis(30));
        assert!(!gate.admit("k"));
        thread::sleep(Duration::from_millis(30));
        // 60ms since the admission, only 30ms since the suppressed attempt
        assert!(gate.admit("k"));
    }

    #[test]
    fn test_exactly_one_admission_per_window() {
        let gate = DedupGate::new(Duration::from_secs(6));
        let admitted = (0..100).filter(|_| gate.admit("same-key")).count();
        assert_eq!(admitted, 1);
    }

    #[test]
    fn test_sweep_evicts_stale_entries() {
        let gate = DedupGate::new(Duration::from_millis(5));
        for i in 0..10 {
            gate.admit(&format!("key-{}", i));
        }
        assert_eq!(gate.tracked_keys(), 10);

        // Wait past 4x the window, then sweep
        thread::sleep(Duration::from_millis(40));
        let evicted = gate.sweep();
        assert_eq!(evicted, 10);
        assert_eq!(gate.tracked_keys(), 0);
    }

    #[test]
    fn test_sweep_keeps_recent_entries() {
        let gate = DedupGate::new(Duration::from_secs(60));
        gate.admit("fresh");
        assert_eq!(gate.sweep(), 0);
        assert_eq!(gate.tracked_keys(), 1);
    }

    #[test]
    fn test_concurrent_admissions_single_winner() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let gate = Arc::new(DedupGate::new(Duration::from_secs(6)));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                let admitted = Arc::clone(&admitted);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if gate.admit("contended-key") {
                            admitted.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
    }
}
