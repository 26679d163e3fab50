//! Per-search and global caps on enqueued/pushed places.

use placescout_core::SearchKey;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tracing::debug;

/// Snapshot of the budget counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BudgetState {
    /// Reserved places per search
    pub per_session: HashMap<SearchKey, u64>,
    /// Reserved places across all searches
    pub global: u64,
    /// Cap per search (`None` = unbounded)
    pub per_session_limit: Option<u64>,
    /// Cap across all searches (`None` = unbounded)
    pub global_limit: Option<u64>,
}

#[derive(Debug, Default)]
struct Counters {
    per_session: HashMap<SearchKey, u64>,
    global: u64,
}

/// Budget counters shared by every session of a run.
///
/// Reservation checks both limits and increments both counters under one
/// lock, so `global` always equals the sum of the per-search counts.
///
/// A reservation that waits on a collaborator before it is kept or released
/// must hold [`BudgetTracker::commit_gate`] for the whole sequence. Readers
/// that decide whether to continue take the gate too, so they never count a
/// reservation that may still be given back.
#[derive(Debug, Default)]
pub struct BudgetTracker {
    per_session_limit: Option<u64>,
    global_limit: Option<u64>,
    counters: Mutex<Counters>,
    commit: AsyncMutex<()>,
}

impl BudgetTracker {
    pub fn new(per_session_limit: Option<u64>, global_limit: Option<u64>) -> Self {
        Self {
            per_session_limit,
            global_limit,
            counters: Mutex::new(Counters::default()),
            commit: AsyncMutex::new(()),
        }
    }

    /// Serialize reserve, hand-off and release across sessions.
    pub async fn commit_gate(&self) -> AsyncMutexGuard<'_, ()> {
        self.commit.lock().await
    }

    /// Reserve one slot for `key`. Returns false and changes nothing when
    /// either limit is already reached.
    pub fn try_reserve(&self, key: &SearchKey) -> bool {
        let mut counters = self.counters.lock().expect("acquire budget lock");
        let session = counters.per_session.get(key).copied().unwrap_or(0);
        if !under(session, self.per_session_limit) || !under(counters.global, self.global_limit) {
            debug!(search_key = %key, session, global = counters.global, "budget reservation refused");
            return false;
        }
        *counters.per_session.entry(key.clone()).or_insert(0) += 1;
        counters.global += 1;
        true
    }

    /// Give back a reservation that did not turn into a new place.
    ///
    /// Does nothing if `key` holds no reservation.
    pub fn release(&self, key: &SearchKey) {
        let mut counters = self.counters.lock().expect("acquire budget lock");
        let Some(session) = counters.per_session.get_mut(key) else {
            return;
        };
        if *session == 0 {
            return;
        }
        *session -= 1;
        counters.global -= 1;
    }

    /// Whether `key` could still reserve a slot (both limits checked).
    pub fn can_reserve_more(&self, key: &SearchKey) -> bool {
        let counters = self.counters.lock().expect("acquire budget lock");
        let session = counters.per_session.get(key).copied().unwrap_or(0);
        under(session, self.per_session_limit) && under(counters.global, self.global_limit)
    }

    pub fn can_reserve_more_global(&self) -> bool {
        let counters = self.counters.lock().expect("acquire budget lock");
        under(counters.global, self.global_limit)
    }

    /// Reservations currently held by `key`.
    pub fn reserved(&self, key: &SearchKey) -> u64 {
        let counters = self.counters.lock().expect("acquire budget lock");
        counters.per_session.get(key).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> BudgetState {
        let counters = self.counters.lock().expect("acquire budget lock");
        BudgetState {
            per_session: counters.per_session.clone(),
            global: counters.global,
            per_session_limit: self.per_session_limit,
            global_limit: self.global_limit,
        }
    }
}

fn under(count: u64, limit: Option<u64>) -> bool {
    limit.map_or(true, |limit| count < limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(s: &str) -> SearchKey {
        SearchKey::new(s)
    }

    fn assert_consistent(tracker: &BudgetTracker) {
        let state = tracker.snapshot();
        assert_eq!(state.global, state.per_session.values().sum::<u64>());
    }

    #[test]
    fn test_unbounded_always_reserves() {
        let tracker = BudgetTracker::new(None, None);
        for _ in 0..1_000 {
            assert!(tracker.try_reserve(&key("a")));
        }
        assert!(tracker.can_reserve_more(&key("a")));
        assert_eq!(tracker.snapshot().global, 1_000);
    }

    #[test]
    fn test_per_session_limit() {
        let tracker = BudgetTracker::new(Some(2), None);
        assert!(tracker.try_reserve(&key("a")));
        assert!(tracker.try_reserve(&key("a")));
        assert!(!tracker.try_reserve(&key("a")));
        assert!(!tracker.can_reserve_more(&key("a")));
        // other searches are unaffected
        assert!(tracker.try_reserve(&key("b")));
        assert_eq!(tracker.reserved(&key("a")), 2);
        assert_consistent(&tracker);
    }

    #[test]
    fn test_release_compensates() {
        let tracker = BudgetTracker::new(Some(1), None);
        assert!(tracker.try_reserve(&key("a")));
        assert!(!tracker.try_reserve(&key("a")));
        tracker.release(&key("a"));
        assert!(tracker.try_reserve(&key("a")));
        assert_consistent(&tracker);
    }

    #[test]
    fn test_release_without_reservation_is_noop() {
        let tracker = BudgetTracker::new(None, None);
        tracker.release(&key("a"));
        assert!(tracker.try_reserve(&key("b")));
        tracker.release(&key("b"));
        tracker.release(&key("b"));
        let state = tracker.snapshot();
        assert_eq!(state.global, 0);
        assert_consistent(&tracker);
    }

    #[test]
    fn test_global_limit_shared_between_sessions() {
        let tracker = BudgetTracker::new(None, Some(10));
        let mut granted = 0;
        for i in 0..20 {
            let search = if i % 2 == 0 { key("a") } else { key("b") };
            if tracker.try_reserve(&search) {
                granted += 1;
            }
        }
        assert_eq!(granted, 10);
        assert!(!tracker.try_reserve(&key("a")));
        assert!(!tracker.try_reserve(&key("b")));
        assert!(!tracker.can_reserve_more_global());
        assert_consistent(&tracker);
    }

    #[test]
    fn test_global_limit_across_threads() {
        let tracker = Arc::new(BudgetTracker::new(None, Some(10)));
        let handles: Vec<_> = ["a", "b"]
            .into_iter()
            .map(|name| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || (0..50).filter(|_| tracker.try_reserve(&key(name))).count())
            })
            .collect();
        let granted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 10);
        assert_consistent(&tracker);
    }

    #[test]
    fn test_mixed_sequence_keeps_sum() {
        let tracker = BudgetTracker::new(Some(3), Some(5));
        let ops = [
            ("a", true),
            ("b", true),
            ("a", true),
            ("a", false),
            ("c", true),
            ("b", false),
            ("b", false),
            ("c", true),
            ("a", true),
        ];
        for (name, reserve) in ops {
            if reserve {
                tracker.try_reserve(&key(name));
            } else {
                tracker.release(&key(name));
            }
            assert_consistent(&tracker);
        }
    }

    #[tokio::test]
    async fn test_commit_gate_orders_in_flight_reservations() {
        let tracker = Arc::new(BudgetTracker::new(None, Some(1)));

        let gate = tracker.commit_gate().await;
        assert!(tracker.try_reserve(&key("a")));

        let waiter = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                let _gate = tracker.commit_gate().await;
                tracker.try_reserve(&key("b"))
            })
        };
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        // the first reservation turns out to be unwanted
        tracker.release(&key("a"));
        drop(gate);

        assert!(waiter.await.unwrap());
        assert_eq!(tracker.reserved(&key("b")), 1);
        assert_consistent(&tracker);
    }
}
