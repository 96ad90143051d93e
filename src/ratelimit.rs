//! Sliding-window rate limiting keyed by network origin and by claimed identity.
//! Used by: handlers, state, janitor.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::janitor::Sweep;

#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    pub max_requests: usize,
    pub window: Duration,
    pub capacity: usize,
}

impl LimiterConfig {
    /// Per-account budget: a handful of resets per hour.
    pub fn identity_default() -> Self {
        Self {
            max_requests: 3,
            window: Duration::from_secs(3600),
            capacity: 10_000,
        }
    }

    /// Per-origin budget: looser per key, but tracks far more keys so a single
    /// origin rotating through invented identities runs dry here first.
    pub fn origin_default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(3600),
            capacity: 50_000,
        }
    }
}

/// Admission timestamps for one identifier, oldest first.
#[derive(Debug, Default)]
struct RateLimitEntry {
    timestamps: VecDeque<Instant>,
}

impl RateLimitEntry {
    fn evict_expired(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) < window {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    fn has_live(&self, now: Instant, window: Duration) -> bool {
        self.timestamps
            .back()
            .is_some_and(|&newest| now.duration_since(newest) < window)
    }
}

pub struct Limiter {
    name: &'static str,
    config: LimiterConfig,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<Box<str>, RateLimitEntry>>,
}

impl Limiter {
    pub fn new(name: &'static str, config: LimiterConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &'static str, config: LimiterConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            config,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> LimiterConfig {
        self.config
    }

    /// Records an admission for `identifier` if its trailing window has room.
    ///
    /// A previously unseen identifier arriving while the limiter is at capacity
    /// triggers one expiry sweep; if that frees nothing it is refused. Live
    /// entries are never evicted to make room.
    pub fn allow_request(&self, identifier: &str) -> bool {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => {
                tracing::error!(limiter = self.name, "rate limiter lock poisoned, denying");
                return false;
            }
        };
        let now = self.clock.now();
        let window = self.config.window;

        if !entries.contains_key(identifier) {
            if entries.len() >= self.config.capacity {
                let removed = sweep(&mut entries, now, window);
                if entries.len() >= self.config.capacity {
                    tracing::warn!(
                        limiter = self.name,
                        tracked = entries.len(),
                        swept = removed,
                        "rate limiter at capacity, refusing new identifier"
                    );
                    return false;
                }
            }
            entries.insert(identifier.into(), RateLimitEntry::default());
        }

        let Some(entry) = entries.get_mut(identifier) else {
            return false;
        };
        entry.evict_expired(now, window);
        if entry.timestamps.len() >= self.config.max_requests {
            return false;
        }
        entry.timestamps.push_back(now);
        true
    }

    /// Drops every identifier with no admission inside the current window.
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(_) => {
                tracing::error!(limiter = self.name, "rate limiter lock poisoned, skipping sweep");
                return 0;
            }
        };
        sweep(&mut entries, self.clock.now(), self.config.window)
    }

    pub fn count(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.config.capacity
    }

    /// One read of the map, so `tracked` and `is_full` always agree.
    pub fn stats(&self) -> LimiterStats {
        let tracked = self.count();
        LimiterStats {
            tracked,
            capacity: self.config.capacity,
            is_full: tracked >= self.config.capacity,
        }
    }
}

fn sweep(entries: &mut HashMap<Box<str>, RateLimitEntry>, now: Instant, window: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.has_live(now, window));
    before - entries.len()
}

impl Sweep for Limiter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn cleanup_expired(&self) -> usize {
        Limiter::cleanup_expired(self)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct LimiterStats {
    pub tracked: usize,
    pub capacity: usize,
    pub is_full: bool,
}

/// Which check turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitError {
    Origin,
    Identity,
}

impl std::fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Origin => write!(f, "origin rate limit exceeded"),
            Self::Identity => write!(f, "identity rate limit exceeded"),
        }
    }
}

/// Origin limiter followed by identity limiter. An origin refusal short-circuits,
/// so a flooding origin does not also burn the claimed identity's budget.
pub struct RequestGuard {
    origin: Arc<Limiter>,
    identity: Arc<Limiter>,
}

impl RequestGuard {
    pub fn new(origin: Arc<Limiter>, identity: Arc<Limiter>) -> Self {
        Self { origin, identity }
    }

    pub fn check(&self, origin: &str, identity: &str) -> Result<(), RateLimitError> {
        if !self.origin.allow_request(origin) {
            return Err(RateLimitError::Origin);
        }
        if !self.identity.allow_request(identity) {
            return Err(RateLimitError::Identity);
        }
        Ok(())
    }

    pub fn origin(&self) -> &Arc<Limiter> {
        &self.origin
    }

    pub fn identity(&self) -> &Arc<Limiter> {
        &self.identity
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use super::*;
    use crate::clock::ManualClock;

    const HOUR: Duration = Duration::from_secs(3600);

    fn limiter(max_requests: usize, window: Duration, capacity: usize) -> (Limiter, ManualClock) {
        let clock = ManualClock::new();
        let config = LimiterConfig { max_requests, window, capacity };
        (Limiter::with_clock("test", config, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn fourth_request_in_window_denied() {
        let (limiter, _) = limiter(3, HOUR, 100);
        assert!(limiter.allow_request("u@example.com"));
        assert!(limiter.allow_request("u@example.com"));
        assert!(limiter.allow_request("u@example.com"));
        assert!(!limiter.allow_request("u@example.com"));
    }

    #[test]
    fn admits_again_once_window_passes() {
        let (limiter, clock) = limiter(2, Duration::from_secs(60), 100);
        assert!(limiter.allow_request("alice"));
        assert!(limiter.allow_request("alice"));
        assert!(!limiter.allow_request("alice"));
        clock.advance(Duration::from_secs(60));
        assert!(limiter.allow_request("alice"));
    }

    #[test]
    fn window_slides_rather_than_resets() {
        let (limiter, clock) = limiter(2, Duration::from_secs(60), 100);
        assert!(limiter.allow_request("alice"));
        clock.advance(Duration::from_secs(40));
        assert!(limiter.allow_request("alice"));
        clock.advance(Duration::from_secs(30));
        // first admission has aged out, second is still live
        assert!(limiter.allow_request("alice"));
        assert!(!limiter.allow_request("alice"));
    }

    #[test]
    fn denied_attempts_are_not_recorded() {
        let (limiter, clock) = limiter(1, Duration::from_secs(60), 100);
        assert!(limiter.allow_request("alice"));
        clock.advance(Duration::from_secs(30));
        assert!(!limiter.allow_request("alice"));
        clock.advance(Duration::from_secs(30));
        assert!(limiter.allow_request("alice"));
    }

    #[test]
    fn identifiers_are_independent() {
        let (limiter, _) = limiter(1, HOUR, 100);
        assert!(limiter.allow_request("1.1.1.1"));
        assert!(!limiter.allow_request("1.1.1.1"));
        assert!(limiter.allow_request("2.2.2.2"));
    }

    #[test]
    fn empty_identifier_is_its_own_key() {
        let (limiter, _) = limiter(1, HOUR, 100);
        assert!(limiter.allow_request(""));
        assert!(!limiter.allow_request(""));
        assert!(limiter.allow_request(" "));
    }

    #[test]
    fn new_identifier_refused_at_capacity() {
        let (limiter, _) = limiter(3, HOUR, 5);
        for id in ["a", "b", "c", "d", "e"] {
            assert!(limiter.allow_request(id));
        }
        assert!(limiter.is_full());
        assert!(!limiter.allow_request("f"));
        assert!(limiter.allow_request("c"));
        assert!(limiter.allow_request("c"));
        assert!(!limiter.allow_request("c"));
        assert_eq!(limiter.count(), 5);
    }

    #[test]
    fn capacity_reclaimed_by_eager_sweep() {
        let (limiter, clock) = limiter(3, Duration::from_secs(60), 2);
        assert!(limiter.allow_request("a"));
        clock.advance(Duration::from_secs(30));
        assert!(limiter.allow_request("b"));
        clock.advance(Duration::from_secs(31));
        // "a" has aged out, "b" has not
        assert!(limiter.allow_request("c"));
        assert_eq!(limiter.count(), 2);
        assert!(!limiter.allow_request("d"));
    }

    #[test]
    fn zero_max_denies_everything() {
        let (limiter, _) = limiter(0, HOUR, 10);
        assert!(!limiter.allow_request("alice"));
        assert!(!limiter.allow_request("bob"));
    }

    #[test]
    fn zero_capacity_denies_unseen_identifiers() {
        let (limiter, clock) = limiter(5, HOUR, 0);
        assert!(!limiter.allow_request("alice"));
        clock.advance(HOUR * 2);
        assert!(!limiter.allow_request("alice"));
        assert_eq!(limiter.count(), 0);
        assert!(limiter.is_full());
    }

    #[test]
    fn cleanup_keeps_identifiers_with_live_timestamps() {
        let (limiter, clock) = limiter(5, Duration::from_secs(60), 100);
        assert!(limiter.allow_request("old"));
        assert!(limiter.allow_request("mixed"));
        clock.advance(Duration::from_secs(45));
        assert!(limiter.allow_request("mixed"));
        clock.advance(Duration::from_secs(20));

        assert_eq!(limiter.cleanup_expired(), 1);
        assert_eq!(limiter.count(), 1);
        // mixed kept both its stale and live timestamps until its next check
        assert!(limiter.allow_request("mixed"));
    }

    #[test]
    fn cleanup_removes_only_fully_expired() {
        let (limiter, clock) = limiter(5, Duration::from_secs(60), 100);
        for id in ["a", "b", "c"] {
            assert!(limiter.allow_request(id));
        }
        clock.advance(Duration::from_secs(59));
        assert_eq!(limiter.cleanup_expired(), 0);
        clock.advance(Duration::from_secs(1));
        assert_eq!(limiter.cleanup_expired(), 3);
        assert_eq!(limiter.count(), 0);
    }

    #[test]
    fn cleanup_drops_entries_never_admitted() {
        let (limiter, _) = limiter(0, HOUR, 10);
        assert!(!limiter.allow_request("alice"));
        assert_eq!(limiter.count(), 1);
        assert_eq!(limiter.cleanup_expired(), 1);
    }

    #[test]
    fn concurrent_callers_never_exceed_budget() {
        let max = 10;
        let extra = 22;
        let limiter = Limiter::new(
            "concurrent",
            LimiterConfig { max_requests: max, window: HOUR, capacity: 10 },
        );
        let barrier = &Barrier::new(max + extra);
        let limiter = &limiter;

        let admitted = thread::scope(|s| {
            let handles: Vec<_> = (0..max + extra)
                .map(|_| {
                    s.spawn(move || {
                        barrier.wait();
                        limiter.allow_request("same-user")
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|&ok| ok)
                .count()
        });

        assert_eq!(admitted, max);
    }

    #[test]
    fn stats_reflect_state() {
        let (limiter, _) = limiter(1, HOUR, 2);
        assert!(limiter.allow_request("a"));
        assert_eq!(
            limiter.stats(),
            LimiterStats { tracked: 1, capacity: 2, is_full: false }
        );
        assert!(limiter.allow_request("b"));
        assert!(limiter.stats().is_full);
    }

    #[test]
    fn stats_consistent_with_zero_capacity() {
        let (limiter, _) = limiter(1, HOUR, 0);
        assert!(!limiter.allow_request("a"));
        let stats = limiter.stats();
        assert_eq!(stats.tracked, 0);
        assert_eq!(stats.is_full, stats.tracked >= stats.capacity);
    }

    mod guard {
        use super::*;

        fn guard(origin_max: usize, identity_max: usize) -> RequestGuard {
            let clock = Arc::new(ManualClock::new());
            let origin = Limiter::with_clock(
                "origin",
                LimiterConfig { max_requests: origin_max, window: HOUR, capacity: 100 },
                clock.clone(),
            );
            let identity = Limiter::with_clock(
                "identity",
                LimiterConfig { max_requests: identity_max, window: HOUR, capacity: 100 },
                clock,
            );
            RequestGuard::new(Arc::new(origin), Arc::new(identity))
        }

        #[test]
        fn both_admit() {
            let g = guard(5, 5);
            assert_eq!(g.check("10.0.0.1", "alice"), Ok(()));
        }

        #[test]
        fn identity_budget_exhausted() {
            let g = guard(10, 1);
            assert_eq!(g.check("10.0.0.1", "alice"), Ok(()));
            assert_eq!(g.check("10.0.0.2", "alice"), Err(RateLimitError::Identity));
        }

        #[test]
        fn rotating_identities_stopped_by_origin() {
            let g = guard(3, 3);
            for user in ["a", "b", "c"] {
                assert_eq!(g.check("10.0.0.1", user), Ok(()));
            }
            assert_eq!(g.check("10.0.0.1", "d"), Err(RateLimitError::Origin));
        }

        #[test]
        fn origin_refusal_spends_no_identity_budget() {
            let g = guard(1, 1);
            assert_eq!(g.check("10.0.0.1", "alice"), Ok(()));
            assert_eq!(g.check("10.0.0.1", "bob"), Err(RateLimitError::Origin));
            assert_eq!(g.identity().count(), 1);
            assert_eq!(g.check("10.0.0.2", "bob"), Ok(()));
        }
    }
}
