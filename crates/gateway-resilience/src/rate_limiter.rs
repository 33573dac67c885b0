//! Sliding-window rate limiter.
//!
//! Every caller identity owns an ordered list of admission instants inside a
//! trailing window. A check prunes expired entries, denies when the list is
//! full, and otherwise records the current instant. Counting is exact; there
//! are no buckets and no background sweep. Identities whose newest admission
//! has left the window are dropped from the table every [`SWEEP_INTERVAL`]
//! checks, so the table tracks recently active callers only.
//!
//! State is process-local. Several gateway instances behind a load balancer
//! each enforce their own quota.

use dashmap::DashMap;
use gateway_core::{CallerIdentity, Clock, MonotonicClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Number of checks between idle-identity sweeps
pub const SWEEP_INTERVAL: u64 = 1024;

/// Rate limiter configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Length of the trailing window
    #[serde(with = "humantime_serde", default = "default_window")]
    pub window: Duration,
    /// Maximum admitted requests per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
}

fn default_window() -> Duration {
    Duration::from_secs(60)
}

fn default_max_requests() -> u32 {
    5
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimitConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
        }
    }
}

/// Result of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// Configured quota per window
    pub limit: u32,
    /// Admissions left in the current window after this check
    pub remaining: u32,
    /// Time until the oldest admission leaves the window (zero when allowed)
    pub retry_after: Duration,
}

/// Admission control keyed by caller identity
pub trait RateLimiter: Send + Sync + fmt::Debug {
    /// Check and, if admitted, charge one request against the caller's quota
    fn check(&self, identity: &CallerIdentity) -> RateDecision;

    /// Whether the caller is admitted
    fn allow(&self, identity: &CallerIdentity) -> bool {
        self.check(identity).allowed
    }
}

type Window = Arc<Mutex<VecDeque<Duration>>>;

/// Exact sliding-window limiter
pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: DashMap<CallerIdentity, Window>,
    checks: AtomicU64,
}

impl SlidingWindowLimiter {
    /// Create a limiter backed by the monotonic system clock
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(MonotonicClock::new()))
    }

    /// Create a limiter with a custom clock
    #[must_use]
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            windows: DashMap::new(),
            checks: AtomicU64::new(0),
        }
    }

    /// Get the configuration
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Number of identities with recorded state
    #[must_use]
    pub fn tracked_identities(&self) -> usize {
        self.windows.len()
    }

    /// Number of admissions currently recorded for an identity (no pruning)
    #[must_use]
    pub fn recorded(&self, identity: &CallerIdentity) -> usize {
        self.windows
            .get(identity)
            .map_or(0, |window| window.lock().len())
    }

    // The map's shard lock is only held while cloning the Arc, so checks for
    // different identities never wait on each other's window lock.
    fn window_for(&self, identity: &CallerIdentity) -> Window {
        if let Some(window) = self.windows.get(identity) {
            return Arc::clone(window.value());
        }
        Arc::clone(self.windows.entry(identity.clone()).or_default().value())
    }

    /// Drop identities with no admission inside the window. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        let now = self.clock.now();
        let Some(cutoff) = now.checked_sub(self.config.window) else {
            return 0;
        };

        let mut evicted = 0;
        self.windows.retain(|_, window| {
            // A check in flight holds its own handle; keep the entry so the
            // identity cannot end up with two windows.
            if Arc::strong_count(window) > 1 {
                return true;
            }
            let keep = window.lock().back().is_some_and(|&newest| newest > cutoff);
            if !keep {
                evicted += 1;
            }
            keep
        });

        if evicted > 0 {
            debug!(evicted = evicted, "Evicted idle rate limit windows");
        }
        evicted
    }

    fn admit(&self, identity: &CallerIdentity) -> RateDecision {
        let window = self.window_for(identity);
        let mut timestamps = window.lock();

        // Never let "now" fall behind the newest admission for this identity.
        let now = timestamps
            .back()
            .map_or_else(|| self.clock.now(), |&newest| newest.max(self.clock.now()));

        if let Some(cutoff) = now.checked_sub(self.config.window) {
            while timestamps.front().is_some_and(|&ts| ts <= cutoff) {
                timestamps.pop_front();
            }
        }

        let limit = self.config.max_requests;
        let in_window = timestamps.len();

        if in_window >= limit as usize {
            let retry_after = timestamps
                .front()
                .map_or(Duration::ZERO, |&oldest| {
                    oldest
                        .checked_add(self.config.window)
                        .map_or(Duration::MAX, |expires| expires.saturating_sub(now))
                });

            debug!(
                caller = %identity,
                in_window = in_window,
                limit = limit,
                retry_after_ms = retry_after.as_millis() as u64,
                "Rate limit exceeded"
            );

            return RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                retry_after,
            };
        }

        timestamps.push_back(now);

        RateDecision {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(timestamps.len() as u32),
            retry_after: Duration::ZERO,
        }
    }
}

impl RateLimiter for SlidingWindowLimiter {
    fn check(&self, identity: &CallerIdentity) -> RateDecision {
        let decision = self.admit(identity);

        if (self.checks.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.evict_idle();
        }
        decision
    }
}

impl fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("config", &self.config)
            .field("tracked_identities", &self.windows.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::ManualClock;

    fn limiter(window_secs: u64, max: u32) -> (SlidingWindowLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(Duration::from_secs(1_000)));
        let limiter = SlidingWindowLimiter::with_clock(
            RateLimitConfig::new(Duration::from_secs(window_secs), max),
            clock.clone(),
        );
        (limiter, clock)
    }

    fn caller(id: &str) -> CallerIdentity {
        CallerIdentity::new(id)
    }

    #[test]
    fn test_sixth_call_within_a_second_is_denied() {
        let (limiter, clock) = limiter(60, 5);
        let u1 = caller("u1");

        let results: Vec<bool> = (0..6)
            .map(|_| {
                clock.advance(Duration::from_millis(100));
                limiter.allow(&u1)
            })
            .collect();

        assert_eq!(results, vec![true, true, true, true, true, false]);
    }

    #[test]
    fn test_first_call_always_passes() {
        let (limiter, _clock) = limiter(60, 1);
        assert!(limiter.allow(&caller("fresh")));
    }

    #[test]
    fn test_denied_call_is_not_recorded() {
        let (limiter, _clock) = limiter(60, 2);
        let u1 = caller("u1");

        assert!(limiter.allow(&u1));
        assert!(limiter.allow(&u1));
        for _ in 0..10 {
            assert!(!limiter.allow(&u1));
        }
        assert_eq!(limiter.recorded(&u1), 2);
    }

    #[test]
    fn test_admission_resumes_after_oldest_leaves_window() {
        let (limiter, clock) = limiter(60, 2);
        let u1 = caller("u1");

        assert!(limiter.allow(&u1));
        clock.advance(Duration::from_secs(10));
        assert!(limiter.allow(&u1));
        assert!(!limiter.allow(&u1));

        // Oldest entry sits exactly on the cutoff: discarded.
        clock.advance(Duration::from_secs(50));
        assert!(limiter.allow(&u1));
        assert!(!limiter.allow(&u1));

        // Second entry expires 60s after it was recorded.
        clock.advance(Duration::from_secs(10));
        assert!(limiter.allow(&u1));
    }

    #[test]
    fn test_entry_just_inside_window_is_kept() {
        let (limiter, clock) = limiter(60, 1);
        let u1 = caller("u1");

        assert!(limiter.allow(&u1));
        clock.advance(Duration::from_millis(59_999));
        assert!(!limiter.allow(&u1));
        clock.advance(Duration::from_millis(1));
        assert!(limiter.allow(&u1));
    }

    #[test]
    fn test_identities_are_independent() {
        let (limiter, _clock) = limiter(60, 1);

        assert!(limiter.allow(&caller("a")));
        assert!(!limiter.allow(&caller("a")));
        assert!(limiter.allow(&caller("b")));
        assert_eq!(limiter.tracked_identities(), 2);
    }

    #[test]
    fn test_decision_reports_remaining_and_retry_after() {
        let (limiter, clock) = limiter(60, 3);
        let u1 = caller("u1");

        assert_eq!(limiter.check(&u1).remaining, 2);
        clock.advance(Duration::from_secs(15));
        assert_eq!(limiter.check(&u1).remaining, 1);
        assert_eq!(limiter.check(&u1).remaining, 0);

        let denied = limiter.check(&u1);
        assert!(!denied.allowed);
        assert_eq!(denied.limit, 3);
        assert_eq!(denied.retry_after, Duration::from_secs(45));
    }

    #[test]
    fn test_clock_regression_does_not_keep_stale_entries() {
        let (limiter, clock) = limiter(60, 1);
        let u1 = caller("u1");

        assert!(limiter.allow(&u1));
        // Clock jumps backwards; the limiter keeps counting from the newest
        // admission instead of treating the old entry as future-dated.
        clock.set(Duration::from_secs(100));
        assert!(!limiter.allow(&u1));
        clock.set(Duration::from_secs(1_060));
        assert!(limiter.allow(&u1));
    }

    #[test]
    fn test_early_process_lifetime_keeps_all_entries() {
        let clock = Arc::new(ManualClock::at(Duration::ZERO));
        let limiter = SlidingWindowLimiter::with_clock(
            RateLimitConfig::new(Duration::from_secs(60), 2),
            clock.clone(),
        );
        let u1 = caller("u1");

        assert!(limiter.allow(&u1));
        clock.advance(Duration::from_secs(1));
        assert!(limiter.allow(&u1));
        assert!(!limiter.allow(&u1));
    }

    #[test]
    fn test_huge_window_denies_without_overflow() {
        let (limiter, _clock) = limiter(u64::MAX, 1);
        let u1 = caller("u1");

        assert!(limiter.allow(&u1));
        let denied = limiter.check(&u1);
        assert!(!denied.allowed);
        assert_eq!(denied.retry_after, Duration::MAX);
    }

    #[test]
    fn test_evict_idle_drops_expired_identities_only() {
        let (limiter, clock) = limiter(60, 2);

        assert!(limiter.allow(&caller("idle")));
        clock.advance(Duration::from_secs(30));
        assert!(limiter.allow(&caller("active")));

        clock.advance(Duration::from_secs(30));
        assert_eq!(limiter.evict_idle(), 1);
        assert_eq!(limiter.tracked_identities(), 1);
        assert_eq!(limiter.recorded(&caller("active")), 1);
        assert_eq!(limiter.recorded(&caller("idle")), 0);

        // A returning identity starts with a fresh quota.
        assert_eq!(limiter.check(&caller("idle")).remaining, 1);
    }

    #[test]
    fn test_evict_idle_keeps_everything_early_in_process_lifetime() {
        let clock = Arc::new(ManualClock::at(Duration::from_secs(10)));
        let limiter = SlidingWindowLimiter::with_clock(
            RateLimitConfig::new(Duration::from_secs(60), 2),
            clock,
        );

        assert!(limiter.allow(&caller("u1")));
        assert_eq!(limiter.evict_idle(), 0);
        assert_eq!(limiter.tracked_identities(), 1);
    }

    #[test]
    fn test_periodic_sweep_bounds_table_size() {
        let (limiter, clock) = limiter(1, 1);

        for i in 0..SWEEP_INTERVAL - 1 {
            assert!(limiter.allow(&caller(&format!("caller-{i}"))));
        }
        assert_eq!(limiter.tracked_identities(), (SWEEP_INTERVAL - 1) as usize);

        clock.advance(Duration::from_secs(5));
        assert!(limiter.allow(&caller("last")));
        assert_eq!(limiter.tracked_identities(), 1);
    }

    #[test]
    fn test_default_config() {
        let config = RateLimitConfig::default();
        assert_eq!(config.window, Duration::from_secs(60));
        assert_eq!(config.max_requests, 5);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checks_same_identity_are_linearized() {
        let limiter = Arc::new(SlidingWindowLimiter::new(RateLimitConfig::new(
            Duration::from_secs(60),
            25,
        )));

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.allow(&CallerIdentity::new("shared")) })
            })
            .collect();

        let mut admitted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 25);
        assert_eq!(limiter.recorded(&CallerIdentity::new("shared")), 25);
    }
}
