//! # Rate Limiter
//!
//! Sliding-window request log per `(rule, client)`. Rules are matched by
//! path prefix, longest prefix first. The log itself sits behind
//! [`RateLimitStore`]; [`MemoryRateStore`] keeps it in process under a
//! single mutex, so concurrent requests from the same client can neither
//! lose nor double-count an increment.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use hashbrown::HashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ============================================================================
// Rules
// ============================================================================

/// `max_requests` per `window` for every path starting with `prefix`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub prefix: String,
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitRule {
    pub fn new(prefix: impl Into<String>, max_requests: u32, window_secs: u64) -> Self {
        Self {
            prefix: prefix.into(),
            max_requests,
            window_secs,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Parse `prefix=max/window_secs`.
    pub fn parse(raw: &str) -> Result<Self> {
        let bad = || Error::Config(format!("invalid rate limit rule '{raw}' (expected prefix=max/window_secs)"));
        let (prefix, limits) = raw.trim().rsplit_once('=').ok_or_else(bad)?;
        let (max, window) = limits.split_once('/').ok_or_else(bad)?;
        let max_requests: u32 = max.trim().parse().map_err(|_| bad())?;
        let window_secs: u64 = window.trim().parse().map_err(|_| bad())?;
        if prefix.is_empty() || window_secs == 0 {
            return Err(bad());
        }
        Ok(Self::new(prefix.trim(), max_requests, window_secs))
    }

    /// Parse a comma-separated rule list. Empty entries are skipped.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Self::parse)
            .collect()
    }
}

// ============================================================================
// Decisions
// ============================================================================

/// Outcome of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No rule covers the path.
    Unlimited,
    /// Counted and let through.
    Allowed(Quota),
    /// Over the limit; not counted.
    Limited(Quota),
}

/// Rule state as seen by one client at decision time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quota {
    pub limit: u32,
    pub window_secs: u64,
    pub remaining: u32,
    /// Time until the oldest counted request leaves the window.
    pub reset_after: Duration,
}

impl Quota {
    /// Whole seconds to wait before retrying, at least 1.
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.reset_after.as_secs();
        let rounded = if self.reset_after.subsec_nanos() > 0 { secs + 1 } else { secs };
        rounded.max(1)
    }
}

// ============================================================================
// Store contract
// ============================================================================

/// `(rule index, client)`.
pub type RateKey = (usize, String);

/// A key's window as seen by one `record` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowState {
    /// Whether the request was counted.
    pub admitted: bool,
    /// Requests in the window after this call.
    pub used: u32,
    pub oldest: Option<Instant>,
}

/// Where request timestamps live.
///
/// `record` must be linearizable per key: two concurrent calls for the
/// same key never both see the same count.
pub trait RateLimitStore: Send + Sync + 'static {
    /// Evict entries older than `window`, then count `now` if fewer than
    /// `max` remain.
    fn record(&self, key: &RateKey, now: Instant, window: Duration, max: u32) -> WindowState;

    /// Evict expired entries everywhere and forget empty keys. `window_of`
    /// maps a rule index to its window; unknown rules are forgotten.
    /// Returns how many keys were forgotten.
    fn prune(&self, now: Instant, window_of: &dyn Fn(usize) -> Option<Duration>) -> usize;

    fn tracked_keys(&self) -> usize;
}

/// In-process store: one mutex over every key's request log.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    log: Mutex<HashMap<RateKey, VecDeque<Instant>>>,
}

impl RateLimitStore for MemoryRateStore {
    fn record(&self, key: &RateKey, now: Instant, window: Duration, max: u32) -> WindowState {
        let mut log = self.log.lock();
        let entries = log.entry(key.clone()).or_default();
        evict(entries, now, window);

        let admitted = (entries.len() as u32) < max;
        if admitted {
            entries.push_back(now);
        }
        WindowState {
            admitted,
            used: entries.len() as u32,
            oldest: entries.front().copied(),
        }
    }

    fn prune(&self, now: Instant, window_of: &dyn Fn(usize) -> Option<Duration>) -> usize {
        let mut log = self.log.lock();
        let before = log.len();
        log.retain(|(idx, _), entries| {
            match window_of(*idx) {
                Some(window) => evict(entries, now, window),
                None => entries.clear(),
            }
            !entries.is_empty()
        });
        before - log.len()
    }

    fn tracked_keys(&self) -> usize {
        self.log.lock().len()
    }
}

fn evict(entries: &mut VecDeque<Instant>, now: Instant, window: Duration) {
    while let Some(front) = entries.front() {
        if now.saturating_duration_since(*front) >= window {
            entries.pop_front();
        } else {
            break;
        }
    }
}

// ============================================================================
// RateLimiter
// ============================================================================

/// Sliding-window limiter over a [`RateLimitStore`].
#[derive(Debug, Default)]
pub struct RateLimiter<S: RateLimitStore = MemoryRateStore> {
    /// Sorted by descending prefix length.
    rules: Vec<RateLimitRule>,
    store: S,
}

impl RateLimiter {
    pub fn new(rules: Vec<RateLimitRule>) -> Self {
        Self::with_store(rules, MemoryRateStore::default())
    }
}

impl<S: RateLimitStore> RateLimiter<S> {
    pub fn with_store(mut rules: Vec<RateLimitRule>, store: S) -> Self {
        rules.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));
        Self { rules, store }
    }

    pub fn rules(&self) -> &[RateLimitRule] {
        &self.rules
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The rule with the longest prefix of `path`.
    pub fn rule_for(&self, path: &str) -> Option<&RateLimitRule> {
        self.rule_index(path).map(|idx| &self.rules[idx])
    }

    fn rule_index(&self, path: &str) -> Option<usize> {
        self.rules.iter().position(|r| path.starts_with(&r.prefix))
    }

    pub fn check(&self, client: &str, path: &str) -> Decision {
        self.check_at(client, path, Instant::now())
    }

    /// Decide and, when allowed, count a request made at `now`.
    pub fn check_at(&self, client: &str, path: &str, now: Instant) -> Decision {
        let Some(idx) = self.rule_index(path) else {
            return Decision::Unlimited;
        };
        let rule = &self.rules[idx];
        let window = rule.window();

        let state = self
            .store
            .record(&(idx, client.to_owned()), now, window, rule.max_requests);
        let quota = Quota {
            limit: rule.max_requests,
            window_secs: rule.window_secs,
            remaining: rule.max_requests.saturating_sub(state.used),
            reset_after: state
                .oldest
                .map(|oldest| (oldest + window).saturating_duration_since(now))
                .unwrap_or(window),
        };

        if state.admitted {
            Decision::Allowed(quota)
        } else {
            tracing::warn!(client, path, limit = rule.max_requests, "rate limit exceeded");
            Decision::Limited(quota)
        }
    }

    pub fn prune(&self) -> usize {
        self.prune_at(Instant::now())
    }

    /// Drop timestamps older than their rule's window and forget clients
    /// with nothing left. Returns how many clients were forgotten.
    pub fn prune_at(&self, now: Instant) -> usize {
        self.store
            .prune(now, &|idx| self.rules.get(idx).map(RateLimitRule::window))
    }

    /// Number of `(rule, client)` keys currently tracked.
    pub fn tracked_keys(&self) -> usize {
        self.store.tracked_keys()
    }
}
