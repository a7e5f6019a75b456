//! Per-client, per-route rate limiting for sensitive endpoints.
//!
//! Fixed-window counters: the first request from a key stamps the window
//! start, requests inside the window increment the counter, and a request
//! past `limit` is denied with the time left until the window resets. A
//! request arriving after the window elapsed resets the counter.
//!
//! The counter store is an injection seam: [`InMemoryStore`] keeps
//! process-local counters (per-instance limits under multi-instance
//! deployment - adequate for abuse mitigation, not strict quotas), and a
//! distributed atomic-counter backend can implement [`RateLimitStore`]
//! behind the same `check` contract when global accuracy is required.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitSettings;
use crate::errors::Error;

/// Stable caller-facing reason attached to denials.
const DENIED_REASON: &str = "Too many requests. Please retry later.";

/// Map size at which [`InMemoryStore`] sweeps elapsed windows on the next
/// check. Keys are attacker-controlled (client addresses), so elapsed
/// entries cannot be allowed to accumulate for the process lifetime.
const SWEEP_THRESHOLD: usize = 1024;

/// Rate limit check result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Request is within the limit; `remaining` requests left in this window
    Allowed { remaining: u32 },
    /// Over the limit; the window resets after `retry_after`
    Denied { retry_after: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Counter storage contract.
///
/// `check` both reads and advances the counter for `key` - a pure decision
/// function over mutable counters; it never blocks the caller.
pub trait RateLimitStore: Send + Sync {
    fn check(&self, key: &str, settings: &RateLimitSettings, now: Instant) -> Decision;
}

#[derive(Debug)]
struct Window {
    start: Instant,
    count: u32,
}

/// Process-local counter store.
///
/// Windows live only as long as the process; restarts reset all counters
/// (the baseline durability trade-off). Elapsed windows are swept out once
/// the map grows past [`SWEEP_THRESHOLD`], so the store stays bounded by
/// the number of keys active within one window, not every key ever seen.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    windows: DashMap<String, Window>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for InMemoryStore {
    fn check(&self, key: &str, settings: &RateLimitSettings, now: Instant) -> Decision {
        // Sweep before taking the entry: retain would deadlock against a
        // held shard guard
        if self.windows.len() >= SWEEP_THRESHOLD {
            self.windows
                .retain(|_, window| now.duration_since(window.start) < settings.window);
        }

        let mut entry = self.windows.entry(key.to_string()).or_insert(Window { start: now, count: 0 });

        // Window elapsed: restart it
        if now.duration_since(entry.start) >= settings.window {
            entry.start = now;
            entry.count = 0;
        }

        if entry.count >= settings.limit {
            let retry_after = settings.window.saturating_sub(now.duration_since(entry.start));
            return Decision::Denied { retry_after };
        }

        entry.count += 1;
        Decision::Allowed {
            remaining: settings.limit - entry.count,
        }
    }
}

/// Rate limiter bound to one settings profile and one counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    settings: RateLimitSettings,
}

impl RateLimiter {
    pub fn new(settings: RateLimitSettings) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), settings)
    }

    pub fn with_store(store: Arc<dyn RateLimitStore>, settings: RateLimitSettings) -> Self {
        Self { store, settings }
    }

    /// Check and advance the counter for `key`.
    pub fn check(&self, key: &str) -> Decision {
        self.check_at(key, Instant::now())
    }

    /// [`Self::check`] with an explicit clock, for deterministic window tests.
    pub fn check_at(&self, key: &str, now: Instant) -> Decision {
        self.store.check(key, &self.settings, now)
    }

    /// Check `key` and turn a denial into the caller-facing error carrying
    /// the retry delay and the stable reason string.
    pub fn check_or_reject(&self, key: &str) -> Result<(), Error> {
        match self.check(key) {
            Decision::Allowed { .. } => Ok(()),
            Decision::Denied { retry_after } => Err(Error::RateLimited {
                retry_after,
                reason: DENIED_REASON.to_string(),
            }),
        }
    }
}

/// Compose the limiter key from the client address and the route, so limits
/// are per-endpoint, per-client.
pub fn client_key(ip: &str, route: &str) -> String {
    format!("{ip}:{route}")
}
