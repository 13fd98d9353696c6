// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding window rate limiter with escalation to a temporary block.
//!
//! Each identity owns a log of admitted request timestamps. A request is
//! admitted while fewer than `max_requests` timestamps fall inside the
//! trailing window. The request that finds the window full is rejected and
//! blocks the identity for `block_duration_secs`; while blocked, the log is
//! left alone and every request is refused. Once the block expires the
//! identity starts over with an empty log.
//!
//! State lives in a sharded map; the shard lock is held for the whole
//! count-then-append sequence so concurrent requests from one identity
//! cannot both squeeze under the limit.

use crate::config::{BlockPolicy, RateLimitConfig};
use crate::identity::Identity;
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Why a request was admitted or refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionReason {
    /// Request admitted
    Ok,
    /// Window was full; the identity is now blocked
    RateExceeded,
    /// Identity is serving a block
    Blocked,
}

impl AdmissionReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::RateExceeded => "rate_exceeded",
            Self::Blocked => "blocked",
        }
    }
}

impl std::fmt::Display for AdmissionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::RateExceeded => write!(f, "Too many requests. Please slow down."),
            Self::Blocked => write!(f, "Temporarily blocked due to excessive usage"),
        }
    }
}

/// Result of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub reason: AdmissionReason,
    /// Requests left in the current window after this one
    pub remaining: u32,
    /// How long until a retry can succeed, for refused requests
    pub retry_after: Option<Duration>,
}

impl Admission {
    fn admitted(remaining: u32) -> Self {
        Self {
            allowed: true,
            reason: AdmissionReason::Ok,
            remaining,
            retry_after: None,
        }
    }

    fn refused(reason: AdmissionReason, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            reason,
            remaining: 0,
            retry_after: Some(retry_after),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Read-only view of one identity's limiter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Admitted requests still inside the window
    pub in_window: u32,
    /// Requests that would still be admitted right now
    pub remaining: u32,
    /// Expiry of an active block
    pub blocked_until: Option<Instant>,
}

/// Per-identity request log and block entry.
#[derive(Debug, Default)]
struct IdentityState {
    /// Admitted request timestamps, non-decreasing
    log: VecDeque<Instant>,
    /// Block expiry, if a block was ever set and not yet cleared
    blocked_until: Option<Instant>,
}

impl IdentityState {
    /// Drop timestamps older than `now - window`. A timestamp exactly
    /// `window` old is still inside.
    fn purge(&mut self, now: Instant, window: Duration) {
        while let Some(&oldest) = self.log.front() {
            if now.saturating_duration_since(oldest) > window {
                self.log.pop_front();
            } else {
                break;
            }
        }
    }

    /// Append `now`, keeping the log ordered when calls arrive out of order.
    fn record(&mut self, now: Instant) {
        match self.log.back() {
            Some(&newest) if now < newest => {
                let idx = self.log.partition_point(|t| *t <= now);
                self.log.insert(idx, now);
            }
            _ => self.log.push_back(now),
        }
    }

    /// Time until the oldest logged request leaves the window.
    fn window_reset_in(&self, now: Instant, window: Duration) -> Duration {
        self.log
            .front()
            .map(|oldest| (*oldest + window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    fn active_block(&self, now: Instant) -> Option<Instant> {
        self.blocked_until.filter(|until| *until > now)
    }
}

/// Thread-safe sliding window rate limiter.
///
/// Instances are independent; create one per tenant or per test.
pub struct RateLimiter {
    /// Configuration
    config: RateLimitConfig,
    /// Per-identity state
    entries: DashMap<Identity, IdentityState>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given configuration.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Decide whether a request from `identity` at `now` is admitted.
    pub fn admit(&self, identity: &Identity, now: Instant) -> Admission {
        let window = self.config.window_duration();
        let block = self.config.block_duration();
        let max = self.config.max_requests;

        let mut state = self.entries.entry(identity.clone()).or_default();

        if let Some(until) = state.active_block(now) {
            let until = match self.config.block_policy {
                BlockPolicy::Fixed => until,
                BlockPolicy::ExtendOnViolation => {
                    let extended = now + block;
                    state.blocked_until = Some(extended);
                    extended
                }
            };
            let retry_after = until.saturating_duration_since(now);
            debug!(%identity, reason = "blocked", ?retry_after, "Request refused");
            return Admission::refused(AdmissionReason::Blocked, retry_after);
        }

        if state.blocked_until.take().is_some() {
            // Block served: fresh start.
            state.log.clear();
            debug!(%identity, "Block expired");
        }

        state.purge(now, window);

        if state.log.len() >= max as usize {
            state.blocked_until = Some(now + block);
            warn!(
                %identity,
                reason = "rate_exceeded",
                block_secs = block.as_secs(),
                "Rate limit exceeded, identity blocked"
            );
            return Admission::refused(AdmissionReason::RateExceeded, block);
        }

        state.record(now);
        let remaining = max.saturating_sub(state.log.len() as u32);
        Admission::admitted(remaining)
    }

    /// Admission check against the current monotonic time.
    pub fn admit_now(&self, identity: &Identity) -> Admission {
        self.admit(identity, Instant::now())
    }

    /// Inspect an identity without recording anything.
    pub fn status(&self, identity: &Identity, now: Instant) -> RateLimitStatus {
        let window = self.config.window_duration();
        let max = self.config.max_requests;

        let Some(state) = self.entries.get(identity) else {
            return RateLimitStatus {
                in_window: 0,
                remaining: max,
                blocked_until: None,
            };
        };

        if let Some(until) = state.active_block(now) {
            return RateLimitStatus {
                in_window: 0,
                remaining: 0,
                blocked_until: Some(until),
            };
        }

        let in_window = if state.blocked_until.is_some() {
            0
        } else {
            state
                .log
                .iter()
                .filter(|t| now.saturating_duration_since(**t) <= window)
                .count() as u32
        };

        RateLimitStatus {
            in_window,
            remaining: max.saturating_sub(in_window),
            blocked_until: None,
        }
    }

    /// Time until the identity's window frees a slot, zero if it has one now.
    pub fn reset_in(&self, identity: &Identity, now: Instant) -> Duration {
        self.entries
            .get(identity)
            .map(|state| state.window_reset_in(now, self.config.window_duration()))
            .unwrap_or(Duration::ZERO)
    }

    /// Lift a block and forget the identity's history.
    /// Returns whether a block was active.
    pub fn unblock(&self, identity: &Identity, now: Instant) -> bool {
        match self.entries.remove(identity) {
            Some((_, state)) => {
                let was_blocked = state.active_block(now).is_some();
                if was_blocked {
                    warn!(%identity, "Identity unblocked");
                }
                was_blocked
            }
            None => false,
        }
    }

    /// Evict identities with no requests in the window and no active block.
    /// Logs of retained identities are left as they are; `admit` purges them.
    /// Returns the number of evicted identities.
    pub fn sweep(&self, now: Instant) -> usize {
        let window = self.config.window_duration();
        let before = self.entries.len();

        self.entries.retain(|_, state| {
            if state.active_block(now).is_some() {
                return true;
            }
            if state.blocked_until.is_some() {
                return false;
            }
            state
                .log
                .back()
                .is_some_and(|newest| now.saturating_duration_since(*newest) <= window)
        });

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Rate limiter sweep");
        }
        evicted
    }

    /// Number of identities currently holding state.
    pub fn tracked_identities(&self) -> usize {
        self.entries.len()
    }
}
