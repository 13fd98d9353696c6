// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Message screening pipeline.
//!
//! Every inbound message passes the rate limiter first, then text
//! validation, then per-URL checks for each link the message carries.
//! Rejections are logged with the identity and reason code only.

use crate::config::Config;
use crate::error::Result;
use crate::identity::Identity;
use crate::limiter::{Admission, RateLimiter};
use crate::metrics::GuardMetrics;
use crate::rules::TextRejection;
use crate::validator::{InputValidator, NormalizedUrl, SanitizedText, UrlRejection};
use std::time::Instant;
use tracing::{debug, info};

/// Verdict for one URL found in a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlVerdict {
    /// URL as it appeared in the message
    pub raw: String,
    pub result: std::result::Result<NormalizedUrl, UrlRejection>,
}

impl UrlVerdict {
    pub fn is_allowed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of screening one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageVerdict {
    /// Message may proceed using `text.text`; only allowed URLs may be fetched.
    Accepted {
        text: SanitizedText,
        urls: Vec<UrlVerdict>,
    },
    /// Sender is over the limit or blocked; retry later.
    Throttled(Admission),
    /// Message content is refused; do not retry the same input.
    Rejected(TextRejection),
}

impl MessageVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    /// Stable reason code: `ok` or the rejection code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Accepted { .. } => "ok",
            Self::Throttled(admission) => admission.reason.code(),
            Self::Rejected(reason) => reason.code(),
        }
    }
}

/// Rate limiter and validator wired into the inbound message flow.
pub struct AbuseGuard {
    limiter: RateLimiter,
    validator: InputValidator,
    metrics: GuardMetrics,
}

impl AbuseGuard {
    pub fn new(limiter: RateLimiter, validator: InputValidator) -> Result<Self> {
        Ok(Self {
            limiter,
            validator,
            metrics: GuardMetrics::new()?,
        })
    }

    /// Build a guard from configuration, resolving hosts through the OS.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let limiter = RateLimiter::new(config.rate_limit.clone());
        let validator = InputValidator::new(config.validation.clone())?;
        Self::new(limiter, validator)
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn validator(&self) -> &InputValidator {
        &self.validator
    }

    pub fn metrics(&self) -> &GuardMetrics {
        &self.metrics
    }

    /// Screen one inbound message received at `now`.
    pub async fn screen_message(
        &self,
        identity: &Identity,
        text: &str,
        now: Instant,
    ) -> MessageVerdict {
        let admission = self.limiter.admit(identity, now);
        self.metrics.record_admission(admission.reason);
        if !admission.allowed {
            info!(%identity, reason = admission.reason.code(), "Message throttled");
            return MessageVerdict::Throttled(admission);
        }

        let sanitized = match self.validator.sanitize_text(text) {
            Ok(sanitized) => sanitized,
            Err(reason) => {
                self.metrics.record_text(reason.code());
                info!(%identity, reason = reason.code(), "Message rejected");
                return MessageVerdict::Rejected(reason);
            }
        };
        self.metrics.record_text("accepted");

        let max_urls = self.validator.config().max_urls_per_message;
        let mut urls = Vec::new();
        for raw in self.validator.extract_urls(text).into_iter().take(max_urls) {
            let result = self.check_url(identity, &raw).await;
            urls.push(UrlVerdict { raw, result });
        }

        debug!(
            %identity,
            remaining = admission.remaining,
            urls = urls.len(),
            "Message accepted"
        );
        MessageVerdict::Accepted {
            text: sanitized,
            urls,
        }
    }

    /// Check a single outbound fetch target on behalf of `identity`.
    pub async fn check_url(
        &self,
        identity: &Identity,
        raw: &str,
    ) -> std::result::Result<NormalizedUrl, UrlRejection> {
        let result = self.validator.validate_url(raw).await;
        match &result {
            Ok(_) => self.metrics.record_url("accepted"),
            Err(reason) => {
                self.metrics.record_url(reason.code());
                info!(%identity, reason = reason.code(), "URL rejected");
            }
        }
        result
    }

    /// Lift a block on `identity`.
    pub fn unblock(&self, identity: &Identity) -> bool {
        let lifted = self.limiter.unblock(identity, Instant::now());
        self.metrics
            .set_tracked_identities(self.limiter.tracked_identities());
        lifted
    }

    /// Evict idle identities and refresh the tracked-identities gauge.
    pub fn sweep(&self, now: Instant) -> usize {
        let evicted = self.limiter.sweep(now);
        self.metrics
            .set_tracked_identities(self.limiter.tracked_identities());
        evicted
    }
}
