// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Attack simulation patterns for security testing.

use std::time::Duration;

/// What each simulated message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Ordinary chat text
    Benign,
    /// Script, markup and SQL-like payloads in rotation
    Injection,
    /// Benign text carrying a URL to an internal target
    InternalUrl,
    /// Long runs of formatting markers
    FormattingFlood,
}

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Total number of messages to send
    pub total_messages: usize,
    /// Messages per second across all identities
    pub messages_per_second: f64,
    /// Number of distinct identities sending
    pub unique_identities: usize,
    /// Content of every message
    pub payload: Payload,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            total_messages: 100,
            messages_per_second: 10.0,
            unique_identities: 1,
            payload: Payload::Benign,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// One user hammering the bot.
    pub fn single_user_flood() -> Self {
        Self {
            total_messages: 200,
            messages_per_second: 20.0,
            ..Default::default()
        }
    }

    /// Many accounts, each at a modest rate.
    pub fn distributed_flood() -> Self {
        Self {
            total_messages: 1_000,
            messages_per_second: 50.0,
            unique_identities: 100,
            ..Default::default()
        }
    }

    /// One user staying just under the limit for several minutes.
    pub fn slow_drip() -> Self {
        Self {
            total_messages: 120,
            // 0.45/s is 27 per minute, under the default 30
            messages_per_second: 0.45,
            ..Default::default()
        }
    }

    /// A burst long enough to trip the block, then silence.
    pub fn burst() -> Self {
        Self {
            total_messages: 60,
            messages_per_second: 500.0,
            ..Default::default()
        }
    }

    /// Injection payloads spread over enough users to avoid throttling.
    pub fn injection_campaign() -> Self {
        Self {
            total_messages: 290,
            messages_per_second: 10.0,
            unique_identities: 29,
            payload: Payload::Injection,
        }
    }

    /// Every message asks the bot to fetch an internal address.
    pub fn ssrf_campaign() -> Self {
        Self {
            total_messages: 84,
            messages_per_second: 5.0,
            unique_identities: 21,
            payload: Payload::InternalUrl,
        }
    }

    /// Markdown marker floods meant to wreck rendering.
    pub fn formatting_flood() -> Self {
        Self {
            total_messages: 50,
            messages_per_second: 5.0,
            unique_identities: 5,
            payload: Payload::FormattingFlood,
        }
    }

    /// Virtual send offset of message `index`.
    pub fn offset(&self, index: usize) -> Duration {
        Duration::from_secs_f64(index as f64 / self.messages_per_second)
    }

    /// Calculate expected duration for the attack.
    pub fn expected_duration(&self) -> Duration {
        self.offset(self.total_messages)
    }
}

/// Expected outcomes for an attack pattern.
pub struct AttackExpectations {
    /// Maximum ratio of messages that may be accepted
    pub max_accepted_ratio: f64,
    /// Description of expected behavior
    pub description: &'static str,
}

impl AttackConfig {
    /// Get expected outcomes for this attack pattern under `max_requests`
    /// per `window`.
    pub fn expectations(&self, max_requests: u32, window: Duration) -> AttackExpectations {
        match self.payload {
            Payload::Injection => AttackExpectations {
                max_accepted_ratio: 0.0,
                description: "Every injection payload is rejected",
            },
            Payload::InternalUrl | Payload::FormattingFlood | Payload::Benign => {
                // Each identity gets at most one window's worth before the block
                let per_identity = self.total_messages as f64 / self.unique_identities as f64;
                let windows = (self.expected_duration().as_secs_f64() / window.as_secs_f64())
                    .ceil()
                    .max(1.0);
                let cap = (max_requests as f64 * windows / per_identity).min(1.0);
                AttackExpectations {
                    max_accepted_ratio: cap,
                    description: "Each identity is capped at max_requests per window",
                }
            }
        }
    }
}
