// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Chat Abuse Guard
//!
//! This crate protects a chat bot from abusive and adversarial traffic:
//!
//! - Per-user sliding window rate limiting with a temporary block
//! - Hard rejection of script, HTML-abuse and SQL-like payloads
//! - Idempotent escaping of markup in accepted text
//! - SSRF checks (scheme, host, literal and resolved addresses) for URLs
//!   the bot fetches
//!
//! [`AbuseGuard`] wires the [`RateLimiter`] and [`InputValidator`] into a
//! single call per inbound message.

pub mod config;
pub mod error;
pub mod guard;
pub mod handlers;
pub mod identity;
pub mod limiter;
pub mod metrics;
pub mod network;
pub mod resolver;
pub mod rules;
pub mod validator;

pub use config::Config;
pub use error::{ConfigError, Error, Result};
pub use guard::{AbuseGuard, MessageVerdict, UrlVerdict};
pub use identity::Identity;
pub use limiter::{Admission, AdmissionReason, RateLimiter};
pub use rules::TextRejection;
pub use validator::{InputValidator, NormalizedUrl, SanitizedText, UrlRejection};
