// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Chat input validator.
//!
//! Screens message text and outbound URLs:
//! - Length ceilings for text and URLs
//! - Script injection, markup abuse and SQL-like payload rejection
//! - Markdown/HTML escaping of accepted text
//! - Scheme allow-list for URLs
//! - SSRF guard: loopback, private, link-local and metadata targets are
//!   refused whether written as literals, encoded IPv4 or DNS names

use crate::config::ValidationConfig;
use crate::error::ConfigError;
use crate::network::NetworkPolicy;
use crate::resolver::{HostResolver, SystemResolver};
use crate::rules::{visible_len, RuleSet, TextRejection};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use url::{Host, Url};

/// Why a URL was refused.
///
/// The display text is generic and never echoes the URL.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrlRejection {
    #[error("URL is too long")]
    TooLong,

    #[error("Invalid URL format")]
    Malformed,

    #[error("URL scheme is not allowed")]
    BadScheme,

    #[error("Access to local/private resources is not allowed")]
    PrivateTarget,

    #[error("URL host could not be resolved")]
    ResolutionFailed,
}

impl UrlRejection {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TooLong => "too_long",
            Self::Malformed => "malformed",
            Self::BadScheme => "bad_scheme",
            Self::PrivateTarget => "private_target",
            Self::ResolutionFailed => "resolution_failed",
        }
    }
}

/// Accepted message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText {
    /// Text to use downstream in place of the original
    pub text: String,
    /// Whether `text` differs from the input (trimming included)
    pub rewritten: bool,
    /// Rewrite rules that fired, in order
    pub applied: Vec<&'static str>,
}

/// A URL that passed every check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedUrl {
    url: Url,
    resolved: Vec<IpAddr>,
}

impl NormalizedUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Vetted addresses; connect to these rather than resolving again.
    pub fn resolved(&self) -> &[IpAddr] {
        &self.resolved
    }

    pub fn into_url(self) -> Url {
        self.url
    }
}

impl fmt::Display for NormalizedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// Chat input validator. Immutable after construction.
pub struct InputValidator {
    config: ValidationConfig,
    rules: RuleSet,
    network: NetworkPolicy,
    schemes: Vec<String>,
    resolver: Arc<dyn HostResolver>,
    url_pattern: Regex,
}

impl InputValidator {
    /// Create a validator that resolves hosts through the operating system.
    pub fn new(config: ValidationConfig) -> Result<Self, ConfigError> {
        Self::with_resolver(config, Arc::new(SystemResolver))
    }

    /// Create a validator with a custom resolver.
    pub fn with_resolver(
        config: ValidationConfig,
        resolver: Arc<dyn HostResolver>,
    ) -> Result<Self, ConfigError> {
        let rules = RuleSet::default_rules(&config)?;
        Self::with_rules(config, rules, resolver)
    }

    /// Create a validator with a custom rule set.
    pub fn with_rules(
        config: ValidationConfig,
        rules: RuleSet,
        resolver: Arc<dyn HostResolver>,
    ) -> Result<Self, ConfigError> {
        let network = NetworkPolicy::new(&config.denied_network_ranges, &config.denied_hosts)?;
        let schemes = config
            .allowed_url_schemes
            .iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .collect();
        let url_pattern = Regex::new(r#"(?i)\bhttps?://[^\s<>"'`]+"#).map_err(|source| {
            ConfigError::InvalidPattern {
                rule: "url_extract".to_string(),
                source,
            }
        })?;

        Ok(Self {
            config,
            rules,
            network,
            schemes,
            resolver,
            url_pattern,
        })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate and sanitize message text.
    ///
    /// The length ceiling applies to [`visible_len`], so text this method
    /// returns is accepted again unchanged.
    pub fn sanitize_text(&self, text: &str) -> Result<SanitizedText, TextRejection> {
        if visible_len(text) > self.config.max_text_length {
            debug!(reason = "too_long", "Text rejected");
            return Err(TextRejection::TooLong);
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            debug!(reason = "empty", "Text rejected");
            return Err(TextRejection::Empty);
        }

        match self.rules.apply(trimmed) {
            Ok(outcome) => {
                let rewritten = outcome.text != text;
                debug!(rewritten, applied = ?outcome.applied, "Text accepted");
                Ok(SanitizedText {
                    text: outcome.text,
                    rewritten,
                    applied: outcome.applied,
                })
            }
            Err((rule, reason)) => {
                debug!(rule, reason = reason.code(), "Text rejected");
                Err(reason)
            }
        }
    }

    /// Validate a URL before anything fetches it.
    pub async fn validate_url(&self, raw: &str) -> Result<NormalizedUrl, UrlRejection> {
        let result = self.check_url(raw).await;
        match &result {
            Ok(url) => debug!(host = ?url.url.host_str(), "URL accepted"),
            Err(reason) => debug!(reason = reason.code(), "URL rejected"),
        }
        result
    }

    async fn check_url(&self, raw: &str) -> Result<NormalizedUrl, UrlRejection> {
        let raw = raw.trim();
        if raw.len() > self.config.max_url_length {
            return Err(UrlRejection::TooLong);
        }

        let mut url = Url::parse(raw).map_err(|_| UrlRejection::Malformed)?;

        if !self.schemes.iter().any(|s| s == url.scheme()) {
            return Err(UrlRejection::BadScheme);
        }

        // WHATWG host parsing already turned decimal, hex and octal IPv4
        // forms into plain addresses.
        let host = url.host().map(|h| h.to_owned()).ok_or(UrlRejection::Malformed)?;
        let resolved = match host {
            Host::Ipv4(v4) => self.vet_addresses(vec![IpAddr::V4(v4)])?,
            Host::Ipv6(v6) => self.vet_addresses(vec![IpAddr::V6(v6)])?,
            Host::Domain(domain) => {
                if domain.is_empty() {
                    return Err(UrlRejection::Malformed);
                }
                if self.network.is_denied_host(&domain) {
                    return Err(UrlRejection::PrivateTarget);
                }
                let port = url.port_or_known_default().unwrap_or(80);
                let addrs = self.resolve(&domain, port).await?;
                self.vet_addresses(addrs)?
            }
        };

        url.set_fragment(None);
        Ok(NormalizedUrl { url, resolved })
    }

    async fn resolve(&self, host: &str, port: u16) -> Result<Vec<IpAddr>, UrlRejection> {
        let lookup = self.resolver.resolve(host, port);
        match tokio::time::timeout(self.config.dns_timeout(), lookup).await {
            Ok(Ok(addrs)) if !addrs.is_empty() => Ok(addrs),
            Ok(Ok(_)) => Err(UrlRejection::ResolutionFailed),
            Ok(Err(err)) => {
                debug!(error = %err, "DNS resolution failed");
                Err(UrlRejection::ResolutionFailed)
            }
            Err(_) => {
                debug!(timeout = ?self.config.dns_timeout(), "DNS resolution timed out");
                Err(UrlRejection::ResolutionFailed)
            }
        }
    }

    /// Every address must be outside the denied ranges.
    fn vet_addresses(&self, addrs: Vec<IpAddr>) -> Result<Vec<IpAddr>, UrlRejection> {
        if addrs.iter().any(|ip| self.network.is_denied_ip(*ip)) {
            return Err(UrlRejection::PrivateTarget);
        }
        Ok(addrs)
    }

    /// Find `http(s)` URLs in message text, in order, without duplicates.
    pub fn extract_urls(&self, text: &str) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();
        for m in self.url_pattern.find_iter(text) {
            let url = trim_trailing_punctuation(m.as_str());
            if !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
        }
        urls
    }
}

/// Strip sentence punctuation and unbalanced closing brackets from a URL
/// found in prose.
fn trim_trailing_punctuation(url: &str) -> &str {
    let mut end = url.len();
    loop {
        let current = &url[..end];
        let Some(last) = current.chars().last() else {
            break;
        };
        let strip = match last {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => current.matches('(').count() < current.matches(')').count(),
            ']' => current.matches('[').count() < current.matches(']').count(),
            _ => false,
        };
        if !strip {
            break;
        }
        end -= last.len_utf8();
    }
    &url[..end]
}
