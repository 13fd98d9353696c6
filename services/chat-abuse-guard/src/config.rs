// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the chat abuse guard.
//!
//! Defaults mirror the limits the chat bot has always shipped with:
//! 30 messages per minute, a five minute block for offenders and a
//! 4096 character message ceiling.

use crate::error::ConfigError;
use crate::network::{DEFAULT_DENIED_HOSTS, DEFAULT_DENIED_RANGES};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an optional JSON configuration file.
pub const CONFIG_FILE_ENV: &str = "ABUSE_GUARD_CONFIG";

/// Configuration for the abuse guard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Input validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// What happens to an active block when the blocked identity keeps sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockPolicy {
    /// The block expires at the time set when the limit was exceeded.
    #[default]
    Fixed,
    /// Every attempt made while blocked pushes the expiry out again.
    ExtendOnViolation,
}

impl std::str::FromStr for BlockPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed" => Ok(Self::Fixed),
            "extend_on_violation" | "extend" => Ok(Self::ExtendOnViolation),
            other => Err(ConfigError::InvalidValue {
                key: "BLOCK_POLICY",
                value: other.to_string(),
            }),
        }
    }
}

/// Sliding window rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Sliding window length in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Requests admitted per identity within one window (default: 30).
    /// Zero blocks every request.
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// How long an identity stays blocked after exceeding the limit (default: 300)
    #[serde(default = "default_block_duration_secs")]
    pub block_duration_secs: u64,

    /// Block expiry behaviour for attempts made while blocked
    #[serde(default)]
    pub block_policy: BlockPolicy,

    /// Interval of the background eviction sweep in seconds (default: 60)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

/// Text and URL validation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Maximum message length in characters (default: 4096)
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,

    /// Maximum URL length in bytes (default: 2048)
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,

    /// Longest run of one markdown marker kept verbatim (default: 4)
    #[serde(default = "default_max_marker_run")]
    pub max_marker_run: usize,

    /// URLs checked per message, extra URLs are ignored (default: 3)
    #[serde(default = "default_max_urls_per_message")]
    pub max_urls_per_message: usize,

    /// URL schemes that may be fetched (default: http, https)
    #[serde(default = "default_allowed_url_schemes")]
    pub allowed_url_schemes: Vec<String>,

    /// CIDR ranges that outbound fetches may never target
    #[serde(default = "default_denied_network_ranges")]
    pub denied_network_ranges: Vec<String>,

    /// Host names that are refused before resolution (metadata services etc.)
    #[serde(default = "default_denied_hosts")]
    pub denied_hosts: Vec<String>,

    /// Regex patterns flagged as SQL injection attempts.
    /// Empty means the built-in list.
    #[serde(default)]
    pub sql_patterns: Vec<String>,

    /// DNS resolution timeout in milliseconds (default: 2000)
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_window_secs() -> u64 {
    60
}

fn default_max_requests() -> u32 {
    30
}

fn default_block_duration_secs() -> u64 {
    300
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_max_text_length() -> usize {
    4096 // Telegram message ceiling
}

fn default_max_url_length() -> usize {
    2048
}

fn default_max_marker_run() -> usize {
    4
}

fn default_max_urls_per_message() -> usize {
    3
}

fn default_allowed_url_schemes() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

fn default_denied_network_ranges() -> Vec<String> {
    DEFAULT_DENIED_RANGES.iter().map(|s| s.to_string()).collect()
}

fn default_denied_hosts() -> Vec<String> {
    DEFAULT_DENIED_HOSTS.iter().map(|s| s.to_string()).collect()
}

fn default_dns_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: default_window_secs(),
            max_requests: default_max_requests(),
            block_duration_secs: default_block_duration_secs(),
            block_policy: BlockPolicy::default(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_text_length: default_max_text_length(),
            max_url_length: default_max_url_length(),
            max_marker_run: default_max_marker_run(),
            max_urls_per_message: default_max_urls_per_message(),
            allowed_url_schemes: default_allowed_url_schemes(),
            denied_network_ranges: default_denied_network_ranges(),
            denied_hosts: default_denied_hosts(),
            sql_patterns: Vec::new(),
            dns_timeout_ms: default_dns_timeout_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Get the sliding window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Get the block duration
    pub fn block_duration(&self) -> Duration {
        Duration::from_secs(self.block_duration_secs)
    }

    /// Get the sweep interval
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl ValidationConfig {
    /// Get the DNS resolution timeout
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }
}

impl Config {
    /// Load configuration from the optional JSON file named by
    /// `ABUSE_GUARD_CONFIG`, then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_FILE_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON configuration file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Apply overrides from a key lookup (the process environment in production).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }

        let rl = &mut self.rate_limit;
        override_parsed(&lookup, "WINDOW_SECS", &mut rl.window_secs)?;
        override_parsed(&lookup, "MAX_REQUESTS", &mut rl.max_requests)?;
        override_parsed(&lookup, "BLOCK_DURATION_SECS", &mut rl.block_duration_secs)?;
        override_parsed(&lookup, "BLOCK_POLICY", &mut rl.block_policy)?;
        override_parsed(&lookup, "SWEEP_INTERVAL_SECS", &mut rl.sweep_interval_secs)?;

        let v = &mut self.validation;
        override_parsed(&lookup, "MAX_TEXT_LENGTH", &mut v.max_text_length)?;
        override_parsed(&lookup, "MAX_URL_LENGTH", &mut v.max_url_length)?;
        override_parsed(&lookup, "MAX_URLS_PER_MESSAGE", &mut v.max_urls_per_message)?;
        override_parsed(&lookup, "DNS_TIMEOUT_MS", &mut v.dns_timeout_ms)?;
        if let Some(list) = lookup("ALLOWED_URL_SCHEMES") {
            v.allowed_url_schemes = split_list(&list);
        }
        if let Some(list) = lookup("DENIED_NETWORK_RANGES") {
            v.denied_network_ranges = split_list(&list);
        }

        override_parsed(&lookup, "METRICS_ENABLED", &mut self.metrics.enabled)?;
        Ok(())
    }

    /// Reject configurations the limiter and validator cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rl = &self.rate_limit;
        if rl.window_secs == 0 {
            return Err(ConfigError::NotPositive("window_secs"));
        }
        if rl.block_duration_secs == 0 {
            return Err(ConfigError::NotPositive("block_duration_secs"));
        }

        let v = &self.validation;
        if v.max_text_length == 0 {
            return Err(ConfigError::NotPositive("max_text_length"));
        }
        if v.max_url_length == 0 {
            return Err(ConfigError::NotPositive("max_url_length"));
        }
        if v.max_marker_run == 0 {
            return Err(ConfigError::NotPositive("max_marker_run"));
        }
        if v.allowed_url_schemes.is_empty() {
            return Err(ConfigError::EmptyList("allowed_url_schemes"));
        }
        if !self.metrics.path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                key: "metrics.path",
                value: self.metrics.path.clone(),
            });
        }
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
            key,
            value: raw.clone(),
        })?;
    }
    Ok(())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
