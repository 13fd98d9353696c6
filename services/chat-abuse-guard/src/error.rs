// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Error types for the chat abuse guard.
//!
//! Per-request outcomes (throttling, rejected text, rejected URLs) are not
//! errors; they live next to the component that produces them. The types
//! here cover setup failures only.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration could not be loaded or does not make sense.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("{0} must be positive")]
    NotPositive(&'static str),

    #[error("{0} must not be empty")]
    EmptyList(&'static str),

    #[error("invalid network range {0:?}")]
    InvalidNetwork(String),

    #[error("invalid pattern for rule {rule}: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
}

/// Service-level errors.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
