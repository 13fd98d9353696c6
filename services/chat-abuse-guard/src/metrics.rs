// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for admission and validation outcomes.
//!
//! Each guard owns its own registry, so several guards in one process
//! (or one per test) never share counters.

use crate::error::{Error, Result};
use crate::limiter::AdmissionReason;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Counters for every outcome the guard produces. Labels are reason codes.
#[derive(Clone)]
pub struct GuardMetrics {
    registry: Registry,
    admissions: IntCounterVec,
    text_verdicts: IntCounterVec,
    url_verdicts: IntCounterVec,
    tracked_identities: IntGauge,
}

impl GuardMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let admissions = IntCounterVec::new(
            Opts::new(
                "abuse_guard_admissions_total",
                "Rate limiter decisions by reason",
            ),
            &["reason"],
        )?;
        let text_verdicts = IntCounterVec::new(
            Opts::new(
                "abuse_guard_text_verdicts_total",
                "Message text verdicts by outcome",
            ),
            &["outcome"],
        )?;
        let url_verdicts = IntCounterVec::new(
            Opts::new("abuse_guard_url_verdicts_total", "URL verdicts by outcome"),
            &["outcome"],
        )?;
        let tracked_identities = IntGauge::new(
            "abuse_guard_tracked_identities",
            "Identities currently holding rate limiter state",
        )?;

        registry.register(Box::new(admissions.clone()))?;
        registry.register(Box::new(text_verdicts.clone()))?;
        registry.register(Box::new(url_verdicts.clone()))?;
        registry.register(Box::new(tracked_identities.clone()))?;

        Ok(Self {
            registry,
            admissions,
            text_verdicts,
            url_verdicts,
            tracked_identities,
        })
    }

    pub fn record_admission(&self, reason: AdmissionReason) {
        self.admissions.with_label_values(&[reason.code()]).inc();
    }

    /// `outcome` is `accepted` or a rejection code.
    pub fn record_text(&self, outcome: &str) {
        self.text_verdicts.with_label_values(&[outcome]).inc();
    }

    /// `outcome` is `accepted` or a rejection code.
    pub fn record_url(&self, outcome: &str) {
        self.url_verdicts.with_label_values(&[outcome]).inc();
    }

    pub fn set_tracked_identities(&self, count: usize) {
        self.tracked_identities.set(count as i64);
    }

    pub fn admissions(&self, reason: AdmissionReason) -> u64 {
        self.admissions.with_label_values(&[reason.code()]).get()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Internal(e.to_string()))
    }
}
