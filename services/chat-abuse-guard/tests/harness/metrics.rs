// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome collection for attack simulation results.

use chat_abuse_guard::{AdmissionReason, MessageVerdict};
use std::collections::HashMap;
use std::time::Duration;

/// Possible outcomes for a simulated message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Accepted,
    RateExceeded,
    Blocked,
    ContentRejected,
}

/// Collects outcomes during attack simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    outcomes: HashMap<Outcome, usize>,
    /// Rejection counts by reason code
    reasons: HashMap<&'static str, usize>,
    /// Accepted messages per identity
    accepted_per_identity: HashMap<String, usize>,
    /// URL verdicts by reason code (`ok` for allowed)
    url_reasons: HashMap<&'static str, usize>,
    /// Accepted messages whose text was rewritten
    rewritten: usize,
    /// Latency samples (microseconds)
    latencies: Vec<u64>,
}

impl AttackMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verdict for one message.
    pub fn record(&mut self, identity: &str, verdict: &MessageVerdict, latency: Duration) {
        let outcome = match verdict {
            MessageVerdict::Accepted { text, urls } => {
                *self
                    .accepted_per_identity
                    .entry(identity.to_string())
                    .or_insert(0) += 1;
                if text.rewritten {
                    self.rewritten += 1;
                }
                for url in urls {
                    let code = match &url.result {
                        Ok(_) => "ok",
                        Err(reason) => reason.code(),
                    };
                    *self.url_reasons.entry(code).or_insert(0) += 1;
                }
                Outcome::Accepted
            }
            MessageVerdict::Throttled(admission) => match admission.reason {
                AdmissionReason::Blocked => Outcome::Blocked,
                _ => Outcome::RateExceeded,
            },
            MessageVerdict::Rejected(_) => Outcome::ContentRejected,
        };
        if outcome != Outcome::Accepted {
            *self.reasons.entry(verdict.code()).or_insert(0) += 1;
        }
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        self.latencies.push(latency.as_micros() as u64);
    }

    pub fn total(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn reason(&self, code: &str) -> usize {
        self.reasons.get(code).copied().unwrap_or(0)
    }

    pub fn url_reason(&self, code: &str) -> usize {
        self.url_reasons.get(code).copied().unwrap_or(0)
    }

    /// Most messages any one identity got through.
    pub fn max_accepted_per_identity(&self) -> usize {
        self.accepted_per_identity.values().copied().max().unwrap_or(0)
    }

    fn percentile_us(&self, p: f64) -> u64 {
        if self.latencies.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        let idx = (sorted.len() as f64 * p) as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        let total = self.total();
        let accepted = self.count(Outcome::Accepted);
        MetricsReport {
            total,
            accepted,
            rate_exceeded: self.count(Outcome::RateExceeded),
            blocked: self.count(Outcome::Blocked),
            content_rejected: self.count(Outcome::ContentRejected),
            rewritten: self.rewritten,
            unique_accepted_identities: self.accepted_per_identity.len(),
            accepted_ratio: if total == 0 {
                0.0
            } else {
                accepted as f64 / total as f64
            },
            median_latency_us: self.percentile_us(0.5),
            p99_latency_us: self.percentile_us(0.99),
        }
    }
}

/// Summary report of attack outcomes.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total: usize,
    pub accepted: usize,
    pub rate_exceeded: usize,
    pub blocked: usize,
    pub content_rejected: usize,
    pub rewritten: usize,
    pub unique_accepted_identities: usize,
    pub accepted_ratio: f64,
    pub median_latency_us: u64,
    pub p99_latency_us: u64,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Attack Metrics Report ===")?;
        writeln!(f, "Total Messages:    {}", self.total)?;
        writeln!(
            f,
            "Accepted:          {} ({:.1}%)",
            self.accepted,
            self.accepted_ratio * 100.0
        )?;
        writeln!(f, "  Rewritten:       {}", self.rewritten)?;
        writeln!(f, "Rate Exceeded:     {}", self.rate_exceeded)?;
        writeln!(f, "Blocked:           {}", self.blocked)?;
        writeln!(f, "Content Rejected:  {}", self.content_rejected)?;
        writeln!(f, "Accepting Users:   {}", self.unique_accepted_identities)?;
        writeln!(f)?;
        writeln!(f, "--- Latency ---")?;
        writeln!(f, "Median:            {} us", self.median_latency_us)?;
        writeln!(f, "P99:               {} us", self.p99_latency_us)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_abuse_guard::TextRejection;

    #[test]
    fn test_counts_rejections_by_reason() {
        let mut metrics = AttackMetrics::new();
        let rejected = MessageVerdict::Rejected(TextRejection::SqlLike);
        metrics.record("1", &rejected, Duration::from_micros(40));
        metrics.record("2", &rejected, Duration::from_micros(60));

        let report = metrics.report();
        assert_eq!(report.total, 2);
        assert_eq!(report.content_rejected, 2);
        assert_eq!(metrics.reason("sql_like"), 2);
        assert_eq!(report.accepted_ratio, 0.0);
    }
}
