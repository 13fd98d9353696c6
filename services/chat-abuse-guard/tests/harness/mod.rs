// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for chat abuse attack simulation.
//!
//! Attacks run on a virtual clock: every message carries an `Instant`
//! derived from its index and the configured send rate, so simulations
//! covering minutes of traffic finish instantly and deterministically.

#![allow(dead_code)]

pub mod attacks;
pub mod generators;
pub mod metrics;

use async_trait::async_trait;
use chat_abuse_guard::resolver::HostResolver;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

/// Resolver answering from a fixed table; unknown names do not resolve.
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        let mut table: HashMap<String, Vec<IpAddr>> = HashMap::new();
        for (host, ip) in entries {
            table
                .entry(host.to_string())
                .or_default()
                .push(ip.parse().expect("test address"));
        }
        Self { table }
    }

    /// Public names used by the generators plus a few rebinding traps.
    pub fn with_defaults() -> Self {
        Self::new(&[
            ("news.example.com", "93.184.216.34"),
            ("blog.example.org", "93.184.216.35"),
            ("docs.example.net", "2606:2800:220:1:248:1893:25c8:1946"),
            ("rebind.attacker.example", "127.0.0.1"),
            ("intranet.attacker.example", "10.1.2.3"),
            ("metadata.attacker.example", "169.254.169.254"),
            ("split.attacker.example", "93.184.216.34"),
            ("split.attacker.example", "192.168.0.10"),
        ])
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str, _port: u16) -> io::Result<Vec<IpAddr>> {
        self.table
            .get(host)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "unknown host"))
    }
}
