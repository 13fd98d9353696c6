// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Chat Abuse Guard Service
//!
//! A sidecar that screens chat bot traffic before the bot acts on it:
//!
//! - Sliding window rate limit per user (30 messages / 60 s by default)
//! - Temporary block after the limit is exceeded (300 s by default)
//! - Script, HTML and SQL-like payload rejection
//! - Escaping of markup that would be re-rendered downstream
//! - SSRF checks on every URL the bot is asked to fetch
//!
//! ## Configuration
//!
//! An optional JSON file named by `ABUSE_GUARD_CONFIG` is read first, then
//! environment variables override individual fields:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `WINDOW_SECS`: Sliding window length (default: 60)
//! - `MAX_REQUESTS`: Messages per window per user (default: 30)
//! - `BLOCK_DURATION_SECS`: Block length after exceeding the limit (default: 300)
//! - `BLOCK_POLICY`: `fixed` or `extend_on_violation` (default: fixed)
//! - `DENIED_NETWORK_RANGES`: Comma separated CIDR list for the SSRF guard

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use chat_abuse_guard::{
    config::Config,
    guard::AbuseGuard,
    handlers::{router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        window_secs = config.rate_limit.window_secs,
        max_requests = config.rate_limit.max_requests,
        block_duration_secs = config.rate_limit.block_duration_secs,
        block_policy = ?config.rate_limit.block_policy,
        "Starting chat abuse guard"
    );

    let guard = AbuseGuard::from_config(&config)?;
    let sweep_interval = config.rate_limit.sweep_interval();
    let addr: SocketAddr = config.bind_addr.parse()?;

    let state = Arc::new(AppState { guard, config });

    // Spawn sweep task
    let sweep_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            let evicted = sweep_state.guard.sweep(std::time::Instant::now());
            debug!(evicted, "Swept idle identities");
        }
    });

    let app = router(state);

    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
