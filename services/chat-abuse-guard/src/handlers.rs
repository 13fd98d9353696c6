// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the abuse guard sidecar.
//!
//! The bot calls `/check/message` for every inbound message and
//! `/check/url` before every outbound fetch. Verdicts are returned with
//! status 200 so callers can always read the body; only malformed
//! requests get a 4xx.

use crate::config::Config;
use crate::guard::{AbuseGuard, MessageVerdict, UrlVerdict};
use crate::identity::Identity;
use crate::limiter::Admission;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state.
pub struct AppState {
    pub guard: AbuseGuard,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub tracked_identities: usize,
}

/// Inbound message to screen.
#[derive(Debug, Deserialize)]
pub struct MessageCheckRequest {
    pub identity: Identity,
    pub text: String,
}

/// Outbound fetch target to vet.
#[derive(Debug, Deserialize)]
pub struct UrlCheckRequest {
    #[serde(default)]
    pub identity: Option<Identity>,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct UnblockRequest {
    pub identity: Identity,
}

/// Verdict for one URL.
#[derive(Debug, Serialize)]
pub struct UrlCheckResponse {
    pub allowed: bool,
    pub reason: &'static str,
    /// Normalised URL when allowed, the URL as sent otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Verdict for one message.
#[derive(Debug, Serialize)]
pub struct MessageCheckResponse {
    pub allowed: bool,
    pub reason: &'static str,
    /// Sanitized text to use in place of the original
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub urls: Vec<UrlCheckResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct UnblockResponse {
    pub unblocked: bool,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub code: &'static str,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "chat-abuse-guard",
        version: env!("CARGO_PKG_VERSION"),
        tracked_identities: state.guard.limiter().tracked_identities(),
    })
}

/// Screen one inbound message.
pub async fn check_message(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MessageCheckRequest>,
) -> Response {
    if req.identity.as_str().trim().is_empty() {
        warn!("Message check without identity");
        return bad_request("identity must not be empty", "invalid_identity");
    }

    let verdict = state
        .guard
        .screen_message(&req.identity, &req.text, Instant::now())
        .await;

    let body = match verdict {
        MessageVerdict::Accepted { text, urls } => MessageCheckResponse {
            allowed: true,
            reason: "ok",
            text: Some(text.text),
            urls: urls.into_iter().map(url_response).collect(),
            retry_after_secs: None,
            retry_at: None,
        },
        MessageVerdict::Throttled(admission) => throttled_response(&admission),
        MessageVerdict::Rejected(reason) => MessageCheckResponse {
            allowed: false,
            reason: reason.code(),
            text: None,
            urls: Vec::new(),
            retry_after_secs: None,
            retry_at: None,
        },
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// Vet one outbound fetch target.
pub async fn check_url(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UrlCheckRequest>,
) -> Json<UrlCheckResponse> {
    let identity = req
        .identity
        .unwrap_or_else(|| Identity::new("anonymous"));
    let result = state.guard.check_url(&identity, &req.url).await;
    Json(url_response(UrlVerdict {
        raw: req.url,
        result,
    }))
}

/// Administrative block lift.
pub async fn unblock(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UnblockRequest>,
) -> Json<UnblockResponse> {
    let unblocked = state.guard.unblock(&req.identity);
    info!(identity = %req.identity, unblocked, "Unblock requested");
    Json(UnblockResponse { unblocked })
}

/// Prometheus scrape endpoint.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.guard.metrics().render() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build the sidecar router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/check/message", post(check_message))
        .route("/check/url", post(check_url))
        .route("/unblock", post(unblock));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

fn url_response(verdict: UrlVerdict) -> UrlCheckResponse {
    match verdict.result {
        Ok(normalized) => UrlCheckResponse {
            allowed: true,
            reason: "ok",
            url: Some(normalized.into_url().into()),
        },
        Err(reason) => UrlCheckResponse {
            allowed: false,
            reason: reason.code(),
            url: Some(verdict.raw),
        },
    }
}

fn throttled_response(admission: &Admission) -> MessageCheckResponse {
    let retry_after = admission.retry_after.unwrap_or_default();
    MessageCheckResponse {
        allowed: false,
        reason: admission.reason.code(),
        text: None,
        urls: Vec::new(),
        retry_after_secs: Some(ceil_secs(retry_after)),
        retry_at: chrono::Duration::from_std(retry_after)
            .ok()
            .map(|d| Utc::now() + d),
    }
}

/// Whole seconds, rounded up so a client never retries early.
fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

fn bad_request(error: &'static str, code: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error, code })).into_response()
}
