//! Per-address fixed-window rate limiting.
//!
//! # Data Flow
//! ```text
//! request → normalize client address
//!         → read window from store
//!         → evaluate (pure): Blocked | Write{expected version, next window}
//!         → compare-and-swap; on a lost race re-read and re-evaluate
//!         → append address to the audit list
//! ```
//!
//! # Design Decisions
//! - Windows live in the shared store, so every instance enforces one count
//! - Writes are compare-and-swap on a version token; lost races retry
//! - The policy sits behind `ArcSwap` and is replaced on config reload
//! - Store failures follow `StoreFailurePolicy` (open by default)

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use crate::config::RateLimitConfig;
use crate::domain::ClientWindow;
use crate::error::AppError;
use crate::http::request::peer_addr;
use crate::observability::metrics;
use crate::security::StoreFailurePolicy;
use crate::store::{Store, StoreResult};

/// Attempts at the read-evaluate-swap cycle before giving up and allowing.
const MAX_SWAP_ATTEMPTS: usize = 8;

/// Active limiter settings, derived from `[rate_limit]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitPolicy {
    pub enabled: bool,
    pub threshold: u32,
    pub window_ms: i64,
    pub block_ms: i64,
    pub audit_capacity: usize,
    pub on_store_failure: StoreFailurePolicy,
}

impl From<&RateLimitConfig> for RateLimitPolicy {
    fn from(config: &RateLimitConfig) -> Self {
        Self {
            enabled: config.enabled,
            threshold: config.threshold,
            window_ms: config.window_secs as i64 * 1000,
            block_ms: config.block_duration_secs as i64 * 1000,
            audit_capacity: config.audit_capacity,
            on_store_failure: StoreFailurePolicy::from_fail_open(config.fail_open),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allow,
    Throttle { retry_after_secs: u64 },
}

/// Outcome of evaluating one request against the current window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    Blocked { retry_after_secs: u64 },
    Write { expected: Option<u64>, next: ClientWindow },
}

/// Pure window transition for a request arriving at `now_ms`.
pub fn evaluate(current: Option<&ClientWindow>, now_ms: i64, policy: &RateLimitPolicy) -> Evaluation {
    let Some(window) = current else {
        return Evaluation::Write {
            expected: None,
            next: ClientWindow::first(now_ms),
        };
    };

    if window.is_blocked_at(now_ms) {
        let remaining = window.blocked_until - now_ms;
        return Evaluation::Blocked {
            retry_after_secs: ((remaining + 999) / 1000).max(1) as u64,
        };
    }

    let elapsed = now_ms - window.last_attempt;
    let count = if elapsed > policy.window_ms {
        1
    } else {
        window.count.saturating_add(1)
    };
    let blocked_until = if count > policy.threshold {
        now_ms + policy.block_ms
    } else {
        window.blocked_until
    };

    Evaluation::Write {
        expected: Some(window.version),
        next: ClientWindow {
            count,
            last_attempt: now_ms,
            blocked_until,
            version: window.version + 1,
        },
    }
}

pub struct RateLimiter {
    store: Arc<dyn Store>,
    policy: ArcSwap<RateLimitPolicy>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn Store>, policy: RateLimitPolicy) -> Self {
        Self {
            store,
            policy: ArcSwap::from_pointee(policy),
        }
    }

    pub fn policy(&self) -> Arc<RateLimitPolicy> {
        self.policy.load_full()
    }

    pub fn update_policy(&self, policy: RateLimitPolicy) {
        tracing::info!(
            enabled = policy.enabled,
            threshold = policy.threshold,
            window_ms = policy.window_ms,
            block_ms = policy.block_ms,
            on_store_failure = ?policy.on_store_failure,
            "Rate limit policy updated"
        );
        self.policy.store(Arc::new(policy));
    }

    pub async fn check(&self, address: &str) -> Result<RateLimitDecision, AppError> {
        self.check_at(address, Utc::now().timestamp_millis()).await
    }

    /// Count a request from `address` at `now_ms`.
    pub async fn check_at(&self, address: &str, now_ms: i64) -> Result<RateLimitDecision, AppError> {
        let policy = self.policy.load_full();
        if !policy.enabled {
            return Ok(RateLimitDecision::Allow);
        }

        match self.count(address, now_ms, &policy).await {
            Ok(decision) => {
                let outcome = match decision {
                    RateLimitDecision::Allow => "allowed",
                    RateLimitDecision::Throttle { .. } => "throttled",
                };
                metrics::record_rate_limit(outcome);
                Ok(decision)
            }
            Err(e) => {
                metrics::record_store_error("rate_limit");
                match policy.on_store_failure {
                    StoreFailurePolicy::Open => {
                        tracing::warn!(client = %address, error = %e, "Rate limit store unavailable, allowing request");
                        metrics::record_rate_limit("fail_open");
                        Ok(RateLimitDecision::Allow)
                    }
                    StoreFailurePolicy::Closed => {
                        metrics::record_rate_limit("fail_closed");
                        Err(AppError::internal("Rate limit check failed", e))
                    }
                }
            }
        }
    }

    async fn count(
        &self,
        address: &str,
        now_ms: i64,
        policy: &RateLimitPolicy,
    ) -> StoreResult<RateLimitDecision> {
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let current = self.store.get_window(address).await?;
            match evaluate(current.as_ref(), now_ms, policy) {
                Evaluation::Blocked { retry_after_secs } => {
                    tracing::debug!(client = %address, retry_after_secs, "Client is blocked");
                    return Ok(RateLimitDecision::Throttle { retry_after_secs });
                }
                Evaluation::Write { expected, next } => {
                    if self.store.swap_window(address, expected, &next).await? {
                        if next.count == policy.threshold.saturating_add(1) {
                            tracing::warn!(
                                client = %address,
                                count = next.count,
                                blocked_until = next.blocked_until,
                                "Rate limit exceeded, blocking client"
                            );
                        }
                        self.audit(address, policy.audit_capacity).await;
                        return Ok(RateLimitDecision::Allow);
                    }
                    tracing::trace!(client = %address, attempt, "Lost rate window race, retrying");
                    tokio::task::yield_now().await;
                }
            }
        }

        tracing::warn!(
            client = %address,
            attempts = MAX_SWAP_ATTEMPTS,
            "Rate window contention, allowing request uncounted"
        );
        Ok(RateLimitDecision::Allow)
    }

    async fn audit(&self, address: &str, capacity: usize) {
        if let Err(e) = self.store.append_audit(address, capacity).await {
            metrics::record_store_error("audit");
            tracing::warn!(client = %address, error = %e, "Failed to append rate limit audit entry");
        }
    }

    /// Clear the window for `address`. Returns whether one existed.
    pub async fn reset(&self, address: &str) -> StoreResult<bool> {
        let cleared = self.store.delete_window(address).await?;
        tracing::info!(client = %address, cleared, "Rate limit window reset");
        Ok(cleared)
    }

    /// Newest audit entries, oldest first.
    pub async fn recent(&self, limit: usize) -> StoreResult<Vec<String>> {
        self.store.recent_audit(limit).await
    }
}

/// Canonical form used as the window key. Loopback and the IPv6 wildcard
/// collapse to `127.0.0.1`; the IPv4 wildcard is not a client.
pub fn normalize_ip(ip: IpAddr) -> Option<IpAddr> {
    match ip.to_canonical() {
        IpAddr::V6(v6) if v6.is_loopback() || v6.is_unspecified() => {
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        }
        IpAddr::V4(v4) if v4.is_unspecified() => None,
        other => Some(other),
    }
}

/// Accepts a bare address or `ip:port`.
pub fn normalize_address(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let ip = raw
        .parse::<IpAddr>()
        .ok()
        .or_else(|| raw.parse::<SocketAddr>().ok().map(|s| s.ip()))?;
    normalize_ip(ip).map(|ip| ip.to_string())
}

pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let client = peer_addr(&request).and_then(|addr| normalize_ip(addr.ip()));

    let Some(client) = client else {
        tracing::warn!(path = %request.uri().path(), "Unable to determine client address");
        return AppError::Validation("Unable to determine client address".to_string())
            .into_response();
    };

    match limiter.check(&client.to_string()).await {
        Ok(RateLimitDecision::Allow) => next.run(request).await,
        Ok(RateLimitDecision::Throttle { retry_after_secs }) => {
            tracing::warn!(client = %client, retry_after_secs, "Rate limit exceeded");
            AppError::Throttled { retry_after_secs }.into_response()
        }
        Err(e) => e.into_response(),
    }
}
