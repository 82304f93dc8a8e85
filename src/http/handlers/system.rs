use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::http::server::AppState;
use crate::security::rate_limit::normalize_address;

const DEFAULT_AUDIT_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub limit: Option<usize>,
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "store": "up" })),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: store unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "store": "down" })),
            )
        }
    }
}

/// Newest audit entries, oldest first.
pub async fn rate_limits(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Value>, AppError> {
    let capacity = state.limiter.policy().audit_capacity;
    let limit = query.limit.unwrap_or(DEFAULT_AUDIT_LIMIT).clamp(1, capacity.max(1));
    let addresses = state
        .limiter
        .recent(limit)
        .await
        .map_err(|e| AppError::store("recent_audit", "Failed to fetch rate limit records", e))?;
    Ok(Json(json!({
        "success": true,
        "count": addresses.len(),
        "addresses": addresses,
    })))
}

pub async fn reset_rate_limit(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<Value>, AppError> {
    let normalized = normalize_address(&address)
        .ok_or_else(|| AppError::Validation(format!("Invalid client address: {address}")))?;
    let cleared = state
        .limiter
        .reset(&normalized)
        .await
        .map_err(|e| AppError::store("reset_window", "Failed to reset rate limit", e))?;

    tracing::info!(address = %normalized, cleared, "Rate limit reset");
    Ok(Json(json!({
        "success": true,
        "message": if cleared { "Rate limit cleared" } else { "No rate limit record for address" },
        "address": normalized,
        "cleared": cleared,
    })))
}
