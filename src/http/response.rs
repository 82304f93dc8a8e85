//! Response envelopes.
//!
//! # Responsibilities
//! - Map [`AppError`] kinds to status codes
//! - Render the JSON error envelope `{success:false, error, message?, code}`
//! - Add `Retry-After` on 429
//!
//! # Design Decisions
//! - Internal errors show only their public message; the cause was already
//!   logged where the error was built
//! - Malformed JSON bodies become 400 in the same envelope

use axum::{
    extract::rejection::JsonRejection,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::domain::Role;
use crate::error::AppError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_role: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::SelfAction(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        let mut body = ErrorBody {
            success: false,
            error: self.to_string(),
            message: None,
            code: self.code(),
            current_role: None,
            required_role: None,
            retry_after: None,
        };
        match self {
            AppError::Forbidden {
                current_role,
                required,
            } => {
                body.error = "Insufficient permissions".to_string();
                body.message = Some(format!("This action requires {required} role"));
                body.current_role = Some(*current_role);
                body.required_role = Some(required.label());
            }
            AppError::Throttled { retry_after_secs } => {
                body.message = Some(format!("Try again in {retry_after_secs} seconds"));
                body.retry_after = Some(*retry_after_secs);
            }
            _ => {}
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.body())).into_response();
        if let AppError::Throttled { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{codes, RoleRequirement};
    use axum::body::to_bytes;

    async fn render(err: AppError) -> (StatusCode, Option<String>, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let retry = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, retry, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_forbidden_envelope() {
        let (status, _, body) = render(AppError::Forbidden {
            current_role: Role::User,
            required: RoleRequirement::AdminOrAbove,
        })
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], codes::INSUFFICIENT_PERMISSIONS);
        assert_eq!(body["currentRole"], "user");
        assert_eq!(body["requiredRole"], "admin or SuperAdmin");
    }

    #[tokio::test]
    async fn test_throttled_sets_retry_after() {
        let (status, retry, body) = render(AppError::Throttled { retry_after_secs: 42 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(retry.as_deref(), Some("42"));
        assert_eq!(body["retryAfter"], 42);
        assert_eq!(body["code"], codes::RATE_LIMITED);
    }

    #[tokio::test]
    async fn test_status_mapping() {
        let cases = [
            (AppError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (AppError::SelfAction("s".into()), StatusCode::BAD_REQUEST),
            (
                AppError::unauthenticated(codes::AUTH_REQUIRED, "a"),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::Conflict("c".into()), StatusCode::CONFLICT),
            (AppError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (AppError::internal("i", "cause"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            let (status, retry, body) = render(err).await;
            assert_eq!(status, expected);
            assert!(retry.is_none());
            assert!(body.get("currentRole").is_none());
        }
    }

    #[tokio::test]
    async fn test_internal_hides_cause() {
        let (_, _, body) = render(AppError::internal("Failed to fetch taps", "redis exploded")).await;
        assert_eq!(body["error"], "Failed to fetch taps");
        assert!(!body.to_string().contains("redis exploded"));
    }
}
