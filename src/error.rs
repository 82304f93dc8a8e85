//! Application error taxonomy.
//!
//! Every handler and gate reports failures as an [`AppError`]. The HTTP
//! mapping (status codes, JSON envelope) lives in `http::response`.

use std::fmt;
use thiserror::Error;

use crate::domain::Role;

/// Stable machine-readable codes carried in every error response.
pub mod codes {
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const SELF_ACTION: &str = "SELF_ACTION";
    pub const AUTH_REQUIRED: &str = "AUTH_REQUIRED";
    pub const INVALID_TOKEN: &str = "INVALID_TOKEN";
    pub const TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";
    pub const USER_NOT_FOUND: &str = "USER_NOT_FOUND";
    pub const INVALID_CREDENTIALS: &str = "INVALID_CREDENTIALS";
    pub const INSUFFICIENT_PERMISSIONS: &str = "INSUFFICIENT_PERMISSIONS";
    pub const CONFLICT: &str = "CONFLICT";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const PERMISSION_CHECK_FAILED: &str = "PERMISSION_CHECK_FAILED";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// The set of roles a gate accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleRequirement {
    AdminOrAbove,
    SuperAdminOnly,
}

impl RoleRequirement {
    pub fn allows(&self, role: Role) -> bool {
        match self {
            RoleRequirement::AdminOrAbove => matches!(role, Role::Admin | Role::SuperAdmin),
            RoleRequirement::SuperAdminOnly => role == Role::SuperAdmin,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoleRequirement::AdminOrAbove => "admin or SuperAdmin",
            RoleRequirement::SuperAdminOnly => "SuperAdmin",
        }
    }
}

impl fmt::Display for RoleRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Errors surfaced to API clients.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing input (400).
    #[error("{0}")]
    Validation(String),

    /// Caller tried to change or delete their own account (400).
    #[error("{0}")]
    SelfAction(String),

    /// Missing, invalid or expired credentials (401).
    #[error("{message}")]
    Unauthenticated { code: &'static str, message: String },

    /// Valid identity, insufficient role (403).
    #[error("insufficient role {current_role}, requires {required}")]
    Forbidden {
        current_role: Role,
        required: RoleRequirement,
    },

    /// Duplicate resource (409).
    #[error("{0}")]
    Conflict(String),

    /// Resource does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// Client is inside a block window (429).
    #[error("Too many requests, try again later")]
    Throttled { retry_after_secs: u64 },

    /// Unexpected dependency failure (500). `message` is safe to show.
    #[error("{message}")]
    Internal { code: &'static str, message: String },
}

impl AppError {
    pub fn unauthenticated(code: &'static str, message: impl Into<String>) -> Self {
        AppError::Unauthenticated {
            code,
            message: message.into(),
        }
    }

    /// Log the underlying cause and return a generic 500.
    pub fn internal(message: &str, cause: impl fmt::Display) -> Self {
        Self::internal_with_code(codes::INTERNAL_ERROR, message, cause)
    }

    pub fn internal_with_code(code: &'static str, message: &str, cause: impl fmt::Display) -> Self {
        tracing::error!(error = %cause, code, "{}", message);
        AppError::Internal {
            code,
            message: message.to_string(),
        }
    }

    /// Count a store failure under `operation` and return a generic 500.
    pub fn store(operation: &'static str, message: &str, cause: impl fmt::Display) -> Self {
        crate::observability::metrics::record_store_error(operation);
        Self::internal(message, cause)
    }

    /// Machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => codes::VALIDATION_FAILED,
            AppError::SelfAction(_) => codes::SELF_ACTION,
            AppError::Unauthenticated { code, .. } => code,
            AppError::Forbidden { .. } => codes::INSUFFICIENT_PERMISSIONS,
            AppError::Conflict(_) => codes::CONFLICT,
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Throttled { .. } => codes::RATE_LIMITED,
            AppError::Internal { code, .. } => code,
        }
    }
}
