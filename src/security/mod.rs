//! Request gates and credential primitives.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → access_control.rs (bearer token → AuthContext, role re-fetched from store)
//!     → rate_limit.rs (per-address fixed window, stored in the shared store)
//!     → headers.rs (security response headers, CORS)
//!     → handler
//!
//! Credentials:
//!     token.rs    (HS256 tokens: issue / verify)
//!     password.rs (Argon2id hashing on the blocking pool)
//! ```
//!
//! # Design Decisions
//! - Gates never keep client state in process; windows and roles live in the store
//! - The token's role is a hint; authorization always re-reads the account
//! - Rate limiting and authorization have opposite store-failure policies

pub mod access_control;
pub mod headers;
pub mod password;
pub mod rate_limit;
pub mod token;

pub use access_control::{AuthContext, AuthState};
pub use password::{PasswordError, PasswordHasher};
pub use rate_limit::{RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use token::{Claims, TokenError, TokenService};

/// What a gate does when the store cannot answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFailurePolicy {
    /// Log and let the request through.
    Open,
    /// Reject the request with a server error.
    Closed,
}

impl StoreFailurePolicy {
    pub fn from_fail_open(fail_open: bool) -> Self {
        if fail_open {
            StoreFailurePolicy::Open
        } else {
            StoreFailurePolicy::Closed
        }
    }
}
