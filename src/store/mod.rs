//! Shared key-value store access.
//!
//! # Data Flow
//! ```text
//! Gates (rate limit, role check) ─┐
//! Services (accounts, catalog) ───┼─→ Store trait ─→ redis.rs  (production)
//!                                 │                └→ memory.rs (tests, local runs)
//! ```
//!
//! # Design Decisions
//! - One typed trait instead of raw commands; index maintenance (id lists,
//!   category sets, the users set) is the implementation's job
//! - Rate windows are written with compare-and-swap on a version token, so
//!   concurrent requests from one address cannot lose updates
//! - Errors never decide policy; callers choose fail-open or fail-closed

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Account, ClientWindow, LiquidType, Tap};
use crate::resilience::Elapsed;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Errors from the store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection or command failure.
    #[error("store backend error: {0}")]
    Backend(String),

    /// The call exceeded its deadline.
    #[error(transparent)]
    Timeout(#[from] Elapsed),

    /// A stored record could not be decoded.
    #[error("corrupt record at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key layout shared by every backend.
pub mod keys {
    use crate::domain::LiquidType;

    pub const USERS_ALL: &str = "users:all";
    pub const TAP_IDS: &str = "taps:ids";
    pub const RATE_LIMIT_AUDIT: &str = "ratelimits:ids";

    pub fn user(email: &str) -> String {
        format!("user:{email}")
    }

    pub fn window(address: &str) -> String {
        format!("ratelimit:{address}")
    }

    pub fn tap(id: &str) -> String {
        format!("tap:{id}")
    }

    pub fn category(liquid: LiquidType) -> String {
        format!("taps:by:category:{}", liquid.as_str())
    }
}

/// Typed access to accounts, rate windows and catalog items.
#[async_trait]
pub trait Store: Send + Sync {
    /// Cheap liveness probe.
    async fn ping(&self) -> StoreResult<()>;

    async fn get_account(&self, email: &str) -> StoreResult<Option<Account>>;

    /// Insert only if the email is free. Returns `false` when it is taken.
    async fn create_account(&self, account: &Account) -> StoreResult<bool>;

    /// Overwrite an existing account.
    async fn save_account(&self, account: &Account) -> StoreResult<()>;

    /// Returns `true` if an account was removed.
    async fn delete_account(&self, email: &str) -> StoreResult<bool>;

    async fn list_accounts(&self) -> StoreResult<Vec<Account>>;

    async fn count_accounts(&self) -> StoreResult<usize>;

    async fn get_window(&self, address: &str) -> StoreResult<Option<ClientWindow>>;

    /// Write `next` if the stored version still equals `expected`
    /// (`None` = the window must not exist yet). Returns whether it wrote.
    async fn swap_window(
        &self,
        address: &str,
        expected: Option<u64>,
        next: &ClientWindow,
    ) -> StoreResult<bool>;

    /// Returns `true` if a window was removed.
    async fn delete_window(&self, address: &str) -> StoreResult<bool>;

    /// Append to the audit list, keeping the newest `capacity` entries.
    async fn append_audit(&self, address: &str, capacity: usize) -> StoreResult<()>;

    /// Newest `limit` audit entries, oldest first.
    async fn recent_audit(&self, limit: usize) -> StoreResult<Vec<String>>;

    async fn get_tap(&self, id: &str) -> StoreResult<Option<Tap>>;

    /// All taps in insertion order.
    async fn list_taps(&self) -> StoreResult<Vec<Tap>>;

    async fn list_taps_in_category(&self, category: LiquidType) -> StoreResult<Vec<Tap>>;

    async fn create_tap(&self, tap: &Tap) -> StoreResult<()>;

    /// Overwrite a tap, moving it between category sets if needed.
    async fn save_tap(&self, tap: &Tap, previous_category: LiquidType) -> StoreResult<()>;

    /// Returns `true` if a tap was removed.
    async fn delete_tap(&self, id: &str) -> StoreResult<bool>;
}
