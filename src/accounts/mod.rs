//! Account management: registration, login, roles, passwords.
//!
//! # Data Flow
//! ```text
//! register → validate → Argon2id hash → Store::create_account (exclusive)
//! login    → Store::get_account → verify hash → TokenService::issue
//! update-role / delete-user → self-action guard → Store (SuperAdmin only)
//! startup  → ensure_super_admin (create if absent)
//! ```

pub mod service;

pub use service::{is_valid_email, AccountService, LoginOutcome, RoleChange, MIN_PASSWORD_LEN};
