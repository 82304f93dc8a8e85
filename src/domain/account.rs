//! User accounts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::role::Role;

/// A persisted account, keyed by email.
#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    pub email: String,
    /// Argon2id PHC string.
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<String>,
}

impl Account {
    /// A freshly registered account with the default role.
    pub fn new(email: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::default(),
            created_at: Utc::now(),
            created_by: None,
            updated_at: None,
            updated_by: None,
        }
    }

    /// Public listing view; never exposes the hash.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Entry in the user listing.
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}
