use chrono::Utc;
use std::sync::Arc;

use crate::domain::{Account, Role, UserSummary};
use crate::error::{codes, AppError};
use crate::security::access_control::{ensure_not_self, AuthContext};
use crate::security::{PasswordError, PasswordHasher, TokenService};
use crate::store::Store;

pub const MIN_PASSWORD_LEN: usize = 6;

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub email: String,
    pub role: Role,
    pub expires_in: u64,
}

/// Result of a role update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleChange {
    pub email: String,
    pub old_role: Role,
    pub new_role: Role,
    pub updated_by: String,
}

/// `local@domain.tld` without whitespace and with a single `@`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

fn required(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn check_password_length(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must contain {MIN_PASSWORD_LEN} or more characters"
        )));
    }
    Ok(())
}

fn hashing_failed(e: PasswordError) -> AppError {
    AppError::internal("Password processing failed", e)
}

#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn Store>,
    hasher: PasswordHasher,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(store: Arc<dyn Store>, hasher: PasswordHasher, tokens: TokenService) -> Self {
        Self {
            store,
            hasher,
            tokens,
        }
    }

    pub async fn register(
        &self,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<Account, AppError> {
        let (Some(email), Some(password)) = (required(&email), required(&password)) else {
            return Err(AppError::Validation("Email and password are required".to_string()));
        };
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid email format".to_string()));
        }
        check_password_length(password)?;

        let hash = self
            .hasher
            .hash(password.to_string())
            .await
            .map_err(hashing_failed)?;
        let account = Account::new(email, hash);

        let created = self
            .store
            .create_account(&account)
            .await
            .map_err(|e| AppError::store("register", "Failed to register user", e))?;
        if !created {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        tracing::info!(email = %account.email, role = %account.role, "User registered");
        Ok(account)
    }

    pub async fn login(
        &self,
        email: Option<String>,
        password: Option<String>,
    ) -> Result<LoginOutcome, AppError> {
        let (Some(email), Some(password)) = (required(&email), required(&password)) else {
            return Err(AppError::Validation("Email and password are required".to_string()));
        };

        let invalid = || AppError::unauthenticated(codes::INVALID_CREDENTIALS, "Invalid email or password");

        let account = self
            .store
            .get_account(email)
            .await
            .map_err(|e| AppError::store("login", "Login failed", e))?
            .ok_or_else(invalid)?;

        let matches = match self
            .hasher
            .verify(password.to_string(), account.password_hash.clone())
            .await
        {
            Ok(matches) => matches,
            Err(PasswordError::MalformedHash(reason)) => {
                tracing::warn!(email = %account.email, reason = %reason, "Stored password hash is unreadable");
                false
            }
            Err(e) => return Err(hashing_failed(e)),
        };
        if !matches {
            tracing::info!(email = %email, "Failed login attempt");
            return Err(invalid());
        }

        let token = self
            .tokens
            .issue(&account.email, account.role)
            .map_err(|e| AppError::internal("Login failed", e))?;

        tracing::info!(email = %account.email, role = %account.role, "User logged in");
        Ok(LoginOutcome {
            token,
            email: account.email,
            role: account.role,
            expires_in: self.tokens.ttl_secs(),
        })
    }

    /// All accounts, SuperAdmins first, then admins, then users.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>, AppError> {
        let mut accounts = self
            .store
            .list_accounts()
            .await
            .map_err(|e| AppError::store("list_users", "Failed to fetch users", e))?;
        accounts.sort_by(|a, b| {
            a.role
                .rank()
                .cmp(&b.role.rank())
                .then_with(|| a.email.cmp(&b.email))
        });
        Ok(accounts.iter().map(Account::summary).collect())
    }

    pub async fn update_role(
        &self,
        actor: &AuthContext,
        email: Option<String>,
        new_role: Option<String>,
    ) -> Result<RoleChange, AppError> {
        let (Some(email), Some(new_role)) = (required(&email), required(&new_role)) else {
            return Err(AppError::Validation("Email and new role are required".to_string()));
        };

        let new_role: Role = new_role
            .parse()
            .ok()
            .filter(Role::is_assignable)
            .ok_or_else(|| AppError::Validation("Invalid role, must be: user or admin".to_string()))?;

        ensure_not_self(actor, email, "Cannot change your own role")?;

        let mut account = self
            .store
            .get_account(email)
            .await
            .map_err(|e| AppError::store("update_role", "Failed to update user role", e))?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        let old_role = account.role;
        account.role = new_role;
        account.updated_at = Some(Utc::now());
        account.updated_by = Some(actor.email.clone());

        self.store
            .save_account(&account)
            .await
            .map_err(|e| AppError::store("update_role", "Failed to update user role", e))?;

        tracing::info!(
            email = %account.email,
            old_role = %old_role,
            new_role = %new_role,
            updated_by = %actor.email,
            "User role updated"
        );
        Ok(RoleChange {
            email: account.email,
            old_role,
            new_role,
            updated_by: actor.email.clone(),
        })
    }

    pub async fn delete_user(&self, actor: &AuthContext, email: &str) -> Result<(), AppError> {
        ensure_not_self(actor, email, "Cannot delete your own account")?;

        let removed = self
            .store
            .delete_account(email)
            .await
            .map_err(|e| AppError::store("delete_user", "Failed to delete user", e))?;
        if !removed {
            return Err(AppError::NotFound("User not found".to_string()));
        }

        tracing::info!(email = %email, deleted_by = %actor.email, "User deleted");
        Ok(())
    }

    pub async fn change_password(
        &self,
        actor: &AuthContext,
        current: Option<String>,
        new: Option<String>,
    ) -> Result<(), AppError> {
        let (Some(current), Some(new)) = (required(&current), required(&new)) else {
            return Err(AppError::Validation(
                "Both currentPassword and newPassword are required".to_string(),
            ));
        };
        check_password_length(new)?;

        let mut account = self
            .store
            .get_account(&actor.email)
            .await
            .map_err(|e| AppError::store("change_password", "Failed to change password", e))?
            .ok_or_else(|| AppError::unauthenticated(codes::USER_NOT_FOUND, "User not found"))?;

        let matches = self
            .hasher
            .verify(current.to_string(), account.password_hash.clone())
            .await
            .or_else(|e| match e {
                PasswordError::MalformedHash(_) => Ok(false),
                other => Err(hashing_failed(other)),
            })?;
        if !matches {
            return Err(AppError::unauthenticated(
                codes::INVALID_CREDENTIALS,
                "Current password is incorrect",
            ));
        }

        account.password_hash = self.hasher.hash(new.to_string()).await.map_err(hashing_failed)?;
        account.updated_at = Some(Utc::now());
        account.updated_by = Some(actor.email.clone());

        self.store
            .save_account(&account)
            .await
            .map_err(|e| AppError::store("change_password", "Failed to change password", e))?;

        tracing::info!(email = %account.email, "Password changed");
        Ok(())
    }

    /// Create the SuperAdmin account if no account holds `email` yet.
    /// Returns whether one was created.
    pub async fn ensure_super_admin(&self, email: &str, password: &str) -> Result<bool, AppError> {
        if !is_valid_email(email) {
            return Err(AppError::Validation("Invalid SuperAdmin email".to_string()));
        }
        check_password_length(password)?;

        if let Some(existing) = self
            .store
            .get_account(email)
            .await
            .map_err(|e| AppError::store("bootstrap", "Failed to check SuperAdmin", e))?
        {
            if existing.role != Role::SuperAdmin {
                tracing::warn!(email = %email, role = %existing.role, "Bootstrap account exists without SuperAdmin role, leaving it unchanged");
            }
            return Ok(false);
        }

        let hash = self
            .hasher
            .hash(password.to_string())
            .await
            .map_err(hashing_failed)?;
        let mut account = Account::new(email, hash);
        account.role = Role::SuperAdmin;

        let created = self
            .store
            .create_account(&account)
            .await
            .map_err(|e| AppError::store("bootstrap", "Failed to create SuperAdmin", e))?;
        if created {
            tracing::info!(email = %email, "SuperAdmin account created");
        }
        Ok(created)
    }
}
