//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect the key-value store, retrying with backoff
//! - Build the configured object store
//! - Create the SuperAdmin account when configured and absent
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::accounts::AccountService;
use crate::config::{AuthConfig, ConfigError, StorageBackend, StorageConfig, StoreBackend, StoreConfig};
use crate::error::AppError;
use crate::media::{HttpObjectStore, MediaError, MemoryObjectStore, ObjectStore};
use crate::resilience::Backoff;
use crate::security::PasswordError;
use crate::store::{MemoryStore, RedisStore, Store, StoreError};

/// Ceiling for the delay between store connection attempts.
const MAX_CONNECT_BACKOFF_MS: u64 = 10_000;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store unreachable after {attempts} attempts: {source}")]
    Store { attempts: u32, source: StoreError },

    #[error("object store error: {0}")]
    Media(#[from] MediaError),

    #[error("password hasher error: {0}")]
    Hasher(#[from] PasswordError),

    #[error("SuperAdmin bootstrap failed: {0}")]
    Bootstrap(AppError),

    #[error("TLS error: {0}")]
    Tls(std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub async fn connect_store(config: &StoreConfig) -> Result<Arc<dyn Store>, StartupError> {
    match config.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
        StoreBackend::Redis => {
            let timeout = Duration::from_millis(config.timeout_ms);
            let backoff = Backoff::new(config.connect_backoff_ms, MAX_CONNECT_BACKOFF_MS);
            let attempts = config.connect_attempts.max(1);

            let mut attempt = 0;
            loop {
                tokio::time::sleep(backoff.delay(attempt)).await;
                attempt += 1;

                match RedisStore::connect(&config.redis_url, timeout).await {
                    Ok(store) => {
                        tracing::info!(attempt, "Store connected");
                        return Ok(Arc::new(store));
                    }
                    Err(e) if attempt < attempts => {
                        tracing::warn!(attempt, max_attempts = attempts, error = %e, "Store connection failed, retrying");
                    }
                    Err(source) => return Err(StartupError::Store { attempts, source }),
                }
            }
        }
    }
}

pub fn connect_media(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StartupError> {
    match config.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory object store; images are lost on restart");
            Ok(Arc::new(MemoryObjectStore::new(
                &config.public_base_url,
                &config.bucket,
            )))
        }
        StorageBackend::Http => Ok(Arc::new(HttpObjectStore::new(config)?)),
    }
}

/// Create the configured SuperAdmin if no account holds that email.
pub async fn bootstrap_super_admin(
    auth: &AuthConfig,
    accounts: &AccountService,
) -> Result<(), StartupError> {
    let (Some(email), Some(password)) = (&auth.superadmin_email, &auth.superadmin_password) else {
        tracing::debug!("No SuperAdmin configured, skipping bootstrap");
        return Ok(());
    };

    let created = accounts
        .ensure_super_admin(email, password)
        .await
        .map_err(StartupError::Bootstrap)?;
    if !created {
        tracing::info!(email = %email, "SuperAdmin account already present");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use crate::security::{PasswordHasher, TokenService};

    #[tokio::test]
    async fn test_memory_backends() {
        let store_config = StoreConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };
        let store = connect_store(&store_config).await.unwrap();
        store.ping().await.unwrap();

        let storage_config = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        assert!(connect_media(&storage_config).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_redis_gives_up() {
        let config = StoreConfig {
            redis_url: "redis://127.0.0.1:1".to_string(),
            timeout_ms: 200,
            connect_attempts: 2,
            connect_backoff_ms: 10,
            ..Default::default()
        };
        let err = connect_store(&config).await.err().unwrap();
        assert!(matches!(err, StartupError::Store { attempts: 2, .. }));
    }

    #[tokio::test]
    async fn test_bootstrap_creates_super_admin_once() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let accounts = AccountService::new(
            store.clone(),
            PasswordHasher::new(1024, 1, 1).unwrap(),
            TokenService::new("unit-test-secret-0123456789", 60),
        );

        bootstrap_super_admin(&AuthConfig::default(), &accounts).await.unwrap();
        assert_eq!(store.count_accounts().await.unwrap(), 0);

        let auth = AuthConfig {
            superadmin_email: Some("root@x.com".to_string()),
            superadmin_password: Some("rootpass".to_string()),
            ..Default::default()
        };
        bootstrap_super_admin(&auth, &accounts).await.unwrap();
        bootstrap_super_admin(&auth, &accounts).await.unwrap();

        let root = store.get_account("root@x.com").await.unwrap().unwrap();
        assert_eq!(root.role, Role::SuperAdmin);
        assert_eq!(store.count_accounts().await.unwrap(), 1);
    }
}
