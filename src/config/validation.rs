//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check settings that depend on each other (body limit vs image limit)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{AppConfig, StorageBackend, StoreBackend, PLACEHOLDER_TOKEN_SECRET};

/// One failed check, naming the offending key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.store.backend == StoreBackend::Redis && !config.store.redis_url.starts_with("redis") {
        errors.push(ValidationError::new(
            "store.redis_url",
            "must start with redis:// or rediss://",
        ));
    }
    if config.store.timeout_ms == 0 {
        errors.push(ValidationError::new("store.timeout_ms", "must be greater than 0"));
    }
    if config.store.connect_attempts == 0 {
        errors.push(ValidationError::new("store.connect_attempts", "must be at least 1"));
    }

    if config.auth.token_secret == PLACEHOLDER_TOKEN_SECRET {
        errors.push(ValidationError::new(
            "auth.token_secret",
            "is the shipped placeholder, set TAP_ADMIN_TOKEN_SECRET",
        ));
    } else if config.auth.token_secret.len() < 16 {
        errors.push(ValidationError::new(
            "auth.token_secret",
            "must be at least 16 characters",
        ));
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must be greater than 0"));
    }
    if config.auth.hash_iterations == 0 || config.auth.hash_parallelism == 0 {
        errors.push(ValidationError::new(
            "auth.hash_iterations",
            "argon2 iterations and parallelism must be at least 1",
        ));
    }
    if config.auth.superadmin_email.is_some() != config.auth.superadmin_password.is_some() {
        errors.push(ValidationError::new(
            "auth.superadmin_email",
            "superadmin email and password must be set together",
        ));
    }

    let rl = &config.rate_limit;
    if rl.threshold == 0 {
        errors.push(ValidationError::new("rate_limit.threshold", "must be at least 1"));
    }
    if rl.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than 0"));
    }
    if rl.block_duration_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.block_duration_secs",
            "must be greater than 0",
        ));
    }
    if rl.audit_capacity == 0 {
        errors.push(ValidationError::new("rate_limit.audit_capacity", "must be at least 1"));
    }

    if config.storage.backend == StorageBackend::Http && url::Url::parse(&config.storage.endpoint).is_err() {
        errors.push(ValidationError::new("storage.endpoint", "must be an absolute URL"));
    }
    if config.storage.bucket.is_empty() {
        errors.push(ValidationError::new("storage.bucket", "must not be empty"));
    }
    if config.storage.max_image_bytes == 0 {
        errors.push(ValidationError::new("storage.max_image_bytes", "must be greater than 0"));
    }
    if config.security.max_body_size < config.storage.max_image_bytes {
        errors.push(ValidationError::new(
            "security.max_body_size",
            "must be at least storage.max_image_bytes",
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "must be a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AppConfig {
        let mut config = AppConfig::default();
        config.auth.token_secret = "a-long-enough-test-secret".to_string();
        config
    }

    #[test]
    fn test_defaults_with_secret_are_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut config = valid();
        config.auth.token_secret = "short".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "auth.token_secret");
    }

    #[test]
    fn test_placeholder_secret_rejected() {
        let errors = validate_config(&AppConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "auth.token_secret");
        assert!(errors[0].message.contains("placeholder"));
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = valid();
        config.listener.bind_address = "nowhere".to_string();
        config.rate_limit.threshold = 0;
        config.rate_limit.block_duration_secs = 0;
        config.security.max_body_size = 1;

        let fields: Vec<_> = validate_config(&config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "rate_limit.threshold",
                "rate_limit.block_duration_secs",
                "security.max_body_size",
            ]
        );
    }

    #[test]
    fn test_superadmin_pair() {
        let mut config = valid();
        config.auth.superadmin_email = Some("root@x.com".to_string());
        assert!(validate_config(&config).is_err());
        config.auth.superadmin_password = Some("secret1".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
