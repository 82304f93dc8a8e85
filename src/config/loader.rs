//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::config::schema::AppConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "TAP_ADMIN_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load, apply environment overrides and validate a TOML file.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    finish(config)
}

/// Like [`load_config`], falling back to defaults when no file is given.
pub fn load_or_default(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    match path {
        Some(path) => load_config(path),
        None => finish(AppConfig::default()),
    }
}

fn finish(mut config: AppConfig) -> Result<AppConfig, ConfigError> {
    apply_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Secrets and deployment-specific values come from the environment.
pub fn apply_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    let var = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(url) = var("TAP_ADMIN_REDIS_URL") {
        config.store.redis_url = url;
    }
    if let Some(secret) = var("TAP_ADMIN_TOKEN_SECRET") {
        config.auth.token_secret = secret;
    }
    if let Some(token) = var("TAP_ADMIN_STORAGE_TOKEN") {
        config.storage.access_token = Some(token);
    }
    if let Some(email) = var("TAP_ADMIN_SUPERADMIN_EMAIL") {
        config.auth.superadmin_email = Some(email);
    }
    if let Some(password) = var("TAP_ADMIN_SUPERADMIN_PASSWORD") {
        config.auth.superadmin_password = Some(password);
    }
}
