//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the admin API.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Key-value store connection.
    pub store: StoreConfig,

    /// Tokens, password hashing and SuperAdmin bootstrap.
    pub auth: AuthConfig,

    /// Per-address request limiting.
    pub rate_limit: RateLimitConfig,

    /// Image object storage.
    pub storage: StorageConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Response hardening and CORS.
    pub security: SecurityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Redis,
    Memory,
}

/// Key-value store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `redis` for production, `memory` for local runs.
    pub backend: StoreBackend,

    /// Redis connection URL. Overridden by `TAP_ADMIN_REDIS_URL`.
    pub redis_url: String,

    /// Deadline for every store call in milliseconds.
    pub timeout_ms: u64,

    /// Connection attempts at startup before giving up.
    pub connect_attempts: u32,

    /// Base delay between connection attempts in milliseconds.
    pub connect_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            timeout_ms: 2000,
            connect_attempts: 5,
            connect_backoff_ms: 200,
        }
    }
}

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for tokens. Overridden by `TAP_ADMIN_TOKEN_SECRET`.
    pub token_secret: String,

    /// Token lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Argon2 memory cost in KiB.
    pub hash_memory_kib: u32,

    /// Argon2 iterations.
    pub hash_iterations: u32,

    /// Argon2 lanes.
    pub hash_parallelism: u32,

    /// SuperAdmin created at startup when absent.
    /// Overridden by `TAP_ADMIN_SUPERADMIN_EMAIL` / `_PASSWORD`.
    pub superadmin_email: Option<String>,
    pub superadmin_password: Option<String>,
}

/// Shipped default signing key. Validation refuses to start with it.
pub const PLACEHOLDER_TOKEN_SECRET: &str = "CHANGE_ME_IN_PRODUCTION";

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_secret: PLACEHOLDER_TOKEN_SECRET.to_string(),
            token_ttl_secs: 3600,
            hash_memory_kib: 19_456,
            hash_iterations: 2,
            hash_parallelism: 1,
            superadmin_email: None,
            superadmin_password: None,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Requests allowed in a window before the address is blocked.
    pub threshold: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// How long a blocked address stays blocked, in seconds.
    pub block_duration_secs: u64,

    /// Audit entries retained.
    pub audit_capacity: usize,

    /// Allow requests when the store is unavailable.
    pub fail_open: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 10,
            window_secs: 300,
            block_duration_secs: 600,
            audit_capacity: 1000,
            fail_open: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Http,
    Memory,
}

/// Image storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `http` for the storage API, `memory` for local runs.
    pub backend: StorageBackend,

    /// Storage API base URL.
    pub endpoint: String,

    /// Base of the public object URLs.
    pub public_base_url: String,

    /// Bucket name.
    pub bucket: String,

    /// Bearer token for the storage API. Overridden by `TAP_ADMIN_STORAGE_TOKEN`.
    pub access_token: Option<String>,

    /// Folder new images are stored under.
    pub folder: String,

    /// Largest accepted image in bytes.
    pub max_image_bytes: usize,

    /// Per-request timeout for the storage API in seconds.
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Http,
            endpoint: "https://storage.googleapis.com".to_string(),
            public_base_url: "https://storage.googleapis.com".to_string(),
            bucket: "tap-images".to_string(),
            access_token: None,
            folder: "taps".to_string(),
            max_image_bytes: 2 * 1024 * 1024, // 2MB
            timeout_secs: 30,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests at shutdown, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,

    /// Maximum body size in bytes. Must leave room for the largest image.
    pub max_body_size: usize,

    /// Origins allowed to call the API from a browser.
    pub cors_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 4 * 1024 * 1024, // 4MB
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}
