//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, path from TAP_ADMIN_CONFIG or --config)
//!     → loader.rs (parse, environment overrides for secrets)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the rate-limit policy
//! ```
//!
//! # Design Decisions
//! - Only the rate-limit policy is hot-reloadable; other sections need a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_or_default, ConfigError, CONFIG_PATH_ENV};
pub use schema::{
    AppConfig, AuthConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig, SecurityConfig,
    StorageBackend, StorageConfig, StoreBackend, StoreConfig, TimeoutConfig, TlsConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
