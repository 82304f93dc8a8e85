//! Tap catalog admin API.
//!
//! A REST service managing catalog items ("taps") and the accounts allowed
//! to edit them. Data lives in Redis, images in an object store. Requests
//! pass through ordered gates before reaching a handler:
//!
//! ```text
//! request → rate limit (per address) → token → role (re-read from store) → handler
//! ```

pub mod accounts;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod media;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::AppConfig;
pub use error::AppError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
