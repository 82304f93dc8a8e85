//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, global layers)
//!     → request.rs (request ID, peer address)
//!     → gates (security::rate_limit, security::access_control)
//!     → handlers/ (parse input, call a service)
//!     → response.rs (AppError → status + JSON envelope)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer};
