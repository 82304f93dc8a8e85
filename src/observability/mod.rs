//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Gates, services, store:
//!     → logging.rs (structured log events, request spans from TraceLayer)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID (`x-request-id`) is set early and echoed on the response
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
