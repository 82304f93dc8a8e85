//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the store or object storage:
//!     → timeouts.rs (every external call has a deadline)
//!
//! Startup connection to the store:
//!     → backoff.rs (retry with exponential backoff + jitter)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; a hung store call never hangs a request
//! - Timeout errors are distinct from other failures so callers can apply
//!   their own failure policy (fail open vs. fail closed)

pub mod backoff;
pub mod timeouts;

pub use backoff::Backoff;
pub use timeouts::{bounded, Elapsed};
