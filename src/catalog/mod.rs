//! Catalog of taps.
//!
//! # Data Flow
//! ```text
//! admin create/update: form fields + image
//!     → NewTap / TapPatch validation → validate_image
//!     → ObjectStore::upload → Store (record + id list + category set)
//!
//! public reads: Store → active taps only (get-by-id excepted)
//! ```

pub mod service;

pub use service::{CatalogService, CatalogStats};
