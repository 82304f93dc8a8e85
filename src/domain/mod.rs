//! Domain records shared by the gates, the services and the store.
//!
//! # Data Flow
//! ```text
//! Store (Redis hashes / in-memory maps)
//!     → Account, Tap, ClientWindow (typed records)
//!     → services (accounts, catalog) and gates (rate limit, roles)
//!     → HTTP handlers (serialized views)
//! ```

pub mod account;
pub mod role;
pub mod tap;
pub mod window;

pub use account::{Account, UserSummary};
pub use role::{Role, UnknownRole};
pub use tap::{LiquidType, NewTap, Tap, TapFilter, TapPatch, TapStatus};
pub use window::ClientWindow;
