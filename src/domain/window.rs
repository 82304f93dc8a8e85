//! Rate-limit window records.

/// Per-address fixed-window counter. Timestamps are milliseconds since the
/// Unix epoch, matching the stored representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientWindow {
    pub count: u32,
    pub last_attempt: i64,
    pub blocked_until: i64,
    /// Bumped on every write; compare-and-swap token.
    pub version: u64,
}

impl ClientWindow {
    /// Window for the first request seen from an address.
    pub fn first(now_ms: i64) -> Self {
        Self {
            count: 1,
            last_attempt: now_ms,
            blocked_until: now_ms,
            version: 1,
        }
    }

    /// Whether requests at `now_ms` must be rejected outright.
    pub fn is_blocked_at(&self, now_ms: i64) -> bool {
        self.blocked_until > now_ms
    }
}
