//! Deadlines for external calls.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// An operation ran past its deadline.
#[derive(Debug, Clone, Copy, Error)]
#[error("{operation} timed out after {limit:?}")]
pub struct Elapsed {
    pub operation: &'static str,
    pub limit: Duration,
}

/// Run `fut` with a deadline.
pub async fn bounded<F: Future>(
    operation: &'static str,
    limit: Duration,
    fut: F,
) -> Result<F::Output, Elapsed> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Elapsed { operation, limit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_passes_fast_calls() {
        let out = bounded("fast", Duration::from_millis(200), async { 7 }).await;
        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_bounded_reports_operation() {
        let slow = tokio::time::sleep(Duration::from_secs(5));
        let err = bounded("HGETALL", Duration::from_millis(20), slow)
            .await
            .unwrap_err();
        assert_eq!(err.operation, "HGETALL");
        assert!(err.to_string().contains("HGETALL timed out"));
    }
}
