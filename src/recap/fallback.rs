//! Helpers for best-effort external calls.

use futures::future::BoxFuture;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::chain::{ChainError, ChainResult};

/// One lazily-started lookup in a fallback chain.
pub type Attempt<'a, T> = BoxFuture<'a, ChainResult<Option<T>>>;

/// Run `fut` with a deadline. Running out of time is reported as
/// `ChainError::Timeout`, same as any other failed lookup.
pub async fn within<T>(
    timeout: Duration,
    fut: impl Future<Output = ChainResult<T>>,
) -> ChainResult<T> {
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or_else(|_| Err(ChainError::Timeout(timeout)))
}

/// Try each attempt in order and return the first `Some`. Errors, timeouts
/// and empty results move on to the next attempt; later attempts are never
/// polled once one succeeds.
pub async fn first_some<T>(
    lookup: &str,
    attempts: Vec<Attempt<'_, T>>,
    timeout: Duration,
) -> Option<T> {
    for (index, attempt) in attempts.into_iter().enumerate() {
        match within(timeout, attempt).await {
            Ok(Some(value)) => return Some(value),
            Ok(None) => debug!(lookup, attempt = index, "empty result, trying next"),
            Err(e) => debug!(lookup, attempt = index, error = %e, "lookup failed, trying next"),
        }
    }
    None
}
