//! Timeout enforcement for generation-time calls.
//!
//! Every specification, key and token fetch runs under a deadline. A timed-out
//! call surfaces as `FetchError::Timeout` and aborts the cycle like any other
//! fetch failure.

use std::future::Future;
use std::time::Duration;

use crate::sources::FetchError;

/// Run `fut` with a deadline, mapping expiry to [`FetchError::Timeout`].
pub async fn with_timeout<T, F>(limit: Duration, what: &str, fut: F) -> Result<T, FetchError>
where
    F: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(what = %what, timeout = ?limit, "External call timed out");
            Err(FetchError::Timeout {
                what: what.to_string(),
                after: limit,
            })
        }
    }
}
