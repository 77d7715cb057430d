// ABOUTME: Fixed-interval retry loop driven by the retryable/fatal probe classification.
// ABOUTME: Stops on success, on a fatal error, or when the cancellation token fires.

use super::ProbeError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    #[error("{0}")]
    Fatal(String),

    #[error("cancelled")]
    Cancelled,
}

/// Call `op` now and then every `interval` until it stops returning
/// [`ProbeError::Retryable`].
pub async fn retry<T, F, Fut>(
    cancel: &CancellationToken,
    interval: Duration,
    mut op: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProbeError>>,
{
    loop {
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            outcome = op() => outcome,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(ProbeError::Fatal(message)) => return Err(RetryError::Fatal(message)),
            Err(ProbeError::Retryable(message)) => {
                tracing::trace!(%message, "Retrying after {:?}", interval);
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}
