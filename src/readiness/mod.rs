// ABOUTME: Readiness protocol: health probes classified as retryable or fatal.
// ABOUTME: wait_until_healthy polls a set of checks concurrently under one timeout.

mod probe;
mod retry;

pub use probe::{AppHealthCheck, HttpProbe, TcpProbe};
pub use retry::{RetryError, retry};

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default pause between two probes of the same check.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);

/// Outcome of a single failed probe.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Transient; probe again after the interval.
    #[error("{0}")]
    Retryable(String),

    /// Give up without further probes.
    #[error("{0}")]
    Fatal(String),
}

impl ProbeError {
    pub fn retryable(message: impl Into<String>) -> Self {
        Self::Retryable(message.into())
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal(message.into())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReadinessError {
    #[error(
        "timed out after {timeout:?} waiting for {app} (last error: {})",
        .last_error.as_deref().unwrap_or("none")
    )]
    Timeout {
        app: String,
        timeout: Duration,
        last_error: Option<String>,
    },

    #[error("health check of {app} failed: {message}")]
    Failed { app: String, message: String },

    #[error("cancelled while waiting for health checks")]
    Cancelled,
}

/// Something that can report whether it is ready to serve.
#[async_trait]
pub trait HealthCheckCapable: Send + Sync {
    fn name(&self) -> &str;

    async fn health_check(&self) -> Result<(), ProbeError>;

    fn interval(&self) -> Duration {
        DEFAULT_INTERVAL
    }
}

struct Progress {
    last_error: Mutex<Option<String>>,
    healthy: AtomicBool,
}

/// Poll every check until all are healthy.
///
/// Fails on the first fatal probe error, on cancellation, or when `timeout`
/// elapses; a timeout names the first check that had not passed yet.
pub async fn wait_until_healthy(
    cancel: &CancellationToken,
    timeout: Duration,
    checks: &[Arc<dyn HealthCheckCapable>],
) -> Result<(), ReadinessError> {
    let progress: Vec<Progress> = checks
        .iter()
        .map(|_| Progress {
            last_error: Mutex::new(None),
            healthy: AtomicBool::new(false),
        })
        .collect();

    let waits = checks.iter().zip(&progress).map(|(check, state)| async move {
        let outcome = retry(cancel, check.interval(), move || async move {
            let result = check.health_check().await;
            if let Err(e) = &result {
                *state.last_error.lock() = Some(e.to_string());
            }
            result
        })
        .await;

        match outcome {
            Ok(()) => {
                state.healthy.store(true, Ordering::SeqCst);
                tracing::debug!(app = check.name(), "Health check passed");
                Ok(())
            }
            Err(RetryError::Fatal(message)) => Err(ReadinessError::Failed {
                app: check.name().to_string(),
                message,
            }),
            Err(RetryError::Cancelled) => Err(ReadinessError::Cancelled),
        }
    });

    match tokio::time::timeout(timeout, futures::future::try_join_all(waits)).await {
        Ok(result) => result.map(|_| ()),
        Err(_) => {
            let (app, last_error) = checks
                .iter()
                .zip(&progress)
                .find(|(_, state)| !state.healthy.load(Ordering::SeqCst))
                .map(|(check, state)| (check.name().to_string(), state.last_error.lock().clone()))
                .unwrap_or_default();
            Err(ReadinessError::Timeout {
                app,
                timeout,
                last_error,
            })
        }
    }
}
