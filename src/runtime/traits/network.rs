// ABOUTME: Network operations trait for container runtimes.
// ABOUTME: Check, create and remove the named networks apps share.

use crate::runtime::RuntimeError;
use crate::types::NetworkId;
use async_trait::async_trait;
use std::collections::BTreeMap;

#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Check if a network with exactly this name exists.
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;

    async fn create_network(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<NetworkId, NetworkError>;

    async fn remove_network(&self, name: &str) -> Result<(), NetworkError>;
}

/// Errors from network operations.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
