// ABOUTME: Container operations trait for container runtimes.
// ABOUTME: Run, start, stop, kill, remove, inspect, and list containers.

use super::shared_types::{ContainerConfig, ContainerInfo};
use crate::runtime::RuntimeError;
use crate::types::ContainerId;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Look up a container (running or not) by its exact name.
    async fn find_container(&self, name: &str) -> Result<Option<ContainerInfo>, ContainerError>;

    /// List containers matching the given filters.
    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerInfo>, ContainerError>;

    /// Create and start a container in one step.
    async fn run_container(&self, config: &ContainerConfig) -> Result<ContainerId, ContainerError>;

    /// Start an existing, stopped container.
    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    /// Stop a running container, killing it after `timeout`.
    async fn stop_container(&self, id: &ContainerId, timeout: Duration)
    -> Result<(), ContainerError>;

    async fn kill_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    async fn remove_container(&self, id: &ContainerId) -> Result<(), ContainerError>;

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError>;
}

/// Filters for listing containers.
#[derive(Debug, Clone, Default)]
pub struct ContainerFilters {
    /// Filter by label (key=value).
    pub labels: BTreeMap<String, String>,
    /// Include stopped containers.
    pub all: bool,
}

impl ContainerFilters {
    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn all(mut self) -> Self {
        self.all = true;
        self
    }
}

/// Errors from container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}
