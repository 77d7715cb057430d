// ABOUTME: Execution targets: where apps actually run.
// ABOUTME: Target drives a whole environment; AppTarget is what one deployment needs.

mod docker;

pub use docker::{APP_HOME_DIR, DockerTarget, LABEL_APP, LABEL_ENV, STOP_TIMEOUT};

use crate::app::{Binary, Container, Mode};
use crate::deploy::DeployError;
use crate::runtime::ImageOps;
use crate::spec::DeploymentInfo;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// An execution backend for a whole environment.
#[async_trait]
pub trait Target: Send + Sync {
    /// Deploy every app of `mode` that is not already running.
    async fn deploy(&self, mode: &Mode, cancel: &CancellationToken) -> Result<(), DeployError>;

    /// Stop every app, dependents before their dependencies.
    async fn stop(&self, cancel: &CancellationToken) -> Result<(), DeployError>;

    /// Delete every app and shared resource of the environment.
    async fn remove(&self, cancel: &CancellationToken) -> Result<(), DeployError>;
}

/// What the scheduler needs from a backend to start single apps.
#[async_trait]
pub trait AppTarget: ImageOps {
    async fn deploy_binary(&self, app: &Binary) -> Result<DeploymentInfo, DeployError>;

    async fn deploy_container(&self, app: &Container) -> Result<DeploymentInfo, DeployError>;
}
