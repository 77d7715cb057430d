// ABOUTME: Error types for deployment operations.
// ABOUTME: Covers graph validation, prerequisites, hooks, image pulls, and runtime failures.

use crate::hooks::HookError;
use crate::readiness::ReadinessError;
use crate::runtime::{ContainerError, ImageError, NetworkError};
use crate::spec::SpecError;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("app {0} is listed more than once")]
    DuplicateApp(String),

    #[error("app {app} depends on {dependency}, which is not part of the deployment")]
    UnknownDependency { app: String, dependency: String },

    #[error("dependency cycle between apps: {}", .apps.join(", "))]
    Cycle { apps: Vec<String> },

    #[error("prerequisites of {app} are not healthy: {source}")]
    Prerequisites {
        app: String,
        source: ReadinessError,
    },

    #[error("cannot create home directory {path}: {source}")]
    AppHome {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("binary {path} of app {app} does not exist")]
    MissingBinary { app: String, path: PathBuf },

    #[error("cannot build arguments of {app}: {message}")]
    Args { app: String, message: String },

    #[error(transparent)]
    Hook(#[from] HookError),

    #[error("image {image} is not available: {source}")]
    Image { image: String, source: ImageError },

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error("deploying {app} failed: {source}")]
    App {
        app: String,
        source: Box<DeployError>,
    },

    #[error("task {0} aborted unexpectedly")]
    Aborted(String),

    #[error("cancelled")]
    Cancelled,
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// The requested set of apps cannot be deployed as declared.
    InvalidGraph,
    /// An app did not become deployable in time.
    NotReady,
    /// A hook or the container engine failed.
    Execution,
    /// The state file could not be written.
    State,
    Cancelled,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::DuplicateApp(_)
            | DeployError::UnknownDependency { .. }
            | DeployError::Cycle { .. } => DeployErrorKind::InvalidGraph,
            DeployError::Prerequisites { .. } => DeployErrorKind::NotReady,
            DeployError::Spec(_) => DeployErrorKind::State,
            DeployError::Cancelled => DeployErrorKind::Cancelled,
            DeployError::App { source, .. } => source.kind(),
            _ => DeployErrorKind::Execution,
        }
    }

    /// Wrap with the name of the app whose deployment failed.
    pub fn for_app(self, app: &str) -> Self {
        match self {
            DeployError::App { .. } | DeployError::Cancelled => self,
            other => DeployError::App {
                app: app.to_string(),
                source: Box::new(other),
            },
        }
    }
}
