// ABOUTME: Hooks run around an app's first deployment.
// ABOUTME: Pre-deploy prepares files before the app runs; post-deploy configures it once reachable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

use crate::spec::DeploymentInfo;

/// Hook execution points in the deployment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// After prerequisites are healthy, before the app is started.
    PreDeploy,
    /// After the app is started and its address is known.
    PostDeploy,
}

impl HookPoint {
    pub fn name(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Context handed to hooks.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub point: HookPoint,
    pub env_name: String,
    pub app: String,
    /// Private directory of the app, mounted at `/app` inside its container.
    pub home_dir: PathBuf,
    /// Present for post-deploy hooks only.
    pub deployment: Option<DeploymentInfo>,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("DEVNET_HOOK".to_string(), self.point.name().to_string());
        env.insert("DEVNET_ENV".to_string(), self.env_name.clone());
        env.insert("DEVNET_APP".to_string(), self.app.clone());
        env.insert(
            "DEVNET_APP_HOME".to_string(),
            self.home_dir.display().to_string(),
        );

        if let Some(info) = &self.deployment {
            if let Some(container) = &info.container {
                env.insert("DEVNET_CONTAINER".to_string(), container.clone());
            }
            if let Some(ip) = info.host_from_host {
                env.insert("DEVNET_HOST".to_string(), ip.to_string());
            }
            if let Some(ip) = info.host_from_container {
                env.insert("DEVNET_CONTAINER_HOST".to_string(), ip.to_string());
            }
            for (name, port) in &info.ports {
                let key = format!("DEVNET_PORT_{}", name.to_uppercase().replace('-', "_"));
                env.insert(key, port.to_string());
            }
        }
        env
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("failed to execute {point} hook {path}: {source}")]
    Spawn {
        point: HookPoint,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{point} hook {path} failed with {status}: {stderr}")]
    Exit {
        point: HookPoint,
        path: PathBuf,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{point} hook failed: {message}")]
    Failed { point: HookPoint, message: String },
}

/// A step run before or after an app is deployed.
#[async_trait]
pub trait Hook: Send + Sync {
    async fn run(&self, context: &HookContext) -> Result<(), HookError>;
}

/// Runs an executable script with the context exported as `DEVNET_*` variables.
#[derive(Debug, Clone)]
pub struct ScriptHook {
    path: PathBuf,
}

impl ScriptHook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Hook for ScriptHook {
    async fn run(&self, context: &HookContext) -> Result<(), HookError> {
        tracing::info!(
            app = %context.app,
            hook = %self.path.display(),
            "Running {} hook",
            context.point
        );

        let output = Command::new(&self.path)
            .envs(context.to_env())
            .current_dir(&context.home_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| HookError::Spawn {
                point: context.point,
                path: self.path.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(app = %context.app, "{} hook output: {}", context.point, stdout.trim());
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(HookError::Exit {
                point: context.point,
                path: self.path.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

type HookFn = dyn Fn(&HookContext) -> Result<(), String> + Send + Sync;

/// Wraps a closure, for callers assembling apps in code.
#[derive(Clone)]
pub struct FnHook {
    f: Arc<HookFn>,
}

impl FnHook {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&HookContext) -> Result<(), String> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }
}

impl fmt::Debug for FnHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHook").finish_non_exhaustive()
    }
}

#[async_trait]
impl Hook for FnHook {
    async fn run(&self, context: &HookContext) -> Result<(), HookError> {
        (self.f)(context).map_err(|message| HookError::Failed {
            point: context.point,
            message,
        })
    }
}
