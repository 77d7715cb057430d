// ABOUTME: Deployment descriptors: a host binary run in a sandbox image, or a container image.
// ABOUTME: Both share AppBase and deploy through prepare, target call, configure.

use crate::config::Config;
use crate::deploy::DeployError;
use crate::hooks::{Hook, HookContext, HookPoint};
use crate::readiness::{HealthCheckCapable, ReadinessError, wait_until_healthy};
use crate::spec::{AppInfo, AppStatus, DeploymentInfo};
use crate::target::AppTarget;
use crate::types::ImageRef;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Image host binaries are run in.
pub const BINARY_IMAGE: &str = "alpine:3.16.0";

/// Default time to wait for prerequisites to become healthy.
pub const DEFAULT_PREREQUISITES_TIMEOUT: Duration = Duration::from_secs(20);

type ArgsFn = dyn Fn() -> Result<Vec<String>, String> + Send + Sync;

/// Apps that must be healthy before an app is prepared.
#[derive(Clone)]
pub struct Prerequisites {
    pub timeout: Duration,
    pub dependencies: Vec<Arc<dyn HealthCheckCapable>>,
}

impl Default for Prerequisites {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PREREQUISITES_TIMEOUT,
            dependencies: Vec::new(),
        }
    }
}

impl fmt::Debug for Prerequisites {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Prerequisites")
            .field("timeout", &self.timeout)
            .field(
                "dependencies",
                &self.dependencies.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Properties shared by both kinds of deployment.
#[derive(Clone)]
pub struct AppBase {
    name: String,
    info: Arc<AppInfo>,
    args: Arc<ArgsFn>,
    ports: BTreeMap<String, u16>,
    requires: Prerequisites,
    pre_deploy: Option<Arc<dyn Hook>>,
    post_deploy: Option<Arc<dyn Hook>>,
}

impl AppBase {
    pub fn new(name: impl Into<String>, info: Arc<AppInfo>) -> Self {
        Self {
            name: name.into(),
            info,
            args: Arc::new(|| Ok(Vec::new())),
            ports: BTreeMap::new(),
            requires: Prerequisites::default(),
            pre_deploy: None,
            post_deploy: None,
        }
    }

    pub fn with_args(self, args: Vec<String>) -> Self {
        self.with_args_fn(move || Ok(args.clone()))
    }

    /// Arguments computed when the app is started, after its prerequisites
    /// have recorded their addresses.
    pub fn with_args_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Result<Vec<String>, String> + Send + Sync + 'static,
    {
        self.args = Arc::new(f);
        self
    }

    pub fn with_ports(mut self, ports: BTreeMap<String, u16>) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_requires(mut self, requires: Prerequisites) -> Self {
        self.requires = requires;
        self
    }

    pub fn with_pre_deploy(mut self, hook: Arc<dyn Hook>) -> Self {
        self.pre_deploy = Some(hook);
        self
    }

    pub fn with_post_deploy(mut self, hook: Arc<dyn Hook>) -> Self {
        self.post_deploy = Some(hook);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> &Arc<AppInfo> {
        &self.info
    }

    pub fn ports(&self) -> &BTreeMap<String, u16> {
        &self.ports
    }

    pub fn requires(&self) -> &Prerequisites {
        &self.requires
    }

    pub fn args(&self) -> Result<Vec<String>, DeployError> {
        (self.args)().map_err(|message| DeployError::Args {
            app: self.name.clone(),
            message,
        })
    }

    fn hook_context(
        &self,
        config: &Config,
        point: HookPoint,
        deployment: Option<DeploymentInfo>,
    ) -> HookContext {
        HookContext {
            point,
            env_name: config.env_name.clone(),
            app: self.name.clone(),
            home_dir: config.app_home(&self.name),
            deployment,
        }
    }

    /// A stopped app is being resumed; it was prepared and configured before.
    fn is_resuming(&self) -> bool {
        self.info.info().status == AppStatus::Stopped
    }

    async fn pre_deploy(
        &self,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<(), DeployError> {
        let home = config.app_home(&self.name);
        create_private_dir(&home).map_err(|source| DeployError::AppHome {
            path: home.clone(),
            source,
        })?;

        if !self.requires.dependencies.is_empty() {
            tracing::debug!(app = %self.name, "Waiting for prerequisites to become healthy");
            wait_until_healthy(cancel, self.requires.timeout, &self.requires.dependencies)
                .await
                .map_err(|source| match source {
                    ReadinessError::Cancelled => DeployError::Cancelled,
                    source => DeployError::Prerequisites {
                        app: self.name.clone(),
                        source,
                    },
                })?;
        }

        if self.is_resuming() {
            return Ok(());
        }
        if let Some(hook) = &self.pre_deploy {
            hook.run(&self.hook_context(config, HookPoint::PreDeploy, None))
                .await?;
        }
        Ok(())
    }

    async fn post_deploy(&self, config: &Config, info: &DeploymentInfo) -> Result<(), DeployError> {
        if self.is_resuming() {
            return Ok(());
        }
        if let Some(hook) = &self.post_deploy {
            hook.run(&self.hook_context(config, HookPoint::PostDeploy, Some(info.clone())))
                .await?;
        }
        Ok(())
    }
}

impl fmt::Debug for AppBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppBase")
            .field("name", &self.name)
            .field("ports", &self.ports)
            .field("requires", &self.requires)
            .field("pre_deploy", &self.pre_deploy.is_some())
            .field("post_deploy", &self.post_deploy.is_some())
            .finish_non_exhaustive()
    }
}

/// A host executable, mounted into [`BINARY_IMAGE`] and run as the invoking user.
#[derive(Debug, Clone)]
pub struct Binary {
    pub base: AppBase,
    pub bin_path: PathBuf,
}

/// A container image run with its own entrypoint.
#[derive(Debug, Clone)]
pub struct Container {
    pub base: AppBase,
    pub image: ImageRef,
    pub env: Vec<(String, String)>,
}

/// An app ready to deploy to a target.
#[derive(Debug, Clone)]
pub enum Deployment {
    Binary(Binary),
    Container(Container),
}

impl Deployment {
    pub fn base(&self) -> &AppBase {
        match self {
            Deployment::Binary(app) => &app.base,
            Deployment::Container(app) => &app.base,
        }
    }

    pub fn name(&self) -> &str {
        self.base().name()
    }

    /// Names of the apps that must be running before this one is deployed.
    pub fn dependencies(&self) -> Vec<&str> {
        self.base()
            .requires
            .dependencies
            .iter()
            .map(|d| d.name())
            .collect()
    }

    /// Image the deployment runs in.
    pub fn image(&self) -> ImageRef {
        match self {
            Deployment::Binary(_) => ImageRef::from_static(BINARY_IMAGE),
            Deployment::Container(app) => app.image.clone(),
        }
    }

    /// Prepare, start through `target`, then configure.
    pub async fn deploy<T>(
        &self,
        target: &T,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<DeploymentInfo, DeployError>
    where
        T: AppTarget + ?Sized,
    {
        let base = self.base();
        base.pre_deploy(config, cancel).await?;

        let info = match self {
            Deployment::Binary(app) => target.deploy_binary(app).await?,
            Deployment::Container(app) => target.deploy_container(app).await?,
        };

        base.post_deploy(config, &info).await?;
        Ok(info)
    }
}

#[cfg(unix)]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(path)
}
