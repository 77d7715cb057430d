// ABOUTME: Target running every app as a container on one engine, joined by a per-environment network.
// ABOUTME: Containers are named and labelled after env and app so later runs find and resume them.

use super::{AppTarget, Target};
use crate::app::{AppBase, BINARY_IMAGE, Binary, Container, Mode};
use crate::config::Config;
use crate::deploy::{DeployError, Scheduler};
use crate::runtime::{
    ContainerConfig, ContainerFilters, ContainerInfo, ImageError, ImageOps, PortMapping, Runtime,
    VolumeMount,
};
use crate::spec::{AppStatus, DeploymentInfo, Spec};
use crate::types::ImageRef;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OnceCell, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Where an app's home directory is mounted inside its container.
pub const APP_HOME_DIR: &str = "/app";

pub const LABEL_ENV: &str = "devnet.env";
pub const LABEL_APP: &str = "devnet.app";

/// Grace period before a stopping container is killed.
pub const STOP_TIMEOUT: Duration = Duration::from_secs(60);

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

pub struct DockerTarget<R> {
    runtime: R,
    config: Arc<Config>,
    spec: Arc<Spec>,
    scheduler: Scheduler,
    network: OnceCell<()>,
}

impl<R: Runtime> DockerTarget<R> {
    pub fn new(runtime: R, config: Arc<Config>, spec: Arc<Spec>) -> Self {
        Self {
            runtime,
            config,
            spec,
            scheduler: Scheduler::default(),
            network: OnceCell::new(),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    fn network_name(&self) -> &str {
        &self.config.env_name
    }

    fn env_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(LABEL_ENV.to_string(), self.config.env_name.clone())])
    }

    /// Create the environment network unless it already exists. Concurrent
    /// callers share a single check and creation.
    async fn ensure_network(&self) -> Result<(), DeployError> {
        self.network
            .get_or_try_init(|| async {
                let name = self.network_name();
                if self.runtime.network_exists(name).await? {
                    tracing::debug!(network = name, "Network exists");
                } else {
                    let id = self.runtime.create_network(name, &self.env_labels()).await?;
                    tracing::info!(network = name, id = id.short(), "Network created");
                }
                Ok::<_, DeployError>(())
            })
            .await
            .map(|_| ())
    }

    /// Resume the app's container if one exists, otherwise run a fresh one
    /// from `fresh`.
    async fn start_app<F>(&self, base: &AppBase, fresh: F) -> Result<DeploymentInfo, DeployError>
    where
        F: FnOnce(String) -> Result<ContainerConfig, DeployError> + Send,
    {
        let name = self.config.container_name(base.name());
        self.ensure_network().await?;

        let id = match self.runtime.find_container(&name).await? {
            Some(existing) => {
                tracing::info!(container = %name, id = existing.id.short(), "Starting existing container");
                if !existing.running {
                    self.runtime.start_container(&existing.id).await?;
                }
                existing.id
            }
            None => {
                tracing::info!(container = %name, "Starting container");
                self.runtime.run_container(&fresh(name.clone())?).await?
            }
        };

        let inspected = self.runtime.inspect_container(&id).await?;
        let host_from_container = inspected
            .networks
            .get(self.network_name())
            .or_else(|| inspected.networks.values().next())
            .copied();

        tracing::info!(container = %name, id = id.short(), "Container started");

        Ok(DeploymentInfo {
            container: Some(name),
            host_from_host: Some(LOCALHOST),
            host_from_container,
            status: AppStatus::Running,
            ports: base.ports().clone(),
            ..Default::default()
        })
    }

    fn base_config(&self, name: String, base: &AppBase, image: ImageRef) -> ContainerConfig {
        let mut labels = self.env_labels();
        labels.insert(LABEL_APP.to_string(), base.name().to_string());

        ContainerConfig {
            name,
            image,
            env: Vec::new(),
            labels,
            ports: base
                .ports()
                .values()
                .map(|port| PortMapping {
                    host_ip: LOCALHOST,
                    host_port: *port,
                    container_port: *port,
                })
                .collect(),
            volumes: vec![VolumeMount {
                source: self.config.app_home(base.name()),
                target: APP_HOME_DIR.to_string(),
                read_only: false,
            }],
            entrypoint: None,
            args: Vec::new(),
            user: None,
            network: Some(self.network_name().to_string()),
        }
    }

    async fn stop_container(
        &self,
        container: &ContainerInfo,
        app: &str,
        dependents: &[watch::Receiver<bool>],
        stopped: Option<&watch::Sender<bool>>,
        cancel: &CancellationToken,
    ) -> Result<(), DeployError> {
        if stopped.is_none() {
            tracing::info!("Unexpected container found, deleting it");
            return self.delete_container(container).await;
        }

        if !dependents.is_empty() {
            tracing::debug!("Waiting for dependents to be stopped");
            for dependent in dependents {
                let mut dependent = dependent.clone();
                tokio::select! {
                    _ = cancel.cancelled() => return Err(DeployError::Cancelled),
                    result = dependent.wait_for(|done| *done) => {
                        result.map_err(|_| DeployError::Aborted(format!("stop of a dependent of {app}")))?;
                    }
                }
            }
        }

        if container.running {
            tracing::info!("Stopping container");
            self.runtime
                .stop_container(&container.id, STOP_TIMEOUT)
                .await?;
            tracing::info!("Container stopped");
        }

        if let Some(stopped) = stopped {
            stopped.send_replace(true);
        }
        Ok(())
    }

    async fn delete_container(&self, container: &ContainerInfo) -> Result<(), DeployError> {
        if container.running {
            self.runtime.kill_container(&container.id).await?;
        }
        self.runtime.remove_container(&container.id).await?;
        tracing::info!("Container deleted");
        Ok(())
    }

    async fn env_containers(&self) -> Result<Vec<ContainerInfo>, DeployError> {
        let filters = ContainerFilters::default()
            .all()
            .label(LABEL_ENV, self.config.env_name.as_str());
        Ok(self.runtime.list_containers(&filters).await?)
    }
}

#[async_trait]
impl<R: Runtime> ImageOps for DockerTarget<R> {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        self.runtime.image_exists(reference).await
    }

    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        self.runtime.pull_image(reference).await
    }
}

#[async_trait]
impl<R: Runtime> AppTarget for DockerTarget<R> {
    async fn deploy_binary(&self, app: &Binary) -> Result<DeploymentInfo, DeployError> {
        let base = &app.base;
        let is_file = tokio::fs::metadata(&app.bin_path)
            .await
            .is_ok_and(|meta| meta.is_file());
        if !is_file {
            return Err(DeployError::MissingBinary {
                app: base.name().to_string(),
                path: app.bin_path.clone(),
            });
        }

        self.start_app(base, |name| {
            let file_name = app
                .bin_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| base.name().to_string());
            let internal_path = format!("/bin/{file_name}");

            let mut config = self.base_config(name, base, ImageRef::from_static(BINARY_IMAGE));
            config.user = current_user();
            config.volumes.push(VolumeMount {
                source: app.bin_path.clone(),
                target: internal_path.clone(),
                read_only: true,
            });
            config.args.push(internal_path);
            config.args.extend(base.args()?);
            Ok(config)
        })
        .await
    }

    async fn deploy_container(&self, app: &Container) -> Result<DeploymentInfo, DeployError> {
        let base = &app.base;
        self.start_app(base, |name| {
            let mut config = self.base_config(name, base, app.image.clone());
            config.env = app.env.clone();
            config.args = base.args()?;
            Ok(config)
        })
        .await
    }
}

#[async_trait]
impl<R: Runtime> Target for DockerTarget<R> {
    async fn deploy(&self, mode: &Mode, cancel: &CancellationToken) -> Result<(), DeployError> {
        self.scheduler
            .deploy(mode, self, &self.config, &self.spec, cancel)
            .await
    }

    async fn stop(&self, cancel: &CancellationToken) -> Result<(), DeployError> {
        let apps = self.spec.apps();

        let mut signals: HashMap<String, (watch::Sender<bool>, watch::Receiver<bool>)> = apps
            .iter()
            .map(|(name, _)| (name.clone(), watch::channel(false)))
            .collect();
        let mut dependents: HashMap<String, Vec<watch::Receiver<bool>>> = HashMap::new();
        for (name, info) in &apps {
            let own = signals[name].1.clone();
            for dependency in info.info().depends_on {
                dependents.entry(dependency).or_default().push(own.clone());
            }
        }

        let containers = self.env_containers().await?;

        // Apps without a container are already gone.
        let present: HashSet<&str> = containers
            .iter()
            .filter_map(|c| c.label(LABEL_APP))
            .collect();
        for (name, (tx, _)) in &signals {
            if !present.contains(name.as_str()) {
                tx.send_replace(true);
            }
        }
        signals.retain(|name, _| present.contains(name.as_str()));

        let no_dependents = Vec::new();
        let stops = containers.iter().map(|container| {
            let app = container.label(LABEL_APP).unwrap_or_default();
            let waits = dependents.get(app).unwrap_or(&no_dependents);
            let stopped = signals.get(app).map(|(tx, _)| tx);
            let span = tracing::info_span!(
                "stop",
                app,
                container = %container.name,
                id = container.id.short()
            );
            self.stop_container(container, app, waits, stopped, cancel)
                .instrument(span)
        });
        futures::future::try_join_all(stops).await?;
        Ok(())
    }

    async fn remove(&self, cancel: &CancellationToken) -> Result<(), DeployError> {
        let containers = self.env_containers().await?;
        let removals = containers.iter().map(|container| {
            let span = tracing::info_span!(
                "remove",
                app = container.label(LABEL_APP).unwrap_or_default(),
                container = %container.name,
                id = container.id.short()
            );
            async move {
                tracing::info!("Deleting container");
                self.delete_container(container).await
            }
            .instrument(span)
        });
        tokio::select! {
            _ = cancel.cancelled() => return Err(DeployError::Cancelled),
            result = futures::future::try_join_all(removals) => { result?; }
        }

        let network = self.network_name();
        if self.runtime.network_exists(network).await? {
            self.runtime.remove_network(network).await?;
            tracing::info!(network, "Network removed");
        }
        Ok(())
    }
}

/// `uid:gid` of this process, read from procfs.
fn current_user() -> Option<String> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    let field = |key: &str| {
        status
            .lines()
            .find(|l| l.starts_with(key))
            .and_then(|l| l.split_whitespace().nth(1))
            .map(str::to_string)
    };
    Some(format!("{}:{}", field("Uid:")?, field("Gid:")?))
}
