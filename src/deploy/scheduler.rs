// ABOUTME: Deploys a mode: one task per app, ordered by dependencies, bounded by two semaphores.
// ABOUTME: The first failure cancels the rest; the state file is saved once at the end.

use super::{DependencyGraph, DeployError};
use crate::app::{Deployment, Mode};
use crate::config::Config;
use crate::spec::{AppInfo, Spec};
use crate::target::AppTarget;
use crate::types::ImageRef;
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::{OnceCell, Semaphore, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Pulls running at the same time, independent of deployments.
pub const DEFAULT_MAX_IMAGE_PULLS: usize = 3;

#[derive(Debug, Clone)]
pub struct Scheduler {
    max_deployments: usize,
    max_image_pulls: usize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            max_deployments: std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
            max_image_pulls: DEFAULT_MAX_IMAGE_PULLS,
        }
    }
}

/// Per-run state shared by every app task.
struct Run<'a, T: ?Sized> {
    target: &'a T,
    config: &'a Config,
    deployment_slots: Semaphore,
    pull_slots: Semaphore,
    images: HashMap<ImageRef, OnceCell<()>>,
    ready: HashMap<String, watch::Sender<bool>>,
    cancel: CancellationToken,
}

impl Scheduler {
    pub fn with_max_deployments(mut self, max: usize) -> Self {
        self.max_deployments = max.max(1);
        self
    }

    pub fn with_max_image_pulls(mut self, max: usize) -> Self {
        self.max_image_pulls = max.max(1);
        self
    }

    pub fn max_deployments(&self) -> usize {
        self.max_deployments
    }

    pub fn max_image_pulls(&self) -> usize {
        self.max_image_pulls
    }

    /// Deploy every app of `mode` not already running, then save `spec`.
    ///
    /// The state file is written whether or not the deployment succeeded so a
    /// later run skips apps that came up. A deployment error takes precedence
    /// over a failure to save.
    pub async fn deploy<T>(
        &self,
        mode: &Mode,
        target: &T,
        config: &Config,
        spec: &Spec,
        cancel: &CancellationToken,
    ) -> Result<(), DeployError>
    where
        T: AppTarget + ?Sized,
    {
        let result = self.run(mode, target, config, cancel).await;
        let saved = spec.save();
        match (result, saved) {
            (Err(e), Err(save_err)) => {
                tracing::warn!(error = %save_err, "Failed to save environment state");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Ok(()), saved) => saved.map_err(DeployError::from),
        }
    }

    async fn run<T>(
        &self,
        mode: &Mode,
        target: &T,
        config: &Config,
        cancel: &CancellationToken,
    ) -> Result<(), DeployError>
    where
        T: AppTarget + ?Sized,
    {
        let apps: Vec<(Deployment, Arc<AppInfo>)> = mode
            .apps()
            .iter()
            .map(|app| (app.deployment(), app.info()))
            .collect();

        let graph = DependencyGraph::new(
            apps.iter()
                .map(|(deployment, _)| (deployment.name(), deployment.dependencies())),
        )?;

        let mut images = HashMap::new();
        let mut ready = HashMap::new();
        for (deployment, _) in &apps {
            images.entry(deployment.image()).or_insert_with(OnceCell::new);
            ready.insert(deployment.name().to_string(), watch::channel(false).0);
        }

        let run = Run {
            target,
            config,
            deployment_slots: Semaphore::new(self.max_deployments),
            pull_slots: Semaphore::new(self.max_image_pulls),
            images,
            ready,
            cancel: cancel.child_token(),
        };

        let mut tasks = FuturesUnordered::new();
        for (deployment, info) in &apps {
            let name = deployment.name();
            if info.info().is_running() {
                tracing::info!(app = name, "Already running");
                run.mark_ready(name);
                continue;
            }

            let span = tracing::info_span!("deploy", app = name);
            let task = async {
                run.deploy_app(deployment, info, graph.dependencies(name))
                    .await
                    .map_err(|e| e.for_app(name))
            };
            tasks.push(task.instrument(span));
        }

        let mut first_error = None;
        while let Some(result) = tasks.next().await {
            if let Err(e) = result {
                if first_error.is_none() {
                    run.cancel.cancel();
                    first_error = Some(e);
                } else if !matches!(e, DeployError::Cancelled) {
                    tracing::warn!(error = %e, "Deployment failed after cancellation");
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl<T> Run<'_, T>
where
    T: AppTarget + ?Sized,
{
    fn mark_ready(&self, app: &str) {
        if let Some(signal) = self.ready.get(app) {
            signal.send_replace(true);
        }
    }

    async fn deploy_app(
        &self,
        deployment: &Deployment,
        info: &AppInfo,
        dependencies: &[String],
    ) -> Result<(), DeployError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(DeployError::Cancelled),
            result = self.deploy_app_inner(deployment, info, dependencies) => result,
        }
    }

    async fn deploy_app_inner(
        &self,
        deployment: &Deployment,
        info: &AppInfo,
        dependencies: &[String],
    ) -> Result<(), DeployError> {
        tracing::info!("Deployment initialized");
        self.ensure_image(&deployment.image()).await?;

        if !dependencies.is_empty() {
            tracing::info!(?dependencies, "Waiting for dependencies");
            for dependency in dependencies {
                let Some(signal) = self.ready.get(dependency) else {
                    continue;
                };
                signal
                    .subscribe()
                    .wait_for(|ready| *ready)
                    .await
                    .map_err(|_| DeployError::Aborted(dependency.clone()))?;
            }
            tracing::info!("Dependencies are running now");
        }

        tracing::debug!("Waiting for free slot for deploying the application");
        let slot = self
            .deployment_slots
            .acquire()
            .await
            .map_err(|_| DeployError::Cancelled)?;

        tracing::info!("Deployment started");
        let mut deployed = deployment
            .deploy(self.target, self.config, &self.cancel)
            .await?;
        deployed.depends_on = dependencies.to_vec();
        deployed.deployed_at = Some(chrono::Utc::now());
        info.set_info(deployed);
        tracing::info!("Deployment succeeded");

        drop(slot);
        self.mark_ready(deployment.name());
        Ok(())
    }

    /// Make `image` available locally. Only the first caller per image checks
    /// and pulls; the others wait for it. A failed pull lets the next waiter
    /// try again.
    async fn ensure_image(&self, image: &ImageRef) -> Result<(), DeployError> {
        let Some(gate) = self.images.get(image) else {
            return Ok(());
        };
        let image_err = |source| DeployError::Image {
            image: image.to_string(),
            source,
        };

        gate.get_or_try_init(|| async {
            if self.target.image_exists(image).await.map_err(image_err)? {
                tracing::info!(%image, "Image exists");
                return Ok(());
            }

            tracing::debug!(%image, "Waiting for free slot for pulling the image");
            let _slot = self
                .pull_slots
                .acquire()
                .await
                .map_err(|_| DeployError::Cancelled)?;

            tracing::info!(%image, "Pulling image");
            self.target.pull_image(image).await.map_err(image_err)?;
            tracing::info!(%image, "Image pulled");
            Ok::<_, DeployError>(())
        })
        .await
        .map(|_| ())
    }
}
