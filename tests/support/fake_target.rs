// ABOUTME: In-memory app target that counts concurrent deploys and pulls.
// ABOUTME: Lets scheduler properties be asserted without a container engine.

use async_trait::async_trait;
use devnet::app::{AppBase, Binary, Container};
use devnet::deploy::DeployError;
use devnet::runtime::{ContainerError, ImageError, ImageOps, RuntimeError};
use devnet::spec::{AppStatus, DeploymentInfo};
use devnet::target::AppTarget;
use devnet::types::ImageRef;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Tracks how many operations run at once and the highest count seen.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeTarget {
    images: Mutex<BTreeSet<String>>,
    pulls: Mutex<Vec<String>>,
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<String>>,
    events: Arc<Mutex<Vec<String>>>,
    failing: BTreeSet<String>,
    failing_pulls: Mutex<BTreeMap<String, usize>>,
    delays: BTreeMap<String, Duration>,
    deploy_delay: Duration,
    pull_delay: Duration,
    pub deploys: Gauge,
    pub pulls_in_flight: Gauge,
}

impl FakeTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(self, image: &str) -> Self {
        self.images.lock().insert(image.to_string());
        self
    }

    pub fn with_deploy_delay(mut self, delay: Duration) -> Self {
        self.deploy_delay = delay;
        self
    }

    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    /// Deploying `app` takes `delay` instead of the default.
    pub fn with_app_delay(mut self, app: &str, delay: Duration) -> Self {
        self.delays.insert(app.to_string(), delay);
        self
    }

    /// Deploying `app` fails after its delay.
    pub fn failing(mut self, app: &str) -> Self {
        self.failing.insert(app.to_string());
        self
    }

    /// The first `times` pulls of `image` fail.
    pub fn failing_pull(self, image: &str, times: usize) -> Self {
        self.failing_pulls.lock().insert(image.to_string(), times);
        self
    }

    pub fn pulls(&self) -> Vec<String> {
        self.pulls.lock().clone()
    }

    /// Apps in the order their deployment began.
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    /// Apps in the order their deployment completed.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().clone()
    }

    /// Log of `deploy <app>` entries, shared so hooks can append to it too.
    pub fn events(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.events)
    }

    async fn deploy(&self, base: &AppBase) -> Result<DeploymentInfo, DeployError> {
        let name = base.name().to_string();
        self.started.lock().push(name.clone());
        self.events.lock().push(format!("deploy {name}"));
        self.deploys.enter();

        let delay = self.delays.get(&name).copied().unwrap_or(self.deploy_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.deploys.exit();

        if self.failing.contains(&name) {
            return Err(ContainerError::NotFound(format!("devnet-test-{name}")).into());
        }

        self.finished.lock().push(name.clone());
        Ok(DeploymentInfo {
            container: Some(format!("devnet-test-{name}")),
            host_from_host: Some(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            host_from_container: Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))),
            status: AppStatus::Running,
            ports: base.ports().clone(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ImageOps for FakeTarget {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.images.lock().contains(reference.as_str()))
    }

    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        self.pulls.lock().push(reference.to_string());
        self.pulls_in_flight.enter();
        if !self.pull_delay.is_zero() {
            tokio::time::sleep(self.pull_delay).await;
        }
        self.pulls_in_flight.exit();

        {
            let mut failing = self.failing_pulls.lock();
            if let Some(remaining) = failing.get_mut(reference.as_str())
                && *remaining > 0
            {
                *remaining -= 1;
                return Err(ImageError::PullFailed {
                    image: reference.to_string(),
                    source: RuntimeError::Unexpected {
                        command: format!("pull {reference}"),
                        output: "manifest unknown".to_string(),
                    },
                });
            }
        }

        self.images.lock().insert(reference.to_string());
        Ok(())
    }
}

#[async_trait]
impl AppTarget for FakeTarget {
    async fn deploy_binary(&self, app: &Binary) -> Result<DeploymentInfo, DeployError> {
        self.deploy(&app.base).await
    }

    async fn deploy_container(&self, app: &Container) -> Result<DeploymentInfo, DeployError> {
        self.deploy(&app.base).await
    }
}
