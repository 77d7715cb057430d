// ABOUTME: In-memory container runtime recording every call it receives.
// ABOUTME: Stands in for the docker CLI when testing the docker target.

use async_trait::async_trait;
use devnet::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ImageError,
    ImageOps, NetworkError, NetworkOps, RuntimeError,
};
use devnet::types::{ContainerId, ImageRef, NetworkId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// One mutating call, named after the container, network or image it touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Run(String),
    Start(String),
    Stop(String),
    Kill(String),
    Remove(String),
    CreateNetwork(String),
    RemoveNetwork(String),
    Pull(String),
}

#[derive(Default)]
struct State {
    containers: BTreeMap<String, ContainerInfo>,
    configs: BTreeMap<String, ContainerConfig>,
    networks: BTreeSet<String>,
    images: BTreeSet<String>,
    calls: Vec<Call>,
    next_id: u8,
}

#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<State>,
    stop_delay: Duration,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stop takes this long, so concurrent stops overlap.
    pub fn with_stop_delay(mut self, delay: Duration) -> Self {
        self.stop_delay = delay;
        self
    }

    pub fn with_image(self, image: &str) -> Self {
        self.state.lock().images.insert(image.to_string());
        self
    }

    pub fn with_network(self, name: &str) -> Self {
        self.state.lock().networks.insert(name.to_string());
        self
    }

    /// Register a container as if a previous run had created it.
    pub fn with_container(self, name: &str, labels: &[(&str, &str)], running: bool) -> Self {
        {
            let mut state = self.state.lock();
            let id = state.allocate_id();
            state.containers.insert(
                id.clone(),
                ContainerInfo {
                    id: ContainerId::new(id),
                    name: name.to_string(),
                    running,
                    labels: labels
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    networks: BTreeMap::new(),
                },
            );
        }
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.state
            .lock()
            .containers
            .values()
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().networks.contains(name)
    }

    /// Config the container called `name` was last run with.
    pub fn run_config(&self, name: &str) -> Option<ContainerConfig> {
        self.state.lock().configs.get(name).cloned()
    }

    fn with_container_mut<T>(
        &self,
        id: &ContainerId,
        f: impl FnOnce(&mut ContainerInfo) -> T,
    ) -> Result<T, ContainerError> {
        let mut state = self.state.lock();
        state
            .containers
            .get_mut(id.as_str())
            .map(f)
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn name_of(&self, id: &ContainerId) -> String {
        self.state
            .lock()
            .containers
            .get(id.as_str())
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:0>64}", self.next_id)
    }
}

fn matches(container: &ContainerInfo, filters: &ContainerFilters) -> bool {
    (filters.all || container.running)
        && filters
            .labels
            .iter()
            .all(|(k, v)| container.label(k) == Some(v.as_str()))
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn find_container(&self, name: &str) -> Result<Option<ContainerInfo>, ContainerError> {
        Ok(self
            .state
            .lock()
            .containers
            .values()
            .find(|c| c.name == name)
            .cloned())
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerInfo>, ContainerError> {
        Ok(self
            .state
            .lock()
            .containers
            .values()
            .filter(|c| matches(c, filters))
            .cloned()
            .collect())
    }

    async fn run_container(&self, config: &ContainerConfig) -> Result<ContainerId, ContainerError> {
        let mut state = self.state.lock();
        if let Some(network) = &config.network
            && !state.networks.contains(network)
        {
            return Err(ContainerError::Runtime(RuntimeError::Unexpected {
                command: "run".to_string(),
                output: format!("network {network} not found"),
            }));
        }

        let id = state.allocate_id();
        let ip = IpAddr::V4(Ipv4Addr::new(172, 18, 0, state.next_id + 1));
        let networks = config
            .network
            .iter()
            .map(|n| (n.clone(), ip))
            .collect();
        state.containers.insert(
            id.clone(),
            ContainerInfo {
                id: ContainerId::new(id.clone()),
                name: config.name.clone(),
                running: true,
                labels: config.labels.clone(),
                networks,
            },
        );
        state.configs.insert(config.name.clone(), config.clone());
        state.calls.push(Call::Run(config.name.clone()));
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.with_container_mut(id, |c| c.running = true)?;
        self.record(Call::Start(self.name_of(id)));
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let name = self.name_of(id);
        if !self.stop_delay.is_zero() {
            tokio::time::sleep(self.stop_delay).await;
        }
        self.with_container_mut(id, |c| c.running = false)?;
        self.record(Call::Stop(name));
        Ok(())
    }

    async fn kill_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.with_container_mut(id, |c| c.running = false)?;
        self.record(Call::Kill(self.name_of(id)));
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let name = self.name_of(id);
        self.state
            .lock()
            .containers
            .remove(id.as_str())
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))?;
        self.record(Call::Remove(name));
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        self.with_container_mut(id, |c| c.clone())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        Ok(self.state.lock().networks.contains(name))
    }

    async fn create_network(
        &self,
        name: &str,
        _labels: &BTreeMap<String, String>,
    ) -> Result<NetworkId, NetworkError> {
        let mut state = self.state.lock();
        state.networks.insert(name.to_string());
        state.calls.push(Call::CreateNetwork(name.to_string()));
        Ok(NetworkId::new(format!("net-{name}")))
    }

    async fn remove_network(&self, name: &str) -> Result<(), NetworkError> {
        let mut state = self.state.lock();
        if !state.networks.remove(name) {
            return Err(NetworkError::NotFound(name.to_string()));
        }
        state.calls.push(Call::RemoveNetwork(name.to_string()));
        Ok(())
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        Ok(self.state.lock().images.contains(reference.as_str()))
    }

    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        let mut state = self.state.lock();
        state.images.insert(reference.to_string());
        state.calls.push(Call::Pull(reference.to_string()));
        Ok(())
    }
}
