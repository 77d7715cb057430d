// ABOUTME: Shared types used across runtime trait definitions.
// ABOUTME: ContainerConfig, ContainerInfo, port and volume mappings.

use crate::types::{ContainerId, ImageRef};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;

/// Configuration for running a new container.
#[derive(Debug, Clone)]
pub struct ContainerConfig {
    pub name: String,
    pub image: ImageRef,
    /// Environment variables, in order.
    pub env: Vec<(String, String)>,
    pub labels: BTreeMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub volumes: Vec<VolumeMount>,
    /// Overrides the image ENTRYPOINT.
    pub entrypoint: Option<String>,
    /// Arguments passed after the image.
    pub args: Vec<String>,
    /// `uid:gid` to run as.
    pub user: Option<String>,
    pub network: Option<String>,
}

/// Port mapping configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMapping {
    pub host_ip: IpAddr,
    pub host_port: u16,
    pub container_port: u16,
}

impl PortMapping {
    /// `ip:host:container/tcp`, as accepted by `--publish`.
    pub fn to_publish_arg(&self) -> String {
        format!("{}:{}:{}/tcp", self.host_ip, self.host_port, self.container_port)
    }
}

/// Bind mount of a host path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeMount {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

impl VolumeMount {
    pub fn to_volume_arg(&self) -> String {
        let mut arg = format!("{}:{}", self.source.display(), self.target);
        if self.read_only {
            arg.push_str(":ro");
        }
        arg
    }
}

/// What the runtime reports about an existing container.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub id: ContainerId,
    /// Name without the leading slash docker prints.
    pub name: String,
    pub running: bool,
    pub labels: BTreeMap<String, String>,
    /// IP address per attached network.
    pub networks: BTreeMap<String, IpAddr>,
}

impl ContainerInfo {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}
