// ABOUTME: Container runtime backed by the docker CLI (or a CLI-compatible engine).
// ABOUTME: Every operation is one external process whose stdout is parsed or discarded.

use super::error::{FailedSnafu, ParseSnafu, SpawnSnafu, UnexpectedSnafu};
use super::traits::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerInfo, ContainerOps, ImageError,
    ImageOps, NetworkError, NetworkOps,
};
use super::RuntimeError;
use crate::types::{ContainerId, ImageRef, NetworkId};
use async_trait::async_trait;
use serde::Deserialize;
use snafu::{ResultExt, ensure};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

pub const DEFAULT_PROGRAM: &str = "docker";

#[derive(Debug, Clone)]
pub struct DockerCli {
    program: PathBuf,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl DockerCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Run the engine with `args` and return its trimmed stdout.
    async fn exec<I, S>(&self, args: I) -> Result<String, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let command = format!("{} {}", self.program.display(), args.join(" "));
        tracing::trace!(%command, "Invoking container engine");

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .context(SpawnSnafu {
                program: self.program.display().to_string(),
            })?;

        ensure!(
            output.status.success(),
            FailedSnafu {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
        );

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    async fn inspect(&self, ids: &[String]) -> Result<Vec<ContainerInfo>, RuntimeError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = vec!["container".to_string(), "inspect".to_string()];
        args.extend(ids.iter().cloned());
        let command = args.join(" ");
        let stdout = self.exec(&args).await?;

        let raw: Vec<InspectOutput> =
            serde_json::from_str(&stdout).context(ParseSnafu { command })?;
        Ok(raw.into_iter().map(ContainerInfo::from).collect())
    }

    async fn ps(&self, filters: &[String], all: bool) -> Result<Vec<String>, RuntimeError> {
        let mut args = vec!["ps".to_string(), "-q".to_string(), "--no-trunc".to_string()];
        if all {
            args.push("-a".to_string());
        }
        for filter in filters {
            args.push("--filter".to_string());
            args.push(filter.clone());
        }
        Ok(lines(&self.exec(&args).await?))
    }
}

fn lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectOutput {
    id: String,
    name: String,
    state: InspectState,
    #[serde(default)]
    config: InspectConfig,
    #[serde(default)]
    network_settings: InspectNetworkSettings,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    running: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(default)]
    networks: Option<BTreeMap<String, InspectNetwork>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetwork {
    #[serde(rename = "IPAddress", default)]
    ip_address: String,
}

impl From<InspectOutput> for ContainerInfo {
    fn from(raw: InspectOutput) -> Self {
        let networks = raw
            .network_settings
            .networks
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, net)| net.ip_address.parse::<IpAddr>().ok().map(|ip| (name, ip)))
            .collect();
        ContainerInfo {
            id: ContainerId::new(raw.id),
            name: raw.name.trim_start_matches('/').to_string(),
            running: raw.state.running,
            labels: raw.config.labels.unwrap_or_default(),
            networks,
        }
    }
}

#[async_trait]
impl ContainerOps for DockerCli {
    async fn find_container(&self, name: &str) -> Result<Option<ContainerInfo>, ContainerError> {
        let ids = self.ps(&[format!("name=^/?{name}$")], true).await?;
        let found = self.inspect(&ids).await?;
        Ok(found.into_iter().find(|c| c.name == name))
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerInfo>, ContainerError> {
        let labels: Vec<String> = filters
            .labels
            .iter()
            .map(|(k, v)| format!("label={k}={v}"))
            .collect();
        let ids = self.ps(&labels, filters.all).await?;
        Ok(self.inspect(&ids).await?)
    }

    async fn run_container(&self, config: &ContainerConfig) -> Result<ContainerId, ContainerError> {
        let args = run_args(config);
        let command = args.join(" ");
        let stdout = self.exec(&args).await?;
        let id = stdout.lines().last().unwrap_or_default().trim();
        if id.is_empty() {
            return Err(UnexpectedSnafu {
                command,
                output: stdout.clone(),
            }
            .build()
            .into());
        }
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.exec(["start", id.as_str()]).await?;
        Ok(())
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        timeout: Duration,
    ) -> Result<(), ContainerError> {
        let secs = timeout.as_secs().to_string();
        self.exec(["stop", "--time", secs.as_str(), id.as_str()]).await?;
        Ok(())
    }

    async fn kill_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.exec(["kill", id.as_str()]).await?;
        Ok(())
    }

    async fn remove_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        self.exec(["rm", id.as_str()]).await?;
        Ok(())
    }

    async fn inspect_container(&self, id: &ContainerId) -> Result<ContainerInfo, ContainerError> {
        self.inspect(&[id.as_str().to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ContainerError::NotFound(id.to_string()))
    }
}

/// Arguments of `docker run` for `config`.
pub(crate) fn run_args(config: &ContainerConfig) -> Vec<String> {
    let mut args = vec![
        "run".to_string(),
        "--detach".to_string(),
        "--name".to_string(),
        config.name.clone(),
    ];
    for (key, value) in &config.labels {
        args.push("--label".to_string());
        args.push(format!("{key}={value}"));
    }
    if let Some(network) = &config.network {
        args.push("--network".to_string());
        args.push(network.clone());
    }
    for port in &config.ports {
        args.push("--publish".to_string());
        args.push(port.to_publish_arg());
    }
    for volume in &config.volumes {
        args.push("--volume".to_string());
        args.push(volume.to_volume_arg());
    }
    for (key, value) in &config.env {
        args.push("--env".to_string());
        args.push(format!("{key}={value}"));
    }
    if let Some(user) = &config.user {
        args.push("--user".to_string());
        args.push(user.clone());
    }
    if let Some(entrypoint) = &config.entrypoint {
        args.push("--entrypoint".to_string());
        args.push(entrypoint.clone());
    }
    args.push(config.image.to_string());
    args.extend(config.args.iter().cloned());
    args
}

#[async_trait]
impl NetworkOps for DockerCli {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        let stdout = self
            .exec(["network", "ls", "--format", "{{.Name}}"])
            .await?;
        Ok(stdout.lines().any(|line| line.trim() == name))
    }

    async fn create_network(
        &self,
        name: &str,
        labels: &BTreeMap<String, String>,
    ) -> Result<NetworkId, NetworkError> {
        let mut args = vec!["network".to_string(), "create".to_string()];
        for (key, value) in labels {
            args.push("--label".to_string());
            args.push(format!("{key}={value}"));
        }
        args.push(name.to_string());
        let id = self.exec(&args).await?;
        Ok(NetworkId::new(id))
    }

    async fn remove_network(&self, name: &str) -> Result<(), NetworkError> {
        self.exec(["network", "rm", name]).await?;
        Ok(())
    }
}

#[async_trait]
impl ImageOps for DockerCli {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let stdout = self.exec(["images", "-q", reference.as_str()]).await?;
        Ok(!stdout.is_empty())
    }

    async fn pull_image(&self, reference: &ImageRef) -> Result<(), ImageError> {
        tracing::info!(image = %reference, "Pulling image");
        self.exec(["pull", reference.as_str()])
            .await
            .map_err(|source| ImageError::PullFailed {
                image: reference.to_string(),
                source,
            })?;
        Ok(())
    }
}
