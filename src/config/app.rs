// ABOUTME: Per-app entries of the stack file.
// ABOUTME: Declares how an app is run, what it needs first and how to tell it is healthy.

use super::{EnvValue, HealthcheckConfig};
use crate::types::{AppName, ImageRef};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    #[serde(rename = "type")]
    pub app_type: String,

    /// Run this image as a container.
    #[serde(default)]
    pub image: Option<ImageRef>,

    /// Run this host executable inside the minimal sandbox image.
    /// Relative paths resolve against the bin dir.
    #[serde(default)]
    pub binary: Option<PathBuf>,

    /// Arguments; `{{app.host}}` and `{{app.ports.name}}` expand to the
    /// container-side address of a required app at deploy time.
    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub ports: BTreeMap<String, u16>,

    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,

    #[serde(default)]
    pub requires: Option<RequiresConfig>,

    #[serde(default)]
    pub health: Option<HealthcheckConfig>,

    #[serde(default)]
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequiresConfig {
    #[serde(default = "default_requires_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    pub apps: Vec<AppName>,
}

fn default_requires_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HooksConfig {
    #[serde(default)]
    pub pre_deploy: Option<PathBuf>,

    #[serde(default)]
    pub post_deploy: Option<PathBuf>,
}

/// Integration test command run by `devnet test`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TestConfig {
    pub command: PathBuf,

    #[serde(default)]
    pub args: Vec<String>,
}

/// What an app entry runs.
#[derive(Debug, Clone, Copy)]
pub enum AppSource<'a> {
    Binary(&'a Path),
    Container(&'a ImageRef),
}

impl AppConfig {
    pub fn source(&self) -> Result<AppSource<'_>, String> {
        match (&self.image, &self.binary) {
            (Some(image), None) => Ok(AppSource::Container(image)),
            (None, Some(binary)) => Ok(AppSource::Binary(binary)),
            (None, None) => Err("one of `image` or `binary` is required".to_string()),
            (Some(_), Some(_)) => Err("`image` and `binary` are mutually exclusive".to_string()),
        }
    }

    /// Names of apps that must be healthy before this one deploys.
    pub fn required_apps(&self) -> impl Iterator<Item = &AppName> {
        self.requires.iter().flat_map(|r| r.apps.iter())
    }
}
