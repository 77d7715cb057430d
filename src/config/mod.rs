// ABOUTME: Process-wide configuration and the YAML stack file describing apps and modes.
// ABOUTME: Config is built once per invocation and shared read-only by every component.

mod app;
mod deserialize;
mod env_value;
mod healthcheck;
mod stack;
pub mod template;

pub use app::{AppConfig, AppSource, HooksConfig, RequiresConfig, TestConfig};
pub use env_value::{EnvValue, resolve_env_map};
pub use healthcheck::{HealthcheckConfig, HttpCheck, ProbeKind, TcpCheck};
pub use stack::StackFile;

use crate::spec::SPEC_FILENAME;
use std::path::{Path, PathBuf};

pub const STACK_FILENAME: &str = "devnet.yml";
pub const DEFAULT_ENV: &str = "devnet";
pub const DEFAULT_MODE: &str = "dev";
pub const DEFAULT_TARGET: &str = "docker";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("stack file not found: {0}")]
    StackNotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid stack file {path}: {source}")]
    Yaml {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("unknown mode {0:?}")]
    UnknownMode(String),

    #[error("unknown target {0:?} (supported: docker)")]
    UnknownTarget(String),

    #[error("app {app}: {message}")]
    InvalidApp { app: String, message: String },

    #[error("mode {mode} lists unknown app {app}")]
    UnknownApp { mode: String, app: String },

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("cannot determine a home directory, pass --home")]
    NoHomeDir,
}

/// Immutable settings for one invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub env_name: String,
    pub mode_name: String,
    pub target: String,
    /// Root of everything this environment writes.
    pub home_dir: PathBuf,
    /// Per-app private directories live under here.
    pub app_dir: PathBuf,
    /// Helper scripts for the operator's shell.
    pub wrapper_dir: PathBuf,
    /// Where host binaries named by the stack file are looked up.
    pub bin_dir: PathBuf,
    pub test_filters: Vec<String>,
    pub verbose: bool,
}

impl Config {
    pub fn spec_file(&self) -> PathBuf {
        self.home_dir.join(SPEC_FILENAME)
    }

    /// Private home directory of one app on the host.
    pub fn app_home(&self, app: &str) -> PathBuf {
        self.app_dir.join(app)
    }

    /// Container name (and log prefix) for an app in this environment.
    pub fn container_name(&self, app: &str) -> String {
        format!("{}-{}", self.env_name, app)
    }
}

/// Raw values collected from flags and environment, turned into a [`Config`].
#[derive(Debug, Clone)]
pub struct ConfigFactory {
    pub env_name: String,
    pub mode_name: String,
    pub target: String,
    /// Directory holding every environment; defaults to the user cache dir.
    pub home_root: Option<PathBuf>,
    pub bin_dir: Option<PathBuf>,
    pub test_filters: Vec<String>,
    pub verbose: bool,
}

impl Default for ConfigFactory {
    fn default() -> Self {
        Self {
            env_name: DEFAULT_ENV.to_string(),
            mode_name: DEFAULT_MODE.to_string(),
            target: DEFAULT_TARGET.to_string(),
            home_root: None,
            bin_dir: None,
            test_filters: Vec::new(),
            verbose: false,
        }
    }
}

impl ConfigFactory {
    pub fn build(self) -> Result<Config, ConfigError> {
        let home_root = match self.home_root {
            Some(root) => root,
            None => dirs::cache_dir()
                .map(|dir| dir.join("devnet"))
                .ok_or(ConfigError::NoHomeDir)?,
        };
        let home_dir = home_root.join(&self.env_name);
        let bin_dir = self
            .bin_dir
            .unwrap_or_else(|| home_root.join("bin-src"));

        Ok(Config {
            app_dir: home_dir.join("app"),
            wrapper_dir: home_dir.join("bin"),
            home_dir,
            bin_dir,
            env_name: self.env_name,
            mode_name: self.mode_name,
            target: self.target,
            test_filters: self.test_filters,
            verbose: self.verbose,
        })
    }
}

/// Locate the stack file: an explicit path wins, otherwise `devnet.yml` in `dir`.
/// Relative paths resolve against `dir`.
pub fn find_stack_file(dir: &Path, explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = dir.join(explicit.unwrap_or(Path::new(STACK_FILENAME)));
    if path.is_file() {
        Ok(path)
    } else {
        Err(ConfigError::StackNotFound(path))
    }
}
