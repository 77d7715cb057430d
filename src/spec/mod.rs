// ABOUTME: Persisted snapshot of what is deployed in an environment.
// ABOUTME: Loaded once per invocation, mutated as apps deploy, saved as indented JSON.

mod app_info;

pub use app_info::{AppInfo, AppStatus, AppType, DeploymentInfo};

use crate::config::Config;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Name of the state file inside the environment home directory.
pub const SPEC_FILENAME: &str = "spec.json";

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error(
        "{field} mismatch: {path} was written for {stored:?} but this run uses {requested:?}"
    )]
    Mismatch {
        field: &'static str,
        stored: String,
        requested: String,
        path: PathBuf,
    },

    #[error("app {name} is recorded as type {stored} but {requested} was requested")]
    TypeMismatch {
        name: String,
        stored: AppType,
        requested: AppType,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not a valid state file: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Deserialize)]
struct SpecFile {
    target: String,
    mode: String,
    env: String,
    #[serde(default)]
    apps: BTreeMap<String, AppInfo>,
}

#[derive(Serialize)]
struct SpecFileRef<'a> {
    target: &'a str,
    mode: &'a str,
    env: &'a str,
    apps: BTreeMap<&'a str, &'a AppInfo>,
}

/// The environment snapshot. Exclusively owns every [`AppInfo`].
#[derive(Debug)]
pub struct Spec {
    path: PathBuf,
    target: String,
    mode: String,
    env: String,
    apps: Mutex<BTreeMap<String, Arc<AppInfo>>>,
}

impl Spec {
    /// Empty snapshot for the target/mode/env of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            path: config.spec_file(),
            target: config.target.clone(),
            mode: config.mode_name.clone(),
            env: config.env_name.clone(),
            apps: Mutex::new(BTreeMap::new()),
        }
    }

    /// Load the state file for `config`, or start empty if there is none.
    ///
    /// A state file recorded for a different target, mode or environment is
    /// rejected so state from an incompatible run is never reused.
    pub fn load(config: &Config) -> Result<Self, SpecError> {
        let path = config.spec_file();
        let raw = match std::fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new(config)),
            Err(source) => return Err(SpecError::Read { path, source }),
        };

        let file: SpecFile = serde_json::from_slice(&raw).map_err(|source| SpecError::Corrupt {
            path: path.clone(),
            source,
        })?;

        for (field, stored, requested) in [
            ("target", &file.target, &config.target),
            ("env", &file.env, &config.env_name),
            ("mode", &file.mode, &config.mode_name),
        ] {
            if stored != requested {
                return Err(SpecError::Mismatch {
                    field,
                    stored: stored.clone(),
                    requested: requested.clone(),
                    path,
                });
            }
        }

        tracing::debug!(path = %path.display(), apps = file.apps.len(), "Loaded environment state");

        Ok(Self {
            path,
            target: file.target,
            mode: file.mode,
            env: file.env,
            apps: Mutex::new(
                file.apps
                    .into_iter()
                    .map(|(name, info)| (name, Arc::new(info)))
                    .collect(),
            ),
        })
    }

    /// Return the [`AppInfo`] for `name`, creating it on first use.
    pub fn describe_app(
        &self,
        app_type: AppType,
        name: &str,
    ) -> Result<Arc<AppInfo>, SpecError> {
        let mut apps = self.apps.lock();
        if let Some(existing) = apps.get(name) {
            let stored = existing.app_type();
            if stored != app_type {
                return Err(SpecError::TypeMismatch {
                    name: name.to_string(),
                    stored,
                    requested: app_type,
                });
            }
            return Ok(Arc::clone(existing));
        }

        let info = Arc::new(AppInfo::new(app_type));
        apps.insert(name.to_string(), Arc::clone(&info));
        Ok(info)
    }

    pub fn app(&self, name: &str) -> Option<Arc<AppInfo>> {
        self.apps.lock().get(name).cloned()
    }

    /// Snapshot of every tracked app, ordered by name.
    pub fn apps(&self) -> Vec<(String, Arc<AppInfo>)> {
        self.apps
            .lock()
            .iter()
            .map(|(name, info)| (name.clone(), Arc::clone(info)))
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.apps.lock().contains_key(name)
    }

    /// Reset every deployed app to `stopped`, dropping addresses that are no
    /// longer valid. Apps that never came up stay `not-deployed` so their
    /// hooks still run on the next start.
    pub fn mark_all_stopped(&self) {
        for info in self.apps.lock().values() {
            if info.info().status != AppStatus::NotDeployed {
                info.set_info(DeploymentInfo::stopped());
            }
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn mode(&self) -> &str {
        &self.mode
    }

    pub fn env(&self) -> &str {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render the snapshot as 2-space indented JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let apps = self.apps.lock();
        let file = SpecFileRef {
            target: &self.target,
            mode: &self.mode,
            env: &self.env,
            apps: apps
                .iter()
                .map(|(name, info)| (name.as_str(), info.as_ref()))
                .collect(),
        };
        serde_json::to_string_pretty(&file)
    }

    /// Write the snapshot to the state file.
    pub fn save(&self) -> Result<(), SpecError> {
        let json = self.to_json().map_err(|source| SpecError::Corrupt {
            path: self.path.clone(),
            source,
        })?;

        let write_err = |source| SpecError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        write_private(&self.path, json.as_bytes()).map_err(write_err)?;

        tracing::debug!(path = %self.path.display(), "Saved environment state");
        Ok(())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
