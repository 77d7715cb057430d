// ABOUTME: The YAML stack file: every app the environment knows, grouped into modes.
// ABOUTME: Parsed once per invocation and validated before anything is deployed.

use super::deserialize::deserialize_modes;
use super::template::ArgTemplate;
use super::{AppConfig, ConfigError, TestConfig};
use crate::types::AppName;
use nonempty::NonEmpty;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StackFile {
    pub apps: BTreeMap<AppName, AppConfig>,

    #[serde(deserialize_with = "deserialize_modes")]
    pub modes: BTreeMap<String, NonEmpty<AppName>>,

    #[serde(default)]
    pub tests: BTreeMap<String, TestConfig>,

    /// Directory the stack file was read from; relative hook paths resolve against it.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl StackFile {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, Path::new("<inline>"))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut stack = Self::parse(&yaml, path)?;
        stack.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        tracing::debug!(
            path = %path.display(),
            apps = stack.apps.len(),
            modes = stack.modes.len(),
            "Loaded stack file"
        );
        Ok(stack)
    }

    fn parse(yaml: &str, path: &Path) -> Result<Self, ConfigError> {
        let stack: Self = serde_yaml::from_str(yaml).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        stack.validate()?;
        Ok(stack)
    }

    /// Per-app checks that do not depend on which mode is deployed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, app) in &self.apps {
            let invalid = |message: String| ConfigError::InvalidApp {
                app: name.to_string(),
                message,
            };

            app.source().map_err(invalid)?;

            for required in app.required_apps() {
                if required == name {
                    return Err(invalid("cannot require itself".to_string()));
                }
                if !self.apps.contains_key(required) {
                    return Err(invalid(format!("requires unknown app {required}")));
                }
            }

            for arg in &app.args {
                let template = ArgTemplate::parse(arg).map_err(|e| invalid(e.0))?;
                for referenced in template.apps() {
                    if !app.required_apps().any(|r| r.as_str() == referenced) {
                        return Err(invalid(format!(
                            "argument {arg:?} refers to {referenced}, which is not listed in requires"
                        )));
                    }
                }
            }

            if let Some(health) = &app.health {
                let probe = health.probe().map_err(invalid)?;
                if !app.ports.contains_key(probe.port_name()) {
                    return Err(invalid(format!(
                        "health check uses undeclared port {:?}",
                        probe.port_name()
                    )));
                }
            }
        }

        for (mode, apps) in &self.modes {
            for app in apps.iter() {
                if !self.apps.contains_key(app) {
                    return Err(ConfigError::UnknownApp {
                        mode: mode.clone(),
                        app: app.to_string(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Apps of `mode` in declaration order; every requirement must be in the same mode.
    pub fn mode(&self, mode: &str) -> Result<Vec<(&AppName, &AppConfig)>, ConfigError> {
        let names = self
            .modes
            .get(mode)
            .ok_or_else(|| ConfigError::UnknownMode(mode.to_string()))?;

        let mut apps = Vec::with_capacity(names.len());
        for name in names.iter() {
            let (name, app) = self
                .apps
                .get_key_value(name)
                .ok_or_else(|| ConfigError::UnknownApp {
                    mode: mode.to_string(),
                    app: name.to_string(),
                })?;
            if let Some(missing) = app.required_apps().find(|r| !names.iter().any(|n| n == *r)) {
                return Err(ConfigError::InvalidApp {
                    app: name.to_string(),
                    message: format!("requires {missing}, which is not part of mode {mode}"),
                });
            }
            apps.push((name, app));
        }
        Ok(apps)
    }

    /// Tests whose name contains any of `filters`; all tests when no filter is given.
    pub fn tests_matching<'a>(
        &'a self,
        filters: &'a [String],
    ) -> impl Iterator<Item = (&'a String, &'a TestConfig)> + 'a {
        self.tests.iter().filter(move |(name, _)| {
            filters.is_empty() || filters.iter().any(|f| name.contains(f.as_str()))
        })
    }

    /// Resolve a path from the stack file relative to its directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }
}
