// ABOUTME: Container environment values from the stack file.
// ABOUTME: Either a literal or a reference to a variable of the invoking shell.

use super::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String, ConfigError> {
        match self {
            EnvValue::Literal(value) => Ok(value.clone()),
            EnvValue::FromEnv { var, default } => std::env::var(var)
                .ok()
                .or_else(|| default.clone())
                .ok_or_else(|| ConfigError::MissingEnvVar(var.clone())),
        }
    }
}

/// Resolve every value, keeping the stack file's key order.
pub fn resolve_env_map(
    map: &BTreeMap<String, EnvValue>,
) -> Result<Vec<(String, String)>, ConfigError> {
    map.iter()
        .map(|(name, value)| value.resolve().map(|resolved| (name.clone(), resolved)))
        .collect()
}
