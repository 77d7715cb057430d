// ABOUTME: Top-level error type returned by devnet commands.
// ABOUTME: Wraps the per-module errors so the binary reports one message and exits non-zero.

use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::spec::SpecError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Spec(#[from] SpecError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("failed to remove {path}: {source}")]
    RemoveHome {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to run test {name}: {source}")]
    TestSpawn {
        name: String,
        source: std::io::Error,
    },

    #[error("{failed} of {total} test(s) failed: {names}")]
    TestsFailed {
        failed: usize,
        total: usize,
        names: String,
    },

    #[error("no tests match {0:?}")]
    NoTests(Vec<String>),

    #[error("interrupted")]
    Interrupted,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
