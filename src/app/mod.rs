// ABOUTME: Applications and modes: what gets deployed, independent of where.
// ABOUTME: An App materialises a Deployment descriptor bound to its long-lived AppInfo.

mod configured;
mod deployment;

pub use configured::{ConfiguredApp, mode_from_stack};
pub use deployment::{
    AppBase, BINARY_IMAGE, Binary, Container, DEFAULT_PREREQUISITES_TIMEOUT, Deployment,
    Prerequisites,
};

use crate::spec::{AppInfo, AppType};
use std::sync::Arc;

/// An application that can be deployed.
pub trait App: Send + Sync {
    fn app_type(&self) -> AppType;

    fn name(&self) -> &str;

    /// Handle to the app's entry in the environment state.
    fn info(&self) -> Arc<AppInfo>;

    /// Descriptor ready to deploy. Building it has no side effects.
    fn deployment(&self) -> Deployment;
}

/// Ordered list of apps deployed together.
#[derive(Clone, Default)]
pub struct Mode {
    apps: Vec<Arc<dyn App>>,
}

impl Mode {
    pub fn new(apps: Vec<Arc<dyn App>>) -> Self {
        Self { apps }
    }

    pub fn apps(&self) -> &[Arc<dyn App>] {
        &self.apps
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}

impl FromIterator<Arc<dyn App>> for Mode {
    fn from_iter<I: IntoIterator<Item = Arc<dyn App>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl std::fmt::Debug for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.apps.iter().map(|app| app.name()))
            .finish()
    }
}
