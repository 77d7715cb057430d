// ABOUTME: Test support utilities.
// ABOUTME: In-memory runtime and target fakes plus helpers to assemble apps and modes.

use devnet::app::{App, AppBase, Binary, Container, Deployment, Prerequisites};
use devnet::config::{Config, ConfigFactory};
use devnet::readiness::{AppHealthCheck, HealthCheckCapable};
use devnet::spec::{AppInfo, AppType, Spec};
use devnet::types::ImageRef;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

// Each test binary only uses some of these modules, so allow dead_code.
#[allow(dead_code)]
pub mod fake_runtime;
#[allow(dead_code)]
pub mod fake_target;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("devnet=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Config rooted in `home`, with host binaries looked up in `<home>/bin-src`.
#[allow(dead_code)]
pub fn test_config(home: &Path) -> Config {
    ConfigFactory {
        env_name: "devnet-test".to_string(),
        home_root: Some(home.to_path_buf()),
        ..Default::default()
    }
    .build()
    .unwrap()
}

/// An app assembled directly in code.
#[allow(dead_code)]
pub struct TestApp {
    app_type: AppType,
    name: String,
    info: Arc<AppInfo>,
    deployment: Deployment,
}

impl App for TestApp {
    fn app_type(&self) -> AppType {
        self.app_type.clone()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> Arc<AppInfo> {
        Arc::clone(&self.info)
    }

    fn deployment(&self) -> Deployment {
        self.deployment.clone()
    }
}

/// Base of an app whose type equals its name and that requires `requires` to be running.
#[allow(dead_code)]
pub fn app_base(spec: &Spec, name: &str, requires: &[&str]) -> AppBase {
    let info = spec.describe_app(AppType::new(name), name).unwrap();
    let dependencies: Vec<Arc<dyn HealthCheckCapable>> = requires
        .iter()
        .map(|dep| {
            let dep_info = spec.describe_app(AppType::new(*dep), dep).unwrap();
            Arc::new(AppHealthCheck::running(*dep, dep_info)) as Arc<dyn HealthCheckCapable>
        })
        .collect();

    let base = AppBase::new(name, info).with_ports(BTreeMap::from([("api".to_string(), 8080)]));
    if dependencies.is_empty() {
        base
    } else {
        base.with_requires(Prerequisites {
            timeout: Duration::from_secs(5),
            dependencies,
        })
    }
}

#[allow(dead_code)]
pub fn container_app(spec: &Spec, name: &str, image: &str, requires: &[&str]) -> Arc<dyn App> {
    let base = app_base(spec, name, requires);
    wrap(Deployment::Container(Container {
        base,
        image: ImageRef::parse(image).unwrap(),
        env: Vec::new(),
    }))
}

#[allow(dead_code)]
pub fn binary_app(spec: &Spec, name: &str, bin_path: PathBuf, requires: &[&str]) -> Arc<dyn App> {
    let base = app_base(spec, name, requires);
    wrap(Deployment::Binary(Binary { base, bin_path }))
}

#[allow(dead_code)]
pub fn wrap(deployment: Deployment) -> Arc<dyn App> {
    let base = deployment.base();
    Arc::new(TestApp {
        app_type: base.info().app_type(),
        name: base.name().to_string(),
        info: Arc::clone(base.info()),
        deployment,
    })
}
