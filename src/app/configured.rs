// ABOUTME: Apps assembled from stack file entries.
// ABOUTME: Resolves binaries, environment, hooks, health checks and argument placeholders.

use super::{App, AppBase, Binary, Container, Deployment, Mode, Prerequisites};
use crate::config::template::{ArgTemplate, Segment, TemplateError};
use crate::config::{AppConfig, AppSource, Config, ConfigError, StackFile, resolve_env_map};
use crate::error::Result;
use crate::hooks::{Hook, ScriptHook};
use crate::readiness::{AppHealthCheck, HealthCheckCapable};
use crate::spec::{AppInfo, AppType, Spec};
use crate::types::AppName;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An app described by the stack file.
#[derive(Debug, Clone)]
pub struct ConfiguredApp {
    app_type: AppType,
    name: AppName,
    info: Arc<AppInfo>,
    deployment: Deployment,
}

impl ConfiguredApp {
    pub fn new(
        stack: &StackFile,
        name: &AppName,
        app: &AppConfig,
        spec: &Spec,
        config: &Config,
    ) -> Result<Self> {
        let invalid = |message: String| ConfigError::InvalidApp {
            app: name.to_string(),
            message,
        };

        let app_type = AppType::new(app.app_type.as_str());
        let info = spec.describe_app(app_type.clone(), name.as_str())?;

        let mut required_infos = BTreeMap::new();
        let mut dependencies: Vec<Arc<dyn HealthCheckCapable>> = Vec::new();
        for required in app.required_apps() {
            let required_app = stack
                .apps
                .get(required)
                .ok_or_else(|| invalid(format!("requires unknown app {required}")))?;
            let required_info = spec.describe_app(
                AppType::new(required_app.app_type.as_str()),
                required.as_str(),
            )?;

            let check = match &required_app.health {
                Some(health) => {
                    AppHealthCheck::new(required.as_str(), Arc::clone(&required_info), health)
                        .map_err(invalid)?
                }
                None => AppHealthCheck::running(required.as_str(), Arc::clone(&required_info)),
            };
            dependencies.push(Arc::new(check));
            required_infos.insert(required.to_string(), required_info);
        }

        let templates = app
            .args
            .iter()
            .map(|arg| ArgTemplate::parse(arg))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| invalid(e.0))?;

        let mut base = AppBase::new(name.as_str(), Arc::clone(&info))
            .with_ports(app.ports.clone())
            .with_args_fn(move || render_args(&templates, &required_infos));
        if let Some(requires) = &app.requires {
            base = base.with_requires(Prerequisites {
                timeout: requires.timeout,
                dependencies,
            });
        }
        if let Some(path) = &app.hooks.pre_deploy {
            let hook: Arc<dyn Hook> = Arc::new(ScriptHook::new(stack.resolve_path(path)));
            base = base.with_pre_deploy(hook);
        }
        if let Some(path) = &app.hooks.post_deploy {
            let hook: Arc<dyn Hook> = Arc::new(ScriptHook::new(stack.resolve_path(path)));
            base = base.with_post_deploy(hook);
        }

        let deployment = match app.source().map_err(invalid)? {
            AppSource::Binary(path) => Deployment::Binary(Binary {
                base,
                bin_path: if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    config.bin_dir.join(path)
                },
            }),
            AppSource::Container(image) => Deployment::Container(Container {
                base,
                image: image.clone(),
                env: resolve_env_map(&app.env)?,
            }),
        };

        Ok(Self {
            app_type,
            name: name.clone(),
            info,
            deployment,
        })
    }
}

impl App for ConfiguredApp {
    fn app_type(&self) -> AppType {
        self.app_type.clone()
    }

    fn name(&self) -> &str {
        self.name.as_str()
    }

    fn info(&self) -> Arc<AppInfo> {
        Arc::clone(&self.info)
    }

    fn deployment(&self) -> Deployment {
        self.deployment.clone()
    }
}

fn render_args(
    templates: &[ArgTemplate],
    infos: &BTreeMap<String, Arc<AppInfo>>,
) -> std::result::Result<Vec<String>, String> {
    templates
        .iter()
        .map(|template| template.render(|segment| placeholder_value(segment, infos)))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| e.0)
}

fn placeholder_value(
    segment: &Segment,
    infos: &BTreeMap<String, Arc<AppInfo>>,
) -> std::result::Result<String, TemplateError> {
    let Some(app) = segment.app() else {
        return Ok(String::new());
    };
    let info = infos
        .get(app)
        .map(|info| info.info())
        .ok_or_else(|| TemplateError(format!("{app} is not a prerequisite")))?;

    match segment {
        Segment::Host { .. } => info
            .host_from_container
            .map(|ip| ip.to_string())
            .ok_or_else(|| TemplateError(format!("{app} has no container address yet"))),
        Segment::Port { port, .. } => info
            .ports
            .get(port)
            .map(u16::to_string)
            .ok_or_else(|| TemplateError(format!("{app} does not expose port {port:?}"))),
        Segment::Literal(text) => Ok(text.clone()),
    }
}

/// Assemble `mode` from the stack file, registering every app in `spec`.
pub fn mode_from_stack(stack: &StackFile, mode: &str, spec: &Spec, config: &Config) -> Result<Mode> {
    stack
        .mode(mode)?
        .into_iter()
        .map(|(name, app)| {
            ConfiguredApp::new(stack, name, app, spec, config)
                .map(|app| Arc::new(app) as Arc<dyn App>)
        })
        .collect::<Result<Vec<_>>>()
        .map(Mode::new)
}
