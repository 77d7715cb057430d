// ABOUTME: Dependency graph of the apps in one deployment.
// ABOUTME: Rejects duplicates, unknown dependencies and cycles before any task starts.

use super::DeployError;
use std::collections::{BTreeMap, VecDeque};

/// Apps and the apps each of them waits for.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    dependencies: BTreeMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build from `(app, dependencies)` pairs in declaration order.
    pub fn new<I, S, D>(nodes: I) -> Result<Self, DeployError>
    where
        I: IntoIterator<Item = (S, D)>,
        S: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
    {
        let mut declared = Vec::new();
        let mut dependencies: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, deps) in nodes {
            let name = name.into();
            if dependencies.contains_key(&name) {
                return Err(DeployError::DuplicateApp(name));
            }
            declared.push(name.clone());
            dependencies.insert(name, deps.into_iter().map(Into::into).collect());
        }

        for (app, deps) in &dependencies {
            if let Some(missing) = deps.iter().find(|d| !dependencies.contains_key(*d)) {
                return Err(DeployError::UnknownDependency {
                    app: app.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        topological_order(&declared, &dependencies)?;
        Ok(Self { dependencies })
    }

    pub fn dependencies(&self, app: &str) -> &[String] {
        self.dependencies.get(app).map_or(&[], Vec::as_slice)
    }
}

/// Kahn's algorithm: every app after all of its dependencies, ties in
/// declaration order. Whatever is left once no app is free forms a cycle.
fn topological_order(
    declared: &[String],
    dependencies: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>, DeployError> {
    let mut pending: BTreeMap<&str, usize> = dependencies
        .iter()
        .map(|(name, deps)| (name.as_str(), deps.len()))
        .collect();

    let mut ready: VecDeque<&str> = declared
        .iter()
        .map(String::as_str)
        .filter(|name| pending[name] == 0)
        .collect();

    let mut order = Vec::with_capacity(declared.len());
    while let Some(app) = ready.pop_front() {
        order.push(app.to_string());
        for candidate in declared {
            let waits_for_app = dependencies[candidate].iter().filter(|d| *d == app).count();
            if waits_for_app == 0 {
                continue;
            }
            if let Some(count) = pending.get_mut(candidate.as_str()) {
                *count -= waits_for_app;
                if *count == 0 {
                    ready.push_back(candidate.as_str());
                }
            }
        }
    }

    if order.len() < declared.len() {
        let apps = declared
            .iter()
            .filter(|name| !order.contains(*name))
            .cloned()
            .collect();
        return Err(DeployError::Cycle { apps });
    }
    Ok(order)
}
