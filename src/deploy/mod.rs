// ABOUTME: Mode deployment: dependency graph, bounded scheduler and error types.
// ABOUTME: Scheduler drives apps through an AppTarget and records results in the Spec.

mod error;
mod graph;
mod scheduler;

pub use error::{DeployError, DeployErrorKind};
pub use graph::DependencyGraph;
pub use scheduler::{DEFAULT_MAX_IMAGE_PULLS, Scheduler};
