// ABOUTME: Command handlers for the devnet CLI.
// ABOUTME: Each loads the environment state and drives the configured target.

mod remove;
mod spec;
mod start;
mod stop;
mod test;

pub use remove::remove;
pub use spec::spec;
pub use start::start;
pub use stop::stop;
pub use test::test;

use devnet::config::{Config, ConfigError, DEFAULT_TARGET, StackFile, find_stack_file};
use devnet::error::Result;
use devnet::output::Output;
use devnet::runtime::DockerCli;
use devnet::spec::Spec;
use devnet::target::DockerTarget;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a command needs from the invocation.
pub struct Context {
    pub config: Arc<Config>,
    pub stack: Option<PathBuf>,
    pub docker: String,
    pub output: Output,
    pub cancel: CancellationToken,
}

impl Context {
    fn load_stack(&self) -> Result<StackFile> {
        let cwd = std::env::current_dir()?;
        let path = find_stack_file(&cwd, self.stack.as_deref())?;
        Ok(StackFile::load(&path)?)
    }

    fn load_spec(&self) -> Result<Arc<Spec>> {
        Ok(Arc::new(Spec::load(&self.config)?))
    }

    fn target(&self, spec: &Arc<Spec>) -> Result<DockerTarget<DockerCli>> {
        if self.config.target != DEFAULT_TARGET {
            return Err(ConfigError::UnknownTarget(self.config.target.clone()).into());
        }
        Ok(DockerTarget::new(
            DockerCli::new(&self.docker),
            Arc::clone(&self.config),
            Arc::clone(spec),
        ))
    }
}
