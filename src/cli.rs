// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Global flags fall back to DEVNET_* environment variables.

use clap::{Args, Parser, Subcommand};
use devnet::config::{ConfigFactory, DEFAULT_ENV, DEFAULT_MODE, DEFAULT_TARGET};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "devnet")]
#[command(about = "Stand up, tear down and test local service environments")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Name of the environment
    #[arg(long = "env", global = true, env = "DEVNET_ENV", default_value = DEFAULT_ENV)]
    pub env_name: String,

    /// Directory holding every environment [default: <cache dir>/devnet]
    #[arg(long, global = true, env = "DEVNET_HOME")]
    pub home: Option<PathBuf>,

    /// Mode to deploy (a named app list in the stack file)
    #[arg(long, global = true, env = "DEVNET_MODE")]
    pub mode: Option<String>,

    /// Execution target
    #[arg(long, global = true, env = "DEVNET_TARGET", default_value = DEFAULT_TARGET)]
    pub target: String,

    /// Directory host binaries are looked up in [default: <home>/bin-src]
    #[arg(long, global = true, env = "DEVNET_BIN_DIR")]
    pub bin_dir: Option<PathBuf>,

    /// Stack file [default: ./devnet.yml]
    #[arg(long, global = true, env = "DEVNET_STACK")]
    pub stack: Option<PathBuf>,

    /// Container engine executable
    #[arg(long, global = true, env = "DEVNET_DOCKER", default_value = devnet::runtime::DEFAULT_PROGRAM)]
    pub docker: String,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print only the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print results as JSON lines
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    /// Settings for a command whose mode defaults to `default_mode`.
    pub fn config_factory(&self, default_mode: &str, test_filters: Vec<String>) -> ConfigFactory {
        ConfigFactory {
            env_name: self.env_name.clone(),
            mode_name: self
                .mode
                .clone()
                .unwrap_or_else(|| default_mode.to_string()),
            target: self.target.clone(),
            home_root: self.home.clone(),
            bin_dir: self.bin_dir.clone(),
            test_filters,
            verbose: self.verbose,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Deploy every app of the mode that is not already running
    Start,

    /// Stop the environment's containers, dependents first
    Stop,

    /// Delete the environment's containers, network and files
    Remove,

    /// Print the recorded environment state
    Spec,

    /// Deploy the test mode and run the stack file's tests against it
    Test {
        /// Run only tests whose name contains this text (repeatable)
        #[arg(short, long = "filter")]
        filters: Vec<String>,
    },
}

impl Commands {
    pub fn default_mode(&self) -> &'static str {
        match self {
            Commands::Test { .. } => "test",
            _ => DEFAULT_MODE,
        }
    }
}
