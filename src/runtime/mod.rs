// ABOUTME: Container engine access behind narrow capability traits.
// ABOUTME: DockerCli implements them by shelling out; tests substitute in-memory fakes.

mod cli;
mod error;
pub mod traits;

pub use cli::{DEFAULT_PROGRAM, DockerCli};
pub use error::RuntimeError;
pub use traits::*;
