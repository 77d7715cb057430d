// ABOUTME: Composable capability traits for container runtimes.
// ABOUTME: Defines ImageOps, ContainerOps and NetworkOps plus their shared types.

mod container;
mod image;
mod network;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps};
pub use image::{ImageError, ImageOps};
pub use network::{NetworkError, NetworkOps};
pub use shared_types::*;

/// Everything a container target needs from a runtime.
pub trait Runtime: ContainerOps + NetworkOps + ImageOps {}

impl<T: ContainerOps + NetworkOps + ImageOps> Runtime for T {}
