// ABOUTME: Library root for devnet - deploys graphs of interdependent local services.
// ABOUTME: The main binary is in main.rs; everything it drives is exposed here for testing.

pub mod app;
pub mod config;
pub mod deploy;
pub mod error;
pub mod hooks;
pub mod output;
pub mod readiness;
pub mod runtime;
pub mod spec;
pub mod target;
pub mod types;

pub use error::{Error, Result};
