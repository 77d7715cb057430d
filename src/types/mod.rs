// ABOUTME: Validated domain types shared by the config, runtime and target layers.
// ABOUTME: Phantom-typed runtime ids, image references and app names.

mod app_name;
mod id;
mod image_ref;

pub use app_name::{AppName, AppNameError};
pub use id::{ContainerId, NetworkId};
pub use image_ref::{ImageRef, ParseImageRefError};
