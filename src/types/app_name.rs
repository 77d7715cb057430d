// ABOUTME: Validated application names.
// ABOUTME: Names end up in container names and host paths, so they follow RFC 1123 labels.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name {0:?} exceeds 63 characters")]
    TooLong(String),

    #[error("app name {0:?} must not start or end with a hyphen")]
    EdgeHyphen(String),

    #[error("invalid character {1:?} in app name {0:?}")]
    InvalidChar(String, char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }
        if value.len() > 63 {
            return Err(AppNameError::TooLong(value.to_string()));
        }
        if value.starts_with('-') || value.ends_with('-') {
            return Err(AppNameError::EdgeHyphen(value.to_string()));
        }
        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
        {
            return Err(AppNameError::InvalidChar(value.to_string(), c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AppName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AppName::new(&s).map_err(serde::de::Error::custom)
    }
}
