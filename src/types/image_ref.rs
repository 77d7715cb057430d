// ABOUTME: Container image reference validation.
// ABOUTME: Keeps the reference verbatim so the engine sees exactly what the stack file says.

use serde::{Deserialize, Deserializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0:?}")]
    InvalidChar(char),

    #[error("image reference has an empty component: {0}")]
    EmptyComponent(String),
}

/// A validated image reference such as `postgres:14.3-alpine` or
/// `ghcr.io/org/indexer@sha256:...`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '/' | ':' | '.' | '-' | '_' | '@'))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (path, _digest) = input.split_once('@').unwrap_or((input, ""));
        if path.split('/').any(str::is_empty) || path.ends_with(':') {
            return Err(ParseImageRefError::EmptyComponent(input.to_string()));
        }

        Ok(Self(input.to_string()))
    }

    /// For references known at compile time to be valid.
    pub(crate) fn from_static(reference: &'static str) -> Self {
        debug_assert!(Self::parse(reference).is_ok(), "invalid image reference {reference}");
        Self(reference.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tag after the last path component, if one was given.
    pub fn tag(&self) -> Option<&str> {
        let path = self.0.split_once('@').map_or(self.0.as_str(), |(p, _)| p);
        let last = path.rsplit('/').next().unwrap_or(path);
        last.split_once(':').map(|(_, tag)| tag)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ImageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ImageRef::parse(&s).map_err(serde::de::Error::custom)
    }
}
