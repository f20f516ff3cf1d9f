//! Build identifiers.
//!
//! A build identifier is opaque. Two builds are the same build only when the
//! identifiers are byte-for-byte equal; there is no semantic-version ordering.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("build version must not be empty")]
pub struct EmptyVersionError;

/// An opaque build identifier.
///
/// The local build must be non-empty; a remote descriptor may report any
/// string, including an empty one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildVersion(String);

impl BuildVersion {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyVersionError> {
        let value = value.into();
        if value.is_empty() {
            Err(EmptyVersionError)
        } else {
            Ok(Self(value))
        }
    }

    /// Whatever the remote descriptor reported, taken verbatim.
    #[must_use]
    pub fn remote(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when `remote` names a different build. Verbatim comparison.
    #[must_use]
    pub fn differs_from(&self, remote: &BuildVersion) -> bool {
        self.0 != remote.0
    }
}

impl TryFrom<String> for BuildVersion {
    type Error = EmptyVersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<BuildVersion> for String {
    fn from(value: BuildVersion) -> Self {
        value.0
    }
}

impl fmt::Display for BuildVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
