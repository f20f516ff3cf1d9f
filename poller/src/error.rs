use std::time::Duration;

use thiserror::Error;

/// Why a version check produced no usable result.
///
/// None of these reach the user. They are logged, recorded in the check
/// history, and the next trigger tries again.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    #[error("network error: {0}")]
    Network(String),
    #[error("descriptor endpoint returned HTTP {0}")]
    Status(u16),
    #[error("version check timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("version check cancelled")]
    Cancelled,
    #[error("malformed version descriptor: {0}")]
    Malformed(String),
}

impl CheckError {
    /// Short label for logs and the check history.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::Status(_) => "status",
            Self::Timeout(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl From<reqwest::Error> for CheckError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status(status.as_u16());
        }
        Self::Network(err.to_string())
    }
}
