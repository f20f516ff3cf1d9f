use thiserror::Error;

use staleguard_poller::CheckError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("version checking is enabled but no `version.endpoint` is configured")]
    MissingEndpoint,
    #[error("failed to build version source: {0}")]
    VersionSource(#[from] CheckError),
}
