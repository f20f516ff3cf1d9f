//! Detects that a newer build of the application has been deployed.
//!
//! The [`VersionPoller`] compares the locally embedded [`BuildVersion`] with
//! the remote descriptor and publishes an `update-available` notification
//! when they differ. Fetching is behind the [`VersionSource`] seam;
//! [`HttpVersionSource`] is the reqwest-backed implementation.
//!
//! [`BuildVersion`]: staleguard_types::BuildVersion

mod descriptor;
mod error;
pub mod history;
mod poller;
mod source;

pub use descriptor::parse_descriptor;
pub use error::CheckError;
pub use history::{CheckHistory, CheckRecord, CheckStats, CheckStatus};
pub use poller::{CheckDecision, CheckState, PollState, RequestHandle, VersionPoller};
pub use source::{HttpVersionSource, VersionSource};
