//! Platform capability seams.
//!
//! The control logic never touches a browser directly. The host wires these
//! traits to whatever its runtime offers; [`memory`] provides in-process
//! versions for tests and for the CLI.

use futures_util::future::BoxFuture;
use thiserror::Error;

use staleguard_types::{HookId, LoadFailure, Visibility};

pub mod memory;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("cache storage is not available")]
    CacheUnavailable,
    #[error("cache operation failed: {0}")]
    Cache(String),
}

/// Reports whether the page is currently shown to the user.
pub trait VisibilityProbe: Send + Sync {
    fn visibility(&self) -> Visibility;
}

/// Enumerate/delete access to the platform's named caches.
pub trait CacheStore: Send + Sync {
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, PlatformError>>;

    /// Returns whether a cache with that name existed.
    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, PlatformError>>;
}

pub type FailureCallback = Box<dyn Fn(LoadFailure) + Send + Sync>;

/// The module loader's interception point for load failures.
///
/// Every `register` must be paired with an `unregister` of the returned id.
pub trait LoaderHook: Send + Sync {
    fn register(&self, callback: FailureCallback) -> HookId;
    fn unregister(&self, id: HookId);
}

/// User-facing recovery actions the host knows how to perform.
pub trait HostActions: Send + Sync {
    /// Full page reload.
    fn reload(&self);
    /// Re-run the page's error boundary without reloading.
    fn reset_error_boundary(&self);
}
