//! What the host feeds in, and the capabilities it hands over.

use std::sync::Arc;

use staleguard_core::{CacheStore, HostActions, LoaderHook, VisibilityProbe};
use staleguard_poller::VersionSource;
use staleguard_types::{Action, ActivityEvent, LoadFailure, ModuleKey, ResourceErrorEvent, Visibility};

/// One event observed by the host page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// Pointer, keyboard, touch, scroll, focus or network input.
    Activity(ActivityEvent),
    Visibility(Visibility),
    RouteChanged,
    ResourceError(ResourceErrorEvent),
    UnhandledRejection(LoadFailure),
    /// A module that failed earlier has now loaded.
    ChunkLoaded(ModuleKey),
    /// The user picked an action on a notification.
    UserAction(Action),
}

/// Platform capabilities, injected by the host.
#[derive(Clone)]
pub struct Platform {
    pub visibility: Arc<dyn VisibilityProbe>,
    pub caches: Arc<dyn CacheStore>,
    pub loader: Arc<dyn LoaderHook>,
    pub host: Arc<dyn HostActions>,
    /// Overrides the HTTP source built from `version.endpoint`.
    pub version_source: Option<Arc<dyn VersionSource>>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("visibility", &self.visibility.visibility())
            .field("version_source", &self.version_source.is_some())
            .finish_non_exhaustive()
    }
}
