//! In-process platform implementations.
//!
//! Used by tests and by the CLI, which has no browser behind it.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use futures_util::future::BoxFuture;

use staleguard_types::{HookId, LoadFailure, Visibility};

use super::{CacheStore, FailureCallback, HostActions, LoaderHook, PlatformError, VisibilityProbe};

/// Visibility that only changes when told to.
#[derive(Debug)]
pub struct StaticVisibility {
    visible: AtomicBool,
}

impl StaticVisibility {
    #[must_use]
    pub fn new(visibility: Visibility) -> Self {
        Self {
            visible: AtomicBool::new(visibility.is_visible()),
        }
    }

    pub fn set(&self, visibility: Visibility) {
        self.visible
            .store(visibility.is_visible(), Ordering::SeqCst);
    }
}

impl Default for StaticVisibility {
    fn default() -> Self {
        Self::new(Visibility::Visible)
    }
}

impl VisibilityProbe for StaticVisibility {
    fn visibility(&self) -> Visibility {
        if self.visible.load(Ordering::SeqCst) {
            Visibility::Visible
        } else {
            Visibility::Hidden
        }
    }
}

/// Named caches held in memory. Can be switched to fail every call.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    names: Mutex<BTreeSet<String>>,
    deleted: Mutex<Vec<String>>,
    unavailable: AtomicBool,
}

impl MemoryCacheStore {
    #[must_use]
    pub fn with_caches<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: Mutex::new(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn insert(&self, name: impl Into<String>) {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Every successful delete, in call order.
    #[must_use]
    pub fn deleted(&self) -> Vec<String> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_available(&self) -> Result<(), PlatformError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(PlatformError::CacheUnavailable)
        } else {
            Ok(())
        }
    }
}

impl CacheStore for MemoryCacheStore {
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, PlatformError>> {
        Box::pin(async move {
            self.check_available()?;
            Ok(self.names())
        })
    }

    fn delete<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<bool, PlatformError>> {
        Box::pin(async move {
            self.check_available()?;
            let removed = self
                .names
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(name);
            if removed {
                self.deleted
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(name.to_string());
            }
            Ok(removed)
        })
    }
}

/// A loader hook driven by hand: `emit` plays the part of the module loader.
#[derive(Default)]
pub struct ManualLoaderHook {
    next_id: AtomicU64,
    callbacks: Mutex<HashMap<HookId, FailureCallback>>,
}

impl ManualLoaderHook {
    /// Deliver a load failure to every registered callback.
    pub fn emit(&self, failure: &LoadFailure) {
        let callbacks = self.callbacks.lock().unwrap_or_else(PoisonError::into_inner);
        for callback in callbacks.values() {
            callback(failure.clone());
        }
    }

    #[must_use]
    pub fn registered(&self) -> usize {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl std::fmt::Debug for ManualLoaderHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualLoaderHook")
            .field("registered", &self.registered())
            .finish()
    }
}

impl LoaderHook for ManualLoaderHook {
    fn register(&self, callback: FailureCallback) -> HookId {
        let id = HookId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, callback);
        id
    }

    fn unregister(&self, id: HookId) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
    }
}

/// Counts the recovery actions it was asked to perform.
#[derive(Debug, Default)]
pub struct RecordingHost {
    reloads: AtomicUsize,
    resets: AtomicUsize,
}

impl RecordingHost {
    #[must_use]
    pub fn reloads(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

impl HostActions for RecordingHost {
    fn reload(&self) {
        tracing::info!("Host reload requested");
        self.reloads.fetch_add(1, Ordering::SeqCst);
    }

    fn reset_error_boundary(&self) {
        tracing::info!("Host error-boundary reset requested");
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
