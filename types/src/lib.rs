//! Core domain types for staleguard.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be shared by the producers (version poller, chunk recovery),
//! the activity monitor, the notification channel, and the composition root.

// Pedantic lint configuration - these are intentional design choices
#![allow(clippy::missing_errors_doc)] // Result-returning functions are self-explanatory
#![allow(clippy::missing_panics_doc)] // Panics are documented in assertions

mod failure;
mod ids;
mod notification;
mod signal;
mod version;

pub use failure::{Disposition, ElementTag, LoadFailure, ModuleKey, ResourceErrorEvent};
pub use ids::{HookId, ListenerId, RequestId};
pub use notification::{Action, Notification, NotificationKind, NotificationSurface};
pub use signal::{ActivityEvent, PageSignal, Trigger, Visibility};
pub use version::{BuildVersion, EmptyVersionError};
