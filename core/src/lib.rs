//! Core building blocks for the client resilience layer.
//!
//! - [`platform`]: capability traits the host implements (visibility, cache
//!   storage, module-loader hook, reload/reset actions) plus in-memory versions.
//! - [`ActivityMonitor`]: idle/active state machine that emits `page-idle` and
//!   `page-activity-resumed`.
//! - [`NotificationChannel`]: pub/sub surface both producers publish into.
//!
//! Nothing in here talks to the network; producers live in their own crates.

mod activity;
mod channel;
pub mod platform;

pub use activity::{ActivityMonitor, ActivityState, SignalCallback};
pub use channel::{ChannelEvent, NotificationChannel, Subscription};
pub use platform::{
    CacheStore, FailureCallback, HostActions, LoaderHook, PlatformError, VisibilityProbe,
};
