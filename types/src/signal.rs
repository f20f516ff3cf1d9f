//! Page-level inputs and the signals derived from them.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

impl Visibility {
    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, Self::Visible)
    }
}

/// Raw input observed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    PointerDown,
    PointerMove,
    PointerUp,
    Click,
    KeyDown,
    KeyUp,
    Scroll,
    TouchStart,
    TouchMove,
    TouchEnd,
    Focus,
    Blur,
    VisibilityChange(Visibility),
    Online,
    Offline,
}

impl ActivityEvent {
    /// Whether this event counts as the user being present.
    ///
    /// A page becoming hidden and the network dropping are not activity.
    #[must_use]
    pub const fn counts_as_activity(self) -> bool {
        !matches!(
            self,
            Self::VisibilityChange(Visibility::Hidden) | Self::Offline
        )
    }
}

/// Broadcast, payload-light signals emitted by the activity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    /// `page-idle`: no activity for at least the idle threshold.
    Idle { idle_for: Duration },
    /// `page-activity-resumed`: first activity after an idle episode.
    ActivityResumed { idle_for: Duration },
}

impl PageSignal {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle { .. } => "page-idle",
            Self::ActivityResumed { .. } => "page-activity-resumed",
        }
    }

    #[must_use]
    pub const fn idle_for(&self) -> Duration {
        match self {
            Self::Idle { idle_for } | Self::ActivityResumed { idle_for } => *idle_for,
        }
    }
}

/// What caused a version check to be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Initial,
    Periodic,
    RouteChange,
    ActivityResumed,
    BecameVisible,
    Manual,
}

impl Trigger {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Periodic => "periodic",
            Self::RouteChange => "route_change",
            Self::ActivityResumed => "activity_resumed",
            Self::BecameVisible => "became_visible",
            Self::Manual => "manual",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
