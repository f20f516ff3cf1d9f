//! Renderer-agnostic notifications.
//!
//! Producers build a [`Notification`]; the notification channel owns whether
//! it is currently shown. Nothing here knows how a notification is drawn.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The two conditions the presentation layer can be told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NotificationKind {
    UpdateAvailable,
    RecoveryRequired,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 2] = [Self::UpdateAvailable, Self::RecoveryRequired];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::UpdateAvailable => "update-available",
            Self::RecoveryRequired => "recovery-required",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user action offered alongside a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    /// Full page reload.
    Reload,
    /// Hide the notification without resolving anything.
    Dismiss,
    /// Reset the page's error boundary without a full reload.
    SoftRetry,
}

impl Action {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Reload => "Reload",
            Self::Dismiss => "Later",
            Self::SoftRetry => "Try again",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    kind: NotificationKind,
    message: String,
    actions: Vec<Action>,
    /// Hide automatically after this long if the user does nothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auto_dismiss_after: Option<Duration>,
}

impl Notification {
    #[must_use]
    pub fn new(kind: NotificationKind, message: impl Into<String>, actions: Vec<Action>) -> Self {
        Self {
            kind,
            message: message.into(),
            actions,
            auto_dismiss_after: None,
        }
    }

    /// A newer build is deployed. Offers dismiss and reload.
    #[must_use]
    pub fn update_available() -> Self {
        Self::new(
            NotificationKind::UpdateAvailable,
            "A new version of this site is available.",
            vec![Action::Dismiss, Action::Reload],
        )
    }

    /// Module loads kept failing after every retry. Offers reload and soft retry.
    #[must_use]
    pub fn recovery_required(display_window: Duration) -> Self {
        Self::new(
            NotificationKind::RecoveryRequired,
            "Some parts of this page failed to load. Reload to fetch the latest version.",
            vec![Action::Reload, Action::SoftRetry],
        )
        .with_auto_dismiss(display_window)
    }

    #[must_use]
    pub fn with_auto_dismiss(mut self, after: Duration) -> Self {
        self.auto_dismiss_after = Some(after);
        self
    }

    #[must_use]
    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    #[must_use]
    pub fn auto_dismiss_after(&self) -> Option<Duration> {
        self.auto_dismiss_after
    }

    #[must_use]
    pub fn offers(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}

/// Everything the presentation layer may observe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationSurface {
    pub update_available: bool,
    pub recovery_required: bool,
}

impl NotificationSurface {
    #[must_use]
    pub fn is_shown(self, kind: NotificationKind) -> bool {
        match kind {
            NotificationKind::UpdateAvailable => self.update_available,
            NotificationKind::RecoveryRequired => self.recovery_required,
        }
    }
}
