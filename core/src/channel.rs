//! Notification pub/sub.
//!
//! Holds at most one active notification per [`NotificationKind`] and fans
//! changes out to subscribers. It does not know why a notification exists.

use std::collections::BTreeMap;

use tokio::sync::mpsc;
use tokio::time::Instant;

use staleguard_types::{Notification, NotificationKind, NotificationSurface};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    Published(Notification),
    /// Hidden by user action.
    Dismissed(NotificationKind),
    /// Hidden because its display window ran out.
    Expired(NotificationKind),
}

/// Receiving end handed to a presentation layer.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        self.rx.recv().await
    }

    /// Next queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChannelEvent> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far.
    pub fn drain(&mut self) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_recv() {
            events.push(event);
        }
        events
    }
}

#[derive(Debug)]
struct Active {
    notification: Notification,
    expires_at: Option<Instant>,
}

#[derive(Debug, Default)]
pub struct NotificationChannel {
    active: BTreeMap<NotificationKind, Active>,
    subscribers: Vec<mpsc::UnboundedSender<ChannelEvent>>,
}

impl NotificationChannel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `notification` the active one of its kind, replacing any previous.
    pub fn publish(&mut self, notification: Notification, now: Instant) {
        let kind = notification.kind();
        let expires_at = notification.auto_dismiss_after().map(|after| now + after);
        tracing::info!(kind = %kind, "Notification published");
        self.active.insert(
            kind,
            Active {
                notification: notification.clone(),
                expires_at,
            },
        );
        self.broadcast(&ChannelEvent::Published(notification));
    }

    pub fn subscribe(&mut self) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        Subscription { rx }
    }

    /// Hide the active notification of `kind`. Returns whether one was shown.
    ///
    /// Does not block a later publish of the same kind.
    pub fn dismiss(&mut self, kind: NotificationKind) -> bool {
        if self.active.remove(&kind).is_none() {
            tracing::debug!(kind = %kind, "Dismiss with nothing active");
            return false;
        }
        tracing::info!(kind = %kind, "Notification dismissed");
        self.broadcast(&ChannelEvent::Dismissed(kind));
        true
    }

    /// Expire notifications whose display window has elapsed.
    pub fn tick(&mut self, now: Instant) {
        let expired: Vec<NotificationKind> = self
            .active
            .iter()
            .filter(|(_, active)| active.expires_at.is_some_and(|at| at <= now))
            .map(|(kind, _)| *kind)
            .collect();

        for kind in expired {
            self.active.remove(&kind);
            tracing::info!(kind = %kind, "Notification expired");
            self.broadcast(&ChannelEvent::Expired(kind));
        }
    }

    /// Earliest pending expiry, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.active.values().filter_map(|a| a.expires_at).min()
    }

    #[must_use]
    pub fn active(&self, kind: NotificationKind) -> Option<&Notification> {
        self.active.get(&kind).map(|a| &a.notification)
    }

    #[must_use]
    pub fn surface(&self) -> NotificationSurface {
        NotificationSurface {
            update_available: self.active.contains_key(&NotificationKind::UpdateAvailable),
            recovery_required: self.active.contains_key(&NotificationKind::RecoveryRequired),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn broadcast(&mut self, event: &ChannelEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
