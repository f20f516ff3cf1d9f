//! Idle/active detection.
//!
//! The monitor is driven from outside: the host feeds it raw page events via
//! [`ActivityMonitor::observe`] and calls [`ActivityMonitor::tick`] on its own
//! schedule. Both return the [`PageSignal`] emitted by that call, if any, and
//! also hand it to registered listeners.
//!
//! # Invariants
//!
//! - `idle` goes `false -> true` at most once per idle episode.
//! - `idle` goes `true -> false` exactly once when activity resumes.
//! - Each transition emits exactly one signal.

use std::time::Duration;

use tokio::time::Instant;

use staleguard_config::ActivitySettings;
use staleguard_types::{ActivityEvent, ListenerId, PageSignal};

pub type SignalCallback = Box<dyn Fn(PageSignal) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityState {
    pub last_activity_at: Instant,
    pub idle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListenerKind {
    Idle,
    Resume,
}

struct Listener {
    id: ListenerId,
    kind: ListenerKind,
    callback: SignalCallback,
}

pub struct ActivityMonitor {
    settings: ActivitySettings,
    state: ActivityState,
    next_check_at: Instant,
    listeners: Vec<Listener>,
    next_listener_id: u64,
}

impl std::fmt::Debug for ActivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityMonitor")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("next_check_at", &self.next_check_at)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl ActivityMonitor {
    /// A fresh monitor counts `now` as the last activity.
    #[must_use]
    pub fn new(settings: ActivitySettings, now: Instant) -> Self {
        let next_check_at = now + settings.check_interval;
        Self {
            settings,
            state: ActivityState {
                last_activity_at: now,
                idle: false,
            },
            next_check_at,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    #[must_use]
    pub fn state(&self) -> ActivityState {
        self.state
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state.idle
    }

    #[must_use]
    pub fn settings(&self) -> &ActivitySettings {
        &self.settings
    }

    /// When the next idle check is due.
    #[must_use]
    pub fn next_deadline(&self) -> Instant {
        self.next_check_at
    }

    /// Feed one raw page event.
    pub fn observe(&mut self, event: ActivityEvent, now: Instant) -> Option<PageSignal> {
        if event == ActivityEvent::Offline {
            tracing::debug!("Page went offline");
            return None;
        }
        if !event.counts_as_activity() {
            return None;
        }
        self.record_activity(now)
    }

    /// Mark the user as present at `now`.
    ///
    /// Returns `ActivityResumed` when this ends an idle episode.
    pub fn record_activity(&mut self, now: Instant) -> Option<PageSignal> {
        let previous = self.state.last_activity_at;
        self.state.last_activity_at = now;

        if !self.state.idle {
            return None;
        }

        self.state.idle = false;
        let signal = PageSignal::ActivityResumed {
            idle_for: now.saturating_duration_since(previous),
        };
        tracing::info!(idle_for_ms = millis(signal.idle_for()), "Activity resumed");
        self.emit(signal);
        Some(signal)
    }

    /// Run the periodic idle check if it is due.
    pub fn tick(&mut self, now: Instant) -> Option<PageSignal> {
        if now < self.next_check_at {
            return None;
        }
        self.next_check_at = now + self.settings.check_interval;
        self.check_idle(now)
    }

    /// Compare the quiet period against the idle threshold.
    ///
    /// Only the first check past the threshold emits; later checks in the same
    /// episode are no-ops.
    pub fn check_idle(&mut self, now: Instant) -> Option<PageSignal> {
        if self.state.idle {
            return None;
        }
        let quiet = now.saturating_duration_since(self.state.last_activity_at);
        if quiet <= self.settings.idle_threshold {
            return None;
        }

        self.state.idle = true;
        let signal = PageSignal::Idle { idle_for: quiet };
        tracing::info!(idle_for_ms = millis(quiet), "Page idle");
        self.emit(signal);
        Some(signal)
    }

    pub fn on_idle(&mut self, callback: SignalCallback) -> ListenerId {
        self.add_listener(ListenerKind::Idle, callback)
    }

    pub fn on_resume(&mut self, callback: SignalCallback) -> ListenerId {
        self.add_listener(ListenerKind::Resume, callback)
    }

    /// Returns whether a listener with that id was registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        before != self.listeners.len()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Drop every listener. Safe to call more than once.
    pub fn dispose(&mut self) {
        if !self.listeners.is_empty() {
            tracing::debug!(count = self.listeners.len(), "Removing activity listeners");
        }
        self.listeners.clear();
    }

    fn add_listener(&mut self, kind: ListenerKind, callback: SignalCallback) -> ListenerId {
        let id = ListenerId::new(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push(Listener { id, kind, callback });
        id
    }

    fn emit(&self, signal: PageSignal) {
        let kind = match signal {
            PageSignal::Idle { .. } => ListenerKind::Idle,
            PageSignal::ActivityResumed { .. } => ListenerKind::Resume,
        };
        for listener in self.listeners.iter().filter(|l| l.kind == kind) {
            (listener.callback)(signal);
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
