//! The version poller state machine.
//!
//! ```text
//! Idle -> Checking -> { UpToDate | UpdateAvailable | Failed }
//! ```
//!
//! Every trigger goes through [`VersionPoller::check_now`], which applies the
//! visibility gate and the throttle before anything touches the network. A
//! started check runs on its own abortable task; the result comes back over an
//! internal channel and is applied by [`VersionPoller::poll_completions`] only
//! if it belongs to the request that is still active.

use std::sync::Arc;

use futures_util::future::{AbortHandle, Abortable};
use tokio::sync::mpsc;
use tokio::time::Instant;

use staleguard_config::VersionSettings;
use staleguard_core::{NotificationChannel, VisibilityProbe};
use staleguard_types::{BuildVersion, Notification, RequestId, Trigger, Visibility};

use crate::history::{CheckHistory, CheckStatus};
use crate::{CheckError, VersionSource, parse_descriptor};

/// Where the poller stands in its check cycle.
///
/// The three result states (`UpToDate`, `UpdateAvailable`, `Failed`) do not
/// fall back to `Idle`; they hold the last outcome until the next check
/// starts and gate nothing, so a new check may start from any of them just
/// as it would from `Idle`. `Idle` is only seen before the first check and
/// after a dispose that cancelled a check in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Checking,
    UpToDate,
    UpdateAvailable,
    Failed,
}

impl PollState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Checking => "checking",
            Self::UpToDate => "up_to_date",
            Self::UpdateAvailable => "update_available",
            Self::Failed => "failed",
        }
    }
}

/// What `check_now` did with a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDecision {
    Started(RequestId),
    /// Too soon after the previous check. Dropped, not queued.
    Throttled,
    PageHidden,
    /// Not mounted, or already disposed.
    Disabled,
}

impl CheckDecision {
    #[must_use]
    pub const fn started(self) -> bool {
        matches!(self, Self::Started(_))
    }
}

/// The cancellation handle for one in-flight check.
#[derive(Debug)]
pub struct RequestHandle {
    id: RequestId,
    trigger: Trigger,
    started_at: Instant,
    abort: AbortHandle,
}

impl RequestHandle {
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[must_use]
    pub fn trigger(&self) -> Trigger {
        self.trigger
    }

    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    fn cancel(&self) {
        self.abort.abort();
    }
}

#[derive(Debug, Default)]
pub struct CheckState {
    pub last_check_at: Option<Instant>,
    /// At most one. A new check cancels and replaces it.
    pub in_flight: Option<RequestHandle>,
    pub dismissed: bool,
    pub has_update: bool,
    pub remote_version: Option<BuildVersion>,
}

#[derive(Debug)]
struct Completion {
    id: RequestId,
    result: Result<BuildVersion, CheckError>,
}

/// Pending delayed triggers.
#[derive(Debug, Default)]
struct Schedule {
    initial: Option<Instant>,
    route_change: Option<Instant>,
    resume: Option<Instant>,
    periodic: Option<Instant>,
}

impl Schedule {
    fn next(&self) -> Option<Instant> {
        [self.initial, self.route_change, self.resume, self.periodic]
            .into_iter()
            .flatten()
            .min()
    }

    fn take_due(slot: &mut Option<Instant>, now: Instant) -> bool {
        if slot.is_some_and(|at| at <= now) {
            *slot = None;
            true
        } else {
            false
        }
    }
}

pub struct VersionPoller {
    settings: VersionSettings,
    local: BuildVersion,
    source: Arc<dyn VersionSource>,
    visibility: Arc<dyn VisibilityProbe>,
    state: CheckState,
    poll_state: PollState,
    /// Last remote version a notification was published for.
    announced: Option<BuildVersion>,
    next_request: RequestId,
    completion_tx: mpsc::UnboundedSender<Completion>,
    completion_rx: mpsc::UnboundedReceiver<Completion>,
    schedule: Schedule,
    last_visibility: Visibility,
    mounted: bool,
    history: CheckHistory,
}

impl std::fmt::Debug for VersionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionPoller")
            .field("local", &self.local)
            .field("state", &self.state)
            .field("poll_state", &self.poll_state)
            .field("announced", &self.announced)
            .field("mounted", &self.mounted)
            .finish_non_exhaustive()
    }
}

impl VersionPoller {
    #[must_use]
    pub fn new(
        settings: VersionSettings,
        local: BuildVersion,
        source: Arc<dyn VersionSource>,
        visibility: Arc<dyn VisibilityProbe>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let last_visibility = visibility.visibility();
        Self {
            settings,
            local,
            source,
            visibility,
            state: CheckState::default(),
            poll_state: PollState::Idle,
            announced: None,
            next_request: RequestId::new(0),
            completion_tx,
            completion_rx,
            schedule: Schedule::default(),
            last_visibility,
            mounted: false,
            history: CheckHistory::new(),
        }
    }

    /// Arm the initial delayed check and the periodic timer.
    pub fn mount(&mut self, now: Instant) {
        if self.mounted {
            return;
        }
        self.mounted = true;
        self.last_visibility = self.visibility.visibility();
        self.schedule.initial = Some(now + self.settings.initial_delay);
        self.schedule.periodic = Some(now + self.settings.check_interval);
        tracing::info!(local = %self.local.as_str(), "Version poller mounted");
    }

    /// Cancel the in-flight check and clear every timer. Idempotent.
    pub fn dispose(&mut self) {
        if !self.mounted && self.state.in_flight.is_none() {
            return;
        }
        self.mounted = false;
        self.schedule = Schedule::default();
        self.cancel_in_flight(Instant::now());
        while self.completion_rx.try_recv().is_ok() {}
        if self.poll_state == PollState::Checking {
            self.poll_state = PollState::Idle;
        }
        tracing::debug!("Version poller disposed");
    }

    /// Run a check unless gated. Supersedes any in-flight check.
    pub fn check_now(&mut self, trigger: Trigger, now: Instant) -> CheckDecision {
        if !self.mounted {
            tracing::debug!(trigger = %trigger, "Version check skipped: poller not mounted");
            return CheckDecision::Disabled;
        }
        if !self.visibility.visibility().is_visible() {
            tracing::debug!(trigger = %trigger, "Version check skipped: page hidden");
            return CheckDecision::PageHidden;
        }
        if let Some(last) = self.state.last_check_at {
            let since = now.saturating_duration_since(last);
            if since < self.settings.min_interval {
                tracing::debug!(
                    trigger = %trigger,
                    since_ms = since.as_millis() as u64,
                    "Version check throttled"
                );
                return CheckDecision::Throttled;
            }
        }

        self.cancel_in_flight(now);

        let id = self.next_request;
        self.next_request = id.next();
        let abort = self.spawn_fetch(id);

        self.state.in_flight = Some(RequestHandle {
            id,
            trigger,
            started_at: now,
            abort,
        });
        self.state.last_check_at = Some(now);
        self.poll_state = PollState::Checking;
        tracing::debug!(request = %id, trigger = %trigger, "Version check started");
        CheckDecision::Started(id)
    }

    fn spawn_fetch(&self, id: RequestId) -> AbortHandle {
        let fetch = self.source.fetch();
        let timeout = self.settings.request_timeout;
        let tx = self.completion_tx.clone();

        let task = async move {
            let result = match tokio::time::timeout(timeout, fetch).await {
                Ok(Ok(body)) => parse_descriptor(&body),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(CheckError::Timeout(timeout)),
            };
            let _ = tx.send(Completion { id, result });
        };

        let (abort, registration) = AbortHandle::new_pair();
        tokio::spawn(async move {
            let _ = Abortable::new(task, registration).await;
        });
        abort
    }

    fn cancel_in_flight(&mut self, now: Instant) {
        if let Some(handle) = self.state.in_flight.take() {
            handle.cancel();
            tracing::debug!(request = %handle.id, "Version check cancelled");
            self.history.record(
                now,
                handle.trigger,
                CheckStatus::Error,
                CheckError::Cancelled.to_string(),
            );
        }
    }

    /// Apply finished checks. Returns how many results were applied.
    pub fn poll_completions(&mut self, channel: &mut NotificationChannel, now: Instant) -> usize {
        let mut applied = 0;
        while let Ok(completion) = self.completion_rx.try_recv() {
            if self.apply(completion, channel, now) {
                applied += 1;
            }
        }
        applied
    }

    fn apply(
        &mut self,
        completion: Completion,
        channel: &mut NotificationChannel,
        now: Instant,
    ) -> bool {
        // Only the active request may touch CheckState.
        let is_active = self
            .state
            .in_flight
            .as_ref()
            .is_some_and(|h| h.id == completion.id);
        if !is_active {
            tracing::debug!(request = %completion.id, "Discarding stale version check result");
            return false;
        }
        let Some(handle) = self.state.in_flight.take() else {
            return false;
        };

        match completion.result {
            Ok(remote) => self.apply_remote(remote, handle.trigger, channel, now),
            Err(err) => {
                tracing::warn!(
                    request = %handle.id,
                    trigger = %handle.trigger,
                    kind = err.kind(),
                    "Version check failed: {err}"
                );
                self.poll_state = PollState::Failed;
                self.history
                    .record(now, handle.trigger, CheckStatus::Error, err.to_string());
            }
        }
        true
    }

    fn apply_remote(
        &mut self,
        remote: BuildVersion,
        trigger: Trigger,
        channel: &mut NotificationChannel,
        now: Instant,
    ) {
        self.state.remote_version = Some(remote.clone());

        if !self.local.differs_from(&remote) {
            self.state.has_update = false;
            self.poll_state = PollState::UpToDate;
            self.history.record(
                now,
                trigger,
                CheckStatus::Success,
                format!("up to date ({})", remote.as_str()),
            );
            return;
        }

        self.state.has_update = true;
        self.poll_state = PollState::UpdateAvailable;
        self.history.record(
            now,
            trigger,
            CheckStatus::Success,
            format!("update available ({})", remote.as_str()),
        );

        if self.announced.as_ref() == Some(&remote) {
            tracing::debug!(remote = %remote.as_str(), "Update already announced");
            return;
        }

        tracing::info!(
            local = %self.local.as_str(),
            remote = %remote.as_str(),
            "New build available"
        );
        self.state.dismissed = false;
        self.announced = Some(remote);
        channel.publish(Notification::update_available(), now);
    }

    /// Navigation happened. Replaces any pending route-change check.
    pub fn on_route_change(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }
        self.schedule.route_change = Some(now + self.settings.route_change_delay);
    }

    /// Activity resumed after an idle episode.
    pub fn on_resume(&mut self, now: Instant) {
        if !self.mounted {
            return;
        }
        self.schedule.resume = Some(now + self.settings.resume_delay);
    }

    /// A hidden-to-visible edge checks immediately.
    pub fn on_visibility(&mut self, visibility: Visibility, now: Instant) -> Option<CheckDecision> {
        let previous = std::mem::replace(&mut self.last_visibility, visibility);
        if previous == Visibility::Hidden && visibility == Visibility::Visible {
            Some(self.check_now(Trigger::BecameVisible, now))
        } else {
            None
        }
    }

    /// Fire every delayed trigger that is due.
    pub fn tick(&mut self, now: Instant) -> Vec<(Trigger, CheckDecision)> {
        if !self.mounted {
            return Vec::new();
        }

        let mut due = Vec::new();
        if Schedule::take_due(&mut self.schedule.initial, now) {
            due.push(Trigger::Initial);
        }
        if Schedule::take_due(&mut self.schedule.route_change, now) {
            due.push(Trigger::RouteChange);
        }
        if Schedule::take_due(&mut self.schedule.resume, now) {
            due.push(Trigger::ActivityResumed);
        }
        if Schedule::take_due(&mut self.schedule.periodic, now) {
            self.schedule.periodic = Some(now + self.settings.check_interval);
            due.push(Trigger::Periodic);
        }

        due.into_iter()
            .map(|trigger| (trigger, self.check_now(trigger, now)))
            .collect()
    }

    /// Hide the current update notice. The remote version is kept.
    pub fn dismiss(&mut self) {
        self.state.dismissed = true;
    }

    /// Earliest pending timer.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.schedule.next()
    }

    #[must_use]
    pub fn has_update(&self) -> bool {
        self.state.has_update
    }

    #[must_use]
    pub fn is_dismissed(&self) -> bool {
        self.state.dismissed
    }

    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    #[must_use]
    pub fn poll_state(&self) -> PollState {
        self.poll_state
    }

    #[must_use]
    pub fn state(&self) -> &CheckState {
        &self.state
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<RequestId> {
        self.state.in_flight.as_ref().map(RequestHandle::id)
    }

    #[must_use]
    pub fn local_version(&self) -> &BuildVersion {
        &self.local
    }

    #[must_use]
    pub fn remote_version(&self) -> Option<&BuildVersion> {
        self.state.remote_version.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> &CheckHistory {
        &self.history
    }

    #[must_use]
    pub fn settings(&self) -> &VersionSettings {
        &self.settings
    }
}

impl Drop for VersionPoller {
    fn drop(&mut self) {
        if let Some(handle) = self.state.in_flight.take() {
            handle.cancel();
        }
    }
}
