//! Composition root for the client resilience layer.
//!
//! [`Resilience`] owns the activity monitor, the version poller, the chunk
//! recovery manager and the notification channel, and is the only place they
//! meet. Control flows one way:
//!
//! ```text
//! ActivityMonitor -> VersionPoller -> NotificationChannel
//! runtime errors  -> ChunkRecoveryManager -> NotificationChannel
//! ```
//!
//! The host either calls [`Resilience::handle`] / [`Resilience::tick`] itself
//! or hands an event receiver to [`Resilience::run`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use staleguard_config::{Features, ResolvedConfig};
use staleguard_core::{ActivityMonitor, NotificationChannel, Subscription};
use staleguard_poller::{HttpVersionSource, VersionPoller, VersionSource};
use staleguard_recovery::ChunkRecoveryManager;
use staleguard_types::{
    Action, ActivityEvent, BuildVersion, Disposition, NotificationKind, NotificationSurface,
    PageSignal, Visibility,
};

mod error;
mod events;

pub use error::EngineError;
pub use events::{Platform, PlatformEvent};

/// How often `run` drives timers, completions and expiry.
pub const TICK_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Created,
    Running,
    Disposed,
}

pub struct Resilience {
    features: Features,
    platform: Platform,
    lifecycle: Lifecycle,
    activity: Option<ActivityMonitor>,
    poller: Option<VersionPoller>,
    recovery: Option<ChunkRecoveryManager>,
    channel: NotificationChannel,
    init_delay: Duration,
    /// When the loader hook gets registered.
    hook_due: Option<Instant>,
}

impl std::fmt::Debug for Resilience {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resilience")
            .field("features", &self.features)
            .field("lifecycle", &self.lifecycle)
            .field("surface", &self.channel.surface())
            .finish_non_exhaustive()
    }
}

impl Resilience {
    pub fn new(
        config: ResolvedConfig,
        build_version: BuildVersion,
        platform: Platform,
    ) -> Result<Self, EngineError> {
        let features = config.features;

        let activity = features
            .activity_monitor
            .then(|| ActivityMonitor::new(config.activity.clone(), Instant::now()));

        let poller = if features.version_check {
            let source: Arc<dyn VersionSource> = match (&platform.version_source, &config.version.endpoint) {
                (Some(source), _) => Arc::clone(source),
                (None, Some(endpoint)) => Arc::new(HttpVersionSource::new(
                    endpoint.clone(),
                    config.version.request_timeout,
                )?),
                (None, None) => return Err(EngineError::MissingEndpoint),
            };
            Some(VersionPoller::new(
                config.version.clone(),
                build_version,
                source,
                Arc::clone(&platform.visibility),
            ))
        } else {
            None
        };

        let recovery = features.chunk_recovery.then(|| {
            ChunkRecoveryManager::new(config.recovery.clone(), Arc::clone(&platform.caches))
        });

        tracing::debug!(
            version_check = features.version_check,
            activity_monitor = features.activity_monitor,
            chunk_recovery = features.chunk_recovery,
            "Resilience layer constructed"
        );

        Ok(Self {
            features,
            platform,
            lifecycle: Lifecycle::Created,
            activity,
            poller,
            recovery,
            channel: NotificationChannel::new(),
            init_delay: config.recovery.init_delay,
            hook_due: None,
        })
    }

    /// Start timers and schedule the loader hook. Only the first call counts.
    pub fn init(&mut self, now: Instant) {
        if self.lifecycle != Lifecycle::Created {
            tracing::debug!(lifecycle = ?self.lifecycle, "init ignored");
            return;
        }
        self.lifecycle = Lifecycle::Running;

        if let Some(activity) = &mut self.activity {
            let _ = activity.record_activity(now);
        }
        if let Some(poller) = &mut self.poller {
            poller.mount(now);
        }
        if self.recovery.is_some() {
            self.hook_due = Some(now + self.init_delay);
            self.register_hook_if_due(now);
        }
        tracing::info!("Resilience layer started");
    }

    /// Tear everything down. Idempotent; a disposed instance stays inert.
    pub fn dispose(&mut self) {
        if self.lifecycle == Lifecycle::Disposed {
            return;
        }
        self.lifecycle = Lifecycle::Disposed;
        self.hook_due = None;

        if let Some(poller) = &mut self.poller {
            poller.dispose();
        }
        if let Some(recovery) = &mut self.recovery {
            recovery.cleanup();
        }
        if let Some(activity) = &mut self.activity {
            activity.dispose();
        }
        tracing::info!("Resilience layer disposed");
    }

    /// Route one host event. The returned disposition tells the host whether
    /// it may suppress the event's default handling.
    pub fn handle(&mut self, event: PlatformEvent, now: Instant) -> Disposition {
        if self.lifecycle != Lifecycle::Running {
            tracing::debug!(lifecycle = ?self.lifecycle, "Event ignored outside running state");
            return Disposition::PassThrough;
        }

        match event {
            PlatformEvent::Activity(ActivityEvent::VisibilityChange(visibility))
            | PlatformEvent::Visibility(visibility) => {
                self.on_visibility(visibility, now);
                Disposition::PassThrough
            }
            PlatformEvent::Activity(activity) => {
                self.observe_activity(activity, now);
                Disposition::PassThrough
            }
            PlatformEvent::RouteChanged => {
                if let Some(poller) = &mut self.poller {
                    poller.on_route_change(now);
                }
                Disposition::PassThrough
            }
            PlatformEvent::ResourceError(event) => match &mut self.recovery {
                Some(recovery) => recovery.on_resource_error(&event, &mut self.channel, now),
                None => Disposition::PassThrough,
            },
            PlatformEvent::UnhandledRejection(failure) => match &mut self.recovery {
                Some(recovery) => recovery.on_unhandled_rejection(&failure, &mut self.channel, now),
                None => Disposition::PassThrough,
            },
            PlatformEvent::ChunkLoaded(key) => {
                if let Some(recovery) = &mut self.recovery {
                    recovery.mark_loaded(&key);
                }
                Disposition::PassThrough
            }
            PlatformEvent::UserAction(action) => {
                self.perform(action);
                Disposition::PassThrough
            }
        }
    }

    fn on_visibility(&mut self, visibility: Visibility, now: Instant) {
        self.observe_activity(ActivityEvent::VisibilityChange(visibility), now);
        if let Some(poller) = &mut self.poller {
            let _ = poller.on_visibility(visibility, now);
        }
    }

    fn observe_activity(&mut self, event: ActivityEvent, now: Instant) {
        let Some(activity) = &mut self.activity else {
            return;
        };
        if let Some(PageSignal::ActivityResumed { .. }) = activity.observe(event, now)
            && let Some(poller) = &mut self.poller
        {
            poller.on_resume(now);
        }
    }

    /// Execute a user action from a notification.
    pub fn perform(&mut self, action: Action) {
        tracing::info!(action = action.label(), "User action");
        match action {
            Action::Reload => self.platform.host.reload(),
            Action::SoftRetry => {
                self.platform.host.reset_error_boundary();
                self.channel.dismiss(NotificationKind::RecoveryRequired);
            }
            Action::Dismiss => {
                if let Some(poller) = &mut self.poller {
                    poller.dismiss();
                }
                self.channel.dismiss(NotificationKind::UpdateAvailable);
            }
        }
    }

    /// Advance every timer and drain finished background work.
    pub fn tick(&mut self, now: Instant) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }

        self.register_hook_if_due(now);

        if let Some(activity) = &mut self.activity
            && let Some(signal) = activity.tick(now)
        {
            tracing::debug!(signal = signal.name(), "Activity signal");
        }

        if let Some(poller) = &mut self.poller {
            let _ = poller.tick(now);
            poller.poll_completions(&mut self.channel, now);
        }

        if let Some(recovery) = &mut self.recovery {
            recovery.poll(&mut self.channel, now);
        }

        self.channel.tick(now);
    }

    fn register_hook_if_due(&mut self, now: Instant) {
        if self.hook_due.is_some_and(|due| due <= now)
            && let Some(recovery) = &mut self.recovery
        {
            self.hook_due = None;
            recovery.initialize(Arc::clone(&self.platform.loader));
        }
    }

    /// Drive the layer until `shutdown` resolves or the event sender closes.
    ///
    /// Dispositions are not reported back from here; a host that needs to
    /// suppress default error handling should call [`Resilience::handle`]
    /// directly.
    pub async fn run(
        &mut self,
        mut events: mpsc::Receiver<PlatformEvent>,
        shutdown: impl Future<Output = ()>,
    ) {
        self.init(Instant::now());

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::debug!("Shutdown requested");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else {
                        tracing::debug!("Event source closed");
                        break;
                    };
                    let disposition = self.handle(event, Instant::now());
                    tracing::trace!(?disposition, "Event handled");
                }
                _ = ticker.tick() => self.tick(Instant::now()),
            }
        }

        self.dispose();
    }

    pub fn subscribe(&mut self) -> Subscription {
        self.channel.subscribe()
    }

    #[must_use]
    pub fn surface(&self) -> NotificationSurface {
        self.channel.surface()
    }

    #[must_use]
    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[must_use]
    pub fn features(&self) -> Features {
        self.features
    }

    #[must_use]
    pub fn activity(&self) -> Option<&ActivityMonitor> {
        self.activity.as_ref()
    }

    /// For registering `on_idle` / `on_resume` listeners.
    pub fn activity_mut(&mut self) -> Option<&mut ActivityMonitor> {
        self.activity.as_mut()
    }

    #[must_use]
    pub fn poller(&self) -> Option<&VersionPoller> {
        self.poller.as_ref()
    }

    #[must_use]
    pub fn recovery(&self) -> Option<&ChunkRecoveryManager> {
        self.recovery.as_ref()
    }
}

impl Drop for Resilience {
    fn drop(&mut self) {
        self.dispose();
    }
}
