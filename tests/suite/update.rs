//! Update detection, throttling and dismissal through the composition root

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use staleguard_config::{ResolvedConfig, VersionSettings};
use staleguard_core::platform::memory::StaticVisibility;
use staleguard_core::{ChannelEvent, NotificationChannel};
use staleguard_engine::PlatformEvent;
use staleguard_poller::{CheckDecision, PollState, VersionPoller};
use staleguard_types::{Action, BuildVersion, NotificationKind, Trigger};

use crate::common::{Harness, ScriptedSource};

#[tokio::test(start_paused = true)]
async fn differing_remote_sets_has_update_and_publishes() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v2");
    h.start();

    h.advance(Duration::from_secs(11)).await;

    let poller = h.resilience.poller().unwrap();
    assert!(poller.has_update());
    assert_eq!(poller.poll_state(), PollState::UpdateAvailable);
    assert_eq!(poller.remote_version().map(BuildVersion::as_str), Some("v2"));

    let published = h.published();
    assert_eq!(published.len(), 1);
    let ChannelEvent::Published(notification) = &published[0] else {
        panic!("expected a published notification");
    };
    assert_eq!(notification.kind(), NotificationKind::UpdateAvailable);
    assert!(notification.offers(Action::Reload));
    assert!(notification.offers(Action::Dismiss));
}

#[tokio::test(start_paused = true)]
async fn identical_remote_publishes_nothing() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    h.advance(Duration::from_secs(11)).await;

    let poller = h.resilience.poller().unwrap();
    assert_eq!(h.source.calls(), 1);
    assert!(!poller.has_update());
    assert_eq!(poller.poll_state(), PollState::UpToDate);
    assert!(h.published().is_empty());
    assert!(!h.resilience.surface().update_available);
}

#[tokio::test(start_paused = true)]
async fn check_now_inside_window_is_a_no_op() {
    let source = ScriptedSource::new("v2");
    let mut poller = VersionPoller::new(
        VersionSettings::default(),
        BuildVersion::new("v1").unwrap(),
        source.clone(),
        Arc::new(StaticVisibility::default()),
    );
    let mut channel = NotificationChannel::new();
    poller.mount(Instant::now());

    assert!(poller.check_now(Trigger::Manual, Instant::now()).started());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(
        poller.check_now(Trigger::Manual, Instant::now()),
        CheckDecision::Throttled
    );
    poller.poll_completions(&mut channel, Instant::now());
    assert_eq!(source.calls(), 1);

    tokio::time::sleep(Duration::from_secs(56)).await;
    assert!(poller.check_now(Trigger::Manual, Instant::now()).started());
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn route_change_soon_after_initial_check_is_throttled() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();
    h.advance(Duration::from_secs(11)).await;
    assert_eq!(h.source.calls(), 1);

    h.send(PlatformEvent::RouteChanged);
    h.advance(Duration::from_secs(6)).await;
    assert_eq!(h.source.calls(), 1);

    h.advance(Duration::from_secs(60)).await;
    h.send(PlatformEvent::RouteChanged);
    h.advance(Duration::from_secs(6)).await;
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn rapid_route_changes_collapse_into_one_check() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();
    h.advance(Duration::from_secs(70)).await;
    assert_eq!(h.source.calls(), 1);

    for _ in 0..4 {
        h.send(PlatformEvent::RouteChanged);
        h.advance(Duration::from_secs(1)).await;
    }
    h.advance(Duration::from_secs(6)).await;
    assert_eq!(h.source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn dismissal_holds_until_a_newer_build_appears() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v2");
    h.start();
    h.advance(Duration::from_secs(11)).await;
    assert_eq!(h.published().len(), 1);

    h.send(PlatformEvent::UserAction(Action::Dismiss));
    assert!(!h.resilience.surface().update_available);
    assert!(h.resilience.poller().unwrap().is_dismissed());

    // Same remote again: still dismissed, nothing new.
    h.advance(Duration::from_secs(61)).await;
    h.send(PlatformEvent::RouteChanged);
    h.advance(Duration::from_secs(6)).await;
    assert_eq!(h.source.calls(), 2);
    assert!(h.published().is_empty());
    assert!(h.resilience.poller().unwrap().is_dismissed());

    h.source.set_version("v3");
    h.advance(Duration::from_secs(61)).await;
    h.send(PlatformEvent::RouteChanged);
    h.advance(Duration::from_secs(6)).await;

    assert_eq!(h.source.calls(), 3);
    assert_eq!(h.published().len(), 1);
    assert!(h.resilience.surface().update_available);
    let poller = h.resilience.poller().unwrap();
    assert!(!poller.is_dismissed());
    assert_eq!(poller.remote_version().map(BuildVersion::as_str), Some("v3"));
}

#[tokio::test(start_paused = true)]
async fn reload_action_reaches_the_host() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v2");
    h.start();
    h.advance(Duration::from_secs(11)).await;

    h.send(PlatformEvent::UserAction(Action::Reload));
    assert_eq!(h.host.reloads(), 1);
}

#[tokio::test(start_paused = true)]
async fn periodic_checks_record_history() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    h.advance(Duration::from_secs(21 * 60)).await;

    // Initial at 10s, then periodic at 10 and 20 minutes.
    assert_eq!(h.source.calls(), 3);
    let history = h.resilience.poller().unwrap().history();
    assert_eq!(history.len(), 3);
    let triggers: Vec<Trigger> = history.records().map(|r| r.trigger).collect();
    assert_eq!(
        triggers,
        vec![Trigger::Initial, Trigger::Periodic, Trigger::Periodic]
    );
}
