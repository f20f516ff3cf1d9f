//! Idle/resume episodes and the version checks they cause

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use staleguard_config::ResolvedConfig;
use staleguard_engine::PlatformEvent;
use staleguard_types::{ActivityEvent, Trigger, Visibility};

use crate::common::Harness;

fn count_signals(h: &mut Harness) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let idle = Arc::new(AtomicUsize::new(0));
    let resumed = Arc::new(AtomicUsize::new(0));
    let activity = h.resilience.activity_mut().unwrap();

    let counter = idle.clone();
    activity.on_idle(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    let counter = resumed.clone();
    activity.on_resume(Box::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    (idle, resumed)
}

#[tokio::test(start_paused = true)]
async fn hidden_past_threshold_then_visible_checks_once() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v2");
    let (idle, resumed) = count_signals(&mut h);
    h.start();
    h.advance(Duration::from_secs(11)).await;
    assert_eq!(h.source.calls(), 1);

    h.set_visibility(Visibility::Hidden);
    h.advance(Duration::from_secs(6 * 60)).await;
    assert_eq!(idle.load(Ordering::SeqCst), 1);
    assert_eq!(resumed.load(Ordering::SeqCst), 0);
    assert!(h.resilience.activity().unwrap().is_idle());

    h.set_visibility(Visibility::Visible);
    h.advance(Duration::from_secs(10)).await;

    assert_eq!(idle.load(Ordering::SeqCst), 1);
    assert_eq!(resumed.load(Ordering::SeqCst), 1);
    assert_eq!(h.source.calls(), 2);

    let history = h.resilience.poller().unwrap().history();
    assert_eq!(history.latest().map(|r| r.trigger), Some(Trigger::BecameVisible));
}

#[tokio::test(start_paused = true)]
async fn idle_fires_once_per_episode() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    let (idle, resumed) = count_signals(&mut h);
    h.start();

    h.advance(Duration::from_secs(20 * 60)).await;
    assert_eq!(idle.load(Ordering::SeqCst), 1);

    h.send(PlatformEvent::Activity(ActivityEvent::KeyDown));
    h.send(PlatformEvent::Activity(ActivityEvent::Scroll));
    assert_eq!(resumed.load(Ordering::SeqCst), 1);

    h.advance(Duration::from_secs(6 * 60)).await;
    assert_eq!(idle.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn steady_activity_never_goes_idle() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    let (idle, _) = count_signals(&mut h);
    h.start();

    for _ in 0..12 {
        h.advance(Duration::from_secs(60)).await;
        h.send(PlatformEvent::Activity(ActivityEvent::PointerMove));
    }
    assert_eq!(idle.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn resume_after_idle_schedules_a_delayed_check() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();
    h.advance(Duration::from_secs(6 * 60)).await;
    assert_eq!(h.source.calls(), 1);
    assert!(h.resilience.activity().unwrap().is_idle());

    h.send(PlatformEvent::Activity(ActivityEvent::Click));
    h.advance(Duration::from_secs(1)).await;
    assert_eq!(h.source.calls(), 1);

    h.advance(Duration::from_secs(2)).await;
    assert_eq!(h.source.calls(), 2);
    let history = h.resilience.poller().unwrap().history();
    assert_eq!(
        history.latest().map(|r| r.trigger),
        Some(Trigger::ActivityResumed)
    );
}

#[tokio::test(start_paused = true)]
async fn hidden_page_skips_periodic_checks() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();
    h.advance(Duration::from_secs(11)).await;

    h.set_visibility(Visibility::Hidden);
    h.advance(Duration::from_secs(25 * 60)).await;
    assert_eq!(h.source.calls(), 1);
}
