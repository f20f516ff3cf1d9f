//! Chunk-load failure recovery: backoff, escalation and the loader hook

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use staleguard_config::{RecoverySettings, ResolvedConfig};
use staleguard_core::NotificationChannel;
use staleguard_core::platform::memory::MemoryCacheStore;
use staleguard_engine::PlatformEvent;
use staleguard_recovery::{ChunkRecoveryManager, HandleOutcome};
use staleguard_types::{
    Action, Disposition, LoadFailure, ModuleKey, NotificationKind, ResourceErrorEvent,
};

use crate::common::Harness;

fn chunk_seven() -> LoadFailure {
    LoadFailure::named("ChunkLoadError", "Loading chunk 7 failed.")
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_then_escalates() {
    let caches = Arc::new(MemoryCacheStore::with_caches(["next-static-v1", "chunks-v1"]));
    let mut manager = ChunkRecoveryManager::new(RecoverySettings::default(), caches);
    let mut channel = NotificationChannel::new();
    let mut sub = channel.subscribe();
    let key = ModuleKey::new("chunk-7");

    let mut delays = Vec::new();
    for _ in 0..3 {
        match manager.handle(&key, &mut channel, Instant::now()) {
            HandleOutcome::Scheduled { delay, .. } => delays.push(delay),
            other => panic!("expected a scheduled retry, got {other:?}"),
        }
        tokio::time::sleep(delays[delays.len() - 1] + Duration::from_millis(1)).await;
        manager.poll(&mut channel, Instant::now());
        assert_eq!(manager.pending_retries(), 0);
    }

    assert_eq!(
        delays,
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4)
        ]
    );
    assert_eq!(manager.take_fired().len(), 3);
    assert_eq!(manager.record(&key).map(|r| r.attempts), Some(3));
    assert!(sub.drain().is_empty());

    assert_eq!(
        manager.handle(&key, &mut channel, Instant::now()),
        HandleOutcome::Escalated
    );
    assert!(manager.record(&key).is_none());
    assert!(channel.surface().recovery_required);
    assert_eq!(manager.escalations(), 1);

    // A fresh failure afterwards starts a new cycle at the base delay.
    assert_eq!(
        manager.handle(&key, &mut channel, Instant::now()),
        HandleOutcome::Scheduled {
            attempt: 1,
            delay: Duration::from_secs(1)
        }
    );
}

#[tokio::test(start_paused = true)]
async fn retries_purge_matching_caches_only() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    let disposition = h
        .resilience
        .handle(PlatformEvent::UnhandledRejection(chunk_seven()), Instant::now());
    assert_eq!(disposition, Disposition::Handled);

    h.advance(Duration::from_secs(2)).await;

    let mut deleted = h.caches.deleted();
    deleted.sort();
    assert_eq!(deleted, vec!["chunks-v1", "next-static-v1"]);
    assert_eq!(h.caches.names(), vec!["api-cache"]);
}

#[tokio::test(start_paused = true)]
async fn repeated_failures_escalate_to_a_banner() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    for wait in [1, 2, 4] {
        h.send(PlatformEvent::UnhandledRejection(chunk_seven()));
        h.advance(Duration::from_secs(wait + 1)).await;
    }
    assert!(!h.resilience.surface().recovery_required);

    h.send(PlatformEvent::UnhandledRejection(chunk_seven()));
    assert!(h.resilience.surface().recovery_required);
    let banner = h
        .resilience
        .channel()
        .active(NotificationKind::RecoveryRequired)
        .cloned()
        .unwrap();
    assert!(banner.offers(Action::Reload));
    assert!(banner.offers(Action::SoftRetry));

    // Auto-dismissed after the display window.
    h.advance(Duration::from_secs(11)).await;
    assert!(!h.resilience.surface().recovery_required);
}

#[tokio::test(start_paused = true)]
async fn failures_during_a_pending_retry_coalesce() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    for _ in 0..5 {
        h.send(PlatformEvent::UnhandledRejection(chunk_seven()));
    }
    let recovery = h.resilience.recovery().unwrap();
    assert_eq!(recovery.pending_retries(), 1);
    assert_eq!(
        recovery.record(&ModuleKey::new("chunk-7")).map(|r| r.attempts),
        Some(1)
    );
}

#[tokio::test(start_paused = true)]
async fn successful_load_resets_the_cycle() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    h.send(PlatformEvent::UnhandledRejection(chunk_seven()));
    h.advance(Duration::from_secs(2)).await;
    h.send(PlatformEvent::ChunkLoaded(ModuleKey::new("chunk-7")));
    assert!(h.resilience.recovery().unwrap().records().is_empty());

    h.send(PlatformEvent::UnhandledRejection(chunk_seven()));
    let record = h
        .resilience
        .recovery()
        .unwrap()
        .record(&ModuleKey::new("chunk-7"))
        .copied()
        .unwrap();
    assert_eq!(record.attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn unrelated_rejections_pass_through() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    let disposition = h.resilience.handle(
        PlatformEvent::UnhandledRejection(LoadFailure::new("Cannot read properties of undefined")),
        Instant::now(),
    );
    assert_eq!(disposition, Disposition::PassThrough);
    assert!(h.resilience.recovery().unwrap().records().is_empty());
}

#[tokio::test(start_paused = true)]
async fn script_errors_under_the_chunk_path_are_recovered() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();

    let disposition = h.resilience.handle(
        PlatformEvent::ResourceError(ResourceErrorEvent::script(
            "https://example.org/_next/static/chunks/pages/schedule-3f2a.js",
        )),
        Instant::now(),
    );
    assert_eq!(disposition, Disposition::PassThrough);
    assert_eq!(h.resilience.recovery().unwrap().pending_retries(), 1);

    let _ = h.resilience.handle(
        PlatformEvent::ResourceError(ResourceErrorEvent::script(
            "https://cdn.example.org/analytics.js",
        )),
        Instant::now(),
    );
    assert_eq!(h.resilience.recovery().unwrap().pending_retries(), 1);
}

#[tokio::test(start_paused = true)]
async fn loader_hook_failures_flow_into_recovery() {
    let mut h = Harness::new(ResolvedConfig::default(), "v1", "v1");
    h.start();
    h.advance(Duration::from_secs(2)).await;
    assert_eq!(h.loader.registered(), 1);

    h.loader.emit(&chunk_seven().with_module_id("412"));
    h.settle().await;

    assert!(
        h.resilience
            .recovery()
            .unwrap()
            .record(&ModuleKey::new("module-412"))
            .is_some()
    );

    h.resilience.dispose();
    assert_eq!(h.loader.registered(), 0);
}

#[tokio::test(start_paused = true)]
async fn soft_retry_clears_the_banner_without_reloading() {
    let mut config = ResolvedConfig::default();
    config.recovery.max_retries = 1;
    let mut h = Harness::new(config, "v1", "v1");
    h.start();

    h.send(PlatformEvent::UnhandledRejection(chunk_seven()));
    h.advance(Duration::from_secs(2)).await;
    h.send(PlatformEvent::UnhandledRejection(chunk_seven()));
    assert!(h.resilience.surface().recovery_required);

    h.send(PlatformEvent::UserAction(Action::SoftRetry));
    assert!(!h.resilience.surface().recovery_required);
    assert_eq!(h.host.resets(), 1);
    assert_eq!(h.host.reloads(), 0);
}
