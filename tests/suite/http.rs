//! End-to-end version checks against a mock HTTP server

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use staleguard_config::ResolvedConfig;
use staleguard_core::platform::memory::{
    ManualLoaderHook, MemoryCacheStore, RecordingHost, StaticVisibility,
};
use staleguard_engine::{Platform, Resilience};
use staleguard_poller::{CheckStatus, HttpVersionSource, PollState, VersionSource, parse_descriptor};
use staleguard_types::BuildVersion;

use crate::common::{mount_version, start_version_mock, version_url};

fn http_resilience(server: &MockServer, local: &str) -> Resilience {
    let mut config = ResolvedConfig::default();
    config.version.endpoint = Some(version_url(server));
    config.version.initial_delay = Duration::from_millis(20);
    config.features.chunk_recovery = false;

    let platform = Platform {
        visibility: Arc::new(StaticVisibility::default()),
        caches: Arc::new(MemoryCacheStore::default()),
        loader: Arc::new(ManualLoaderHook::default()),
        host: Arc::new(RecordingHost::default()),
        version_source: None,
    };
    Resilience::new(config, BuildVersion::new(local).unwrap(), platform).unwrap()
}

/// Tick in real time until the first check settles.
async fn wait_for_result(resilience: &mut Resilience) {
    for _ in 0..200 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        resilience.tick(Instant::now());
        let poller = resilience.poller().unwrap();
        if !poller.history().is_empty() {
            return;
        }
    }
    panic!("version check did not complete");
}

#[tokio::test]
async fn detects_new_build_over_http() {
    let server = start_version_mock("2026.03.1").await;
    let mut resilience = http_resilience(&server, "2026.02.7");
    resilience.init(Instant::now());

    wait_for_result(&mut resilience).await;

    assert!(resilience.surface().update_available);
    let poller = resilience.poller().unwrap();
    assert_eq!(poller.poll_state(), PollState::UpdateAvailable);
    assert_eq!(
        poller.remote_version().map(BuildVersion::as_str),
        Some("2026.03.1")
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert!(request.url.query_pairs().any(|(k, _)| k == "t"));
    let cache_control = request
        .headers
        .get("cache-control")
        .and_then(|v| v.to_str().ok());
    assert_eq!(cache_control, Some("no-cache, no-store, must-revalidate"));
}

#[tokio::test]
async fn server_error_marks_check_failed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut resilience = http_resilience(&server, "v1");
    resilience.init(Instant::now());
    wait_for_result(&mut resilience).await;

    let poller = resilience.poller().unwrap();
    assert_eq!(poller.poll_state(), PollState::Failed);
    assert!(!poller.has_update());
    assert_eq!(
        poller.history().latest().map(|r| r.status),
        Some(CheckStatus::Error)
    );
    assert!(!resilience.surface().update_available);
}

#[tokio::test]
async fn malformed_descriptor_is_a_failed_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let mut resilience = http_resilience(&server, "v1");
    resilience.init(Instant::now());
    wait_for_result(&mut resilience).await;

    assert_eq!(
        resilience.poller().unwrap().poll_state(),
        PollState::Failed
    );
}

#[tokio::test]
async fn one_shot_fetch_reads_the_deployed_version() {
    let server = MockServer::start().await;
    mount_version(&server, "build-88").await;

    let source = HttpVersionSource::new(version_url(&server), Duration::from_secs(5)).unwrap();
    let body = source.fetch().await.unwrap();
    let remote = parse_descriptor(&body).unwrap();

    assert_eq!(remote.as_str(), "build-88");
    assert!(BuildVersion::new("build-87").unwrap().differs_from(&remote));
}
