mod support;

use std::sync::Arc;
use std::time::Duration;

use podcache::cache::{FetchRequest, FillError, OnDemandOutcome, ResponseSource, origin_url};
use podcache_protocol::Notification;
use url::Url;

use support::{Harness, config};

const MANIFEST: [&str; 1] = ["./"];
const EPISODE: &str = "/audio/ep1.mp3";

#[tokio::test]
async fn caching_twice_fetches_once() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    let worker = harness.runtime.registration().active().expect("active");
    let mut client = harness.runtime.hub().connect(Some("v1".to_string()));

    assert!(matches!(
        worker.cache_content(EPISODE).await,
        OnDemandOutcome::Stored
    ));
    assert!(matches!(
        worker.cache_content(EPISODE).await,
        OnDemandOutcome::AlreadyCached
    ));

    assert_eq!(harness.origin.calls_to(EPISODE), 1);
    assert_eq!(harness.entries("podcast-audio-v1").await, 1);
    assert!(harness.runtime.is_cached(EPISODE).await.expect("lookup"));

    // Both requests confirm to clients.
    let expected = Notification::ContentCached {
        url: EPISODE.to_string(),
    };
    assert_eq!(client.try_recv(), Some(expected.clone()));
    assert_eq!(client.try_recv(), Some(expected));
    assert_eq!(client.try_recv(), None);
}

#[tokio::test]
async fn failed_fetch_stores_nothing_and_reports_failure() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    harness.origin.respond(EPISODE, 404, "gone");
    let worker = harness.runtime.registration().active().expect("active");
    let mut client = harness.runtime.hub().connect(Some("v1".to_string()));

    let outcome = worker.cache_content(EPISODE).await;
    assert!(matches!(
        outcome,
        OnDemandOutcome::Failed(FillError::Status { status: 404 })
    ));
    assert_eq!(harness.entries("podcast-audio-v1").await, 0);

    match client.try_recv() {
        Some(Notification::ContentCacheFailed { url, .. }) => assert_eq!(url, EPISODE),
        other => panic!("expected failure notification, got {other:?}"),
    }
    assert_eq!(client.try_recv(), None);
}

#[tokio::test]
async fn failures_are_silent_when_not_configured() {
    let mut cache = config("v1", &MANIFEST);
    cache.notify_failures = false;
    let harness = Harness::activated(cache).await;
    harness.origin.fail(EPISODE);
    let worker = harness.runtime.registration().active().expect("active");
    let mut client = harness.runtime.hub().connect(Some("v1".to_string()));

    assert!(matches!(
        worker.cache_content(EPISODE).await,
        OnDemandOutcome::Failed(FillError::Origin(_))
    ));
    assert_eq!(client.try_recv(), None);
}

#[tokio::test]
async fn concurrent_requests_share_one_fetch() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    harness.origin.set_delay(Duration::from_millis(100));
    let worker = harness.runtime.registration().active().expect("active");

    let first = {
        let worker = Arc::clone(&worker);
        tokio::spawn(async move { worker.cache_content(EPISODE).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = worker.cache_content(EPISODE).await;

    assert!(matches!(second, OnDemandOutcome::InFlight));
    assert!(matches!(
        first.await.expect("join"),
        OnDemandOutcome::Stored
    ));
    assert_eq!(harness.origin.calls_to(EPISODE), 1);
    assert_eq!(harness.entries("podcast-audio-v1").await, 1);
}

#[tokio::test]
async fn every_client_hears_about_cached_content() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    let worker = harness.runtime.registration().active().expect("active");
    let mut clients: Vec<_> = (0..3)
        .map(|_| harness.runtime.hub().connect(Some("v1".to_string())))
        .collect();

    worker.cache_content("https://cdn.example/ep7.mp3").await;

    for client in clients.iter_mut() {
        assert_eq!(
            client.try_recv(),
            Some(Notification::ContentCached {
                url: "https://cdn.example/ep7.mp3".to_string()
            })
        );
    }
    assert_eq!(harness.origin.calls_to("/ep7.mp3"), 1);
}

#[tokio::test]
async fn relative_and_absolute_forms_share_an_entry() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    let worker = harness.runtime.registration().active().expect("active");

    worker.cache_content("audio/ep1.mp3").await;
    assert!(matches!(
        worker
            .cache_content("http://origin.test/audio/ep1.mp3")
            .await,
        OnDemandOutcome::AlreadyCached
    ));
    assert_eq!(harness.origin.calls_to(EPISODE), 1);
}

#[tokio::test]
async fn pinned_root_path_is_served_under_prefixed_origin() {
    let base = Url::parse("http://origin.test/app/").expect("prefixed base");
    let harness = Harness::with_base(base.clone(), config("v1", &MANIFEST));
    harness
        .runtime
        .install_configured()
        .await
        .expect("install should succeed");
    let worker = harness.runtime.registration().active().expect("active");

    assert!(matches!(
        worker.cache_content(EPISODE).await,
        OnDemandOutcome::Stored
    ));
    assert_eq!(harness.origin.calls_to("/app/audio/ep1.mp3"), 1);
    assert!(harness.runtime.is_cached(EPISODE).await.expect("lookup"));

    harness.origin.reset_calls();
    harness.origin.set_offline(true);
    let intercepted = origin_url(&base, EPISODE).expect("request url");
    let served = harness
        .runtime
        .registration()
        .handle_fetch(&FetchRequest::get(intercepted))
        .await;

    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.status, 200);
    assert_eq!(harness.origin.total_calls(), 0);
}
