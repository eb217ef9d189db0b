mod support;

use axum::http::Method;
use bytes::Bytes;
use podcache::cache::{CacheStore, FetchRequest, RequestClass, ResponseSource};

use support::{Harness, config, url};

const MANIFEST: [&str; 2] = ["./", "./index.html"];

async fn pin(harness: &Harness, path: &str) {
    let worker = harness.runtime.registration().active().expect("active");
    worker.cache_content(path).await;
    harness.origin.reset_calls();
}

#[tokio::test]
async fn cached_content_is_served_without_network() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    harness.origin.respond("/audio/ep1.mp3", 200, "episode one");
    pin(&harness, "/audio/ep1.mp3").await;

    let served = harness
        .runtime
        .registration()
        .handle_fetch(&FetchRequest::get(url("/audio/ep1.mp3")))
        .await;

    assert_eq!(served.class, RequestClass::Content);
    assert_eq!(served.source, ResponseSource::Cache);
    assert_eq!(served.response.body, Bytes::from("episode one"));
    assert_eq!(harness.origin.total_calls(), 0);
}

#[tokio::test]
async fn content_miss_is_fetched_but_not_stored() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;

    let served = harness
        .runtime
        .registration()
        .handle_fetch(&FetchRequest::get(url("/episodes/ep2.mp3")))
        .await;

    assert_eq!(served.class, RequestClass::Content);
    assert_eq!(served.source, ResponseSource::Network);
    assert_eq!(served.response.status, 200);
    assert_eq!(harness.origin.calls_to("/episodes/ep2.mp3"), 1);
    assert_eq!(harness.entries("podcast-audio-v1").await, 0);
    assert!(
        !harness
            .runtime
            .is_cached("/episodes/ep2.mp3")
            .await
            .expect("lookup")
    );
}

#[tokio::test]
async fn core_miss_is_stored_then_served_from_cache() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    let registration = harness.runtime.registration();
    let request = FetchRequest::get(url("/assets/app.js"));

    let first = registration.handle_fetch(&request).await;
    assert_eq!(first.class, RequestClass::Core);
    assert_eq!(first.source, ResponseSource::Network);
    assert_eq!(harness.origin.calls_to("/assets/app.js"), 1);

    let second = registration.handle_fetch(&request).await;
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.response.body, first.response.body);
    assert_eq!(harness.origin.calls_to("/assets/app.js"), 1);
}

#[tokio::test]
async fn non_success_core_responses_are_not_stored() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    harness.origin.respond("/assets/missing.js", 404, "nope");
    let registration = harness.runtime.registration();
    let request = FetchRequest::get(url("/assets/missing.js"));

    let first = registration.handle_fetch(&request).await;
    assert_eq!(first.response.status, 404);
    assert_eq!(first.source, ResponseSource::Network);

    registration.handle_fetch(&request).await;
    assert_eq!(harness.origin.calls_to("/assets/missing.js"), 2);
    assert_eq!(harness.entries("podcast-core-v1").await, MANIFEST.len());
}

#[tokio::test]
async fn offline_navigation_gets_the_shell() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    harness.origin.set_offline(true);

    let served = harness
        .runtime
        .registration()
        .handle_fetch(&FetchRequest::navigation(url("/episodes/42")))
        .await;

    assert_eq!(served.source, ResponseSource::OfflineShell);
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.body, Bytes::from("/index.html"));
}

#[tokio::test]
async fn offline_subresource_gets_plain_503() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    harness.origin.set_offline(true);

    let served = harness
        .runtime
        .registration()
        .handle_fetch(&FetchRequest::get(url("/assets/new.css")))
        .await;

    assert_eq!(served.source, ResponseSource::Unavailable);
    assert_eq!(served.response.status, 503);
    assert_eq!(served.response.body, Bytes::from("Offline"));
}

#[tokio::test]
async fn offline_uncached_content_gets_content_503() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    harness.origin.set_offline(true);

    let served = harness
        .runtime
        .registration()
        .handle_fetch(&FetchRequest::get(url("/audio/ep9.mp3")))
        .await;

    assert_eq!(served.class, RequestClass::Content);
    assert_eq!(served.response.status, 503);
    assert_eq!(
        served.response.body,
        Bytes::from("Audio not available offline")
    );
}

#[tokio::test]
async fn non_get_requests_are_forwarded_and_never_stored() {
    let harness = Harness::activated(config("v1", &MANIFEST)).await;
    let registration = harness.runtime.registration();

    let mut request = FetchRequest::get(url("/api/progress"));
    request.method = Method::POST;
    request.body = Bytes::from_static(b"{\"position\":12}");

    let served = registration.handle_fetch(&request).await;
    assert_eq!(served.source, ResponseSource::Network);
    registration.handle_fetch(&request).await;

    assert_eq!(harness.origin.calls_to("/api/progress"), 2);
    assert_eq!(harness.entries("podcast-core-v1").await, MANIFEST.len());
}

#[tokio::test]
async fn uncontrolled_requests_pass_through() {
    let harness = Harness::new(config("v1", &MANIFEST));

    let served = harness
        .runtime
        .registration()
        .handle_fetch(&FetchRequest::get(url("/assets/app.js")))
        .await;
    assert_eq!(served.source, ResponseSource::Network);
    assert!(
        harness
            .store
            .namespaces()
            .await
            .expect("namespaces")
            .is_empty()
    );
}
