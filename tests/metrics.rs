mod support;

use std::collections::HashSet;

use metrics_util::debugging::DebuggingRecorder;
use podcache::cache::FetchRequest;

use support::{Harness, config, url};

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    // v1 installs and activates, v2 replaces it and deletes v1's namespace.
    let harness = Harness::activated(config("v1", &["./"])).await;
    let next = harness
        .runtime
        .worker_for(config("v2", &["./"]))
        .expect("worker");
    harness
        .runtime
        .registration()
        .register(next)
        .await
        .expect("install v2");

    let _client = harness.runtime.hub().connect(Some("v2".to_string()));
    let registration = harness.runtime.registration();
    registration
        .handle_fetch(&FetchRequest::get(url("/assets/app.js")))
        .await;
    registration
        .active()
        .expect("active")
        .cache_content("/audio/ep1.mp3")
        .await;

    let metric_names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    for expected in [
        "podcache_install_total",
        "podcache_install_ms",
        "podcache_namespace_deleted_total",
        "podcache_fetch_total",
        "podcache_on_demand_total",
        "podcache_clients_connected",
    ] {
        assert!(
            metric_names.contains(expected),
            "missing metric `{expected}` in {metric_names:?}"
        );
    }
}
