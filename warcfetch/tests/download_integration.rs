//! End-to-end tests for the enumeration-and-download engine against a mock
//! WASAPI access point.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;
use tempfile::TempDir;

use warcfetch::{
    ChecksumAlgorithm, ChecksumVerifier, CoordinatorConfig, DescriptorPager, DownloadCoordinator,
    FetchError, InventoryClient, ManifestStore, QueryFilter, RetryPolicy, RunError,
};

fn sha1_hex(data: &[u8]) -> String {
    let mut verifier = ChecksumVerifier::new(ChecksumAlgorithm::Sha1);
    verifier.update(data);
    verifier.finalize_hex()
}

fn file_json(server: &MockServer, name: &str, data: &[u8]) -> serde_json::Value {
    json!({
        "filename": name,
        "size": data.len(),
        "checksums": { "sha1": sha1_hex(data) },
        "locations": [server.url(format!("/files/{name}"))],
        "collection": 5425
    })
}

fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        concurrency: 2,
        retry: RetryPolicy::immediate(3),
        ..CoordinatorConfig::default()
    }
}

fn client_for(server: &MockServer) -> InventoryClient {
    InventoryClient::new(server.url("/webdata"))
        .expect("client")
        .with_retry_policy(RetryPolicy::immediate(2))
}

/// Two pages (2 + 1 files), all transfers succeed, then a re-run skips
/// everything without touching the file mocks again.
#[tokio::test]
async fn scenario_two_pages_then_idempotent_rerun() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data_a = b"first warc contents".as_slice();
    let data_b = b"second warc contents, slightly longer".as_slice();
    let data_c = b"third warc contents".as_slice();

    let page1_body = json!({
        "count": 3,
        "next": server.url("/webdata-page2"),
        "files": [
            file_json(&server, "a.warc.gz", data_a),
            file_json(&server, "b.warc.gz", data_b),
        ]
    });
    let page2_body = json!({
        "count": 3,
        "next": null,
        "files": [file_json(&server, "c.warc.gz", data_c)]
    });

    let page1 = server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page1_body.clone());
    });
    let page2 = server.mock(|when, then| {
        when.method(GET).path("/webdata-page2");
        then.status(200).json_body(page2_body.clone());
    });
    let file_a = server.mock(|when, then| {
        when.method(GET).path("/files/a.warc.gz");
        then.status(200).body(data_a);
    });
    let file_b = server.mock(|when, then| {
        when.method(GET).path("/files/b.warc.gz");
        then.status(200).body(data_b);
    });
    let file_c = server.mock(|when, then| {
        when.method(GET).path("/files/c.warc.gz");
        then.status(200).body(data_c);
    });

    let manifest_path = dest.path().join("manifest.jsonl");
    let filter = QueryFilter::new().with_collection("5425");

    let manifest = Arc::new(ManifestStore::open(&manifest_path).unwrap());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&filter).await.unwrap();

    assert_eq!(report.completed, 3);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.failed_count(), 0);
    assert!(report.is_success());
    assert_eq!(
        report.bytes_downloaded,
        (data_a.len() + data_b.len() + data_c.len()) as u64
    );

    for (name, data) in [
        ("a.warc.gz", data_a),
        ("b.warc.gz", data_b),
        ("c.warc.gz", data_c),
    ] {
        let on_disk = std::fs::read(dest.path().join(name)).unwrap();
        assert_eq!(on_disk, data, "{name} content differs");
        assert!(!dest.path().join(format!("{name}.part")).exists());
    }

    page1.assert_hits(1);
    page2.assert_hits(1);
    file_a.assert_hits(1);

    // Second run against the same destination: everything is skipped and
    // nothing is re-downloaded.
    let manifest = Arc::new(ManifestStore::open(&manifest_path).unwrap());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&filter).await.unwrap();

    assert_eq!(report.completed, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(report.failed_count(), 0);
    file_a.assert_hits(1);
    file_b.assert_hits(1);
    file_c.assert_hits(1);
}

/// A descriptor whose body never matches its declared digest is retried
/// exactly once more, then reported failed; the other files complete.
#[tokio::test]
async fn checksum_mismatch_is_retried_once_then_failed() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data_good = b"good contents".as_slice();
    let corrupted = b"corrupted contents".as_slice();

    let mut bad_descriptor = file_json(&server, "bad.warc.gz", b"expected contents");
    bad_descriptor["size"] = json!(corrupted.len());

    let page_body = json!({
        "count": 2,
        "next": null,
        "files": [file_json(&server, "good.warc.gz", data_good), bad_descriptor]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    server.mock(|when, then| {
        when.method(GET).path("/files/good.warc.gz");
        then.status(200).body(data_good);
    });
    let bad_mock = server.mock(|when, then| {
        when.method(GET).path("/files/bad.warc.gz");
        then.status(200).body(corrupted);
    });

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.failed[0].filename, "bad.warc.gz");
    assert!(report.failed[0].reason.contains("checksum mismatch"));

    // One original attempt plus exactly one mismatch retry.
    bad_mock.assert_hits(2);

    // A corrupted stream is never finalized, and its partial is discarded.
    assert!(!dest.path().join("bad.warc.gz").exists());
    assert!(!dest.path().join("bad.warc.gz.part").exists());
    assert!(dest.path().join("good.warc.gz").exists());
}

/// An interrupted transfer resumes from the partial file's offset and the
/// finished file is byte-identical to an uninterrupted download.
#[tokio::test]
async fn resume_continues_from_partial_offset() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data: Vec<u8> = (0..4096u32).flat_map(|i| i.to_le_bytes()).collect();
    let split = data.len() / 2;
    let (first_half, second_half) = data.split_at(split);

    let page_body = json!({
        "count": 1,
        "next": null,
        "files": [file_json(&server, "resumable.warc.gz", &data)]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    let range_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/files/resumable.warc.gz")
            .header("range", format!("bytes={split}-"));
        then.status(206)
            .header(
                "content-range",
                format!("bytes {split}-{}/{}", data.len() - 1, data.len()),
            )
            .body(second_half);
    });

    // A previous run left the first half behind.
    std::fs::write(dest.path().join("resumable.warc.gz.part"), first_half).unwrap();

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();

    assert_eq!(report.completed, 1);
    assert!(report.is_success());
    range_mock.assert_hits(1);

    let on_disk = std::fs::read(dest.path().join("resumable.warc.gz")).unwrap();
    assert_eq!(on_disk, data);
}

/// A server that ignores Range and replays the full body must not corrupt
/// the file: the downloader restarts from offset zero.
#[tokio::test]
async fn full_response_to_range_request_restarts_cleanly() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data = b"complete body, range not honored".as_slice();
    let page_body = json!({
        "count": 1,
        "next": null,
        "files": [file_json(&server, "stubborn.warc.gz", data)]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    server.mock(|when, then| {
        when.method(GET).path("/files/stubborn.warc.gz");
        then.status(200).body(data);
    });

    std::fs::write(dest.path().join("stubborn.warc.gz.part"), &data[..10]).unwrap();

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();

    assert_eq!(report.completed, 1);
    let on_disk = std::fs::read(dest.path().join("stubborn.warc.gz")).unwrap();
    assert_eq!(on_disk, data);
}

/// Files already on disk with a matching digest complete without any
/// transfer, even when the manifest was lost.
#[tokio::test]
async fn finished_files_survive_manifest_loss() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data = b"already downloaded".as_slice();
    let page_body = json!({
        "count": 1,
        "next": null,
        "files": [file_json(&server, "done.warc.gz", data)]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    let file_mock = server.mock(|when, then| {
        when.method(GET).path("/files/done.warc.gz");
        then.status(200).body(data);
    });

    std::fs::write(dest.path().join("done.warc.gz"), data).unwrap();

    // Fresh (empty) manifest: the file is re-verified in place.
    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator = DownloadCoordinator::new(
        client_for(&server),
        dest.path(),
        Arc::clone(&manifest),
        test_config(),
    );
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();

    assert_eq!(report.completed, 1);
    assert_eq!(report.bytes_downloaded, 0);
    file_mock.assert_hits(0);
    assert!(manifest.is_completed("done.warc.gz"));
}

/// A non-retryable refusal fails the file immediately: one request, no
/// retries, reported with its status.
#[tokio::test]
async fn not_found_fails_without_retry() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let descriptor = json!({
        "filename": "gone.warc.gz",
        "size": 4,
        "checksums": { "sha1": sha1_hex(b"gone") },
        "locations": [server.url("/files/gone.warc.gz")]
    });
    let page_body = json!({ "count": 1, "next": null, "files": [descriptor] });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    let file_mock = server.mock(|when, then| {
        when.method(GET).path("/files/gone.warc.gz");
        then.status(404);
    });

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();

    assert_eq!(report.completed, 0);
    assert_eq!(report.failed_count(), 1);
    assert!(report.failed[0].reason.contains("404"));
    assert_eq!(report.failed[0].attempts, 1);
    file_mock.assert_hits(1);
}

/// Transient server errors are retried per policy and eventually succeed.
#[tokio::test]
async fn transient_errors_are_retried() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data = b"eventually available".as_slice();
    let page_body = json!({
        "count": 1,
        "next": null,
        "files": [file_json(&server, "flaky.warc.gz", data)]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });

    let failure = server.mock(|when, then| {
        when.method(GET).path("/files/flaky.warc.gz");
        then.status(503);
    });

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();

    // Every attempt in the budget was spent against the flaky mirror
    // before the file was declared failed.
    assert_eq!(report.failed_count(), 1);
    assert_eq!(report.failed[0].attempts, 3);
    failure.assert_hits(3);

    // The final name never appeared.
    assert!(!dest.path().join("flaky.warc.gz").exists());
}

/// A zero-byte descriptor completes after an empty verified stream.
#[tokio::test]
async fn zero_size_file_completes() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let page_body = json!({
        "count": 1,
        "next": null,
        "files": [file_json(&server, "empty.warc.gz", b"")]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    server.mock(|when, then| {
        when.method(GET).path("/files/empty.warc.gz");
        then.status(200).body("");
    });

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();

    assert_eq!(report.completed, 1);
    let meta = std::fs::metadata(dest.path().join("empty.warc.gz")).unwrap();
    assert_eq!(meta.len(), 0);
}

/// A page that keeps failing aborts the run; files dispatched before the
/// abort still settle into the partial report.
#[tokio::test]
async fn enumeration_failure_aborts_with_partial_report() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data = b"page one file".as_slice();
    let page1_body = json!({
        "count": 2,
        "next": server.url("/webdata-broken"),
        "files": [file_json(&server, "early.warc.gz", data)]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page1_body);
    });
    let broken = server.mock(|when, then| {
        when.method(GET).path("/webdata-broken");
        then.status(500);
    });
    server.mock(|when, then| {
        when.method(GET).path("/files/early.warc.gz");
        then.status(200).body(data);
    });

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let err = coordinator.run(&QueryFilter::new()).await.unwrap_err();

    match err {
        RunError::Enumeration { source, partial } => {
            assert!(matches!(source, FetchError::Status { status: 500, .. }));
            assert_eq!(partial.completed, 1);
        }
        other => panic!("expected enumeration abort, got {other:?}"),
    }
    // Page-level transient retries ran before the abort.
    broken.assert_hits(2);
}

/// Rejected credentials surface as an auth error and are never retried.
#[tokio::test]
async fn auth_failure_is_not_retried() {
    let server = MockServer::start();
    let forbidden = server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(403);
    });

    let client = client_for(&server);
    let err = client.fetch_page(&QueryFilter::new(), None).await.unwrap_err();
    assert!(matches!(err, FetchError::Auth { status: 403, .. }));
    forbidden.assert_hits(1);
}

/// Pagination yields every descriptor exactly once, in page order, and
/// stops fetching when the consumer stops pulling.
#[tokio::test]
async fn pager_is_complete_ordered_and_lazy() {
    let server = MockServer::start();

    let pages = [
        ("/webdata", Some("/wd2"), vec!["p1-a.warc.gz", "p1-b.warc.gz"]),
        ("/wd2", Some("/wd3"), vec!["p2-a.warc.gz"]),
        ("/wd3", None, vec!["p3-a.warc.gz", "p3-b.warc.gz"]),
    ];
    let mut mocks = Vec::new();
    for (path, next, names) in &pages {
        let files: Vec<_> = names
            .iter()
            .map(|name| json!({ "filename": name, "size": 1 }))
            .collect();
        let body = json!({
            "next": next.map(|n| server.url(n)),
            "files": files
        });
        mocks.push(server.mock(|when, then| {
            when.method(GET).path(*path);
            then.status(200).json_body(body.clone());
        }));
    }

    let client = InventoryClient::new(server.url("/webdata")).unwrap();
    let mut pager = DescriptorPager::new(client.clone(), QueryFilter::new());

    let mut names = Vec::new();
    while let Some(page) = pager.next_page().await.unwrap() {
        names.extend(page.into_iter().map(|d| d.filename));
    }
    assert_eq!(
        names,
        vec!["p1-a.warc.gz", "p1-b.warc.gz", "p2-a.warc.gz", "p3-a.warc.gz", "p3-b.warc.gz"]
    );
    assert_eq!(pager.pages_seen(), 3);

    // Early termination: pulling only the first page must not touch the
    // later ones.
    let mut lazy_pager = DescriptorPager::new(client, QueryFilter::new());
    let first = lazy_pager.next_page().await.unwrap().unwrap();
    assert_eq!(first.len(), 2);
    drop(lazy_pager);
    // Two walks hit the first page; the abandoned walk never fetched page 2.
    mocks[0].assert_hits(2);
    mocks[1].assert_hits(1);
}

/// `count` and `total_size` answer without downloading anything.
#[tokio::test]
async fn count_and_total_size() {
    let server = MockServer::start();

    let page1 = json!({
        "count": 3,
        "next": server.url("/wd2"),
        "files": [
            { "filename": "a.warc.gz", "size": 100 },
            { "filename": "b.warc.gz", "size": 200 }
        ]
    });
    let page2 = json!({
        "count": 3,
        "next": null,
        "files": [{ "filename": "c.warc.gz", "size": 50 }]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page1);
    });
    server.mock(|when, then| {
        when.method(GET).path("/wd2");
        then.status(200).json_body(page2);
    });

    let client = InventoryClient::new(server.url("/webdata")).unwrap();
    assert_eq!(client.count(&QueryFilter::new()).await.unwrap(), Some(3));

    let (files, bytes) = client.total_size(&QueryFilter::new()).await.unwrap();
    assert_eq!(files, 3);
    assert_eq!(bytes, 350);
}

/// With concurrency 2, four delayed transfers must run in at least two
/// waves; an unbounded pool would finish them all in one.
#[tokio::test]
async fn worker_pool_respects_concurrency_limit() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let delay = Duration::from_millis(250);
    let names = ["w1.warc.gz", "w2.warc.gz", "w3.warc.gz", "w4.warc.gz"];
    let data = b"bounded".as_slice();

    let files: Vec<_> = names
        .iter()
        .map(|name| file_json(&server, name, data))
        .collect();
    let page_body = json!({ "count": 4, "next": null, "files": files });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    for name in names {
        server.mock(|when, then| {
            when.method(GET).path(format!("/files/{name}"));
            then.status(200).delay(delay).body(data);
        });
    }

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());

    let started = std::time::Instant::now();
    let report = coordinator.run(&QueryFilter::new()).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(report.completed, 4);
    assert!(report.is_success());
    assert!(
        elapsed >= delay * 2,
        "4 files at concurrency 2 finished in {elapsed:?}, under two delay windows"
    );
}

/// Cancellation mid-run stops dispatch and still yields a (partial) report.
#[tokio::test]
async fn cancellation_yields_partial_report() {
    let server = MockServer::start();
    let dest = TempDir::new().unwrap();

    let data = b"slow file".as_slice();
    let page_body = json!({
        "count": 1,
        "next": null,
        "files": [file_json(&server, "slow.warc.gz", data)]
    });
    server.mock(|when, then| {
        when.method(GET).path("/webdata");
        then.status(200).json_body(page_body);
    });
    server.mock(|when, then| {
        when.method(GET).path("/files/slow.warc.gz");
        then.status(200)
            .delay(Duration::from_secs(5))
            .body(data);
    });

    let manifest = Arc::new(ManifestStore::in_memory());
    let coordinator =
        DownloadCoordinator::new(client_for(&server), dest.path(), manifest, test_config());
    let token = coordinator.cancellation_token();

    let filter = QueryFilter::new();
    let (report, ()) = tokio::join!(coordinator.run(&filter), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        token.cancel();
    });

    let report = report.unwrap();
    assert!(report.interrupted);
    assert_eq!(report.completed, 0);
    assert!(!dest.path().join("slow.warc.gz").exists());
}
