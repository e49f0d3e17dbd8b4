//! Report delivery against a mocked analysis server.
//!
//! `ureq` is blocking, so each store call runs on a blocking thread while
//! wiremock serves from the async runtime.

mod common;

use std::fs;
use std::sync::Arc;

use tia_relay::commit::{CommitDescriptor, Revision};
use tia_relay::config::{FallbackConfig, UploadConfig};
use tia_relay::error::StoreError;
use tia_relay::format::ReportFormat;
use tia_relay::logging::NoopLogger;
use tia_relay::store::{
    FallbackReportStore, LocalReportStore, RemoteReportStore, ReportStore, StoreOutcome,
    UploadWithFallback,
};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UPLOAD_PATH: &str = "/api/projects/demo/external-analysis/reports";
const REPORT: &str = "<?xml version=\"1.0\"?>\n<report name=\"unit\">\n  <counter type=\"LINE\" missed=\"3\" covered=\"7\"/>\n</report>\n";

fn upload_config(url: &str) -> UploadConfig {
    UploadConfig::new(
        url,
        "demo",
        "Unit Tests",
        Revision::Commit(CommitDescriptor::new("main", "1700000000000").unwrap()),
        ReportFormat::JacocoXml,
    )
}

#[tokio::test(flavor = "multi_thread")]
async fn upload_success_does_not_touch_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .and(body_string_contains("name=\"partition\"\r\n\r\nUnit Tests"))
        .and(body_string_contains("name=\"t\"\r\n\r\nmain:1700000000000"))
        .and(body_string_contains("name=\"format\"\r\n\r\nJACOCO"))
        .and(body_string_contains(REPORT))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fallback = FallbackConfig {
        directory: dir.path().join("fallback"),
    };
    let store =
        UploadWithFallback::from_config(upload_config(&server.uri()), &fallback, NoopLogger::shared())
            .unwrap();

    let outcome = tokio::task::spawn_blocking(move || store.store(REPORT))
        .await
        .unwrap()
        .unwrap();

    assert!(matches!(outcome, StoreOutcome::Uploaded { .. }), "{outcome:?}");
    assert!(!fallback.directory.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn http_500_falls_back_with_identical_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("database is down"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let fallback = FallbackConfig {
        directory: dir.path().to_path_buf(),
    };
    let store =
        UploadWithFallback::from_config(upload_config(&server.uri()), &fallback, NoopLogger::shared())
            .unwrap();

    let outcome = tokio::task::spawn_blocking(move || store.store(REPORT))
        .await
        .unwrap()
        .expect("a failed upload must not surface as an error");

    let path = match outcome {
        StoreOutcome::Written { path } => path,
        other => panic!("expected local fallback, got {other:?}"),
    };
    assert_eq!(path.parent().unwrap(), dir.path());
    let name = path.file_name().unwrap().to_str().unwrap();
    assert!(name.starts_with("jacoco-") && name.ends_with(".xml"), "{name}");
    assert_eq!(fs::read(&path).unwrap(), REPORT.as_bytes());

    // What the server received is exactly what landed on disk.
    let requests = server.received_requests().await.unwrap();
    let sent = String::from_utf8(requests[0].body.clone()).unwrap();
    assert!(sent.contains(REPORT));
}

#[tokio::test(flavor = "multi_thread")]
async fn remote_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("access key expired"))
        .mount(&server)
        .await;

    let store = RemoteReportStore::new(upload_config(&server.uri()), NoopLogger::shared()).unwrap();
    let err = tokio::task::spawn_blocking(move || store.store(REPORT))
        .await
        .unwrap()
        .unwrap_err();

    match err {
        StoreError::Http { status, body, target } => {
            assert_eq!(status, 403);
            assert_eq!(body, "access key expired");
            assert!(target.contains(UPLOAD_PATH), "{target}");
        }
        other => panic!("expected Http error, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn credentials_and_message_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(UPLOAD_PATH))
        // base64("build:s3cret")
        .and(header("authorization", "Basic YnVpbGQ6czNjcmV0"))
        .and(body_string_contains("name=\"message\"\r\n\r\nnightly run"))
        .and(body_string_contains("name=\"project\"\r\n\r\ndemo"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let config = upload_config(&server.uri())
        .with_credentials("build", "s3cret")
        .with_message("nightly run");
    let store = RemoteReportStore::new(config, NoopLogger::shared()).unwrap();
    let outcome = tokio::task::spawn_blocking(move || store.store(REPORT))
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(outcome, StoreOutcome::Uploaded { .. }));
}

#[test]
fn unreachable_server_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let remote =
        RemoteReportStore::new(upload_config(&common::unused_local_url()), NoopLogger::shared())
            .unwrap();
    let local = LocalReportStore::new(dir.path(), ReportFormat::JacocoXml, NoopLogger::shared())
        .with_clock(|| 1700000000123);
    let store = FallbackReportStore::new(remote, local, NoopLogger::shared());

    let outcome = store.store(REPORT).unwrap();
    let expected = dir.path().join("jacoco-1700000000123.xml");
    assert_eq!(outcome, StoreOutcome::Written { path: expected.clone() });
    assert_eq!(fs::read_to_string(expected).unwrap(), REPORT);
}

#[test]
fn describe_names_remote_and_fallback() {
    let fallback = FallbackConfig {
        directory: "/var/tmp/coverage".into(),
    };
    let store = UploadWithFallback::from_config(
        upload_config("http://analysis.example.com"),
        &fallback,
        NoopLogger::shared(),
    )
    .unwrap();

    let description = store.describe();
    assert!(
        description.contains("http://analysis.example.com/api/projects/demo/external-analysis/reports"),
        "{description}"
    );
    assert!(description.contains("/var/tmp/coverage"), "{description}");
}

#[test]
fn collector_upload_failure_lands_in_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let store = FallbackReportStore::new(
        common::UnreachableStore,
        LocalReportStore::new(dir.path(), ReportFormat::TestwiseCoverage, NoopLogger::shared()),
        NoopLogger::shared(),
    );
    let collector = Arc::new(tia_relay::collector::LocalCollector::new(
        common::FakeRecorder::new(),
        store,
        ReportFormat::TestwiseCoverage,
        NoopLogger::shared(),
    ));
    let client = tia_relay::session::TiaClient::new(collector, NoopLogger::shared());

    let mut session = client
        .start_test_run(vec![tia_relay::model::ClusteredTestDetails::new("T1")])
        .unwrap();
    session
        .start_test("T1")
        .unwrap()
        .end_test(tia_relay::model::TestResult::passed())
        .unwrap();
    session.end_test_run(true).unwrap();

    let files: Vec<_> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let content = fs::read_to_string(&files[0]).unwrap();
    assert!(content.contains("tests=\"T1\""), "{content}");
}
