#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tia_relay::error::{StoreError, TiaError};
use tia_relay::format::ReportFormat;
use tia_relay::logging::NoopLogger;
use tia_relay::model::format_file_coverage;
use tia_relay::snapshot::{CoverageRecorder, CoverageSnapshot};
use tia_relay::store::{ReportStore, StoreOutcome, StoreResult};
use tia_relay::collector::LocalCollector;

/// Recorder double: each test "executes" the lines registered for it.
#[derive(Default)]
pub struct FakeRecorder {
    lines_by_test: HashMap<String, BTreeMap<String, Vec<u32>>>,
    /// Per snapshot token: tests whose windows were closed, in order.
    finished: Mutex<HashMap<u64, Vec<String>>>,
    pub resets: AtomicUsize,
}

impl FakeRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn covers(mut self, uniform_path: &str, file: &str, lines: &[u32]) -> Self {
        self.lines_by_test
            .entry(uniform_path.to_string())
            .or_default()
            .insert(file.to_string(), lines.to_vec());
        self
    }
}

impl CoverageRecorder for FakeRecorder {
    fn reset(&self, snapshot: &CoverageSnapshot) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.finished
            .lock()
            .unwrap()
            .insert(snapshot.token().get(), Vec::new());
    }

    fn begin_window(&self, _snapshot: &CoverageSnapshot, _uniform_path: &str) -> tia_relay::error::Result<()> {
        Ok(())
    }

    fn end_window(&self, snapshot: &CoverageSnapshot, uniform_path: &str) -> tia_relay::error::Result<String> {
        self.finished
            .lock()
            .unwrap()
            .entry(snapshot.token().get())
            .or_default()
            .push(uniform_path.to_string());
        Ok(self
            .lines_by_test
            .get(uniform_path)
            .map(format_file_coverage)
            .unwrap_or_default())
    }

    fn build_report(&self, snapshot: &CoverageSnapshot, format: ReportFormat) -> tia_relay::error::Result<String> {
        let finished = self.finished.lock().unwrap();
        let tests = finished
            .get(&snapshot.token().get())
            .ok_or_else(|| TiaError::Protocol("snapshot was never reset".to_string()))?;
        Ok(format!(
            "<report format=\"{}\" session=\"{}\" tests=\"{}\"/>",
            format,
            snapshot.session_id(),
            tests.join(",")
        ))
    }
}

/// Store double remembering every body it was given.
#[derive(Default)]
pub struct CountingStore {
    pub bodies: Mutex<Vec<String>>,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }
}

impl ReportStore for CountingStore {
    fn store(&self, report: &str) -> StoreResult<StoreOutcome> {
        self.bodies.lock().unwrap().push(report.to_string());
        Ok(StoreOutcome::Uploaded {
            target: "memory".to_string(),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

/// Store double that always fails to upload.
pub struct UnreachableStore;

impl ReportStore for UnreachableStore {
    fn store(&self, _report: &str) -> StoreResult<StoreOutcome> {
        Err(StoreError::Transport {
            target: "http://unreachable.invalid".to_string(),
            message: "connection refused".to_string(),
        })
    }

    fn describe(&self) -> String {
        "http://unreachable.invalid".to_string()
    }
}

pub type TestCollector = LocalCollector<FakeRecorder, Arc<CountingStore>>;

/// A collector backed by `recorder`, plus a handle on its store.
pub fn collector(recorder: FakeRecorder) -> (Arc<TestCollector>, Arc<CountingStore>) {
    let store = Arc::new(CountingStore::default());
    let collector = LocalCollector::new(
        recorder,
        Arc::clone(&store),
        ReportFormat::TestwiseCoverage,
        NoopLogger::shared(),
    );
    (Arc::new(collector), store)
}

/// An address nothing listens on.
pub fn unused_local_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}
