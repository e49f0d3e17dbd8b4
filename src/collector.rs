//! A collection service living in the current process.
//!
//! [`LocalCollector`] plays the role of the long-running collection process
//! for hosts that embed the recorder directly: it keeps one
//! [`CoverageSnapshot`](crate::snapshot::CoverageSnapshot) per session, opens
//! and closes per-test windows on the recorder and, when a session ends with
//! an upload request, hands the aggregate report to its [`ReportStore`].
//!
//! It holds no impact history, so every candidate is planned. Tests that
//! share a cluster id stay together; clusters keep first-appearance order.
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::error::{Result, TiaError};
use crate::format::{ArtifactFormat, ReportFormat};
use crate::logging::SharedLogger;
use crate::model::{
    ClusteredTestDetails, PrioritizableTest, PrioritizableTestCluster, TestExecution, TestInfo,
    TestRunPlan, TestRunRequest,
};
use crate::service::TestRunService;
use crate::snapshot::{CoverageRecorder, SnapshotArena};
use crate::store::ReportStore;

/// Cluster id for tests that did not name one.
pub const DEFAULT_CLUSTER: &str = "default";

#[derive(Default)]
struct SessionRecord {
    active_test: Option<String>,
    executions: Vec<TestExecution>,
}

#[derive(Default)]
struct CollectorState {
    arena: SnapshotArena,
    sessions: HashMap<String, SessionRecord>,
    last_known_tests: Vec<ClusteredTestDetails>,
}

pub struct LocalCollector<R, S> {
    recorder: R,
    store: S,
    format: ReportFormat,
    artifact_dir: Option<PathBuf>,
    logger: SharedLogger,
    state: Mutex<CollectorState>,
}

impl<R: CoverageRecorder, S: ReportStore> LocalCollector<R, S> {
    pub fn new(recorder: R, store: S, format: ReportFormat, logger: SharedLogger) -> Self {
        Self {
            recorder,
            store,
            format,
            artifact_dir: None,
            logger,
            state: Mutex::new(CollectorState::default()),
        }
    }

    /// Also write each ended session's test executions to
    /// `<dir>/test-execution-<epoch-millis>.json`.
    pub fn with_artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifact_dir = Some(dir.into());
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of sessions registered and not yet ended.
    pub fn open_sessions(&self) -> usize {
        self.lock().sessions.len()
    }

    fn lock(&self) -> MutexGuard<'_, CollectorState> {
        // A panic in another worker does not invalidate the session table.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_executions(&self, executions: &[TestExecution]) -> Result<Option<PathBuf>> {
        let Some(ref dir) = self.artifact_dir else {
            return Ok(None);
        };
        let format = ArtifactFormat::TestExecution;
        fs::create_dir_all(dir)?;
        let path = dir.join(format!(
            "{}-{}.{}",
            format.file_prefix(),
            Utc::now().timestamp_millis(),
            format.file_extension()
        ));
        fs::write(&path, serde_json::to_vec_pretty(executions)?)?;
        Ok(Some(path))
    }
}

/// Group candidates by cluster id, keeping first-appearance order of
/// clusters and input order within each.
pub fn cluster_tests(tests: &[ClusteredTestDetails]) -> Vec<PrioritizableTestCluster> {
    let mut clusters: Vec<PrioritizableTestCluster> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for test in tests {
        let id = test.cluster_id.as_deref().unwrap_or(DEFAULT_CLUSTER);
        let slot = *index.entry(id).or_insert_with(|| {
            clusters.push(PrioritizableTestCluster {
                cluster_id: id.to_string(),
                tests: Vec::new(),
            });
            clusters.len() - 1
        });
        clusters[slot].tests.push(PrioritizableTest::from(test));
    }
    clusters
}

impl<R: CoverageRecorder, S: ReportStore> TestRunService for LocalCollector<R, S> {
    fn register_test_run(&self, request: &TestRunRequest) -> Result<TestRunPlan> {
        let mut state = self.lock();

        let clusters = match (&request.available_tests, request.include_non_impacted) {
            (Some(tests), _) => {
                state.last_known_tests = tests.clone();
                cluster_tests(tests)
            }
            (None, true) => Vec::new(),
            (None, false) => cluster_tests(&state.last_known_tests),
        };

        let session_id = uuid::Uuid::new_v4().to_string();
        let snapshot = state.arena.allocate(&session_id);
        self.recorder.reset(snapshot);
        state
            .sessions
            .insert(session_id.clone(), SessionRecord::default());

        self.logger.debug(&format!(
            "Registered session {} with {} clusters",
            session_id,
            clusters.len()
        ));
        Ok(TestRunPlan {
            session_id,
            clusters,
        })
    }

    fn start_test(&self, session_id: &str, uniform_path: &str) -> Result<()> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let record = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| unknown_session(session_id))?;
        if let Some(ref active) = record.active_test {
            return Err(TiaError::Protocol(format!(
                "session {} already runs {}",
                session_id, active
            )));
        }
        let snapshot = state
            .arena
            .get(session_id)
            .ok_or_else(|| unknown_session(session_id))?;

        self.recorder.begin_window(snapshot, uniform_path)?;
        record.active_test = Some(uniform_path.to_string());
        Ok(())
    }

    fn end_test(
        &self,
        session_id: &str,
        execution: &TestExecution,
        retrieve_coverage: bool,
    ) -> Result<Option<TestInfo>> {
        let mut guard = self.lock();
        let state = &mut *guard;
        let record = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| unknown_session(session_id))?;
        if record.active_test.as_deref() != Some(execution.uniform_path.as_str()) {
            return Err(TiaError::Protocol(format!(
                "test {} is not running in session {}",
                execution.uniform_path, session_id
            )));
        }
        let snapshot = state
            .arena
            .get(session_id)
            .ok_or_else(|| unknown_session(session_id))?;

        record.active_test = None;
        let coverage = self.recorder.end_window(snapshot, &execution.uniform_path)?;
        record.executions.push(execution.clone());

        Ok(retrieve_coverage.then(|| TestInfo {
            uniform_path: execution.uniform_path.clone(),
            result: Some(execution.result),
            message: execution.message.clone(),
            coverage,
        }))
    }

    fn end_test_run(&self, session_id: &str, upload: bool) -> Result<()> {
        let (record, snapshot) = {
            let mut state = self.lock();
            let record = state
                .sessions
                .remove(session_id)
                .ok_or_else(|| unknown_session(session_id))?;
            let snapshot = state
                .arena
                .release(session_id)
                .ok_or_else(|| unknown_session(session_id))?;
            (record, snapshot)
        };

        // The executions artifact is auxiliary; the report is still delivered.
        match self.write_executions(&record.executions) {
            Ok(Some(path)) => self
                .logger
                .info(&format!("Wrote test executions to {}", path.display())),
            Ok(None) => {}
            Err(e) => self.logger.warn(&format!(
                "Could not write test executions of session {}: {}",
                session_id, e
            )),
        }

        if upload {
            let report = self.recorder.build_report(&snapshot, self.format)?;
            let outcome = self.store.store(&report)?;
            self.logger.info(&format!(
                "Report for session {} {}",
                session_id, outcome
            ));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        format!("in-process collector delivering to {}", self.store.describe())
    }
}

fn unknown_session(session_id: &str) -> TiaError {
    TiaError::Protocol(format!("unknown session {}", session_id))
}
