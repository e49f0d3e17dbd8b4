//! Client side of a coordinated test run.
//!
//! A [`TestRunSession`] is registered with the collection process, hands out
//! the prioritized plan, brackets each test with a [`RunningTest`] and is
//! finally ended. One session serves one test-execution loop; parallel
//! runners open one session per worker.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::agent::AgentClient;
use crate::config::AgentConfig;
use crate::error::{Result, TiaError};
use crate::logging::SharedLogger;
use crate::model::{
    ClusteredTestDetails, PrioritizableTest, PrioritizableTestCluster, TestExecution, TestInfo,
    TestResult, TestRunRequest,
};
use crate::retry::call_with_retry;
use crate::service::TestRunService;

/// Entry point for test-runner integrations.
pub struct TiaClient {
    service: Arc<dyn TestRunService>,
    logger: SharedLogger,
    baseline: Option<i64>,
}

impl TiaClient {
    pub fn new(service: Arc<dyn TestRunService>, logger: SharedLogger) -> Self {
        Self {
            service,
            logger,
            baseline: None,
        }
    }

    /// Talk to a collection process over HTTP.
    pub fn connect(config: &AgentConfig, logger: SharedLogger) -> Result<Self> {
        let service = AgentClient::new(config)?;
        Ok(Self::new(Arc::new(service), logger))
    }

    /// Only changes after `epoch_millis` count as impacting.
    pub fn with_baseline(mut self, epoch_millis: i64) -> Self {
        self.baseline = Some(epoch_millis);
        self
    }

    /// Register `available_tests` and receive them back as prioritized
    /// clusters. Uniform paths must be unique.
    pub fn start_test_run(&self, available_tests: Vec<ClusteredTestDetails>) -> Result<TestRunSession> {
        let mut seen = HashSet::new();
        if let Some(dup) = available_tests
            .iter()
            .find(|t| !seen.insert(t.uniform_path.as_str()))
        {
            return Err(TiaError::InvalidInput(format!(
                "duplicate uniform path in test list: {}",
                dup.uniform_path
            )));
        }

        self.register(TestRunRequest {
            available_tests: Some(available_tests),
            include_non_impacted: false,
            baseline: self.baseline,
        })
    }

    /// Register a run for coverage attribution only; the caller decides
    /// what to execute and the plan is left empty.
    pub fn start_test_run_without_test_selection(&self) -> Result<TestRunSession> {
        self.register(TestRunRequest {
            available_tests: None,
            include_non_impacted: true,
            baseline: self.baseline,
        })
    }

    /// Register a run reusing the test list the collection process saw last.
    pub fn start_test_run_assuming_unchanged_tests(&self) -> Result<TestRunSession> {
        self.register(TestRunRequest {
            available_tests: None,
            include_non_impacted: false,
            baseline: self.baseline,
        })
    }

    fn register(&self, request: TestRunRequest) -> Result<TestRunSession> {
        let plan = call_with_retry(self.logger.as_ref(), "start test run", || {
            self.service.register_test_run(&request)
        })?;
        self.logger.info(&format!(
            "Started test run {} with {} clusters at {}",
            plan.session_id,
            plan.clusters.len(),
            self.service.describe()
        ));
        Ok(TestRunSession {
            service: Arc::clone(&self.service),
            logger: Arc::clone(&self.logger),
            session_id: plan.session_id,
            clusters: plan.clusters,
            active_test: None,
            finished: HashSet::new(),
            ended: false,
        })
    }
}

pub struct TestRunSession {
    service: Arc<dyn TestRunService>,
    logger: SharedLogger,
    session_id: String,
    clusters: Vec<PrioritizableTestCluster>,
    active_test: Option<String>,
    finished: HashSet<String>,
    ended: bool,
}

impl TestRunSession {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Clusters in execution order, each holding its tests in order.
    pub fn prioritized_clusters(&self) -> &[PrioritizableTestCluster] {
        &self.clusters
    }

    /// Every planned test, flattened in execution order.
    pub fn tests_in_order(&self) -> impl Iterator<Item = &PrioritizableTest> {
        self.clusters.iter().flat_map(|c| c.tests.iter())
    }

    pub fn active_test(&self) -> Option<&str> {
        self.active_test.as_deref()
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Open the coverage window for `uniform_path`.
    ///
    /// Fails if the session has ended, another test is still active (its
    /// handle was dropped without being ended) or the path already ran.
    pub fn start_test(&mut self, uniform_path: &str) -> Result<RunningTest<'_>> {
        self.ensure_open("start a test")?;
        if let Some(ref active) = self.active_test {
            return Err(TiaError::ContractViolation(format!(
                "cannot start {} in session {}: {} is still running",
                uniform_path, self.session_id, active
            )));
        }
        if self.finished.contains(uniform_path) {
            return Err(TiaError::ContractViolation(format!(
                "test {} already ran in session {}",
                uniform_path, self.session_id
            )));
        }

        call_with_retry(self.logger.as_ref(), "start test", || {
            self.service.start_test(&self.session_id, uniform_path)
        })?;
        self.logger.debug(&format!("Started test {}", uniform_path));

        self.active_test = Some(uniform_path.to_string());
        Ok(RunningTest {
            session: self,
            uniform_path: uniform_path.to_string(),
            started: Instant::now(),
        })
    }

    /// Finish the session. With `upload`, the collection process assembles
    /// and delivers the aggregate report of everything recorded.
    ///
    /// The session counts as ended even if the remote call fails.
    pub fn end_test_run(&mut self, upload: bool) -> Result<()> {
        self.ensure_open("end the test run")?;
        if let Some(ref active) = self.active_test {
            return Err(TiaError::ContractViolation(format!(
                "cannot end session {} while {} is still running",
                self.session_id, active
            )));
        }
        self.ended = true;

        call_with_retry(self.logger.as_ref(), "end test run", || {
            self.service.end_test_run(&self.session_id, upload)
        })?;
        self.logger.info(&format!(
            "Ended test run {} after {} tests (upload: {})",
            self.session_id,
            self.finished.len(),
            upload
        ));
        Ok(())
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.ended {
            return Err(TiaError::ContractViolation(format!(
                "cannot {}: session {} has already ended",
                action, self.session_id
            )));
        }
        Ok(())
    }

    fn finish_test(
        &mut self,
        uniform_path: String,
        started: Instant,
        result: TestResult,
        retrieve_coverage: bool,
    ) -> Result<Option<TestInfo>> {
        // The slot is freed before talking to the service so a failed call
        // does not block the next test.
        self.active_test = None;
        self.finished.insert(uniform_path.clone());

        let execution = TestExecution {
            uniform_path,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            result: result.status,
            message: result.message,
        };
        let info = call_with_retry(self.logger.as_ref(), "end test", || {
            self.service
                .end_test(&self.session_id, &execution, retrieve_coverage)
        })?;
        self.logger.debug(&format!(
            "Ended test {} with {} after {} ms",
            execution.uniform_path, execution.result, execution.duration_ms
        ));
        Ok(info)
    }
}

impl Drop for TestRunSession {
    fn drop(&mut self) {
        if !self.ended {
            self.logger.warn(&format!(
                "Test run {} was dropped without being ended; its coverage was not finalized",
                self.session_id
            ));
        }
    }
}

/// The test currently being attributed coverage. Ending it consumes the
/// handle and frees the session for the next test.
pub struct RunningTest<'a> {
    session: &'a mut TestRunSession,
    uniform_path: String,
    started: Instant,
}

impl RunningTest<'_> {
    pub fn uniform_path(&self) -> &str {
        &self.uniform_path
    }

    pub fn end_test(self, result: TestResult) -> Result<()> {
        self.session
            .finish_test(self.uniform_path, self.started, result, false)?;
        Ok(())
    }

    /// End the test and fetch the coverage recorded while it ran.
    pub fn end_test_and_retrieve_coverage(self, result: TestResult) -> Result<TestInfo> {
        let uniform_path = self.uniform_path.clone();
        self.session
            .finish_test(self.uniform_path, self.started, result, true)?
            .ok_or_else(|| {
                TiaError::Protocol(format!("no coverage returned for test {}", uniform_path))
            })
    }
}
