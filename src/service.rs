//! Typed interface to the collection process.
//!
//! Implementations perform exactly one attempt per call; retrying is the
//! caller's business (see [`crate::retry`]).
use std::sync::Arc;

use crate::error::Result;
use crate::model::{TestExecution, TestInfo, TestRunPlan, TestRunRequest};

pub trait TestRunService: Send + Sync {
    /// Open a session and return its prioritized plan.
    fn register_test_run(&self, request: &TestRunRequest) -> Result<TestRunPlan>;

    /// Open the coverage window for `uniform_path`.
    fn start_test(&self, session_id: &str, uniform_path: &str) -> Result<()>;

    /// Close the current window. With `retrieve_coverage`, the coverage
    /// attributed to the window is returned.
    fn end_test(
        &self,
        session_id: &str,
        execution: &TestExecution,
        retrieve_coverage: bool,
    ) -> Result<Option<TestInfo>>;

    /// Close the session, optionally delivering its aggregate report.
    fn end_test_run(&self, session_id: &str, upload: bool) -> Result<()>;

    /// Where the service lives, for error messages.
    fn describe(&self) -> String;
}

impl<S: TestRunService + ?Sized> TestRunService for Arc<S> {
    fn register_test_run(&self, request: &TestRunRequest) -> Result<TestRunPlan> {
        (**self).register_test_run(request)
    }

    fn start_test(&self, session_id: &str, uniform_path: &str) -> Result<()> {
        (**self).start_test(session_id, uniform_path)
    }

    fn end_test(
        &self,
        session_id: &str,
        execution: &TestExecution,
        retrieve_coverage: bool,
    ) -> Result<Option<TestInfo>> {
        (**self).end_test(session_id, execution, retrieve_coverage)
    }

    fn end_test_run(&self, session_id: &str, upload: bool) -> Result<()> {
        (**self).end_test_run(session_id, upload)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
