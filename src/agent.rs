//! HTTP/JSON transport to a collection process listening on a port.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | Call | Request |
//! |---|---|
//! | register | `POST testrun/start?include-non-impacted=<bool>[&baseline=<ms>]` |
//! | start test | `POST testrun/<session>/test/start/<uniform-path>` |
//! | end test | `POST testrun/<session>/test/end/<uniform-path>?coverage=<bool>` |
//! | end run | `POST testrun/<session>/end?upload=<bool>` |
//!
//! Uniform paths travel as a single percent-encoded path segment.
use url::Url;

use crate::config::AgentConfig;
use crate::error::{Result, TiaError};
use crate::model::{TestExecution, TestInfo, TestRunPlan, TestRunRequest};
use crate::service::TestRunService;

pub struct AgentClient {
    base: Url,
    agent: ureq::Agent,
}

impl AgentClient {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(concat!("tia-relay/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            base: config.base_url()?,
            agent,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Base URLs are validated to be hierarchical, so this cannot fail.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn post(&self, url: &Url) -> ureq::Request {
        self.agent
            .post(url.as_str())
            .set("Accept", "application/json")
    }
}

/// Read a response body; a connection dropped mid-body counts as
/// connectivity trouble.
fn read_body(endpoint: &Url, response: ureq::Response) -> Result<String> {
    response.into_string().map_err(|e| TiaError::Connectivity {
        endpoint: endpoint.to_string(),
        message: format!("failed to read response body: {}", e),
    })
}

fn decode<T: serde::de::DeserializeOwned>(endpoint: &Url, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| {
        TiaError::Protocol(format!("unexpected response from {}: {}", endpoint, e))
    })
}

impl TestRunService for AgentClient {
    fn register_test_run(&self, request: &TestRunRequest) -> Result<TestRunPlan> {
        let url = self.endpoint(&["testrun", "start"]);
        let mut call = self.post(&url).query(
            "include-non-impacted",
            if request.include_non_impacted { "true" } else { "false" },
        );
        if let Some(baseline) = request.baseline {
            call = call.query("baseline", &baseline.to_string());
        }
        let response = call
            .send_json(&request.available_tests)
            .map_err(|e| TiaError::agent_call(url.as_str(), e))?;
        decode(&url, &read_body(&url, response)?)
    }

    fn start_test(&self, session_id: &str, uniform_path: &str) -> Result<()> {
        let url = self.endpoint(&["testrun", session_id, "test", "start", uniform_path]);
        self.post(&url)
            .call()
            .map_err(|e| TiaError::agent_call(url.as_str(), e))?;
        Ok(())
    }

    fn end_test(
        &self,
        session_id: &str,
        execution: &TestExecution,
        retrieve_coverage: bool,
    ) -> Result<Option<TestInfo>> {
        let url = self.endpoint(&[
            "testrun",
            session_id,
            "test",
            "end",
            &execution.uniform_path,
        ]);
        let response = self
            .post(&url)
            .query("coverage", if retrieve_coverage { "true" } else { "false" })
            .send_json(execution)
            .map_err(|e| TiaError::agent_call(url.as_str(), e))?;

        if !retrieve_coverage {
            return Ok(None);
        }
        decode(&url, &read_body(&url, response)?).map(Some)
    }

    fn end_test_run(&self, session_id: &str, upload: bool) -> Result<()> {
        let url = self.endpoint(&["testrun", session_id, "end"]);
        self.post(&url)
            .query("upload", if upload { "true" } else { "false" })
            .call()
            .map_err(|e| TiaError::agent_call(url.as_str(), e))?;
        Ok(())
    }

    fn describe(&self) -> String {
        self.base.to_string()
    }
}
