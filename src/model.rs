//! Records exchanged between test-runner integrations and the collection
//! process. Field names follow the camelCase JSON used on the wire.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A candidate test announced when a run is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusteredTestDetails {
    /// Stable, cross-tool identifier of the test.
    pub uniform_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
    /// Fingerprint of the test's content, used to detect changed tests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tests sharing a cluster id are kept together (e.g. one suite).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
}

impl ClusteredTestDetails {
    pub fn new(uniform_path: impl Into<String>) -> Self {
        Self {
            uniform_path: uniform_path.into(),
            source_path: None,
            content: None,
            cluster_id: None,
            partition: None,
        }
    }

    pub fn with_cluster(mut self, cluster_id: impl Into<String>) -> Self {
        self.cluster_id = Some(cluster_id.into());
        self
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }
}

/// One entry of the execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizableTest {
    pub uniform_path: String,
    /// Why the server selected this test, when it was selected by impact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl PrioritizableTest {
    pub fn new(uniform_path: impl Into<String>) -> Self {
        Self {
            uniform_path: uniform_path.into(),
            selection_reason: None,
            partition: None,
            score: None,
            duration_ms: None,
        }
    }
}

impl From<&ClusteredTestDetails> for PrioritizableTest {
    fn from(details: &ClusteredTestDetails) -> Self {
        Self {
            partition: details.partition.clone(),
            ..Self::new(details.uniform_path.clone())
        }
    }
}

/// An ordered group of tests; clusters themselves are ordered by priority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizableTestCluster {
    pub cluster_id: String,
    pub tests: Vec<PrioritizableTest>,
}

/// Answer to a run registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunPlan {
    pub session_id: String,
    #[serde(default)]
    pub clusters: Vec<PrioritizableTestCluster>,
}

/// What the caller asks for when registering a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestRunRequest {
    /// `None` means "use whatever the collection process already knows".
    pub available_tests: Option<Vec<ClusteredTestDetails>>,
    /// Return every test, not only the impacted ones.
    pub include_non_impacted: bool,
    /// Only consider changes after this point in time (epoch millis).
    pub baseline: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Passed,
    Failure,
    Error,
    Skipped,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "PASSED",
            TestStatus::Failure => "FAILURE",
            TestStatus::Error => "ERROR",
            TestStatus::Skipped => "SKIPPED",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a test as reported by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub status: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TestResult {
    pub fn new(status: TestStatus) -> Self {
        Self {
            status,
            message: None,
        }
    }

    pub fn passed() -> Self {
        Self::new(TestStatus::Passed)
    }

    pub fn with_message(status: TestStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: Some(message.into()),
        }
    }
}

/// Wire record for a finished test; also the content of test-execution
/// artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestExecution {
    pub uniform_path: String,
    pub duration_ms: u64,
    pub result: TestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Coverage attributed to exactly one test window.
///
/// `coverage` holds one line per source file in the form
/// `path:1-4,7`, files sorted by path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestInfo {
    pub uniform_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub coverage: String,
}

impl TestInfo {
    /// Split `coverage` into `(path, ranges)` pairs.
    pub fn covered_files(&self) -> Vec<(&str, &str)> {
        self.coverage
            .lines()
            .filter_map(|line| line.rsplit_once(':'))
            .collect()
    }
}

/// Render covered lines per file in the textual `path:ranges` form used by
/// [`TestInfo::coverage`].
pub fn format_file_coverage(files: &BTreeMap<String, Vec<u32>>) -> String {
    files
        .iter()
        .filter(|(_, lines)| !lines.is_empty())
        .map(|(path, lines)| format!("{}:{}", path, format_line_ranges(lines)))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse line numbers into compact ranges, e.g. `[1,2,3,7]` → `1-3,7`.
/// Input need not be sorted; duplicates are ignored.
pub fn format_line_ranges(lines: &[u32]) -> String {
    let mut sorted = lines.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut ranges: Vec<String> = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut end) = (first, first);
    for line in iter {
        if line == end + 1 {
            end = line;
            continue;
        }
        ranges.push(range_text(start, end));
        start = line;
        end = line;
    }
    ranges.push(range_text(start, end));
    ranges.join(",")
}

fn range_text(start: u32, end: u32) -> String {
    if start == end {
        format!("{}", start)
    } else {
        format!("{}-{}", start, end)
    }
}
