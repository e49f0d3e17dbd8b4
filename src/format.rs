//! Closed tables of report encodings and on-disk artifact kinds.
//!
//! Artifact kinds are recognised purely by file name: a file is an instance
//! of a kind when its name starts with the kind's prefix and its extension
//! matches (case-insensitive). An empty prefix matches every name.
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TiaError;

/// Encodings a finished report can be delivered in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    JacocoXml,
    TestwiseCoverage,
    JUnit,
    Lcov,
}

impl ReportFormat {
    pub const ALL: [ReportFormat; 4] = [
        ReportFormat::JacocoXml,
        ReportFormat::TestwiseCoverage,
        ReportFormat::JUnit,
        ReportFormat::Lcov,
    ];

    /// Tag the analysis server expects in the `format` upload field.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::JacocoXml => "JACOCO",
            ReportFormat::TestwiseCoverage => "TESTWISE_COVERAGE",
            ReportFormat::JUnit => "JUNIT",
            ReportFormat::Lcov => "LCOV",
        }
    }

    pub fn readable_name(&self) -> &'static str {
        match self {
            ReportFormat::JacocoXml => "JaCoCo XML coverage",
            ReportFormat::TestwiseCoverage => "Testwise coverage",
            ReportFormat::JUnit => "JUnit test results",
            ReportFormat::Lcov => "LCOV coverage",
        }
    }

    /// Prefix of locally written files of this format.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            ReportFormat::JacocoXml => "jacoco",
            ReportFormat::TestwiseCoverage => "testwise-coverage",
            ReportFormat::JUnit => "junit",
            ReportFormat::Lcov => "lcov",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            ReportFormat::JacocoXml | ReportFormat::JUnit => "xml",
            ReportFormat::TestwiseCoverage => "json",
            ReportFormat::Lcov => "info",
        }
    }

    /// MIME type used for the report part of an upload.
    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::JacocoXml | ReportFormat::JUnit => "application/xml",
            ReportFormat::TestwiseCoverage => "application/json",
            ReportFormat::Lcov => "text/plain",
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = TiaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        match normalized.as_str() {
            "JACOCO" | "JACOCO_XML" => Ok(ReportFormat::JacocoXml),
            "TESTWISE_COVERAGE" | "TESTWISE" => Ok(ReportFormat::TestwiseCoverage),
            "JUNIT" => Ok(ReportFormat::JUnit),
            "LCOV" => Ok(ReportFormat::Lcov),
            _ => {
                let supported: Vec<String> = ReportFormat::ALL
                    .iter()
                    .map(|f| f.as_str().to_lowercase().replace('_', "-"))
                    .collect();
                Err(TiaError::InvalidInput(format!(
                    "Unknown report format: '{}'. Supported: {}",
                    s,
                    supported.join(", ")
                )))
            }
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ReportFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReportFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Kinds of artifacts that aggregation tooling discovers on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    /// JSON array of the tests available in a run.
    TestList,
    /// JSON array of executed tests with their results.
    TestExecution,
    /// Binary execution dump written by the coverage recorder.
    NativeCoverage,
    /// JSON coverage produced by the Closure compiler instrumentation.
    ClosureCoverage,
}

impl ArtifactFormat {
    pub const ALL: [ArtifactFormat; 4] = [
        ArtifactFormat::TestList,
        ArtifactFormat::TestExecution,
        ArtifactFormat::ClosureCoverage,
        ArtifactFormat::NativeCoverage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactFormat::TestList => "test-list",
            ArtifactFormat::TestExecution => "test-execution",
            ArtifactFormat::NativeCoverage => "native-coverage",
            ArtifactFormat::ClosureCoverage => "closure-coverage",
        }
    }

    pub fn readable_name(&self) -> &'static str {
        match self {
            ArtifactFormat::TestList => "Test list",
            ArtifactFormat::TestExecution => "Test execution",
            ArtifactFormat::NativeCoverage => "Native coverage dump",
            ArtifactFormat::ClosureCoverage => "Closure coverage",
        }
    }

    pub fn file_prefix(&self) -> &'static str {
        match self {
            ArtifactFormat::TestList => "test-list",
            ArtifactFormat::TestExecution => "test-execution",
            ArtifactFormat::NativeCoverage => "",
            ArtifactFormat::ClosureCoverage => "closure-coverage",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            ArtifactFormat::TestList
            | ArtifactFormat::TestExecution
            | ArtifactFormat::ClosureCoverage => "json",
            ArtifactFormat::NativeCoverage => "exec",
        }
    }

    /// Whether files of this kind hold a JSON array of records.
    pub fn is_json(&self) -> bool {
        self.file_extension() == "json"
    }

    /// Whether the file name at `path` follows this kind's naming convention.
    pub fn matches(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        name.starts_with(self.file_prefix()) && ext.eq_ignore_ascii_case(self.file_extension())
    }

    /// Classify a single file. Kinds with a non-empty prefix win over the
    /// catch-all native dump kind.
    pub fn of_file(path: &Path) -> Option<ArtifactFormat> {
        Self::ALL.into_iter().find(|format| format.matches(path))
    }
}

impl std::str::FromStr for ArtifactFormat {
    type Err = TiaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "test-list" => Ok(ArtifactFormat::TestList),
            "test-execution" => Ok(ArtifactFormat::TestExecution),
            "native-coverage" | "jacoco" => Ok(ArtifactFormat::NativeCoverage),
            "closure-coverage" | "closure" => Ok(ArtifactFormat::ClosureCoverage),
            _ => Err(TiaError::InvalidInput(format!(
                "Unknown artifact format: '{}'. Supported: test-list, test-execution, \
                 native-coverage, closure-coverage",
                s
            ))),
        }
    }
}

impl std::fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
