//! Command handler functions for the tia-relay CLI.
//!
//! Each `cmd_*` function returns its output as a `String`, making them easy
//! to test without capturing stdout.

use std::fmt::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::artifact;
use crate::commit::{CommitDescriptor, Revision};
use crate::config::{FallbackConfig, UploadConfig};
use crate::format::{ArtifactFormat, ReportFormat};
use crate::store::ReportStore;

/// Upload target and fallback location shared by `upload` and `describe`.
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Base URL of the analysis server.
    #[arg(long, env = "TIA_SERVER_URL")]
    pub server_url: String,

    /// Project the report belongs to.
    #[arg(long, env = "TIA_PROJECT")]
    pub project: String,

    #[arg(long, env = "TIA_USER")]
    pub user: Option<String>,

    #[arg(long, env = "TIA_ACCESS_KEY", hide_env_values = true)]
    pub access_key: Option<String>,

    /// Partition the report is stored under.
    #[arg(long, env = "TIA_PARTITION")]
    pub partition: String,

    /// Revision as `branch:timestamp` (branch defaults to master).
    #[arg(long, conflicts_with = "revision", required_unless_present = "revision")]
    pub commit: Option<CommitDescriptor>,

    /// Opaque VCS revision id.
    #[arg(long)]
    pub revision: Option<String>,

    /// Report encoding (jacoco, testwise-coverage, junit, lcov).
    #[arg(long, default_value = "jacoco")]
    pub report_format: ReportFormat,

    /// Free-text message attached to the upload.
    #[arg(long)]
    pub message: Option<String>,

    /// Directory receiving reports whose upload failed.
    #[arg(long, default_value = "coverage-fallback")]
    pub fallback_dir: PathBuf,
}

impl UploadArgs {
    pub fn upload_config(&self) -> Result<UploadConfig> {
        let revision = match (&self.commit, &self.revision) {
            (Some(commit), _) => Revision::Commit(commit.clone()),
            (None, Some(rev)) => Revision::Revision(rev.clone()),
            (None, None) => anyhow::bail!("either --commit or --revision is required"),
        };
        let mut config = UploadConfig::new(
            &self.server_url,
            &self.project,
            &self.partition,
            revision,
            self.report_format,
        );
        config.user = self.user.clone();
        config.access_key = self.access_key.clone();
        config.message = self.message.clone();
        Ok(config)
    }

    pub fn fallback_config(&self) -> FallbackConfig {
        FallbackConfig {
            directory: self.fallback_dir.clone(),
        }
    }
}

/// List artifact files of `format` below `paths`. With `check`, every file
/// is also parsed and its record count shown; only JSON kinds can be checked.
pub fn cmd_artifacts(format: ArtifactFormat, paths: &[PathBuf], check: bool) -> Result<String> {
    if check && !format.is_json() {
        anyhow::bail!(
            "--check is not supported for {} artifacts (binary .{} files)",
            format.as_str(),
            format.file_extension()
        );
    }
    let files = artifact::filter_by_format(paths, format)?;
    let mut out = String::new();

    if files.is_empty() {
        writeln!(out, "No {} artifacts found.", format.readable_name()).unwrap();
        return Ok(out);
    }

    for file in &files {
        if check {
            let records: Vec<serde_json::Value> =
                artifact::read_objects(std::slice::from_ref(file), format)?;
            writeln!(out, "{}  ({} records)", file.display(), records.len()).unwrap();
        } else {
            writeln!(out, "{}", file.display()).unwrap();
        }
    }
    writeln!(out, "{} {} artifact(s)", files.len(), format.readable_name()).unwrap();
    Ok(out)
}

/// Deliver the report in `file` through `store`.
pub fn cmd_upload(store: &dyn ReportStore, file: &Path) -> Result<String> {
    let report = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read report {}", file.display()))?;
    let outcome = store
        .store(&report)
        .with_context(|| format!("Failed to store report {}", file.display()))?;
    Ok(format!("Report {} {}\n", file.display(), outcome))
}

pub fn cmd_describe(store: &dyn ReportStore) -> String {
    format!("Reports are delivered to {}\n", store.describe())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::NoopLogger;
    use crate::store::LocalReportStore;

    #[test]
    fn test_cmd_artifacts_lists_matches() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test-list-a.json"), r#"[{"uniformPath":"a"}]"#).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();

        let out = cmd_artifacts(ArtifactFormat::TestList, &[dir.path().to_path_buf()], true).unwrap();
        assert!(out.contains("test-list-a.json  (1 records)"), "{out}");
        assert!(!out.contains("notes.txt"));
    }

    #[test]
    fn test_cmd_artifacts_check_rejects_binary_kind() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("run.exec"), [0xc0u8, 0xc0, 0x10, 0x07]).unwrap();

        let err = cmd_artifacts(ArtifactFormat::NativeCoverage, &[dir.path().to_path_buf()], true)
            .unwrap_err();
        assert!(err.to_string().contains("native-coverage"), "{err}");

        let out = cmd_artifacts(ArtifactFormat::NativeCoverage, &[dir.path().to_path_buf()], false)
            .unwrap();
        assert!(out.contains("run.exec"), "{out}");
    }

    #[test]
    fn test_cmd_artifacts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let out = cmd_artifacts(ArtifactFormat::ClosureCoverage, &[dir.path().to_path_buf()], false)
            .unwrap();
        assert_eq!(out, "No Closure coverage artifacts found.\n");
    }

    #[test]
    fn test_cmd_upload_to_local_store() {
        let dir = tempfile::tempdir().unwrap();
        let report = dir.path().join("report.xml");
        std::fs::write(&report, "<report/>").unwrap();
        let out_dir = dir.path().join("out");
        let store = LocalReportStore::new(&out_dir, ReportFormat::JacocoXml, NoopLogger::shared())
            .with_clock(|| 7);

        let out = cmd_upload(&store, &report).unwrap();
        assert!(out.contains("written to"), "{out}");
        assert_eq!(std::fs::read_to_string(out_dir.join("jacoco-7.xml")).unwrap(), "<report/>");
    }

    #[test]
    fn test_upload_args_to_config() {
        let args = UploadArgs {
            server_url: "http://localhost:8080".to_string(),
            project: "demo".to_string(),
            user: None,
            access_key: None,
            partition: "Unit Tests".to_string(),
            commit: None,
            revision: Some("abc123".to_string()),
            report_format: ReportFormat::Lcov,
            message: Some("ci".to_string()),
            fallback_dir: PathBuf::from("fallback"),
        };
        let config = args.upload_config().unwrap();
        assert_eq!(config.revision, Revision::Revision("abc123".to_string()));
        assert_eq!(config.format, ReportFormat::Lcov);
        assert_eq!(config.message.as_deref(), Some("ci"));
        assert_eq!(args.fallback_config().directory, PathBuf::from("fallback"));
    }
}
