//! Connection and delivery settings.
//!
//! Every struct deserializes from JSON so host integrations can keep them in
//! a file; the binary assembles them from command-line flags instead.
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::commit::Revision;
use crate::error::{Result, TiaError};
use crate::format::ReportFormat;

const DEFAULT_AGENT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_UPLOAD_TIMEOUT_SECS: u64 = 120;

fn default_agent_timeout() -> u64 {
    DEFAULT_AGENT_TIMEOUT_SECS
}

fn default_upload_timeout() -> u64 {
    DEFAULT_UPLOAD_TIMEOUT_SECS
}

/// Where the long-running collection process listens.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    pub url: String,
    #[serde(default = "default_agent_timeout")]
    pub timeout_secs: u64,
}

impl AgentConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: DEFAULT_AGENT_TIMEOUT_SECS,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed base URL, always ending in `/` so relative joins keep its path.
    pub fn base_url(&self) -> Result<Url> {
        parse_base_url(&self.url)
    }
}

/// Target of remote report delivery and the metadata sent with each report.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub url: String,
    pub project: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    pub partition: String,
    pub revision: Revision,
    pub format: ReportFormat,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default = "default_upload_timeout")]
    pub timeout_secs: u64,
}

impl UploadConfig {
    pub fn new(
        url: impl Into<String>,
        project: impl Into<String>,
        partition: impl Into<String>,
        revision: Revision,
        format: ReportFormat,
    ) -> Self {
        Self {
            url: url.into(),
            project: project.into(),
            user: None,
            access_key: None,
            partition: partition.into(),
            revision,
            format,
            message: None,
            timeout_secs: DEFAULT_UPLOAD_TIMEOUT_SECS,
        }
    }

    pub fn with_credentials(mut self, user: impl Into<String>, access_key: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.access_key = Some(access_key.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject settings that could never lead to a successful upload.
    pub fn validate(&self) -> Result<()> {
        parse_base_url(&self.url)?;
        if self.project.trim().is_empty() {
            return Err(TiaError::InvalidInput("upload project must not be empty".to_string()));
        }
        if self.partition.trim().is_empty() {
            return Err(TiaError::InvalidInput("upload partition must not be empty".to_string()));
        }
        if self.user.is_some() != self.access_key.is_some() {
            return Err(TiaError::InvalidInput(
                "user and access key must be given together".to_string(),
            ));
        }
        Ok(())
    }

    /// Endpoint receiving the multipart upload for this project.
    pub fn upload_url(&self) -> Result<Url> {
        let mut url = parse_base_url(&self.url)?;
        url.path_segments_mut()
            .map_err(|_| TiaError::InvalidInput(format!("'{}' cannot be a base URL", self.url)))?
            .pop_if_empty()
            .extend(["api", "projects", self.project.as_str(), "external-analysis", "reports"]);
        Ok(url)
    }
}

/// Local directory used when remote delivery fails.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    pub directory: PathBuf,
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url =
        Url::parse(raw).map_err(|e| TiaError::InvalidInput(format!("invalid URL '{}': {}", raw, e)))?;
    if url.cannot_be_a_base() {
        return Err(TiaError::InvalidInput(format!("'{}' cannot be a base URL", raw)));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
