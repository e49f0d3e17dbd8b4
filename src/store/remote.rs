//! Upload of a report to the analysis server as one multipart request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use url::Url;

use super::{ReportStore, StoreOutcome, StoreResult};
use crate::config::UploadConfig;
use crate::error::{Result, StoreError};
use crate::logging::SharedLogger;

pub struct RemoteReportStore {
    config: UploadConfig,
    url: Url,
    agent: ureq::Agent,
    logger: SharedLogger,
}

impl RemoteReportStore {
    pub fn new(config: UploadConfig, logger: SharedLogger) -> Result<Self> {
        config.validate()?;
        let url = config.upload_url()?;
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout())
            .user_agent(concat!("tia-relay/", env!("CARGO_PKG_VERSION")))
            .build();
        Ok(Self {
            config,
            url,
            agent,
            logger,
        })
    }

    /// The multipart body for `report`, with the metadata that identifies it.
    fn form(&self, report: &str) -> MultipartForm {
        let config = &self.config;
        let (revision_field, revision_value) = config.revision.as_form_field();

        let mut form = MultipartForm::new();
        form.add_file(
            "report",
            &format!(
                "{}.{}",
                config.format.file_prefix(),
                config.format.file_extension()
            ),
            config.format.content_type(),
            report.as_bytes(),
        );
        form.add_text("project", &config.project);
        form.add_text(revision_field, &revision_value);
        form.add_text("partition", &config.partition);
        form.add_text("format", config.format.as_str());
        if let Some(ref message) = config.message {
            form.add_text("message", message);
        }
        form
    }
}

impl ReportStore for RemoteReportStore {
    fn store(&self, report: &str) -> StoreResult<StoreOutcome> {
        let target = self.describe();
        let (content_type, body) = self.form(report).finish();

        let mut request = self
            .agent
            .post(self.url.as_str())
            .set("Content-Type", &content_type)
            .set("Accept", "application/json");
        if let (Some(user), Some(key)) = (&self.config.user, &self.config.access_key) {
            let token = STANDARD.encode(format!("{}:{}", user, key));
            request = request.set("Authorization", &format!("Basic {}", token));
        }

        self.logger.debug(&format!(
            "Uploading {} report ({} bytes) to {}",
            self.config.format.readable_name(),
            report.len(),
            target
        ));
        let response = request
            .send_bytes(&body)
            .map_err(|e| StoreError::upload(&target, e))?;

        // ureq only errors on 4xx/5xx; anything else outside 2xx is a failure too.
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(StoreError::Http {
                target,
                status,
                body: response.into_string().unwrap_or_default(),
            });
        }

        self.logger.info(&format!("Uploaded report to {}", target));
        Ok(StoreOutcome::Uploaded { target })
    }

    fn describe(&self) -> String {
        format!(
            "{} (project {}, partition {}, {})",
            self.url, self.config.project, self.config.partition, self.config.revision
        )
    }
}

/// Minimal `multipart/form-data` encoder.
struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl MultipartForm {
    fn new() -> Self {
        Self {
            boundary: format!("tia-relay-{}", uuid::Uuid::new_v4().simple()),
            body: Vec::new(),
        }
    }

    fn add_text(&mut self, name: &str, value: &str) {
        self.open_part(&format!("form-data; name=\"{}\"", escape_quoted(name)), None);
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
    }

    fn add_file(&mut self, name: &str, file_name: &str, content_type: &str, content: &[u8]) {
        self.open_part(
            &format!(
                "form-data; name=\"{}\"; filename=\"{}\"",
                escape_quoted(name),
                escape_quoted(file_name)
            ),
            Some(content_type),
        );
        self.body.extend_from_slice(content);
        self.body.extend_from_slice(b"\r\n");
    }

    fn open_part(&mut self, disposition: &str, content_type: Option<&str>) {
        self.body
            .extend_from_slice(format!("--{}\r\n", self.boundary).as_bytes());
        self.body
            .extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
        if let Some(ct) = content_type {
            self.body
                .extend_from_slice(format!("Content-Type: {}\r\n", ct).as_bytes());
        }
        self.body.extend_from_slice(b"\r\n");
    }

    /// Returns the request `Content-Type` header and the encoded body.
    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
