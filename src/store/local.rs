use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::{ReportStore, StoreOutcome, StoreResult};
use crate::error::StoreError;
use crate::format::ReportFormat;
use crate::logging::SharedLogger;

type Clock = Box<dyn Fn() -> i64 + Send + Sync>;

/// Writes each report to `<dir>/<prefix>-<epoch-millis>.<ext>`.
///
/// Names carry no counter or random part: two writes within the same
/// millisecond go to the same file and the later one wins.
pub struct LocalReportStore {
    directory: PathBuf,
    format: ReportFormat,
    clock: Clock,
    logger: SharedLogger,
}

impl LocalReportStore {
    pub fn new(directory: impl Into<PathBuf>, format: ReportFormat, logger: SharedLogger) -> Self {
        Self {
            directory: directory.into(),
            format,
            clock: Box::new(|| Utc::now().timestamp_millis()),
            logger,
        }
    }

    /// Replace the wall clock (epoch millis) used to name files.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_name(&self, epoch_millis: i64) -> String {
        format!(
            "{}-{}.{}",
            self.format.file_prefix(),
            epoch_millis,
            self.format.file_extension()
        )
    }
}

impl ReportStore for LocalReportStore {
    fn store(&self, report: &str) -> StoreResult<StoreOutcome> {
        let io_err = |path: &Path, source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.directory).map_err(|e| io_err(&self.directory, e))?;
        let path = self.directory.join(self.file_name((self.clock)()));
        fs::write(&path, report).map_err(|e| io_err(&path, e))?;

        self.logger.info(&format!(
            "Wrote {} report to {}",
            self.format.readable_name(),
            path.display()
        ));
        Ok(StoreOutcome::Written { path })
    }

    fn describe(&self) -> String {
        format!("local directory {}", self.directory.display())
    }
}
