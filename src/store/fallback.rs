use super::{LocalReportStore, RemoteReportStore, ReportStore, StoreOutcome, StoreResult};
use crate::config::{FallbackConfig, UploadConfig};
use crate::error::Result;
use crate::logging::SharedLogger;

/// Tries `primary`; if that fails for any reason, hands the identical report
/// body to `fallback`. The caller only sees an error when both fail.
pub struct FallbackReportStore<P, F> {
    primary: P,
    fallback: F,
    logger: SharedLogger,
}

/// The usual composition: upload, else keep the report on local disk.
pub type UploadWithFallback = FallbackReportStore<RemoteReportStore, LocalReportStore>;

impl<P: ReportStore, F: ReportStore> FallbackReportStore<P, F> {
    pub fn new(primary: P, fallback: F, logger: SharedLogger) -> Self {
        Self {
            primary,
            fallback,
            logger,
        }
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn fallback(&self) -> &F {
        &self.fallback
    }
}

impl UploadWithFallback {
    pub fn from_config(
        upload: UploadConfig,
        fallback: &FallbackConfig,
        logger: SharedLogger,
    ) -> Result<Self> {
        let format = upload.format;
        let remote = RemoteReportStore::new(upload, logger.clone())?;
        let local = LocalReportStore::new(&fallback.directory, format, logger.clone());
        Ok(Self::new(remote, local, logger))
    }
}

impl<P: ReportStore, F: ReportStore> ReportStore for FallbackReportStore<P, F> {
    fn store(&self, report: &str) -> StoreResult<StoreOutcome> {
        let err = match self.primary.store(report) {
            Ok(outcome) => return Ok(outcome),
            Err(e) => e,
        };

        self.logger.warn(&format!(
            "Delivery to {} failed: {}. Keeping the report in {} instead",
            self.primary.describe(),
            err,
            self.fallback.describe()
        ));

        self.fallback.store(report).map_err(|fallback_err| {
            self.logger.error(&format!(
                "Fallback to {} failed as well, the report was not persisted: {}",
                self.fallback.describe(),
                fallback_err
            ));
            fallback_err
        })
    }

    fn describe(&self) -> String {
        format!(
            "{} (fallback: {})",
            self.primary.describe(),
            self.fallback.describe()
        )
    }
}
