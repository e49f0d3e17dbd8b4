//! Durable delivery of finished reports.
//!
//! A [`ReportStore`] persists a report body somewhere and can say where.
//! [`RemoteReportStore`] uploads to the analysis server,
//! [`LocalReportStore`] writes timestamped files, and
//! [`FallbackReportStore`] composes the two so a failed upload still leaves
//! the report on disk.

pub mod fallback;
pub mod local;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;

pub use fallback::{FallbackReportStore, UploadWithFallback};
pub use local::LocalReportStore;
pub use remote::RemoteReportStore;

use crate::error::StoreError;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Where a report ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Accepted by the remote endpoint at `target`.
    Uploaded { target: String },
    /// Written to a local file.
    Written { path: PathBuf },
}

impl std::fmt::Display for StoreOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreOutcome::Uploaded { target } => write!(f, "uploaded to {target}"),
            StoreOutcome::Written { path } => write!(f, "written to {}", path.display()),
        }
    }
}

pub trait ReportStore: Send + Sync {
    /// Persist `report` unmodified.
    fn store(&self, report: &str) -> StoreResult<StoreOutcome>;

    /// Human-readable destination, for log lines and operator output.
    fn describe(&self) -> String;
}

impl<S: ReportStore + ?Sized> ReportStore for Box<S> {
    fn store(&self, report: &str) -> StoreResult<StoreOutcome> {
        (**self).store(report)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

impl<S: ReportStore + ?Sized> ReportStore for Arc<S> {
    fn store(&self, report: &str) -> StoreResult<StoreOutcome> {
        (**self).store(report)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
