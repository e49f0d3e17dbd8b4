//! Opaque handles to coverage held by the external recorder.
//!
//! A [`CoverageSnapshot`] names a session's accumulation of execution data;
//! the data itself lives in the recorder. Snapshots are owned by a
//! [`SnapshotArena`] and lent out by reference, never cloned or serialized.
use std::collections::HashMap;

use crate::error::Result;
use crate::format::ReportFormat;

/// Recorder-side identity of a snapshot. Only the arena mints these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotToken(u64);

impl SnapshotToken {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct CoverageSnapshot {
    session_id: String,
    token: SnapshotToken,
}

impl CoverageSnapshot {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn token(&self) -> SnapshotToken {
        self.token
    }
}

/// One snapshot per open session.
#[derive(Debug, Default)]
pub struct SnapshotArena {
    next_token: u64,
    by_session: HashMap<String, CoverageSnapshot>,
}

impl SnapshotArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the snapshot for `session_id`. A second allocation for the
    /// same session returns the existing snapshot.
    pub fn allocate(&mut self, session_id: &str) -> &CoverageSnapshot {
        let next_token = &mut self.next_token;
        self.by_session
            .entry(session_id.to_string())
            .or_insert_with(|| {
                *next_token += 1;
                CoverageSnapshot {
                    session_id: session_id.to_string(),
                    token: SnapshotToken(*next_token),
                }
            })
    }

    pub fn get(&self, session_id: &str) -> Option<&CoverageSnapshot> {
        self.by_session.get(session_id)
    }

    /// Remove the snapshot once its session has ended.
    pub fn release(&mut self, session_id: &str) -> Option<CoverageSnapshot> {
        self.by_session.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.by_session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_session.is_empty()
    }
}

/// The external coverage recorder, seen through snapshot handles only.
pub trait CoverageRecorder: Send + Sync {
    /// Discard everything recorded so far for `snapshot`.
    fn reset(&self, snapshot: &CoverageSnapshot);

    /// Start attributing execution to the test `uniform_path`.
    fn begin_window(&self, snapshot: &CoverageSnapshot, uniform_path: &str) -> Result<()>;

    /// Close the current window and return its coverage as `path:ranges`
    /// lines.
    fn end_window(&self, snapshot: &CoverageSnapshot, uniform_path: &str) -> Result<String>;

    /// Build the aggregate report of everything recorded for `snapshot`.
    fn build_report(&self, snapshot: &CoverageSnapshot, format: ReportFormat) -> Result<String>;
}
