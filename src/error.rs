use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TiaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The peer could not be reached at all (refused, reset, timed out).
    #[error("Could not reach {endpoint}: {message}")]
    Connectivity { endpoint: String, message: String },

    /// The collection process answered, but with an error status.
    #[error("Agent at {endpoint} responded with HTTP {status}: {body}")]
    Agent {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{operation} failed after retry: {source}")]
    RetriesExhausted {
        operation: String,
        #[source]
        source: Box<TiaError>,
    },

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Malformed artifact {}: {source}", .path.display())]
    MalformedArtifact {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Report store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TiaError {
    /// True for failures where the peer was never reached and a retry may help.
    #[must_use]
    pub fn is_connectivity(&self) -> bool {
        matches!(self, TiaError::Connectivity { .. })
    }

    pub(crate) fn agent_call(endpoint: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, resp) => TiaError::Agent {
                endpoint: endpoint.to_string(),
                status,
                body: resp.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => TiaError::Connectivity {
                endpoint: endpoint.to_string(),
                message: t.to_string(),
            },
        }
    }
}

/// Failures raised while delivering a finished report.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Upload to {target} failed (HTTP {status}): {body}")]
    Http {
        target: String,
        status: u16,
        body: String,
    },

    #[error("Upload to {target} failed: {message}")]
    Transport { target: String, message: String },

    #[error("Could not write report to {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Map a `ureq` failure for `target`. Reading the error body is best
    /// effort; an unreadable body becomes an empty string.
    pub(crate) fn upload(target: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(status, resp) => StoreError::Http {
                target: target.to_string(),
                status,
                body: resp.into_string().unwrap_or_default(),
            },
            ureq::Error::Transport(t) => StoreError::Transport {
                target: target.to_string(),
                message: t.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, TiaError>;
