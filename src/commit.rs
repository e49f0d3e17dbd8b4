//! Identification of the code revision a report belongs to.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Result, TiaError};

/// Branch used when a commit string carries no branch part.
pub const DEFAULT_BRANCH: &str = "master";

/// A revision given as `branch:timestamp`. The timestamp stays textual so
/// symbolic values such as `HEAD` survive unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommitDescriptor {
    pub branch_name: String,
    pub timestamp: String,
}

impl CommitDescriptor {
    /// Branch names cannot contain `:` (git forbids it in ref names), which
    /// keeps the `branch:timestamp` form unambiguous.
    pub fn new(branch_name: impl Into<String>, timestamp: impl Into<String>) -> Result<Self> {
        let branch_name = branch_name.into();
        if branch_name.contains(':') {
            return Err(TiaError::InvalidInput(format!(
                "branch name '{}' must not contain ':'",
                branch_name
            )));
        }
        Ok(Self {
            branch_name,
            timestamp: timestamp.into(),
        })
    }

    /// Parse `branch:timestamp`. Everything before the first colon is the
    /// branch; a string without a colon is a timestamp on [`DEFAULT_BRANCH`].
    pub fn parse(s: &str) -> Self {
        let (branch, timestamp) = s.split_once(':').unwrap_or((DEFAULT_BRANCH, s));
        Self {
            branch_name: branch.to_string(),
            timestamp: timestamp.to_string(),
        }
    }
}

impl fmt::Display for CommitDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.branch_name, self.timestamp)
    }
}

impl FromStr for CommitDescriptor {
    type Err = TiaError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(TiaError::InvalidInput(
                "commit descriptor must not be empty".to_string(),
            ));
        }
        Ok(Self::parse(s))
    }
}

impl Serialize for CommitDescriptor {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CommitDescriptor {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// What an uploaded report is attributed to: a branch/timestamp pair or an
/// opaque VCS revision id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Revision {
    Commit(CommitDescriptor),
    Revision(String),
}

impl Revision {
    /// Multipart field name and value identifying this revision on upload.
    pub fn as_form_field(&self) -> (&'static str, String) {
        match self {
            Revision::Commit(commit) => ("t", commit.to_string()),
            Revision::Revision(id) => ("revision", id.clone()),
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Revision::Commit(commit) => write!(f, "commit {commit}"),
            Revision::Revision(id) => write!(f, "revision {id}"),
        }
    }
}
