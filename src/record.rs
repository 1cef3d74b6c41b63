//! Build records as stored by the build system.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Status of a build as reported by the build system.
///
/// Names the build system may add later decode as `Other` and never match
/// any cleanup rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildState {
    Pending,
    Running,
    Success,
    Failure,
    Error,
    Other(String),
}

impl BuildState {
    /// States removed by `--clean-failed` when no explicit set is given.
    pub const DEFAULT_CLEAN: [BuildState; 2] = [BuildState::Failure, BuildState::Error];

    pub fn as_str(&self) -> &str {
        match self {
            BuildState::Pending => "PENDING",
            BuildState::Running => "RUNNING",
            BuildState::Success => "SUCCESS",
            BuildState::Failure => "FAILURE",
            BuildState::Error => "ERROR",
            BuildState::Other(name) => name,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, BuildState::Other(_))
    }

    fn parse_known(name: &str) -> Option<Self> {
        match name {
            "PENDING" => Some(BuildState::Pending),
            "RUNNING" => Some(BuildState::Running),
            "SUCCESS" => Some(BuildState::Success),
            "FAILURE" => Some(BuildState::Failure),
            "ERROR" => Some(BuildState::Error),
            _ => None,
        }
    }
}

impl From<String> for BuildState {
    fn from(name: String) -> Self {
        Self::parse_known(&name).unwrap_or(BuildState::Other(name))
    }
}

impl From<BuildState> for String {
    fn from(state: BuildState) -> Self {
        state.as_str().to_string()
    }
}

/// Parses operator input. Case-insensitive, and only the known states are
/// accepted so a typo can't silently select nothing.
impl FromStr for BuildState {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse_known(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| Error::InvalidStatus(s.to_string()))
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub state: BuildState,
}

/// One build's metadata. The identifier lives in the store key, not the
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildRecord {
    /// Unix timestamp in seconds.
    pub time_created: f64,
    pub progress: Progress,
}

impl BuildRecord {
    pub fn new(created_at: DateTime<Utc>, state: BuildState) -> Self {
        Self {
            time_created: created_at.timestamp_millis() as f64 / 1000.0,
            progress: Progress { state },
        }
    }

    pub fn state(&self) -> &BuildState {
        &self.progress.state
    }

    pub fn is_running(&self) -> bool {
        self.progress.state == BuildState::Running
    }

    /// `None` when `time_created` is not finite or falls outside the
    /// range chrono can represent.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if !self.time_created.is_finite() {
            return None;
        }
        DateTime::from_timestamp_millis((self.time_created * 1000.0).round() as i64)
    }

    /// Age relative to `now`. Negative when the record claims a future
    /// creation time, `None` when the creation time is unrepresentable.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.created_at().map(|created| now.signed_duration_since(created))
    }

    /// Decodes a stored document. A document whose creation time cannot
    /// be placed on the clock is rejected like any other undecodable one.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let record: Self = serde_json::from_slice(raw)?;
        if record.created_at().is_none() {
            return Err(Error::Validation(format!(
                "time_created {} is out of range",
                record.time_created
            )));
        }
        Ok(record)
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Age in hours with fractional part, for operator messages.
pub fn hours(age: Duration) -> f64 {
    age.num_milliseconds() as f64 / 3_600_000.0
}
