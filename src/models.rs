use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::ConfigError;

/// Host name or address a controller probes. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProbeTarget(String);

impl ProbeTarget {
    pub fn new(target: impl Into<String>) -> Result<Self, ConfigError> {
        let target = target.into().trim().to_string();
        if target.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        Ok(Self(target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProbeTarget {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProbeTarget> for String {
    fn from(target: ProbeTarget) -> Self {
        target.0
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of a single probe attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "message")]
pub enum ProbeOutcome {
    Reachable,
    Unreachable,
    Error(String),
}

impl ProbeOutcome {
    pub fn is_reachable(&self) -> bool {
        matches!(self, ProbeOutcome::Reachable)
    }
}

/// What the observer receives for every completed probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// 1-based position of the probe within its running session.
    pub sequence: u64,
    pub target: ProbeTarget,
    pub timestamp: DateTime<Utc>,
    pub outcome: ProbeOutcome,
    /// Round trip of this probe, only set when the host answered.
    pub latency_ms: Option<f64>,
}

impl ProbeReport {
    pub fn new(
        sequence: u64,
        target: ProbeTarget,
        timestamp: DateTime<Utc>,
        outcome: ProbeOutcome,
        elapsed: Duration,
    ) -> Self {
        let latency_ms = outcome
            .is_reachable()
            .then(|| elapsed.as_secs_f64() * 1000.0);
        Self {
            sequence,
            target,
            timestamp,
            outcome,
            latency_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Idle,
    Running,
    Stopping,
}
