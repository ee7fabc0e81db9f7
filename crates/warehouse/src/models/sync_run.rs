//! Sync run bookkeeping
//!
//! The watermark itself is always derived from stored rows; a `SyncRun`
//! only records what the last invocation for an entity did, for status
//! reporting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::Entity;

/// Outcome of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "succeeded" => Some(RunStatus::Succeeded),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The last sync run recorded for an entity
#[derive(Debug, Clone, PartialEq)]
pub struct SyncRun {
    pub entity: Entity,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    /// Upper bound of the last committed window (watermarked entities only)
    pub committed_through: Option<DateTime<Utc>>,
    /// Records written during the run
    pub records: usize,
    pub error: Option<String>,
}

impl SyncRun {
    pub fn succeeded(
        entity: Entity,
        started_at: DateTime<Utc>,
        committed_through: Option<DateTime<Utc>>,
        records: usize,
    ) -> Self {
        Self {
            entity,
            started_at,
            finished_at: Utc::now(),
            status: RunStatus::Succeeded,
            committed_through,
            records,
            error: None,
        }
    }

    pub fn failed(entity: Entity, started_at: DateTime<Utc>, error: &anyhow::Error) -> Self {
        Self {
            entity,
            started_at,
            finished_at: Utc::now(),
            status: RunStatus::Failed,
            committed_through: None,
            records: 0,
            error: Some(format!("{:#}", error)),
        }
    }

    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [RunStatus::Succeeded, RunStatus::Failed] {
            assert_eq!(RunStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(RunStatus::parse("running"), None);
    }

    #[test]
    fn test_failed_run_keeps_error_chain() {
        let error = anyhow::anyhow!("connection reset").context("Failed to fetch users");
        let run = SyncRun::failed(Entity::Users, Utc::now(), &error);
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(
            run.error.as_deref(),
            Some("Failed to fetch users: connection reset")
        );
        assert!(run.duration_ms() >= 0);
    }
}
