//! Sync jobs
//!
//! A job is the unit that gets scheduled: it syncs one or more entities in
//! order and records a [`SyncRun`] for each.

use anyhow::Result;
use chrono::Utc;
use std::fmt;
use std::str::FromStr;

use super::engine::{SyncStats, sync_entity};
use crate::config::RepeatInterval;
use crate::models::{Entity, SyncRun};
use crate::source::RecordSource;
use crate::storage::WarehouseStore;

/// A schedulable sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    ContentUsageHistory,
    ContentViewHistory,
    LibraryContentVersions,
    LibraryContents,
    SearchHistory,
    /// Users, then the full user property assignment snapshot
    Users,
    WorkspaceContentVersions,
    WorkspaceContents,
    ScimUsers,
}

impl Job {
    pub const ALL: [Job; 9] = [
        Job::ContentUsageHistory,
        Job::ContentViewHistory,
        Job::LibraryContentVersions,
        Job::LibraryContents,
        Job::SearchHistory,
        Job::Users,
        Job::WorkspaceContentVersions,
        Job::WorkspaceContents,
        Job::ScimUsers,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Job::ContentUsageHistory => "content-usage-history",
            Job::ContentViewHistory => "content-view-history",
            Job::LibraryContentVersions => "library-content-versions",
            Job::LibraryContents => "library-contents",
            Job::SearchHistory => "search-history",
            Job::Users => "users",
            Job::WorkspaceContentVersions => "workspace-content-versions",
            Job::WorkspaceContents => "workspace-contents",
            Job::ScimUsers => "scim-users",
        }
    }

    /// Entities synced by this job, in order
    pub fn entities(&self) -> &'static [Entity] {
        match self {
            Job::ContentUsageHistory => &[Entity::ContentUsageHistory],
            Job::ContentViewHistory => &[Entity::ContentViewHistory],
            Job::LibraryContentVersions => &[Entity::LibraryContentVersions],
            Job::LibraryContents => &[Entity::LibraryContents],
            Job::SearchHistory => &[Entity::SearchHistory],
            Job::Users => &[Entity::Users, Entity::UserPropertyAssignments],
            Job::WorkspaceContentVersions => &[Entity::WorkspaceContentVersions],
            Job::WorkspaceContents => &[Entity::WorkspaceContents],
            Job::ScimUsers => &[Entity::ScimUsers],
        }
    }

    /// Interval used in repeat mode when none is configured
    pub fn default_interval(&self) -> RepeatInterval {
        match self {
            Job::ContentViewHistory | Job::SearchHistory | Job::WorkspaceContents => {
                RepeatInterval::Minutes(60)
            }
            _ => RepeatInterval::Hours(6),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for an unrecognised job name
#[derive(Debug, thiserror::Error)]
#[error("unknown job: {0} (expected one of: {names})", names = job_names())]
pub struct UnknownJobError(pub String);

fn job_names() -> String {
    Job::ALL.map(|j| j.name()).join(", ")
}

impl FromStr for Job {
    type Err = UnknownJobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Job::ALL
            .into_iter()
            .find(|j| j.name() == normalized)
            .ok_or_else(|| UnknownJobError(s.to_string()))
    }
}

/// Run a job once
///
/// Entities are synced in order; the first failure stops the job. Every
/// attempted entity gets a [`SyncRun`] recorded, including the failed one.
pub fn run_job(
    job: Job,
    source: &dyn RecordSource,
    store: &dyn WarehouseStore,
) -> Result<Vec<SyncStats>> {
    log::info!("Running the {} job", job);
    let mut all_stats = Vec::new();

    for &entity in job.entities() {
        let started_at = Utc::now();
        match sync_entity(source, store, entity) {
            Ok(stats) => {
                log::info!(
                    "Synced {}: {} fetched, {} saved, {} retired in {} batches ({} ms)",
                    entity,
                    stats.records_fetched,
                    stats.records_upserted,
                    stats.records_retired,
                    stats.batches,
                    stats.duration_ms
                );
                let run = SyncRun::succeeded(
                    entity,
                    started_at,
                    stats.committed_through,
                    stats.records_upserted,
                );
                record(store, &run);
                all_stats.push(stats);
            }
            Err(e) => {
                record(store, &SyncRun::failed(entity, started_at, &e));
                return Err(e.context(format!("{} job failed", job)));
            }
        }
    }

    Ok(all_stats)
}

/// Run bookkeeping is best effort; it never fails the sync itself
fn record(store: &dyn WarehouseStore, run: &SyncRun) {
    if let Err(e) = store.record_run(run) {
        log::warn!("Could not record {} run for {}: {:#}", run.status, run.entity, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunStatus;
    use crate::source::fake::{Call, FakeSource};
    use crate::storage::InMemoryWarehouse;
    use serde_json::json;

    #[test]
    fn test_parse_job_names() {
        for job in Job::ALL {
            assert_eq!(job.name().parse::<Job>().unwrap(), job);
        }
        assert_eq!("search_history".parse::<Job>().unwrap(), Job::SearchHistory);
        let err = "mailboxes".parse::<Job>().unwrap_err();
        assert!(err.to_string().contains("scim-users"));
    }

    #[test]
    fn test_every_entity_belongs_to_one_job() {
        for entity in Entity::ALL {
            let owners = Job::ALL
                .iter()
                .filter(|j| j.entities().contains(&entity))
                .count();
            assert_eq!(owners, 1, "{entity}");
        }
    }

    #[test]
    fn test_default_intervals() {
        assert_eq!(Job::ContentViewHistory.default_interval(), RepeatInterval::Minutes(60));
        assert_eq!(Job::Users.default_interval(), RepeatInterval::Hours(6));
    }

    #[test]
    fn test_users_job_syncs_assignments_after_users() {
        let source = FakeSource::new()
            .with(
                Entity::Users,
                vec![json!({ "id": "u1", "modifiedAt": Utc::now().to_rfc3339() })],
            )
            .with(
                Entity::UserPropertyAssignments,
                vec![json!({ "userId": "u1", "userPropertyId": "p1" })],
            );
        let store = InMemoryWarehouse::new();

        let stats = run_job(Job::Users, &source, &store).unwrap();

        assert_eq!(stats.len(), 2);
        assert_eq!(source.calls().last(), Some(&Call::All(Entity::UserPropertyAssignments)));
        assert_eq!(store.count_rows(Entity::UserPropertyAssignments).unwrap(), 1);
        for entity in Job::Users.entities() {
            let run = store.last_run(*entity).unwrap().unwrap();
            assert_eq!(run.status, RunStatus::Succeeded);
        }
    }

    #[test]
    fn test_failed_job_records_failure_and_stops() {
        let source = FakeSource::new().failing_after(0);
        let store = InMemoryWarehouse::new();

        let err = run_job(Job::Users, &source, &store).unwrap_err();
        assert!(format!("{:#}", err).contains("users job failed"));

        let run = store.last_run(Entity::Users).unwrap().unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert!(run.error.unwrap().contains("connection reset"));
        assert!(store.last_run(Entity::UserPropertyAssignments).unwrap().is_none());
    }
}
