//! Integration tests for the warehouse crate
//!
//! These tests drive the sync engine end to end against an on-disk SQLite
//! warehouse and a scripted record source.

use anyhow::{Result, bail};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;
use warehouse::models::timestamp::parse_timestamp;
use warehouse::source::api::ScimListResponse;
use warehouse::{
    Entity, FieldValue, Job, RecordKey, RecordSource, RunStatus, SqliteWarehouse, WarehouseStore,
    run_job, run_sync_until, sync_entity, watermark,
};

/// Serves fixed records per entity and can be told to start failing
#[derive(Default)]
struct ScriptedSource {
    records: Mutex<HashMap<Entity, Vec<Value>>>,
    fail_after: Option<usize>,
    calls: Mutex<usize>,
}

impl ScriptedSource {
    fn new() -> Self {
        Self::default()
    }

    fn with(self, entity: Entity, records: Vec<Value>) -> Self {
        self.set(entity, records);
        self
    }

    fn failing_after(mut self, calls: usize) -> Self {
        self.fail_after = Some(calls);
        self
    }

    fn set(&self, entity: Entity, records: Vec<Value>) {
        self.records.lock().unwrap().insert(entity, records);
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }

    fn tick(&self) -> Result<()> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if let Some(limit) = self.fail_after
            && *calls > limit
        {
            bail!("502 Bad Gateway");
        }
        Ok(())
    }

    fn records(&self, entity: Entity) -> Vec<Value> {
        self.records
            .lock()
            .unwrap()
            .get(&entity)
            .cloned()
            .unwrap_or_default()
    }
}

impl RecordSource for ScriptedSource {
    fn fetch_modified(
        &self,
        entity: Entity,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<Value>> {
        self.tick()?;
        Ok(self
            .records(entity)
            .into_iter()
            .filter(|r| {
                let at = r["modifiedAt"].as_str().and_then(parse_timestamp);
                at.is_some_and(|at| at >= start && end.is_none_or(|end| at < end))
            })
            .collect())
    }

    fn fetch_all(&self, entity: Entity) -> Result<Vec<Value>> {
        self.tick()?;
        Ok(self.records(entity))
    }

    fn fetch_page(&self, entity: Entity, start_index: usize, count: usize) -> Result<ScimListResponse> {
        self.tick()?;
        let all = self.records(entity);
        Ok(ScimListResponse {
            total_results: all.len(),
            start_index: Some(start_index),
            items_per_page: Some(count),
            resources: all.into_iter().skip(start_index - 1).take(count).collect(),
        })
    }
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
}

fn content(id: &str, name: &str, modified_at: DateTime<Utc>) -> Value {
    json!({ "id": id, "name": name, "modifiedAt": modified_at.to_rfc3339() })
}

fn open_store(dir: &TempDir) -> SqliteWarehouse {
    SqliteWarehouse::new(dir.path().join("warehouse.db")).unwrap()
}

#[test]
fn test_windowed_sync_commits_each_window() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let source = ScriptedSource::new().with(
        Entity::WorkspaceContents,
        vec![
            content("w1", "Deck", day(3)),
            content("w2", "Brief", day(10)),
            content("w3", "Sheet", day(18)),
        ],
    );

    let stats = run_sync_until(&source, &store, Entity::WorkspaceContents, day(1), day(20)).unwrap();

    // [Jan 1, Jan 8), [Jan 8, Jan 15), [Jan 15, Jan 20)
    assert_eq!(stats.batches, 3);
    assert_eq!(source.calls(), 3);
    assert_eq!(stats.committed_through, Some(day(20)));
    assert_eq!(store.count_rows(Entity::WorkspaceContents).unwrap(), 3);
    assert_eq!(watermark(&store, Entity::WorkspaceContents).unwrap(), day(18));
}

#[test]
fn test_empty_table_starts_from_epoch() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);

    assert_eq!(
        watermark(&store, Entity::LibraryContents).unwrap(),
        Utc.with_ymd_and_hms(2023, 1, 20, 0, 0, 0).unwrap()
    );
}

#[test]
fn test_empty_windows_still_advance() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let source = ScriptedSource::new();

    let stats = run_sync_until(&source, &store, Entity::WorkspaceContents, day(1), day(20)).unwrap();

    assert_eq!(stats.batches, 3);
    assert_eq!(stats.records_upserted, 0);
    assert_eq!(stats.committed_through, Some(day(20)));
}

#[test]
fn test_failure_keeps_committed_windows() {
    let dir = TempDir::new().unwrap();
    let records = vec![content("w1", "Deck", day(3)), content("w2", "Brief", day(10))];

    {
        let store = open_store(&dir);
        let source = ScriptedSource::new()
            .with(Entity::WorkspaceContents, records.clone())
            .failing_after(1);

        let err = run_sync_until(&source, &store, Entity::WorkspaceContents, day(1), day(20))
            .unwrap_err();
        assert!(format!("{:#}", err).contains("502 Bad Gateway"));
        assert_eq!(store.count_rows(Entity::WorkspaceContents).unwrap(), 1);
    }

    // A later run resumes from what was committed
    let store = open_store(&dir);
    let mark = watermark(&store, Entity::WorkspaceContents).unwrap();
    assert_eq!(mark, day(3));

    let source = ScriptedSource::new().with(Entity::WorkspaceContents, records);
    run_sync_until(&source, &store, Entity::WorkspaceContents, mark, day(20)).unwrap();
    assert_eq!(store.count_rows(Entity::WorkspaceContents).unwrap(), 2);
    assert_eq!(watermark(&store, Entity::WorkspaceContents).unwrap(), day(10));
}

#[test]
fn test_resync_is_idempotent_and_last_write_wins() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let source = ScriptedSource::new().with(
        Entity::WorkspaceContents,
        vec![content("w1", "Deck", day(3))],
    );

    run_sync_until(&source, &store, Entity::WorkspaceContents, day(1), day(20)).unwrap();
    run_sync_until(&source, &store, Entity::WorkspaceContents, day(1), day(20)).unwrap();
    assert_eq!(store.count_rows(Entity::WorkspaceContents).unwrap(), 1);

    source.set(
        Entity::WorkspaceContents,
        vec![content("w1", "Deck v2", day(12))],
    );
    run_sync_until(&source, &store, Entity::WorkspaceContents, day(1), day(20)).unwrap();

    let row = store
        .get_row(Entity::WorkspaceContents, &RecordKey::single("w1"))
        .unwrap()
        .unwrap();
    assert_eq!(
        row.get(Entity::WorkspaceContents, "name"),
        Some(&FieldValue::Text("Deck v2".to_string()))
    );
    assert_eq!(store.count_rows(Entity::WorkspaceContents).unwrap(), 1);
}

#[test]
fn test_snapshot_generation_deletes_missing_assignments() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let assignment = |user: &str| json!({ "userId": user, "userPropertyId": "region" });
    let source = ScriptedSource::new().with(
        Entity::UserPropertyAssignments,
        vec![assignment("A"), assignment("B"), assignment("C")],
    );

    sync_entity(&source, &store, Entity::UserPropertyAssignments).unwrap();
    assert_eq!(store.count_rows(Entity::UserPropertyAssignments).unwrap(), 3);

    source.set(
        Entity::UserPropertyAssignments,
        vec![assignment("A"), assignment("C")],
    );
    let stats = sync_entity(&source, &store, Entity::UserPropertyAssignments).unwrap();

    assert_eq!(stats.records_retired, 1);
    let keys = store.list_keys(Entity::UserPropertyAssignments).unwrap();
    assert_eq!(
        keys,
        vec![
            RecordKey::composite(["A", "region"]),
            RecordKey::composite(["C", "region"]),
        ]
    );
}

#[test]
fn test_scim_users_soft_deleted_and_revived() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let user = |id: &str| json!({ "id": id, "userName": format!("{id}@example.com") });
    let source = ScriptedSource::new().with(Entity::ScimUsers, vec![user("u1"), user("u2")]);

    sync_entity(&source, &store, Entity::ScimUsers).unwrap();

    source.set(Entity::ScimUsers, vec![user("u1")]);
    sync_entity(&source, &store, Entity::ScimUsers).unwrap();

    let gone = store
        .get_row(Entity::ScimUsers, &RecordKey::single("u2"))
        .unwrap()
        .unwrap();
    assert!(gone.deleted);
    assert_eq!(store.count_rows(Entity::ScimUsers).unwrap(), 2);

    source.set(Entity::ScimUsers, vec![user("u1"), user("u2")]);
    sync_entity(&source, &store, Entity::ScimUsers).unwrap();

    let back = store
        .get_row(Entity::ScimUsers, &RecordKey::single("u2"))
        .unwrap()
        .unwrap();
    assert!(!back.deleted);
}

#[test]
fn test_users_job_records_runs() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let source = ScriptedSource::new()
        .with(
            Entity::Users,
            vec![json!({ "id": "u1", "modifiedAt": "2024-01-05T09:30:00Z" })],
        )
        .with(
            Entity::UserPropertyAssignments,
            vec![json!({ "userId": "u1", "userPropertyId": "region" })],
        );

    let stats = run_job(Job::Users, &source, &store).unwrap();

    assert_eq!(stats.len(), 2);
    assert_eq!(store.count_rows(Entity::Users).unwrap(), 1);
    assert_eq!(store.count_rows(Entity::UserPropertyAssignments).unwrap(), 1);

    let run = store.last_run(Entity::Users).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.records, 1);
    assert!(run.committed_through.is_some());

    let run = store.last_run(Entity::UserPropertyAssignments).unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.committed_through, None);
}
