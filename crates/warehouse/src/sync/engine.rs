//! Incremental sync engine
//!
//! Watermarked entities are synced by walking `[watermark, now)`:
//! - "since" entities in one open-ended query
//! - windowed entities in consecutive bounded windows
//!
//! Each window is fetched, decoded and upserted as one atomic batch before
//! the next is requested, so a failure leaves every earlier window
//! committed and the next run resumes from there.
//!
//! Full-snapshot entities are synced as a sync generation (see
//! [`super::reconcile`]).

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use std::time::Instant;

use super::reconcile::Generation;
use super::watermark::watermark;
use crate::models::{Entity, FetchStrategy, SyncWindow, decode_rows, windows};
use crate::source::RecordSource;
use crate::storage::WarehouseStore;

/// Statistics from syncing one entity
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStats {
    pub entity: Entity,
    /// Windows, pages or batches committed
    pub batches: usize,
    /// Records received from the source
    pub records_fetched: usize,
    /// Rows written to storage
    pub records_upserted: usize,
    /// Rows deleted or flagged by reconciliation
    pub records_retired: usize,
    /// Upper bound of the last committed window (watermarked entities)
    pub committed_through: Option<DateTime<Utc>>,
    /// Duration of the sync
    pub duration_ms: u64,
}

impl SyncStats {
    fn new(entity: Entity) -> Self {
        Self {
            entity,
            batches: 0,
            records_fetched: 0,
            records_upserted: 0,
            records_retired: 0,
            committed_through: None,
            duration_ms: 0,
        }
    }
}

/// Sync one entity using its fetch strategy
pub fn sync_entity(
    source: &dyn RecordSource,
    store: &dyn WarehouseStore,
    entity: Entity,
) -> Result<SyncStats> {
    match entity.strategy() {
        FetchStrategy::Since | FetchStrategy::Windowed { .. } => {
            let mark = watermark(store, entity)?;
            run_sync(source, store, entity, mark)
        }
        FetchStrategy::Collection { batch_size } => {
            sync_collection(source, store, entity, batch_size)
        }
        FetchStrategy::ScimPages { page_size } => sync_scim_pages(source, store, entity, page_size),
    }
}

/// Sync a watermarked entity from `watermark` up to the current time
pub fn run_sync(
    source: &dyn RecordSource,
    store: &dyn WarehouseStore,
    entity: Entity,
    watermark: DateTime<Utc>,
) -> Result<SyncStats> {
    run_sync_until(source, store, entity, watermark, Utc::now())
}

/// Sync a watermarked entity over `[watermark, now)`
pub fn run_sync_until(
    source: &dyn RecordSource,
    store: &dyn WarehouseStore,
    entity: Entity,
    watermark: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<SyncStats> {
    let start = Instant::now();
    let mut stats = SyncStats::new(entity);

    match entity.strategy() {
        FetchStrategy::Since => {
            if watermark < now {
                let window = SyncWindow::new(watermark, now);
                log::info!(
                    "Looking for {} modified since {}",
                    entity,
                    crate::models::timestamp::format_query(&watermark)
                );
                sync_window(source, store, entity, window, None, &mut stats)?;
            }
        }
        FetchStrategy::Windowed { .. } => {
            let Some(step) = entity.step() else {
                bail!("{} has no window step", entity);
            };
            for window in windows(watermark, now, step) {
                log::info!("Looking for {} modified in {}", entity, window);
                sync_window(source, store, entity, window, Some(window.end), &mut stats)?;
            }
        }
        FetchStrategy::Collection { .. } | FetchStrategy::ScimPages { .. } => {
            bail!("{} is not synced from a watermark", entity);
        }
    }

    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// Fetch, decode and commit one window
fn sync_window(
    source: &dyn RecordSource,
    store: &dyn WarehouseStore,
    entity: Entity,
    window: SyncWindow,
    query_end: Option<DateTime<Utc>>,
    stats: &mut SyncStats,
) -> Result<()> {
    let values = source
        .fetch_modified(entity, window.start, query_end)
        .with_context(|| format!("Failed to fetch {} in {}", entity, window))?;
    let fetched = values.len();

    let rows = decode_rows(entity, values)
        .with_context(|| format!("Failed to decode {} in {}", entity, window))?;

    log_saving(entity, rows.len());
    let written = store
        .upsert(entity, &rows)
        .with_context(|| format!("Failed to save {} in {}", entity, window))?;

    stats.batches += 1;
    stats.records_fetched += fetched;
    stats.records_upserted += written;
    stats.committed_through = Some(window.end);
    Ok(())
}

/// Full unfiltered read, committed in fixed-size batches within one
/// sync generation
fn sync_collection(
    source: &dyn RecordSource,
    store: &dyn WarehouseStore,
    entity: Entity,
    batch_size: usize,
) -> Result<SyncStats> {
    let start = Instant::now();
    let mut stats = SyncStats::new(entity);

    log::info!("Updating {}", entity);
    let mut generation = Generation::begin(store, entity)?;

    let values = source
        .fetch_all(entity)
        .with_context(|| format!("Failed to fetch {}", entity))?;
    stats.records_fetched = values.len();

    let rows = decode_rows(entity, values)?;
    for batch in rows.chunks(batch_size.max(1)) {
        log_saving(entity, batch.len());
        generation
            .upsert(batch)
            .with_context(|| format!("Failed to save {} batch {}", entity, stats.batches + 1))?;
        stats.batches += 1;
    }

    let report = generation.finish()?;
    stats.records_upserted = report.upserted;
    stats.records_retired = report.retired;
    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

/// SCIM offset pagination within one sync generation, one commit per page
///
/// Stops once `startIndex` passes `totalResults` or a page comes back empty.
fn sync_scim_pages(
    source: &dyn RecordSource,
    store: &dyn WarehouseStore,
    entity: Entity,
    page_size: usize,
) -> Result<SyncStats> {
    let start = Instant::now();
    let mut stats = SyncStats::new(entity);
    let page_size = page_size.max(1);

    log::info!("Updating {}", entity);
    let mut generation = Generation::begin(store, entity)?;

    let mut start_index = 1;
    loop {
        let page = source
            .fetch_page(entity, start_index, page_size)
            .with_context(|| format!("Failed to fetch {} page at index {}", entity, start_index))?;
        let received = page.resources.len();
        stats.records_fetched += received;

        let rows = decode_rows(entity, page.resources)
            .with_context(|| format!("Failed to decode {} page at index {}", entity, start_index))?;
        log_saving(entity, rows.len());
        generation
            .upsert(&rows)
            .with_context(|| format!("Failed to save {} page at index {}", entity, start_index))?;
        stats.batches += 1;

        // Servers may return fewer than `count`; resume after what arrived
        start_index += received;
        if received == 0 || start_index > page.total_results {
            break;
        }
    }

    let report = generation.finish()?;
    stats.records_upserted = report.upserted;
    stats.records_retired = report.retired;
    stats.duration_ms = start.elapsed().as_millis() as u64;
    Ok(stats)
}

fn log_saving(entity: Entity, count: usize) {
    let plural = if count == 1 { "" } else { "s" };
    log::info!("Saving {} {} record{} to database", count, entity, plural);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fake::{Call, FakeSource};
    use crate::storage::InMemoryWarehouse;
    use chrono::{Duration, TimeZone};
    use serde_json::{Value, json};

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    fn record(id: &str, modified_at: DateTime<Utc>) -> Value {
        json!({ "id": id, "modifiedAt": modified_at.to_rfc3339() })
    }

    fn scim_users(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "id": format!("u{:03}", i) })).collect()
    }

    #[test]
    fn test_windowed_sync_walks_windows() {
        let source = FakeSource::new().with(
            Entity::WorkspaceContents,
            vec![record("a", day(2)), record("b", day(9)), record("c", day(19))],
        );
        let store = InMemoryWarehouse::new();

        let stats =
            run_sync_until(&source, &store, Entity::WorkspaceContents, day(1), day(20)).unwrap();

        assert_eq!(stats.batches, 3);
        assert_eq!(stats.records_upserted, 3);
        assert_eq!(stats.committed_through, Some(day(20)));
        assert_eq!(
            source.calls(),
            vec![
                Call::Modified(Entity::WorkspaceContents, day(1), Some(day(8))),
                Call::Modified(Entity::WorkspaceContents, day(8), Some(day(15))),
                Call::Modified(Entity::WorkspaceContents, day(15), Some(day(20))),
            ]
        );
    }

    #[test]
    fn test_since_sync_is_one_open_query() {
        let source = FakeSource::new().with(
            Entity::ContentViewHistory,
            vec![record("v1", day(3)), record("v2", day(4))],
        );
        let store = InMemoryWarehouse::new();

        let stats =
            run_sync_until(&source, &store, Entity::ContentViewHistory, day(2), day(10)).unwrap();

        assert_eq!(stats.batches, 1);
        assert_eq!(stats.committed_through, Some(day(10)));
        assert_eq!(
            source.calls(),
            vec![Call::Modified(Entity::ContentViewHistory, day(2), None)]
        );
        assert_eq!(store.count_rows(Entity::ContentViewHistory).unwrap(), 2);
    }

    #[test]
    fn test_up_to_date_watermark_does_nothing() {
        let source = FakeSource::new();
        let store = InMemoryWarehouse::new();

        for entity in [Entity::Users, Entity::ContentUsageHistory] {
            let stats = run_sync_until(&source, &store, entity, day(5), day(5)).unwrap();
            assert_eq!(stats.batches, 0);
            assert_eq!(stats.records_fetched, 0);
            assert_eq!(stats.committed_through, None);
        }
        assert!(source.calls().is_empty());
    }

    #[test]
    fn test_empty_windows_still_advance() {
        let source = FakeSource::new();
        let store = InMemoryWarehouse::new();

        let stats =
            run_sync_until(&source, &store, Entity::SearchHistory, day(1), day(4)).unwrap();

        assert_eq!(stats.batches, 2);
        assert_eq!(stats.records_upserted, 0);
        assert_eq!(stats.committed_through, Some(day(4)));
    }

    #[test]
    fn test_failure_keeps_committed_windows() {
        let source = FakeSource::new()
            .with(
                Entity::SearchHistory,
                vec![record("s1", day(1) + Duration::hours(1)), record("s2", day(4))],
            )
            .failing_after(1);
        let store = InMemoryWarehouse::new();

        let err = run_sync_until(&source, &store, Entity::SearchHistory, day(1), day(7)).unwrap_err();

        let message = format!("{:#}", err);
        assert!(message.contains("2024-01-03T00:00:00"), "{message}");
        assert_eq!(store.count_rows(Entity::SearchHistory).unwrap(), 1);
        assert_eq!(
            watermark(&store, Entity::SearchHistory).unwrap(),
            day(1) + Duration::hours(1)
        );
    }

    #[test]
    fn test_malformed_record_fails_window() {
        let source = FakeSource::new().with(
            Entity::Users,
            vec![record("u1", day(2)), json!({ "id": "u2", "modifiedAt": "garbage" })],
        );
        let store = InMemoryWarehouse::new();

        assert!(run_sync_until(&source, &store, Entity::Users, day(1), day(3)).is_err());
        assert_eq!(store.count_rows(Entity::Users).unwrap(), 0);
    }

    #[test]
    fn test_scim_pages() {
        let source = FakeSource::new().with(Entity::ScimUsers, scim_users(250));
        let store = InMemoryWarehouse::new();

        let stats = sync_entity(&source, &store, Entity::ScimUsers).unwrap();

        assert_eq!(stats.batches, 3);
        assert_eq!(stats.records_upserted, 250);
        assert_eq!(
            source.calls(),
            vec![
                Call::Page(Entity::ScimUsers, 1, 100),
                Call::Page(Entity::ScimUsers, 101, 100),
                Call::Page(Entity::ScimUsers, 201, 100),
            ]
        );
    }

    #[test]
    fn test_scim_page_boundary() {
        let source = FakeSource::new().with(Entity::ScimUsers, scim_users(200));
        let store = InMemoryWarehouse::new();

        sync_entity(&source, &store, Entity::ScimUsers).unwrap();
        assert_eq!(source.calls().len(), 2);
    }

    #[test]
    fn test_scim_short_pages_resume_after_last_received() {
        let source = FakeSource::new()
            .with(Entity::ScimUsers, scim_users(200))
            .with_page_cap(50);
        let store = InMemoryWarehouse::new();

        let stats = sync_entity(&source, &store, Entity::ScimUsers).unwrap();

        assert_eq!(stats.records_upserted, 200);
        assert_eq!(stats.records_retired, 0);
        let starts: Vec<usize> = source
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Page(_, start, _) => Some(start),
                _ => None,
            })
            .collect();
        assert_eq!(starts, vec![1, 51, 101, 151]);
    }

    #[test]
    fn test_scim_short_pages_keep_existing_users_current() {
        let store = InMemoryWarehouse::new();
        sync_entity(
            &FakeSource::new().with(Entity::ScimUsers, scim_users(200)),
            &store,
            Entity::ScimUsers,
        )
        .unwrap();

        let capped = FakeSource::new()
            .with(Entity::ScimUsers, scim_users(200))
            .with_page_cap(50);
        sync_entity(&capped, &store, Entity::ScimUsers).unwrap();

        for key in store.list_keys(Entity::ScimUsers).unwrap() {
            assert!(!store.get_row(Entity::ScimUsers, &key).unwrap().unwrap().deleted, "{key}");
        }
    }

    #[test]
    fn test_scim_empty_page_stops_the_scan() {
        // Reported total is larger than what the server actually returns
        let source = FakeSource::new()
            .with(Entity::ScimUsers, scim_users(30))
            .with_reported_total(500);
        let store = InMemoryWarehouse::new();

        let stats = sync_entity(&source, &store, Entity::ScimUsers).unwrap();
        assert_eq!(stats.records_upserted, 30);
        assert_eq!(source.calls().len(), 2);
    }

    #[test]
    fn test_scim_empty_directory_makes_one_request() {
        let source = FakeSource::new();
        let store = InMemoryWarehouse::new();

        let stats = sync_entity(&source, &store, Entity::ScimUsers).unwrap();
        assert_eq!(stats.records_upserted, 0);
        assert_eq!(source.calls().len(), 1);
    }

    #[test]
    fn test_scim_users_missing_from_scan_are_soft_deleted() {
        let store = InMemoryWarehouse::new();
        sync_entity(
            &FakeSource::new().with(Entity::ScimUsers, scim_users(3)),
            &store,
            Entity::ScimUsers,
        )
        .unwrap();

        let smaller = vec![json!({ "id": "u000" }), json!({ "id": "u002" })];
        let stats = sync_entity(
            &FakeSource::new().with(Entity::ScimUsers, smaller),
            &store,
            Entity::ScimUsers,
        )
        .unwrap();

        assert_eq!(stats.records_retired, 1);
        assert!(store.get_row(Entity::ScimUsers, &"u001".into()).unwrap().unwrap().deleted);
    }

    #[test]
    fn test_collection_batches() {
        let assignments: Vec<Value> = (0..7001)
            .map(|i| json!({ "userId": format!("u{}", i), "userPropertyId": "p" }))
            .collect();
        let source = FakeSource::new().with(Entity::UserPropertyAssignments, assignments);
        let store = InMemoryWarehouse::new();

        let stats = sync_entity(&source, &store, Entity::UserPropertyAssignments).unwrap();

        assert_eq!(stats.batches, 3);
        assert_eq!(stats.records_upserted, 7001);
        assert_eq!(source.calls(), vec![Call::All(Entity::UserPropertyAssignments)]);
    }

    #[test]
    fn test_snapshot_entities_reject_watermark_sync() {
        let source = FakeSource::new();
        let store = InMemoryWarehouse::new();
        assert!(run_sync_until(&source, &store, Entity::ScimUsers, day(1), day(2)).is_err());
    }
}
