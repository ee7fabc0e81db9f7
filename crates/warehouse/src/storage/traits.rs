//! Storage trait definitions

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};

use crate::models::timestamp;
use crate::models::{Entity, FieldValue, RecordKey, Row, SyncRun};

/// A row as read back from storage, with its generation flags
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    /// Data columns in entity column order
    pub values: Vec<FieldValue>,
    /// `_synced` flag; `None` on tables that are not reconciled
    pub synced: Option<bool>,
    /// `_deleted` flag; always false on tables without soft delete
    pub deleted: bool,
}

/// Column value as storage holds it
///
/// Booleans become integers and timestamps their fixed-width text form, so
/// every backend reads back the same values.
pub fn stored_value(value: &FieldValue) -> FieldValue {
    match value {
        FieldValue::Bool(b) => FieldValue::Integer(i64::from(*b)),
        FieldValue::Timestamp(dt) => FieldValue::Text(timestamp::format_storage(dt)),
        other => other.clone(),
    }
}

/// Check that a row matches the entity's column layout
pub fn validate_row(entity: Entity, row: &Row) -> Result<()> {
    let columns = entity.columns();
    if row.values.len() != columns.len() {
        bail!(
            "Row {} for {} has {} values, expected {}",
            row.key,
            entity,
            row.values.len(),
            columns.len()
        );
    }
    if row.key.parts().len() != entity.key_columns().len() {
        bail!("Row key {} does not match the key of {}", row.key, entity);
    }
    Ok(())
}

impl StoredRow {
    pub fn get(&self, entity: Entity, column: &str) -> Option<&FieldValue> {
        entity.column_index(column).and_then(|i| self.values.get(i))
    }
}

/// Trait for warehouse storage operations
///
/// Every method that writes is atomic: either all of its effects are
/// visible afterwards or none are.
pub trait WarehouseStore: Send + Sync {
    /// Greatest stored `modified_at` for a watermarked entity
    fn max_modified_at(&self, entity: Entity) -> Result<Option<DateTime<Utc>>>;

    /// Insert or update a batch of rows, keyed by the entity's primary key
    ///
    /// Returns the number of rows written. Reconciled entities have their
    /// rows marked as seen in the current generation.
    fn upsert(&self, entity: Entity, rows: &[Row]) -> Result<usize>;

    /// Mark every row of a reconciled entity as not yet seen
    ///
    /// Returns the number of rows reset.
    fn begin_generation(&self, entity: Entity) -> Result<usize>;

    /// Retire rows not seen since [`WarehouseStore::begin_generation`],
    /// according to the entity's [`Retention`](crate::models::Retention)
    ///
    /// Returns the number of rows deleted or newly flagged `_deleted`.
    fn finish_generation(&self, entity: Entity) -> Result<usize>;

    /// Count stored rows, including soft-deleted ones
    fn count_rows(&self, entity: Entity) -> Result<usize>;

    /// Get a row by key
    fn get_row(&self, entity: Entity, key: &RecordKey) -> Result<Option<StoredRow>>;

    /// List stored keys in ascending order
    fn list_keys(&self, entity: Entity) -> Result<Vec<RecordKey>>;

    /// Record the outcome of a sync run, replacing the previous one
    fn record_run(&self, run: &SyncRun) -> Result<()>;

    /// Last recorded run for an entity
    fn last_run(&self, entity: Entity) -> Result<Option<SyncRun>>;
}
