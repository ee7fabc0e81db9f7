//! In-memory warehouse
//!
//! Used by tests. Behaves like the SQLite store: values are
//! kept in their stored form and generation flags follow the same rules.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use super::traits::{StoredRow, WarehouseStore, stored_value, validate_row};
use crate::models::timestamp::parse_timestamp;
use crate::models::{Entity, FieldValue, RecordKey, Retention, Row, SyncRun};

/// In-memory implementation of [`WarehouseStore`]
///
/// One ordered map per entity table, protected by a single `RwLock` so a
/// batch is applied atomically.
pub struct InMemoryWarehouse {
    tables: RwLock<HashMap<Entity, BTreeMap<RecordKey, StoredRow>>>,
    runs: RwLock<HashMap<Entity, SyncRun>>,
}

impl InMemoryWarehouse {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            runs: RwLock::new(HashMap::new()),
        }
    }

    fn reconciled(entity: Entity) -> Result<Retention> {
        entity
            .retention()
            .ok_or_else(|| anyhow!("{} is not reconciled by sync generation", entity))
    }
}

impl Default for InMemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("In-memory warehouse lock poisoned")
}

impl WarehouseStore for InMemoryWarehouse {
    fn max_modified_at(&self, entity: Entity) -> Result<Option<DateTime<Utc>>> {
        let Some(index) = entity.column_index("modified_at") else {
            return Ok(None);
        };
        let tables = self.tables.read().map_err(poisoned)?;
        let Some(table) = tables.get(&entity) else {
            return Ok(None);
        };

        // Stored timestamps are fixed-width, so text order is time order
        let max = table
            .values()
            .filter_map(|row| match row.values.get(index) {
                Some(FieldValue::Text(s)) => Some(s.as_str()),
                _ => None,
            })
            .max();

        max.map(|raw| {
            parse_timestamp(raw).ok_or_else(|| anyhow!("Invalid stored modified_at: {:?}", raw))
        })
        .transpose()
    }

    fn upsert(&self, entity: Entity, rows: &[Row]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            validate_row(entity, row)?;
        }

        let retention = entity.retention();
        let mut tables = self.tables.write().map_err(poisoned)?;
        let table = tables.entry(entity).or_default();

        for row in rows {
            table.insert(
                row.key.clone(),
                StoredRow {
                    values: row.values.iter().map(stored_value).collect(),
                    synced: retention.map(|_| true),
                    deleted: false,
                },
            );
        }

        Ok(rows.len())
    }

    fn begin_generation(&self, entity: Entity) -> Result<usize> {
        Self::reconciled(entity)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Some(table) = tables.get_mut(&entity) else {
            return Ok(0);
        };

        let mut reset = 0;
        for row in table.values_mut() {
            if row.synced != Some(false) {
                row.synced = Some(false);
                reset += 1;
            }
        }
        Ok(reset)
    }

    fn finish_generation(&self, entity: Entity) -> Result<usize> {
        let retention = Self::reconciled(entity)?;
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Some(table) = tables.get_mut(&entity) else {
            return Ok(0);
        };

        let retired = match retention {
            Retention::Delete => {
                let before = table.len();
                table.retain(|_, row| row.synced != Some(false));
                before - table.len()
            }
            Retention::SoftDelete => {
                let mut flagged = 0;
                for row in table.values_mut() {
                    if row.synced == Some(false) && !row.deleted {
                        row.deleted = true;
                        flagged += 1;
                    }
                }
                flagged
            }
        };
        Ok(retired)
    }

    fn count_rows(&self, entity: Entity) -> Result<usize> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.get(&entity).map_or(0, BTreeMap::len))
    }

    fn get_row(&self, entity: Entity, key: &RecordKey) -> Result<Option<StoredRow>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables.get(&entity).and_then(|t| t.get(key)).cloned())
    }

    fn list_keys(&self, entity: Entity) -> Result<Vec<RecordKey>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(&entity)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn record_run(&self, run: &SyncRun) -> Result<()> {
        self.runs
            .write()
            .map_err(poisoned)?
            .insert(run.entity, run.clone());
        Ok(())
    }

    fn last_run(&self, entity: Entity) -> Result<Option<SyncRun>> {
        Ok(self.runs.read().map_err(poisoned)?.get(&entity).cloned())
    }
}
