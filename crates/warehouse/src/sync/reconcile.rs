//! Reconciliation by sync generation
//!
//! Full-snapshot entities cannot be synced incrementally: a record that
//! disappears from the source never shows up in a "modified since" query.
//! Instead every scan is a generation:
//!
//! 1. [`Generation::begin`] marks all stored rows as unseen (`_synced = 0`)
//! 2. [`Generation::upsert`] writes scanned rows, marking them seen
//! 3. [`Generation::finish`] retires rows still unseen, by deleting them or
//!    flagging them `_deleted`, per the entity's retention
//!
//! A generation that fails before `finish` retires nothing; the next one
//! starts again from step 1.

use anyhow::{Context, Result, bail};

use crate::models::{Entity, Row};
use crate::storage::WarehouseStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    InProgress,
    Complete,
}

/// Outcome of a completed generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationReport {
    pub entity: Entity,
    /// Rows written during the scan
    pub upserted: usize,
    /// Rows deleted or flagged because the scan did not see them
    pub retired: usize,
}

/// One full scan of a reconciled entity
pub struct Generation<'a> {
    store: &'a dyn WarehouseStore,
    entity: Entity,
    state: GenerationState,
    upserted: usize,
}

impl<'a> Generation<'a> {
    /// Start a generation, marking every stored row as unseen
    pub fn begin(store: &'a dyn WarehouseStore, entity: Entity) -> Result<Self> {
        let reset = store
            .begin_generation(entity)
            .with_context(|| format!("Failed to begin sync generation for {}", entity))?;
        log::debug!("Marked {} stored {} rows unseen", reset, entity.name());

        Ok(Self {
            store,
            entity,
            state: GenerationState::InProgress,
            upserted: 0,
        })
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Write one batch of scanned rows
    pub fn upsert(&mut self, rows: &[Row]) -> Result<usize> {
        if self.state == GenerationState::Complete {
            bail!("Sync generation for {} is already complete", self.entity);
        }
        let written = self.store.upsert(self.entity, rows)?;
        self.upserted += written;
        Ok(written)
    }

    /// Complete the scan and retire rows it did not see
    pub fn finish(&mut self) -> Result<GenerationReport> {
        if self.state == GenerationState::Complete {
            bail!("Sync generation for {} is already complete", self.entity);
        }
        let retired = self
            .store
            .finish_generation(self.entity)
            .with_context(|| format!("Failed to finish sync generation for {}", self.entity))?;
        self.state = GenerationState::Complete;

        Ok(GenerationReport {
            entity: self.entity,
            upserted: self.upserted,
            retired,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, RecordKey};
    use crate::storage::{InMemoryWarehouse, SqliteWarehouse};

    fn scim_row(id: &str) -> Row {
        let entity = Entity::ScimUsers;
        let mut values = vec![FieldValue::Null; entity.columns().len()];
        values[0] = id.into();
        Row::new(RecordKey::single(id), values)
    }

    fn assignment_row(user: &str) -> Row {
        let entity = Entity::UserPropertyAssignments;
        let mut values = vec![FieldValue::Null; entity.columns().len()];
        values[0] = user.into();
        values[1] = "region".into();
        Row::new(RecordKey::composite([user, "region"]), values)
    }

    fn check_reconciles(store: &dyn WarehouseStore) {
        let entity = Entity::UserPropertyAssignments;
        let scan = |keys: &[&str]| -> Vec<Row> { keys.iter().map(|k| assignment_row(k)).collect() };

        let mut first = Generation::begin(store, entity).unwrap();
        first.upsert(&scan(&["A", "B", "C"])).unwrap();
        first.finish().unwrap();

        let mut second = Generation::begin(store, entity).unwrap();
        second.upsert(&scan(&["A"])).unwrap();
        second.upsert(&scan(&["C"])).unwrap();
        let report = second.finish().unwrap();

        assert_eq!(report.upserted, 2);
        assert_eq!(report.retired, 1);
        assert_eq!(
            store.list_keys(entity).unwrap(),
            vec![
                RecordKey::composite(["A", "region"]),
                RecordKey::composite(["C", "region"]),
            ]
        );
    }

    #[test]
    fn test_reconciles_in_memory() {
        check_reconciles(&InMemoryWarehouse::new());
    }

    #[test]
    fn test_reconciles_sqlite() {
        check_reconciles(&SqliteWarehouse::open_in_memory().unwrap());
    }

    #[test]
    fn test_soft_delete_keeps_rows() {
        let store = InMemoryWarehouse::new();
        let entity = Entity::ScimUsers;

        let mut first = Generation::begin(&store, entity).unwrap();
        first.upsert(&[scim_row("A"), scim_row("B"), scim_row("C")]).unwrap();
        first.finish().unwrap();

        let mut second = Generation::begin(&store, entity).unwrap();
        second.upsert(&[scim_row("A"), scim_row("C")]).unwrap();
        assert_eq!(second.finish().unwrap().retired, 1);

        let b = store.get_row(entity, &"B".into()).unwrap().unwrap();
        assert!(b.deleted);
        assert_eq!(b.synced, Some(false));
        assert!(!store.get_row(entity, &"A".into()).unwrap().unwrap().deleted);
    }

    #[test]
    fn test_state_transitions() {
        let store = InMemoryWarehouse::new();
        let mut generation = Generation::begin(&store, Entity::ScimUsers).unwrap();
        assert_eq!(generation.state(), GenerationState::InProgress);

        generation.finish().unwrap();
        assert_eq!(generation.state(), GenerationState::Complete);
        assert!(generation.upsert(&[scim_row("A")]).is_err());
        assert!(generation.finish().is_err());
    }

    #[test]
    fn test_abandoned_generation_retires_nothing() {
        let store = InMemoryWarehouse::new();
        let entity = Entity::UserPropertyAssignments;

        let mut first = Generation::begin(&store, entity).unwrap();
        first.upsert(&[assignment_row("A"), assignment_row("B")]).unwrap();
        first.finish().unwrap();

        // Scan dies after seeing only A
        let mut partial = Generation::begin(&store, entity).unwrap();
        partial.upsert(&[assignment_row("A")]).unwrap();
        drop(partial);

        assert_eq!(store.count_rows(entity).unwrap(), 2);

        let mut retry = Generation::begin(&store, entity).unwrap();
        retry.upsert(&[assignment_row("A"), assignment_row("B")]).unwrap();
        assert_eq!(retry.finish().unwrap().retired, 0);
    }

    #[test]
    fn test_watermarked_entity_rejected() {
        let store = InMemoryWarehouse::new();
        assert!(Generation::begin(&store, Entity::Users).is_err());
    }
}
