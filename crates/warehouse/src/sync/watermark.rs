//! Watermark tracking
//!
//! The watermark of an entity is the greatest `modified_at` among its
//! stored rows. It is derived, never stored, so it can only move once a
//! window's rows are committed.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};

use crate::models::Entity;
use crate::storage::WarehouseStore;

/// Current watermark of `entity`: its greatest stored `modified_at`, or the
/// entity's epoch when nothing is stored yet
pub fn watermark(store: &dyn WarehouseStore, entity: Entity) -> Result<DateTime<Utc>> {
    let epoch = entity
        .epoch()
        .ok_or_else(|| anyhow!("{} is not synced from a watermark", entity))?;

    let stored = store
        .max_modified_at(entity)
        .with_context(|| format!("Failed to read watermark of {}", entity))?;

    Ok(stored.unwrap_or(epoch))
}
