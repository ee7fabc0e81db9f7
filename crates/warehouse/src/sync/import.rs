//! One-off loading of saved API responses
//!
//! A file holding the JSON array returned by a reporting endpoint can be
//! loaded straight into the warehouse, with the same decoding and upsert
//! rules as a live sync.

use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::path::Path;

use crate::models::{Entity, decode_rows};
use crate::storage::WarehouseStore;

/// Load a saved content view history response
pub fn import_view_history(store: &dyn WarehouseStore, path: &Path) -> Result<usize> {
    import_file(store, Entity::ContentViewHistory, path)
}

/// Load a saved response for a watermarked entity as one atomic batch
pub fn import_file(store: &dyn WarehouseStore, entity: Entity, path: &Path) -> Result<usize> {
    if !entity.is_watermarked() {
        bail!("{} can only be loaded by a full sync", entity);
    }

    let values: Vec<Value> = config::load_json_file(path)?;
    let rows = decode_rows(entity, values)
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    log::info!("Saving {} {} records from {}", rows.len(), entity, path.display());
    store
        .upsert(entity, &rows)
        .with_context(|| format!("Failed to save {} from {}", entity, path.display()))
}
