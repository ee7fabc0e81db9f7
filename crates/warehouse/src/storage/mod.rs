//! Storage traits and implementations
//!
//! The warehouse is reached only through [`WarehouseStore`], so the sync
//! engine runs the same against SQLite and the in-memory store.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryWarehouse;
pub use sqlite::SqliteWarehouse;
pub use traits::{StoredRow, WarehouseStore, stored_value, validate_row};
