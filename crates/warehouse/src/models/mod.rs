//! Domain models for synced entities

mod entity;
pub mod records;
mod row;
mod sync_run;
pub mod timestamp;
mod window;

pub use entity::{Entity, FetchStrategy, Retention, UnknownEntityError};
pub use records::decode_rows;
pub use row::{FieldValue, Record, RecordKey, Row};
pub use sync_run::{RunStatus, SyncRun};
pub use window::{SyncWindow, windows};
