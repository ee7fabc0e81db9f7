//! Sync engine for pulling reporting data into the warehouse
//!
//! Every write is an idempotent upsert, so any sync can be safely re-run.

mod engine;
mod import;
mod jobs;
mod reconcile;
mod watermark;

pub use engine::{SyncStats, run_sync, run_sync_until, sync_entity};
pub use import::{import_file, import_view_history};
pub use jobs::{Job, UnknownJobError, run_job};
pub use reconcile::{Generation, GenerationReport, GenerationState};
pub use watermark::watermark;
