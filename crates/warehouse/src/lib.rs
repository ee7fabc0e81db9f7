//! Warehouse crate - incremental sync of reporting data into a warehouse
//!
//! This crate provides:
//! - Entity descriptors and typed source records
//! - Reporting / SCIM API client with delegated-access tokens
//! - Storage trait with SQLite and in-memory implementations
//! - Watermark-driven windowed sync and generation-based reconciliation
//! - Schedulable jobs grouping entities the way they are run

pub mod config;
pub mod models;
pub mod source;
pub mod storage;
pub mod sync;

pub use self::config::{Endpoints, RepeatInterval, SourceCredentials, database_path, repeat_enabled};
pub use models::{
    Entity, FetchStrategy, FieldValue, Record, RecordKey, Retention, Row, RunStatus, SyncRun,
    SyncWindow, UnknownEntityError, decode_rows, windows,
};
pub use source::{CredentialProvider, RecordSource, ReportingClient, SourceError};
pub use storage::{InMemoryWarehouse, SqliteWarehouse, StoredRow, WarehouseStore};
pub use sync::{
    Generation, GenerationReport, GenerationState, Job, SyncStats, UnknownJobError,
    import_view_history, run_job, run_sync, run_sync_until, sync_entity, watermark,
};
