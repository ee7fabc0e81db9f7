//! SQLite-backed warehouse

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Utc};
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use rusqlite_migration::{M, Migrations};

use super::traits::{StoredRow, WarehouseStore, validate_row};
use crate::models::timestamp::{self, parse_timestamp};
use crate::models::{Entity, FieldValue, RecordKey, Retention, Row, RunStatus, SyncRun};

/// Database migrations
///
/// Applied in order; the user_version pragma tracks which have run.
fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        // Migration 1: Reporting tables
        M::up(
            r#"
            CREATE TABLE content_usage_history (
                id TEXT PRIMARY KEY,
                action TEXT,
                action_type TEXT,
                application TEXT,
                content_id TEXT,
                content_version_id TEXT,
                content_profile_id TEXT,
                content_profile_name TEXT,
                context_id TEXT,
                context_name TEXT,
                context_type TEXT,
                context_system_type TEXT,
                instance_name TEXT,
                is_bound_delivery INTEGER,
                library_content_id TEXT,
                library_content_version_id TEXT,
                livesend_link_content_id TEXT,
                livesend_link_id TEXT,
                occurred_at TEXT,
                product_area TEXT,
                total_pages INTEGER,
                user_id TEXT,
                user_username TEXT,
                workspace_content_id TEXT,
                workspace_content_version_id TEXT,
                modified_at TEXT NOT NULL,
                interaction_id TEXT
            );

            CREATE INDEX idx_content_usage_history_modified_at
                ON content_usage_history(modified_at);

            CREATE TABLE content_view_history (
                id TEXT PRIMARY KEY,
                action TEXT,
                application TEXT,
                content_id TEXT,
                content_version_id TEXT,
                content_profile_id TEXT,
                content_profile_name TEXT,
                context_id TEXT,
                context_name TEXT,
                context_type TEXT,
                context_system_type TEXT,
                instance_name TEXT,
                library_content_id TEXT,
                library_content_version_id TEXT,
                occurred_at TEXT,
                product_area TEXT,
                user_id TEXT,
                user_username TEXT,
                workspace_content_id TEXT,
                workspace_content_version_id TEXT,
                modified_at TEXT NOT NULL
            );

            CREATE INDEX idx_content_view_history_modified_at
                ON content_view_history(modified_at);

            CREATE TABLE library_content_versions (
                id TEXT PRIMARY KEY,
                created_at TEXT,
                created_by TEXT,
                created_by_username TEXT,
                expires_at TEXT,
                is_deleted INTEGER,
                is_published INTEGER,
                library_content_id TEXT,
                modified_at TEXT NOT NULL,
                name TEXT,
                preview_image_id TEXT,
                preview_image_url TEXT,
                thumbnail_image_id TEXT,
                thumbnail_image_url TEXT,
                size INTEGER,
                version TEXT,
                teamsite_id TEXT
            );

            CREATE INDEX idx_library_content_versions_modified_at
                ON library_content_versions(modified_at);

            CREATE TABLE library_contents (
                id TEXT PRIMARY KEY,
                name TEXT,
                version TEXT,
                created_at TEXT,
                modified_at TEXT NOT NULL,
                type TEXT,
                format TEXT,
                is_checked_out INTEGER,
                is_deleted INTEGER,
                is_published INTEGER,
                published_version_expires_at TEXT,
                latest_library_content_version_created_at TEXT,
                latest_library_content_version_created_by TEXT,
                latest_library_content_version_created_by_username TEXT,
                latest_library_content_version_id TEXT,
                latest_library_content_version_size INTEGER,
                library_url TEXT,
                doc_center_url TEXT,
                news_center_url TEXT,
                owner_id TEXT,
                owner_username TEXT,
                owner_email TEXT,
                teamsite_id TEXT,
                teamsite_name TEXT,
                preview_image_id TEXT,
                preview_image_url TEXT,
                thumbnail_image_id TEXT,
                thumbnail_image_url TEXT,
                description TEXT,
                short_id TEXT,
                parent_folder_library_content_id TEXT,
                library_path TEXT,
                has_planner_associations INTEGER,
                origin_type TEXT,
                last_modified TEXT
            );

            CREATE INDEX idx_library_contents_modified_at
                ON library_contents(modified_at);

            CREATE TABLE search_history (
                id TEXT PRIMARY KEY,
                occurred_at TEXT,
                active_scope TEXT,
                application TEXT,
                result_count INTEGER,
                result_count_content_manager INTEGER,
                result_count_control_center INTEGER,
                result_count_doc_center INTEGER,
                result_count_news_center INTEGER,
                result_count_workspace INTEGER,
                search_cycle_id TEXT,
                search_term_normalized TEXT,
                search_term_raw TEXT,
                search_type TEXT,
                sort_by TEXT,
                user_id TEXT,
                modified_at TEXT NOT NULL,
                step_index INTEGER,
                step_type TEXT,
                was_clicked INTEGER,
                facet_values TEXT
            );

            CREATE INDEX idx_search_history_modified_at
                ON search_history(modified_at);

            CREATE TABLE users (
                id TEXT PRIMARY KEY,
                created_at TEXT,
                default_content_profile_id TEXT,
                default_content_profile_name TEXT,
                deleted_at TEXT,
                email TEXT,
                email_domain TEXT,
                first_name TEXT,
                full_name TEXT,
                is_deleted INTEGER,
                is_lessonly_enabled INTEGER,
                is_seismic_employee INTEGER,
                is_seismic_enabled INTEGER,
                is_system_admin INTEGER,
                last_name TEXT,
                license_type TEXT,
                modified_at TEXT NOT NULL,
                organization TEXT,
                sso_user_id TEXT,
                title TEXT,
                username TEXT,
                is_locked INTEGER,
                address TEXT,
                phone_number TEXT,
                latest_activity_date TEXT,
                external_id TEXT
            );

            CREATE INDEX idx_users_modified_at ON users(modified_at);

            -- Full snapshot, reconciled by sync generation (hard delete)
            CREATE TABLE user_property_assignments (
                user_id TEXT NOT NULL,
                user_property_id TEXT NOT NULL,
                modified_at TEXT,
                user_property_name TEXT,
                user_property_type TEXT,
                user_property_value TEXT,
                user_property_value_boolean INTEGER,
                user_property_value_datetime TEXT,
                user_property_value_float REAL,
                user_property_value_integer INTEGER,
                _synced INTEGER,
                PRIMARY KEY (user_id, user_property_id)
            );

            CREATE TABLE workspace_content_versions (
                id TEXT PRIMARY KEY,
                created_at TEXT,
                created_by TEXT,
                format TEXT,
                library_content_version_id TEXT,
                name TEXT,
                preview_image_id TEXT,
                preview_image_url TEXT,
                thumbnail_image_id TEXT,
                thumbnail_image_url TEXT,
                size INTEGER,
                version TEXT,
                version_creation_method TEXT,
                workspace_content_id TEXT,
                modified_at TEXT NOT NULL
            );

            CREATE INDEX idx_workspace_content_versions_modified_at
                ON workspace_content_versions(modified_at);

            CREATE TABLE workspace_contents (
                id TEXT PRIMARY KEY,
                created_at TEXT,
                created_by TEXT,
                is_cart_content INTEGER,
                is_contextual_folder_content INTEGER,
                is_deleted INTEGER,
                latest_workspace_content_version_created_at TEXT,
                latest_workspace_content_version_id TEXT,
                latest_workspace_content_version_size INTEGER,
                origin_content_profile_id TEXT,
                library_content_id TEXT,
                materialized_path TEXT,
                modified_at TEXT NOT NULL,
                name TEXT,
                preview_image_id TEXT,
                preview_image_url TEXT,
                thumbnail_image_id TEXT,
                thumbnail_image_url TEXT,
                version TEXT,
                context_id TEXT,
                context_name TEXT,
                context_type TEXT,
                context_system_type TEXT,
                origin_application TEXT
            );

            CREATE INDEX idx_workspace_contents_modified_at
                ON workspace_contents(modified_at);
            "#,
        ),
        // Migration 2: SCIM directory (full snapshot, soft delete)
        M::up(
            r#"
            CREATE TABLE scim_users (
                id TEXT PRIMARY KEY,
                user_name TEXT,
                display_name TEXT,
                given_name TEXT,
                family_name TEXT,
                email TEXT,
                active INTEGER,
                title TEXT,
                employee_number TEXT,
                department TEXT,
                organization TEXT,
                manager_id TEXT,
                created_at TEXT,
                modified_at TEXT,
                extended_properties TEXT,
                _synced INTEGER,
                _deleted INTEGER NOT NULL DEFAULT 0
            );
            "#,
        ),
        // Migration 3: Last run per entity
        M::up(
            r#"
            CREATE TABLE sync_runs (
                entity TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                status TEXT NOT NULL,
                committed_through TEXT,
                records INTEGER NOT NULL DEFAULT 0,
                error TEXT
            );
            "#,
        ),
    ])
}

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            FieldValue::Null => ToSqlOutput::Owned(Value::Null),
            FieldValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            FieldValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            FieldValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            FieldValue::Bool(b) => ToSqlOutput::Owned(Value::Integer(i64::from(*b))),
            FieldValue::Timestamp(dt) => {
                ToSqlOutput::Owned(Value::Text(timestamp::format_storage(dt)))
            }
        })
    }
}

fn field_value(value: ValueRef<'_>) -> FieldValue {
    match value {
        ValueRef::Null => FieldValue::Null,
        ValueRef::Integer(i) => FieldValue::Integer(i),
        ValueRef::Real(f) => FieldValue::Real(f),
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            FieldValue::Text(String::from_utf8_lossy(t).into_owned())
        }
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

fn column_list(columns: &[&str]) -> String {
    columns.iter().map(|c| quote(c)).collect::<Vec<_>>().join(", ")
}

fn key_filter(entity: Entity) -> String {
    entity
        .key_columns()
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{} = ?{}", quote(c), i + 1))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// `INSERT ... ON CONFLICT(key) DO UPDATE` for every non-key column
///
/// Reconciled tables also mark the row as seen in the current generation
/// (and no longer deleted) on both paths.
fn upsert_sql(entity: Entity) -> String {
    let columns = entity.columns();
    let keys = entity.key_columns();
    let retention = entity.retention();

    let mut insert_columns = column_list(columns);
    let mut placeholders = (1..=columns.len())
        .map(|i| format!("?{}", i))
        .collect::<Vec<_>>()
        .join(", ");

    let mut updates: Vec<String> = columns
        .iter()
        .filter(|c| !keys.contains(c))
        .map(|c| format!("{0} = excluded.{0}", quote(c)))
        .collect();

    if retention.is_some() {
        insert_columns.push_str(", \"_synced\"");
        placeholders.push_str(", 1");
        updates.push("\"_synced\" = 1".to_string());
    }
    if retention == Some(Retention::SoftDelete) {
        insert_columns.push_str(", \"_deleted\"");
        placeholders.push_str(", 0");
        updates.push("\"_deleted\" = 0".to_string());
    }

    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {}",
        quote(entity.table()),
        insert_columns,
        placeholders,
        column_list(keys),
        conflict
    )
}

fn parse_stored_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>> {
    parse_timestamp(raw).ok_or_else(|| anyhow!("Invalid stored {} timestamp: {:?}", what, raw))
}

/// SQLite-backed warehouse
pub struct SqliteWarehouse {
    conn: Mutex<Connection>,
}

impl SqliteWarehouse {
    /// Open (or create) the warehouse at `db_path` and bring its schema up
    /// to date
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open database at {:?}", db_path))?;

        // WAL keeps readers (status queries) unblocked while a job writes
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = -64000;
            PRAGMA temp_store = MEMORY;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;

        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        migrations()
            .to_latest(&mut conn)
            .context("Failed to run database migrations")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Warehouse connection lock poisoned"))
    }

    fn ensure_reconciled(entity: Entity) -> Result<Retention> {
        entity
            .retention()
            .ok_or_else(|| anyhow!("{} is not reconciled by sync generation", entity))
    }
}

impl WarehouseStore for SqliteWarehouse {
    fn max_modified_at(&self, entity: Entity) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let max: Option<String> = conn
            .query_row(
                &format!("SELECT MAX(modified_at) FROM {}", quote(entity.table())),
                [],
                |row| row.get(0),
            )
            .with_context(|| format!("Failed to read max modified_at of {}", entity))?;

        max.map(|raw| parse_stored_timestamp(&raw, "modified_at"))
            .transpose()
    }

    fn upsert(&self, entity: Entity, rows: &[Row]) -> Result<usize> {
        if rows.is_empty() {
            return Ok(0);
        }
        for row in rows {
            validate_row(entity, row)?;
        }

        let sql = upsert_sql(entity);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx
                .prepare_cached(&sql)
                .with_context(|| format!("Failed to prepare upsert for {}", entity))?;
            for row in rows {
                stmt.execute(params_from_iter(row.values.iter()))
                    .with_context(|| format!("Failed to upsert {} row {}", entity, row.key))?;
            }
        }
        tx.commit()
            .with_context(|| format!("Failed to commit {} batch", entity))?;

        Ok(rows.len())
    }

    fn begin_generation(&self, entity: Entity) -> Result<usize> {
        Self::ensure_reconciled(entity)?;
        let conn = self.conn()?;
        let reset = conn.execute(
            &format!(
                "UPDATE {} SET _synced = 0 WHERE _synced IS NULL OR _synced = 1",
                quote(entity.table())
            ),
            [],
        )?;
        Ok(reset)
    }

    fn finish_generation(&self, entity: Entity) -> Result<usize> {
        let retention = Self::ensure_reconciled(entity)?;
        let table = quote(entity.table());
        let conn = self.conn()?;

        let retired = match retention {
            Retention::Delete => {
                conn.execute(&format!("DELETE FROM {} WHERE _synced = 0", table), [])?
            }
            Retention::SoftDelete => conn.execute(
                &format!(
                    "UPDATE {} SET _deleted = 1 WHERE _synced = 0 AND _deleted = 0",
                    table
                ),
                [],
            )?,
        };
        Ok(retired)
    }

    fn count_rows(&self, entity: Entity) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote(entity.table())),
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    fn get_row(&self, entity: Entity, key: &RecordKey) -> Result<Option<StoredRow>> {
        let columns = entity.columns();
        let retention = entity.retention();

        let mut select = column_list(columns);
        if retention.is_some() {
            select.push_str(", \"_synced\"");
        }
        if retention == Some(Retention::SoftDelete) {
            select.push_str(", \"_deleted\"");
        }

        let sql = format!(
            "SELECT {} FROM {} WHERE {}",
            select,
            quote(entity.table()),
            key_filter(entity)
        );

        let conn = self.conn()?;
        let row = conn
            .query_row(&sql, params_from_iter(key.parts().iter()), |row| {
                let mut values = Vec::with_capacity(columns.len());
                for i in 0..columns.len() {
                    values.push(field_value(row.get_ref(i)?));
                }
                let synced = match retention {
                    Some(_) => row
                        .get::<_, Option<i64>>(columns.len())?
                        .map(|flag| flag != 0),
                    None => None,
                };
                let deleted = match retention {
                    Some(Retention::SoftDelete) => row.get::<_, i64>(columns.len() + 1)? != 0,
                    _ => false,
                };
                Ok(StoredRow {
                    values,
                    synced,
                    deleted,
                })
            })
            .optional()?;

        Ok(row)
    }

    fn list_keys(&self, entity: Entity) -> Result<Vec<RecordKey>> {
        let keys = column_list(entity.key_columns());
        let width = entity.key_columns().len();
        let sql = format!(
            "SELECT {0} FROM {1} ORDER BY {0}",
            keys,
            quote(entity.table())
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let keys = stmt
            .query_map([], |row| {
                (0..width)
                    .map(|i| row.get::<_, String>(i))
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map(RecordKey)
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(keys)
    }

    fn record_run(&self, run: &SyncRun) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sync_runs
             (entity, started_at, finished_at, status, committed_through, records, error)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(entity) DO UPDATE SET
                started_at = excluded.started_at,
                finished_at = excluded.finished_at,
                status = excluded.status,
                committed_through = excluded.committed_through,
                records = excluded.records,
                error = excluded.error",
            params![
                run.entity.name(),
                timestamp::format_storage(&run.started_at),
                timestamp::format_storage(&run.finished_at),
                run.status.as_str(),
                run.committed_through.as_ref().map(timestamp::format_storage),
                run.records as i64,
                run.error,
            ],
        )
        .with_context(|| format!("Failed to record sync run for {}", run.entity))?;

        Ok(())
    }

    fn last_run(&self, entity: Entity) -> Result<Option<SyncRun>> {
        let conn = self.conn()?;
        let row: Option<(String, String, String, Option<String>, i64, Option<String>)> = conn
            .query_row(
                "SELECT started_at, finished_at, status, committed_through, records, error
                 FROM sync_runs WHERE entity = ?",
                [entity.name()],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                    ))
                },
            )
            .optional()?;

        let Some((started_at, finished_at, status, committed_through, records, error)) = row
        else {
            return Ok(None);
        };

        let Some(status) = RunStatus::parse(&status) else {
            bail!("Unknown sync run status {:?} for {}", status, entity);
        };

        Ok(Some(SyncRun {
            entity,
            started_at: parse_stored_timestamp(&started_at, "started_at")?,
            finished_at: parse_stored_timestamp(&finished_at, "finished_at")?,
            status,
            committed_through: committed_through
                .map(|raw| parse_stored_timestamp(&raw, "committed_through"))
                .transpose()?,
            records: records as usize,
            error,
        }))
    }
}
