//! SQLite-backed record store.
//!
//! The ingestion pipeline only sees [`RecordStore`] and [`AtomicScope`]; the
//! rusqlite types stay behind this module.

use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, Transaction, params, params_from_iter};
use tracing::debug;

use crate::duration;
use crate::model::{BaseRecord, DetailRecord};
use crate::schema::{ALL_VARIANTS, DetailVariant};
use crate::util::now_utc_string;

pub const DB_SCHEMA_VERSION: &str = "0.1.0";

/// Writes the ingestion pipeline needs. Every call happens inside an
/// [`AtomicScope::atomic`] unit.
pub trait RecordStore {
    /// Deletes every base record uploaded under `file_name`, detail rows first.
    fn delete_base_records_by_file_name(&mut self, file_name: &str) -> Result<usize>;

    fn create_base_record(&mut self, record: &BaseRecord) -> Result<i64>;

    fn create_detail_record(&mut self, base_id: i64, detail: &DetailRecord) -> Result<i64>;
}

/// Transaction boundary: commit when `work` succeeds, roll back when it fails.
pub trait AtomicScope {
    fn atomic<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RecordStore) -> Result<T>;
}

pub struct SqliteStore {
    connection: Connection,
    rollback_only: bool,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        let connection = Connection::open(db_path)
            .with_context(|| format!("failed to open {}", db_path.display()))?;
        configure_connection(&connection)?;
        Self::from_connection(connection)
    }

    pub fn open_in_memory() -> Result<Self> {
        let connection =
            Connection::open_in_memory().context("failed to open in-memory database")?;
        Self::from_connection(connection)
    }

    fn from_connection(connection: Connection) -> Result<Self> {
        connection
            .pragma_update(None, "foreign_keys", "ON")
            .context("failed to enable foreign_keys")?;
        ensure_schema(&connection)?;
        Ok(Self {
            connection,
            rollback_only: false,
        })
    }

    /// Every unit of work is rolled back instead of committed.
    pub fn rollback_only(mut self, enabled: bool) -> Self {
        self.rollback_only = enabled;
        self
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl AtomicScope for SqliteStore {
    fn atomic<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&mut dyn RecordStore) -> Result<T>,
    {
        let mut tx = self
            .connection
            .transaction()
            .context("failed to begin transaction")?;

        // An early return drops `tx`, which rolls it back.
        let value = work(&mut tx)?;

        if self.rollback_only {
            tx.rollback().context("failed to roll back transaction")?;
        } else {
            tx.commit().context("failed to commit transaction")?;
        }
        Ok(value)
    }
}

impl RecordStore for Transaction<'_> {
    fn delete_base_records_by_file_name(&mut self, file_name: &str) -> Result<usize> {
        for variant in ALL_VARIANTS {
            let sql = format!(
                "DELETE FROM {} WHERE assessment_base_id IN (
                   SELECT id FROM assessment_base WHERE file_name = ?1
                 )",
                variant.table_name()
            );
            let deleted = self
                .execute(&sql, [file_name])
                .with_context(|| format!("failed to delete {} rows", variant.table_name()))?;
            if deleted > 0 {
                debug!(file = %file_name, table = variant.table_name(), deleted, "deleted detail rows");
            }
        }

        let deleted = self
            .execute(
                "DELETE FROM assessment_base WHERE file_name = ?1",
                [file_name],
            )
            .context("failed to delete assessment_base rows")?;
        Ok(deleted)
    }

    fn create_base_record(&mut self, record: &BaseRecord) -> Result<i64> {
        let additional_data = serde_json::to_string(&record.additional_data)
            .context("failed to serialize additional_data")?;

        self.execute(
            "
            INSERT INTO assessment_base(
              file_name, record_date, crew_group, name, work_certificate_number,
              vehicle_model, assessment_item, assessment_result, additional_data
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
            params![
                &record.file_name,
                record.record_date,
                &record.crew_group,
                &record.name,
                &record.work_certificate_number,
                &record.vehicle_model,
                &record.assessment_item,
                record.outcome.code(),
                additional_data,
            ],
        )
        .with_context(|| {
            format!(
                "failed to insert assessment_base row for {}",
                record.work_certificate_number
            )
        })?;

        Ok(self.last_insert_rowid())
    }

    fn create_detail_record(&mut self, base_id: i64, detail: &DetailRecord) -> Result<i64> {
        let fields = detail.variant.fields();
        let columns = fields
            .iter()
            .map(|field| field.column)
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = (2..=fields.len() + 1)
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {}(assessment_base_id, {columns}) VALUES(?1, {placeholders})",
            detail.variant.table_name()
        );

        let mut values: Vec<Option<i64>> = Vec::with_capacity(fields.len() + 1);
        values.push(Some(base_id));
        values.extend(
            (0..fields.len()).map(|index| {
                detail
                    .durations
                    .get(index)
                    .copied()
                    .flatten()
                    .and_then(duration::to_micros)
            }),
        );

        self.execute(&sql, params_from_iter(values.iter()))
            .with_context(|| {
                format!(
                    "failed to insert {} row for base {base_id}",
                    detail.variant.table_name()
                )
            })?;

        Ok(self.last_insert_rowid())
    }
}

fn configure_connection(connection: &Connection) -> Result<()> {
    connection
        .pragma_update(None, "journal_mode", "WAL")
        .context("failed to set journal_mode=WAL")?;
    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL")?;
    Ok(())
}

fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS metadata (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS assessment_base (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              file_name TEXT NOT NULL CHECK (length(file_name) <= 100),
              record_date TEXT,
              crew_group TEXT CHECK (crew_group IS NULL OR length(crew_group) <= 50),
              name TEXT CHECK (name IS NULL OR length(name) <= 100),
              work_certificate_number TEXT NOT NULL,
              vehicle_model TEXT CHECK (vehicle_model IS NULL OR length(vehicle_model) <= 20),
              assessment_item TEXT CHECK (assessment_item IS NULL OR length(assessment_item) <= 100),
              assessment_result INTEGER NOT NULL DEFAULT 0 CHECK (assessment_result BETWEEN 0 AND 3),
              additional_data TEXT NOT NULL DEFAULT '{}'
            );

            CREATE INDEX IF NOT EXISTS idx_assessment_base_file_name ON assessment_base(file_name);
            CREATE INDEX IF NOT EXISTS idx_assessment_base_model_item ON assessment_base(vehicle_model, assessment_item);
            CREATE INDEX IF NOT EXISTS idx_assessment_base_record_date ON assessment_base(record_date);
            ",
        )
        .context("failed to initialize assessment_base schema")?;

    for variant in ALL_VARIANTS {
        connection
            .execute_batch(&detail_table_ddl(variant))
            .with_context(|| format!("failed to initialize {}", variant.table_name()))?;
    }

    let now = now_utc_string();
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_schema_version', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [DB_SCHEMA_VERSION],
    )?;
    connection.execute(
        "INSERT INTO metadata(key, value) VALUES('db_updated_at', ?1)
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        [now],
    )?;

    Ok(())
}

fn detail_table_ddl(variant: DetailVariant) -> String {
    let duration_columns = variant
        .fields()
        .iter()
        .map(|field| format!("  {} INTEGER", field.column))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "
        CREATE TABLE IF NOT EXISTS {table} (
          id INTEGER PRIMARY KEY AUTOINCREMENT,
          assessment_base_id INTEGER NOT NULL UNIQUE
            REFERENCES assessment_base(id) ON DELETE CASCADE,
        {duration_columns}
        );
        ",
        table = variant.table_name(),
    )
}
