use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};
use validator::Validate;

use crate::error::{DronitorError, Result};
use crate::models::{DateFilter, NewReading, Reading};
use crate::store::{AppendReceipt, ReadingStore};
use crate::utils::constants::SQLITE_BUSY_TIMEOUT_MS;

const SCHEMA_VERSION: i64 = 1;

const INSERT_READING: &str = "INSERT INTO readings (longitude, latitude, aqi, recorded_at, raw_data)
     VALUES (?1, ?2, ?3, ?4, ?5)";

const SELECT_READINGS: &str =
    "SELECT id, longitude, latitude, aqi, recorded_at, raw_data FROM readings";

/// SQLite-backed [`ReadingStore`].
///
/// `recorded_at` is stored as microseconds since the Unix epoch so date
/// filters become integer range scans over `idx_readings_recorded_at`.
pub struct SqliteStore {
    connection: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DronitorError::StoreUnavailable(format!(
                        "cannot create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        let mut connection = Connection::open_with_flags(path, flags)?;
        connection.execute_batch("PRAGMA journal_mode = WAL;")?;
        connection.busy_timeout(Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS))?;
        initialize_schema(&mut connection)?;

        info!("Opened reading store at {}", path.display());

        Ok(Self {
            connection: Mutex::new(connection),
            path: Some(path.to_path_buf()),
        })
    }

    /// Ephemeral store, gone when dropped.
    pub fn open_in_memory() -> Result<Self> {
        let mut connection = Connection::open_in_memory()?;
        initialize_schema(&mut connection)?;

        Ok(Self {
            connection: Mutex::new(connection),
            path: None,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append with an explicit ingestion timestamp instead of the clock.
    pub fn append_at(
        &self,
        batch: &[NewReading],
        recorded_at: DateTime<Utc>,
    ) -> Result<AppendReceipt> {
        let mut connection = self.lock()?;
        insert_batch(&mut connection, batch, recorded_at)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| DronitorError::StoreUnavailable("connection mutex poisoned".to_string()))
    }
}

impl ReadingStore for SqliteStore {
    fn append(&self, batch: &[NewReading]) -> Result<AppendReceipt> {
        let mut connection = self.lock()?;
        // Taken under the lock so recorded_at never decreases as ids grow
        let recorded_at = Utc::now();
        insert_batch(&mut connection, batch, recorded_at)
    }

    fn query(&self, filter: &DateFilter) -> Result<Vec<Reading>> {
        let range = filter.range()?;
        let connection = self.lock()?;

        let readings = match range {
            None => {
                let mut stmt = connection.prepare_cached(&format!("{SELECT_READINGS} ORDER BY id"))?;
                let rows = stmt.query_map([], map_reading_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            Some(range) => {
                let mut stmt = connection.prepare_cached(&format!(
                    "{SELECT_READINGS} WHERE recorded_at >= ?1 AND recorded_at < ?2 ORDER BY id"
                ))?;
                let rows = stmt.query_map(
                    params![range.start.timestamp_micros(), range.end.timestamp_micros()],
                    map_reading_row,
                )?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };

        debug!("Query {} matched {} readings", filter, readings.len());
        Ok(readings)
    }

    fn count(&self) -> Result<u64> {
        let connection = self.lock()?;
        let count: i64 = connection.query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }
}

fn insert_batch(
    connection: &mut Connection,
    batch: &[NewReading],
    recorded_at: DateTime<Utc>,
) -> Result<AppendReceipt> {
    if batch.is_empty() {
        return Err(DronitorError::EmptyBatch);
    }

    // Stored at microsecond precision; report what was stored
    let recorded_at = recorded_at.trunc_subsecs(6);
    let recorded_micros = recorded_at.timestamp_micros();

    // Dropping the transaction on any early return rolls the batch back
    let tx = connection.transaction()?;
    let mut first_id = None;
    let mut last_id = 0;
    {
        let mut stmt = tx.prepare_cached(INSERT_READING)?;
        for reading in batch {
            reading.validate()?;
            stmt.execute(params![
                reading.longitude,
                reading.latitude,
                reading.aqi,
                recorded_micros,
                reading.raw_data,
            ])?;
            last_id = tx.last_insert_rowid();
            first_id.get_or_insert(last_id);
        }
    }
    tx.commit()?;

    let receipt = AppendReceipt {
        stored: batch.len(),
        first_id: first_id.unwrap_or(last_id),
        last_id,
        recorded_at,
    };
    debug!(
        "Committed {} readings (ids {}..={})",
        receipt.stored, receipt.first_id, receipt.last_id
    );
    Ok(receipt)
}

fn map_reading_row(row: &Row<'_>) -> rusqlite::Result<Reading> {
    let micros: i64 = row.get(4)?;
    let recorded_at = DateTime::<Utc>::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, micros))?;

    Ok(Reading {
        id: row.get(0)?,
        longitude: row.get(1)?,
        latitude: row.get(2)?,
        aqi: row.get(3)?,
        recorded_at,
        raw_data: row.get(5)?,
    })
}

fn initialize_schema(connection: &mut Connection) -> Result<()> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()?;

    match version {
        None => {
            tx.execute(
                "INSERT INTO store_meta (version) VALUES (?1)",
                params![SCHEMA_VERSION],
            )?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS readings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    longitude REAL NOT NULL CHECK (longitude BETWEEN -180.0 AND 180.0),
                    latitude REAL NOT NULL CHECK (latitude BETWEEN -90.0 AND 90.0),
                    aqi INTEGER NOT NULL CHECK (aqi >= 0),
                    recorded_at INTEGER NOT NULL,
                    raw_data TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_readings_recorded_at
                    ON readings (recorded_at);",
            )?;
            debug!("Initialized reading store schema v{}", SCHEMA_VERSION);
        }
        Some(SCHEMA_VERSION) => {}
        Some(other) => {
            return Err(DronitorError::StoreUnavailable(format!(
                "unsupported schema version {other} (expected {SCHEMA_VERSION})"
            )));
        }
    }

    tx.commit()?;
    Ok(())
}
