// crates/growthwire-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Reading Store
// Description: Durable ReadingStore and DeviceRegistry backed by SQLite.
// Purpose: Persist status records and device registrations with point ops.
// Dependencies: growthwire-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements the durable [`ReadingStore`] and a SQLite-backed
//! [`DeviceRegistry`] sharing one database file. The store needs only point
//! operations (insert, lookup by id or dedup key, partial update, ordered
//! scan), so a single mutex-guarded connection is sufficient. Schema changes
//! are gated by a `store_meta` version row and fail closed on mismatch.
//! Security posture: database contents are untrusted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use growthwire_core::DeviceRecord;
use growthwire_core::DeviceRegistry;
use growthwire_core::DeviceUid;
use growthwire_core::NewStatusRecord;
use growthwire_core::PayloadEncoding;
use growthwire_core::PlainDedupKey;
use growthwire_core::ReadingId;
use growthwire_core::ReadingStore;
use growthwire_core::RegistryError;
use growthwire_core::StatusRecord;
use growthwire_core::StoreError;
use growthwire_core::StoredPayload;
use growthwire_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Column list shared by every record query.
const RECORD_COLUMNS: &str = "id, device_uid, payload_kind, cipher_encoding, ciphertext, \
                              age, height, status, created_at, recommendation";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` reading store.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
///
/// # Invariants
/// - Error messages avoid embedding record payloads.
#[derive(Debug, Error, Clone)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Invalid(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Invalid(message)
            }
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed reading store.
///
/// # Invariants
/// - Connection access is serialized through a mutex.
/// - Records are never deleted.
#[derive(Clone)]
pub struct SqliteReadingStore {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteReadingStore {
    /// Opens (or creates) the store at the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path is invalid, the database
    /// cannot be opened, or the stored schema version does not match.
    pub fn new(config: SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        if config.path.is_dir() {
            return Err(SqliteStoreError::Invalid(format!(
                "store path is a directory: {}",
                config.path.display()
            )));
        }
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Returns a device registry sharing this store's connection.
    #[must_use]
    pub fn device_registry(&self) -> SqliteDeviceRegistry {
        SqliteDeviceRegistry {
            connection: Arc::clone(&self.connection),
        }
    }

    /// Acquires the connection lock.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))
    }
}

/// Opens a connection and applies pragmas from the configuration.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let connection =
        Connection::open(&config.path).map_err(|err| SqliteStoreError::Io(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Creates or validates the schema, gated by the `store_meta` version row.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS status_records (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    device_uid TEXT,
                    payload_kind TEXT NOT NULL,
                    cipher_encoding TEXT,
                    ciphertext TEXT,
                    age INTEGER,
                    height REAL,
                    status TEXT,
                    created_at INTEGER NOT NULL,
                    recommendation TEXT
                );
                CREATE INDEX IF NOT EXISTS idx_status_records_dedup
                    ON status_records (device_uid, age, payload_kind);
                CREATE INDEX IF NOT EXISTS idx_status_records_created
                    ON status_records (created_at);
                CREATE TABLE IF NOT EXISTS devices (
                    uid TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    gender TEXT NOT NULL
                );",
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(found) if found == SCHEMA_VERSION => {}
        Some(found) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "found {found}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}

// ============================================================================
// SECTION: Row Mapping
// ============================================================================

/// Raw row image read before conversion into a [`StatusRecord`].
struct RawRecord {
    /// Rowid.
    id: i64,
    /// Device identifier column.
    device_uid: Option<String>,
    /// Payload kind label.
    payload_kind: String,
    /// Cipher encoding label.
    cipher_encoding: Option<String>,
    /// Ciphertext column.
    ciphertext: Option<String>,
    /// Plaintext age column.
    age: Option<i64>,
    /// Plaintext height column.
    height: Option<f64>,
    /// Plaintext status column.
    status: Option<String>,
    /// Creation timestamp (unix millis).
    created_at: i64,
    /// Recommendation column.
    recommendation: Option<String>,
}

/// Reads a raw record image from a query row.
fn read_raw(row: &Row<'_>) -> Result<RawRecord, rusqlite::Error> {
    Ok(RawRecord {
        id: row.get(0)?,
        device_uid: row.get(1)?,
        payload_kind: row.get(2)?,
        cipher_encoding: row.get(3)?,
        ciphertext: row.get(4)?,
        age: row.get(5)?,
        height: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
        recommendation: row.get(9)?,
    })
}

impl TryFrom<RawRecord> for StatusRecord {
    type Error = SqliteStoreError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let id = u64::try_from(raw.id)
            .ok()
            .and_then(ReadingId::from_raw)
            .ok_or_else(|| SqliteStoreError::Invalid(format!("invalid record id {}", raw.id)))?;
        let payload = match raw.payload_kind.as_str() {
            "plain" => {
                let age = raw
                    .age
                    .and_then(|age| u32::try_from(age).ok())
                    .ok_or_else(|| SqliteStoreError::Invalid("plain record without age".to_string()))?;
                let height = raw.height.ok_or_else(|| {
                    SqliteStoreError::Invalid("plain record without height".to_string())
                })?;
                let status = raw.status.ok_or_else(|| {
                    SqliteStoreError::Invalid("plain record without status".to_string())
                })?;
                StoredPayload::Plain {
                    age,
                    height,
                    status,
                }
            }
            "cipher" => {
                let encoding = raw
                    .cipher_encoding
                    .as_deref()
                    .and_then(PayloadEncoding::parse)
                    .ok_or_else(|| {
                        SqliteStoreError::Invalid("cipher record without encoding".to_string())
                    })?;
                let ciphertext = raw.ciphertext.ok_or_else(|| {
                    SqliteStoreError::Invalid("cipher record without ciphertext".to_string())
                })?;
                StoredPayload::Cipher {
                    encoding,
                    ciphertext,
                }
            }
            other => {
                return Err(SqliteStoreError::Invalid(format!("unknown payload kind {other}")));
            }
        };
        Ok(Self {
            id,
            device_uid: raw.device_uid.map(DeviceUid::new),
            payload,
            created_at: Timestamp::from_millis(raw.created_at),
            recommendation: raw.recommendation,
        })
    }
}

/// Converts a reading identifier into a rowid parameter.
fn rowid(id: ReadingId) -> Result<i64, SqliteStoreError> {
    i64::try_from(id.get())
        .map_err(|_| SqliteStoreError::Invalid(format!("record id out of range: {id}")))
}

// ============================================================================
// SECTION: ReadingStore Implementation
// ============================================================================

impl ReadingStore for SqliteReadingStore {
    fn create(&self, record: &NewStatusRecord) -> Result<ReadingId, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let inserted = match &record.payload {
            StoredPayload::Plain {
                age,
                height,
                status,
            } => connection.execute(
                "INSERT INTO status_records
                    (device_uid, payload_kind, age, height, status, created_at)
                 VALUES (?1, 'plain', ?2, ?3, ?4, ?5)",
                params![
                    record.device_uid.as_ref().map(DeviceUid::as_str),
                    i64::from(*age),
                    height,
                    status,
                    record.created_at.as_millis(),
                ],
            ),
            StoredPayload::Cipher {
                encoding,
                ciphertext,
            } => connection.execute(
                "INSERT INTO status_records
                    (device_uid, payload_kind, cipher_encoding, ciphertext, created_at)
                 VALUES (?1, 'cipher', ?2, ?3, ?4)",
                params![
                    record.device_uid.as_ref().map(DeviceUid::as_str),
                    encoding.as_str(),
                    ciphertext,
                    record.created_at.as_millis(),
                ],
            ),
        };
        inserted.map_err(|err| StoreError::Store(err.to_string()))?;
        u64::try_from(connection.last_insert_rowid())
            .ok()
            .and_then(ReadingId::from_raw)
            .ok_or_else(|| StoreError::Invalid("invalid inserted rowid".to_string()))
    }

    fn find_by_id(&self, id: ReadingId) -> Result<Option<StatusRecord>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let raw = connection
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM status_records WHERE id = ?1"),
                params![rowid(id).map_err(StoreError::from)?],
                read_raw,
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        raw.map(|raw| StatusRecord::try_from(raw).map_err(StoreError::from)).transpose()
    }

    fn find_plain_by_dedup(
        &self,
        key: &PlainDedupKey,
    ) -> Result<Option<StatusRecord>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let raw = connection
            .query_row(
                &format!(
                    "SELECT {RECORD_COLUMNS} FROM status_records
                     WHERE device_uid = ?1 AND age = ?2 AND payload_kind = 'plain'
                     ORDER BY created_at DESC, id DESC LIMIT 1"
                ),
                params![key.uid.as_str(), i64::from(key.age)],
                read_raw,
            )
            .optional()
            .map_err(|err| StoreError::Store(err.to_string()))?;
        raw.map(|raw| StatusRecord::try_from(raw).map_err(StoreError::from)).transpose()
    }

    fn update_plain_reading(
        &self,
        id: ReadingId,
        age: u32,
        height: f64,
        status: &str,
    ) -> Result<(), StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let updated = connection
            .execute(
                "UPDATE status_records SET age = ?1, height = ?2, status = ?3
                 WHERE id = ?4 AND payload_kind = 'plain'",
                params![i64::from(age), height, status, rowid(id).map_err(StoreError::from)?],
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn set_recommendation(&self, id: ReadingId, recommendation: &str) -> Result<(), StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let updated = connection
            .execute(
                "UPDATE status_records SET recommendation = ?1 WHERE id = ?2",
                params![recommendation, rowid(id).map_err(StoreError::from)?],
            )
            .map_err(|err| StoreError::Store(err.to_string()))?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<StatusRecord>, StoreError> {
        let connection = self.lock().map_err(StoreError::from)?;
        let mut statement = connection
            .prepare(&format!(
                "SELECT {RECORD_COLUMNS} FROM status_records ORDER BY created_at DESC, id DESC"
            ))
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let rows = statement
            .query_map(params![], read_raw)
            .map_err(|err| StoreError::Store(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(|err| StoreError::Store(err.to_string()))?;
            records.push(StatusRecord::try_from(raw).map_err(StoreError::from)?);
        }
        Ok(records)
    }
}

// ============================================================================
// SECTION: Device Registry
// ============================================================================

/// `SQLite`-backed device registry sharing the store's connection.
///
/// # Invariants
/// - Registrations are idempotent per device identifier.
#[derive(Clone)]
pub struct SqliteDeviceRegistry {
    /// Shared connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteDeviceRegistry {
    /// Registers a device, replacing any previous registration.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the write fails.
    pub fn register(&self, device: &DeviceRecord) -> Result<(), SqliteStoreError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| SqliteStoreError::Db("connection mutex poisoned".to_string()))?;
        connection
            .execute(
                "INSERT OR REPLACE INTO devices (uid, name, gender) VALUES (?1, ?2, ?3)",
                params![device.uid.as_str(), device.name, device.gender],
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        Ok(())
    }
}

impl DeviceRegistry for SqliteDeviceRegistry {
    fn find(&self, uid: &DeviceUid) -> Result<Option<DeviceRecord>, RegistryError> {
        let connection = self
            .connection
            .lock()
            .map_err(|_| RegistryError::Registry("connection mutex poisoned".to_string()))?;
        connection
            .query_row(
                "SELECT uid, name, gender FROM devices WHERE uid = ?1",
                params![uid.as_str()],
                |row| {
                    Ok(DeviceRecord {
                        uid: DeviceUid::new(row.get::<_, String>(0)?),
                        name: row.get(1)?,
                        gender: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(|err| RegistryError::Registry(err.to_string()))
    }
}
