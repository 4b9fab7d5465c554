//! Storage layer for carnet.
//!
//! This module provides `SQLite`-based persistent storage for vehicles,
//! documents, notification settings, the reminder ledger and the local
//! notification outbox.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Document, Vehicle, VehicleType};
use crate::notifier::Notification;
use crate::scheduler::{DocumentRepository, ReminderEntry, ReminderStore};
use crate::settings::{SettingsBackend, StoredSettings};

/// Metadata key holding the last day the expiring-today digest was sent.
const DIGEST_DAY_KEY: &str = "last_expiry_digest";

/// Metadata key holding the next unallocated reminder id.
const NEXT_REMINDER_ID_KEY: &str = "next_reminder_id";

/// How long a writer waits on another process's write lock.
const BUSY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

const VEHICLE_COLUMNS: &str =
    "id, plate, make, model, driver, phone, vehicle_type, created_at, updated_at";

const DOCUMENT_COLUMNS: &str = "id, reference, document_type, vehicle_plate, valid_from, \
     expires_at, active, created_at, updated_at";

/// Storage engine for vehicles, documents and reminder state.
///
/// Provides persistent storage using `SQLite` with support for:
/// - Vehicle and document CRUD, with cascading vehicle deletes
/// - Expiry queries and text search
/// - Per-profile notification settings
/// - The reminder ledger and notification outbox
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::internal("database connection lock poisoned"))
    }

    // === Vehicles ===

    /// Insert a vehicle. Returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateVehicle`] if the plate is taken,
    /// [`Error::InvalidRecord`] if the plate is blank, or a database error.
    pub fn add_vehicle(&self, vehicle: &Vehicle) -> Result<i64> {
        let plate = validate_plate(&vehicle.plate)?;
        let conn = self.conn()?;
        if plate_exists(&conn, plate)? {
            return Err(Error::DuplicateVehicle {
                plate: plate.to_string(),
            });
        }

        let now = encode_timestamp(&Utc::now());
        conn.execute(
            r"
            INSERT INTO vehicles (plate, make, model, driver, phone, vehicle_type, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ",
            params![
                plate,
                vehicle.make,
                vehicle.model,
                vehicle.driver,
                vehicle.phone,
                vehicle.vehicle_type.as_str(),
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted vehicle {} with id {}", plate, id);
        Ok(id)
    }

    /// Get a vehicle by plate.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn vehicle(&self, plate: &str) -> Result<Option<Vehicle>> {
        let conn = self.conn()?;
        let vehicle = conn
            .query_row(
                &format!("SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE plate = ?1"),
                [plate.trim()],
                row_to_vehicle,
            )
            .optional()?;
        Ok(vehicle)
    }

    /// List vehicles, most recently created first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_vehicles(&self) -> Result<Vec<Vehicle>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {VEHICLE_COLUMNS} FROM vehicles ORDER BY created_at DESC, id DESC"
        ))?;
        let vehicles = stmt
            .query_map([], row_to_vehicle)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(vehicles)
    }

    /// Update a stored vehicle, matched by id.
    ///
    /// Changing the plate moves the vehicle's documents to the new plate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the vehicle doesn't exist,
    /// [`Error::DuplicateVehicle`] if the new plate is taken, or a database error.
    pub fn update_vehicle(&self, vehicle: &Vehicle) -> Result<()> {
        let id = vehicle
            .id
            .ok_or_else(|| Error::not_found("vehicle", "<unsaved>"))?;
        let plate = validate_plate(&vehicle.plate)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let old_plate: String = tx
            .query_row("SELECT plate FROM vehicles WHERE id = ?1", [id], |row| {
                row.get(0)
            })
            .optional()?
            .ok_or_else(|| Error::not_found("vehicle", id))?;

        if old_plate != plate && plate_exists(&tx, plate)? {
            return Err(Error::DuplicateVehicle {
                plate: plate.to_string(),
            });
        }

        let now = encode_timestamp(&Utc::now());
        tx.execute(
            r"
            UPDATE vehicles
            SET plate = ?1, make = ?2, model = ?3, driver = ?4, phone = ?5,
                vehicle_type = ?6, updated_at = ?7
            WHERE id = ?8
            ",
            params![
                plate,
                vehicle.make,
                vehicle.model,
                vehicle.driver,
                vehicle.phone,
                vehicle.vehicle_type.as_str(),
                now,
                id,
            ],
        )?;

        if old_plate != plate {
            let moved = tx.execute(
                "UPDATE documents SET vehicle_plate = ?1, updated_at = ?2 WHERE vehicle_plate = ?3",
                params![plate, now, old_plate],
            )?;
            debug!("Moved {} documents from {} to {}", moved, old_plate, plate);
        }

        tx.commit()?;
        Ok(())
    }

    /// Delete a vehicle and every document attached to its plate.
    ///
    /// Returns the ids of the deleted documents.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no vehicle has this plate, or a database error.
    pub fn delete_vehicle(&self, plate: &str) -> Result<Vec<i64>> {
        let plate = plate.trim();
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        if !plate_exists(&tx, plate)? {
            return Err(Error::not_found("vehicle", plate));
        }

        let document_ids = {
            let mut stmt = tx.prepare("SELECT id FROM documents WHERE vehicle_plate = ?1")?;
            let ids = stmt
                .query_map([plate], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            ids
        };

        tx.execute("DELETE FROM documents WHERE vehicle_plate = ?1", [plate])?;
        tx.execute("DELETE FROM vehicles WHERE plate = ?1", [plate])?;
        tx.commit()?;

        info!(
            "Deleted vehicle {} and {} document(s)",
            plate,
            document_ids.len()
        );
        Ok(document_ids)
    }

    // === Documents ===

    /// Insert a document. Returns the assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the vehicle plate is unknown,
    /// [`Error::InvalidRecord`] if the type is blank, or a database error.
    pub fn add_document(&self, document: &Document) -> Result<i64> {
        validate_document(document)?;
        let conn = self.conn()?;
        if !plate_exists(&conn, document.vehicle_plate.trim())? {
            return Err(Error::not_found("vehicle", document.vehicle_plate.trim()));
        }

        let now = encode_timestamp(&Utc::now());
        conn.execute(
            r"
            INSERT INTO documents
                (reference, document_type, vehicle_plate, valid_from, expires_at, active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
            ",
            params![
                document.reference,
                document.document_type.trim(),
                document.vehicle_plate.trim(),
                encode_timestamp(&document.valid_from),
                encode_timestamp(&document.expires_at),
                document.active,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        debug!("Inserted document with id {}", id);
        Ok(id)
    }

    /// Get a document by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn document(&self, id: i64) -> Result<Option<Document>> {
        let conn = self.conn()?;
        let document = conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?1"),
                [id],
                row_to_document,
            )
            .optional()?;
        Ok(document)
    }

    /// List every document, soonest expiry first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_documents(&self) -> Result<Vec<Document>> {
        self.query_documents(
            &format!("SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY expires_at ASC, id ASC"),
            [],
        )
    }

    /// List the documents of one vehicle, soonest expiry first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn documents_for_vehicle(&self, plate: &str) -> Result<Vec<Document>> {
        self.query_documents(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE vehicle_plate = ?1 \
                 ORDER BY expires_at ASC, id ASC"
            ),
            [plate.trim()],
        )
    }

    /// Update a stored document, matched by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the document or its vehicle doesn't
    /// exist, or a database error.
    pub fn update_document(&self, document: &Document) -> Result<()> {
        let id = document
            .id
            .ok_or_else(|| Error::not_found("document", "<unsaved>"))?;
        validate_document(document)?;

        let conn = self.conn()?;
        if !plate_exists(&conn, document.vehicle_plate.trim())? {
            return Err(Error::not_found("vehicle", document.vehicle_plate.trim()));
        }

        let affected = conn.execute(
            r"
            UPDATE documents
            SET reference = ?1, document_type = ?2, vehicle_plate = ?3, valid_from = ?4,
                expires_at = ?5, active = ?6, updated_at = ?7
            WHERE id = ?8
            ",
            params![
                document.reference,
                document.document_type.trim(),
                document.vehicle_plate.trim(),
                encode_timestamp(&document.valid_from),
                encode_timestamp(&document.expires_at),
                document.active,
                encode_timestamp(&Utc::now()),
                id,
            ],
        )?;

        if affected == 0 {
            return Err(Error::not_found("document", id));
        }
        Ok(())
    }

    /// Delete a document by id.
    ///
    /// Returns `true` if a document was deleted, `false` if not found.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_document(&self, id: i64) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM documents WHERE id = ?1", [id])?;
        Ok(affected > 0)
    }

    /// Case-insensitive search on plate and document type.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn search_documents(&self, term: &str) -> Result<Vec<Document>> {
        let needle = term.to_lowercase();
        let documents = self.list_documents()?;
        Ok(documents
            .into_iter()
            .filter(|d| {
                d.vehicle_plate.to_lowercase().contains(&needle)
                    || d.document_type.to_lowercase().contains(&needle)
            })
            .collect())
    }

    /// Active documents expiring between `now` and `now + days`, soonest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn expiring_documents(&self, days: i64, now: DateTime<Utc>) -> Result<Vec<Document>> {
        let until = now + Duration::days(days);
        self.query_documents(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents \
                 WHERE active = 1 AND expires_at >= ?1 AND expires_at <= ?2 \
                 ORDER BY expires_at ASC, id ASC"
            ),
            params![encode_timestamp(&now), encode_timestamp(&until)],
        )
    }

    /// Active documents already expired at `now`, most recent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn expired_documents(&self, now: DateTime<Utc>) -> Result<Vec<Document>> {
        self.query_documents(
            &format!(
                "SELECT {DOCUMENT_COLUMNS} FROM documents \
                 WHERE active = 1 AND expires_at < ?1 \
                 ORDER BY expires_at DESC, id DESC"
            ),
            [encode_timestamp(&now)],
        )
    }

    fn query_documents<P: Params>(&self, sql: &str, params: P) -> Result<Vec<Document>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let documents = stmt
            .query_map(params, row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    // === Outbox ===

    /// Queue a notification.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails, including when a
    /// notification with the same id is already pending.
    pub fn enqueue_notification(&self, notification: &Notification) -> Result<()> {
        self.conn()?.execute(
            r"
            INSERT INTO outbox (id, title, body, fires_at, document_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
            params![
                notification.id,
                notification.title,
                notification.body,
                encode_timestamp(&notification.fires_at),
                notification.document_id,
            ],
        )?;
        Ok(())
    }

    /// Remove pending notifications by id. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn remove_notifications(&self, ids: &[i64]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM outbox WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Every pending notification, soonest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn outbox(&self) -> Result<Vec<Notification>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, title, body, fires_at, document_id FROM outbox ORDER BY fires_at ASC, id ASC",
        )?;
        let notifications = stmt
            .query_map([], row_to_notification)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(notifications)
    }

    /// Remove and return the notifications due at `now`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn take_due_notifications(&self, now: DateTime<Utc>) -> Result<Vec<Notification>> {
        let now = encode_timestamp(&now);
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let due = {
            let mut stmt = tx.prepare(
                "SELECT id, title, body, fires_at, document_id FROM outbox \
                 WHERE fires_at <= ?1 ORDER BY fires_at ASC, id ASC",
            )?;
            let due = stmt
                .query_map([&now], row_to_notification)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            due
        };
        tx.execute("DELETE FROM outbox WHERE fires_at <= ?1", [&now])?;
        tx.commit()?;
        Ok(due)
    }

    // === Statistics ===

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        let vehicles = count("SELECT COUNT(*) FROM vehicles")?;
        let documents = count("SELECT COUNT(*) FROM documents")?;
        let active_documents = count("SELECT COUNT(*) FROM documents WHERE active = 1")?;
        let ledger_entries = count("SELECT COUNT(*) FROM reminder_ledger")?;
        let pending_notifications = count("SELECT COUNT(*) FROM outbox")?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            vehicles,
            documents,
            active_documents,
            ledger_entries,
            pending_notifications,
            db_size_bytes,
        })
    }
}

#[async_trait::async_trait]
impl DocumentRepository for Storage {
    async fn fetch_documents(&self) -> Result<Vec<Document>> {
        self.list_documents()
            .map_err(|e| Error::repository(e.to_string()))
    }
}

impl SettingsBackend for Storage {
    fn load_settings(&self, profile: &str) -> Result<Option<StoredSettings>> {
        let payload: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload FROM settings WHERE profile = ?1",
                [profile],
                |row| row.get(0),
            )
            .optional()?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Error::from))
            .transpose()
    }

    fn store_settings(&self, profile: &str, settings: &StoredSettings) -> Result<()> {
        let payload = serde_json::to_string(settings)?;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO settings (profile, payload, updated_at) VALUES (?1, ?2, ?3)",
            params![profile, payload, encode_timestamp(&Utc::now())],
        )?;
        Ok(())
    }
}

impl ReminderStore for Storage {
    fn load_ledger(&self) -> Result<Vec<ReminderEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r"
            SELECT id, document_id, scheduled_for, notification_hour, days_until_expiration
            FROM reminder_ledger ORDER BY scheduled_for ASC, id ASC
            ",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(ReminderEntry {
                    id: row.get(0)?,
                    document_id: row.get(1)?,
                    scheduled_for: timestamp(row, 2)?,
                    notification_hour: row.get(3)?,
                    days_until_expiration: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn replace_ledger(&self, entries: &[ReminderEntry]) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM reminder_ledger", [])?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO reminder_ledger
                    (id, document_id, scheduled_for, notification_hour, days_until_expiration)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    entry.document_id,
                    encode_timestamp(&entry.scheduled_for),
                    entry.notification_hour,
                    entry.days_until_expiration,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn last_digest_day(&self) -> Result<Option<NaiveDate>> {
        let value: Option<String> = self
            .conn()?
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [DIGEST_DAY_KEY],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value.and_then(|v| match NaiveDate::parse_from_str(&v, "%Y-%m-%d") {
            Ok(day) => Some(day),
            Err(_) => {
                warn!("Ignoring invalid digest day: {}", v);
                None
            }
        }))
    }

    fn set_last_digest_day(&self, day: NaiveDate) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (DIGEST_DAY_KEY, day.format("%Y-%m-%d").to_string()),
        )?;
        Ok(())
    }

    fn try_lock(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool> {
        let expires_at = now
            .checked_add_signed(lease)
            .ok_or_else(|| Error::internal("lock lease out of range"))?;
        // Taken when free, expired, or already ours.
        let changed = self.conn()?.execute(
            r"
            INSERT INTO locks (name, holder, expires_at) VALUES (?1, ?2, ?3)
            ON CONFLICT(name) DO UPDATE
                SET holder = excluded.holder, expires_at = excluded.expires_at
                WHERE locks.holder = excluded.holder OR locks.expires_at <= ?4
            ",
            params![
                name,
                holder,
                encode_timestamp(&expires_at),
                encode_timestamp(&now)
            ],
        )?;
        Ok(changed == 1)
    }

    fn release_lock(&self, name: &str, holder: &str) -> Result<()> {
        self.conn()?.execute(
            "DELETE FROM locks WHERE name = ?1 AND holder = ?2",
            [name, holder],
        )?;
        Ok(())
    }

    fn reserve_ids(&self, count: usize, floor: i64) -> Result<i64> {
        let count = i64::try_from(count).map_err(|e| Error::internal(e.to_string()))?;
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<String> = tx
            .query_row(
                "SELECT value FROM metadata WHERE key = ?1",
                [NEXT_REMINDER_ID_KEY],
                |row| row.get(0),
            )
            .optional()?;
        let stored = match stored {
            Some(value) => value
                .parse::<i64>()
                .map_err(|_| Error::internal(format!("invalid reminder id counter: {value}")))?,
            None => 1,
        };

        let first = stored.max(floor).max(1);
        let next = first
            .checked_add(count)
            .ok_or_else(|| Error::internal("reminder id counter overflow"))?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            (NEXT_REMINDER_ID_KEY, next.to_string()),
        )?;
        tx.commit()?;
        Ok(first)
    }
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of vehicles.
    pub vehicles: i64,
    /// Number of documents.
    pub documents: i64,
    /// Number of active documents.
    pub active_documents: i64,
    /// Number of reminders in the ledger.
    pub ledger_entries: i64,
    /// Number of notifications waiting in the outbox.
    pub pending_notifications: i64,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Encode a timestamp so that lexical order is chronological.
fn encode_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let value: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn plate_exists(conn: &Connection, plate: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM vehicles WHERE plate = ?1",
        [plate],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn validate_plate(plate: &str) -> Result<&str> {
    let plate = plate.trim();
    if plate.is_empty() {
        return Err(Error::invalid_record("vehicle", "plate must not be empty"));
    }
    Ok(plate)
}

fn validate_document(document: &Document) -> Result<()> {
    if document.document_type.trim().is_empty() {
        return Err(Error::invalid_record("document", "type must not be empty"));
    }
    if document.expires_at < document.valid_from {
        return Err(Error::invalid_record(
            "document",
            "expiration date is before the start of validity",
        ));
    }
    Ok(())
}

fn row_to_vehicle(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    let vehicle_type: String = row.get(6)?;
    let vehicle_type = VehicleType::parse(&vehicle_type).unwrap_or_else(|| {
        warn!("Unknown vehicle type: {}, defaulting to car", vehicle_type);
        VehicleType::Car
    });

    Ok(Vehicle {
        id: Some(row.get(0)?),
        plate: row.get(1)?,
        make: row.get(2)?,
        model: row.get(3)?,
        driver: row.get(4)?,
        phone: row.get(5)?,
        vehicle_type,
        created_at: timestamp(row, 7)?,
        updated_at: timestamp(row, 8)?,
    })
}

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    Ok(Document {
        id: Some(row.get(0)?),
        reference: row.get(1)?,
        document_type: row.get(2)?,
        vehicle_plate: row.get(3)?,
        valid_from: timestamp(row, 4)?,
        expires_at: timestamp(row, 5)?,
        active: row.get(6)?,
        created_at: timestamp(row, 7)?,
        updated_at: timestamp(row, 8)?,
    })
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        title: row.get(1)?,
        body: row.get(2)?,
        fires_at: timestamp(row, 3)?,
        document_id: row.get(4)?,
    })
}
