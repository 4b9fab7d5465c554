//! `SQLite` schema definitions for carnet.
//!
//! Timestamps are stored as RFC 3339 text with nanosecond precision and a `Z`
//! suffix, so lexical order matches chronological order.

/// SQL statement to create the vehicles table.
pub const CREATE_VEHICLES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS vehicles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plate TEXT NOT NULL UNIQUE,
    make TEXT NOT NULL DEFAULT '',
    model TEXT NOT NULL DEFAULT '',
    driver TEXT NOT NULL DEFAULT '',
    phone TEXT NOT NULL DEFAULT '',
    vehicle_type TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the documents table.
///
/// `AUTOINCREMENT` guarantees ids are never reused after a delete.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reference TEXT NOT NULL DEFAULT '',
    document_type TEXT NOT NULL,
    vehicle_plate TEXT NOT NULL,
    valid_from TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create an index on `vehicle_plate` for cascades.
pub const CREATE_DOCUMENT_PLATE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_plate ON documents(vehicle_plate)
";

/// SQL statement to create an index on `expires_at` for expiry queries.
pub const CREATE_DOCUMENT_EXPIRY_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_expires_at ON documents(expires_at)
";

/// SQL statement to create the per-profile settings table.
pub const CREATE_SETTINGS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS settings (
    profile TEXT PRIMARY KEY,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create the reminder ledger.
pub const CREATE_LEDGER_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS reminder_ledger (
    id INTEGER PRIMARY KEY,
    document_id INTEGER NOT NULL,
    scheduled_for TEXT NOT NULL,
    notification_hour INTEGER NOT NULL,
    days_until_expiration INTEGER NOT NULL
)
";

/// SQL statement to create an index on the ledger's `document_id`.
pub const CREATE_LEDGER_DOCUMENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_ledger_document ON reminder_ledger(document_id)
";

/// SQL statement to create the notification outbox.
pub const CREATE_OUTBOX_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS outbox (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL,
    fires_at TEXT NOT NULL,
    document_id INTEGER
)
";

/// SQL statement to create an index on `fires_at` for delivery.
pub const CREATE_OUTBOX_FIRES_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_outbox_fires_at ON outbox(fires_at)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// SQL statement to create the scheduler lock table.
///
/// One row per lock name. A row whose `expires_at` has passed is free.
pub const CREATE_LOCKS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS locks (
    name TEXT PRIMARY KEY,
    holder TEXT NOT NULL,
    expires_at TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_VEHICLES_TABLE,
    CREATE_DOCUMENTS_TABLE,
    CREATE_DOCUMENT_PLATE_INDEX,
    CREATE_DOCUMENT_EXPIRY_INDEX,
    CREATE_SETTINGS_TABLE,
    CREATE_LEDGER_TABLE,
    CREATE_LEDGER_DOCUMENT_INDEX,
    CREATE_OUTBOX_TABLE,
    CREATE_OUTBOX_FIRES_INDEX,
    CREATE_METADATA_TABLE,
    CREATE_LOCKS_TABLE,
];
