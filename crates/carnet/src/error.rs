//! Error types for carnet.
//!
//! This module defines all error types used throughout the carnet crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::notifier::NotifierError;

/// The main error type for carnet operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// A notification settings update was rejected.
    #[error("invalid notification settings: {message}")]
    InvalidSettings {
        /// Why the update was rejected.
        message: String,
    },

    // === Repository Errors ===
    /// The document repository could not be reached or refused the request.
    #[error("repository unavailable: {cause}")]
    Repository {
        /// Human-readable cause.
        cause: String,
    },

    /// A record could not be found.
    #[error("{entity} not found: {key}")]
    NotFound {
        /// Kind of record (vehicle, document).
        entity: &'static str,
        /// The key that was looked up.
        key: String,
    },

    /// A record failed validation before being stored.
    #[error("invalid {entity}: {message}")]
    InvalidRecord {
        /// Kind of record (vehicle, document).
        entity: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// A vehicle with this plate already exists.
    #[error("vehicle with plate '{plate}' already exists")]
    DuplicateVehicle {
        /// The conflicting plate.
        plate: String,
    },

    // === Scheduler Errors ===
    /// Another process holds the reminder lock.
    #[error("reminders are being updated by another process, try again")]
    RemindersBusy,

    // === Notifier Errors ===
    /// The platform notifier failed.
    #[error(transparent)]
    Notifier(#[from] NotifierError),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for carnet operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new repository error.
    #[must_use]
    pub fn repository(cause: impl Into<String>) -> Self {
        Self::Repository {
            cause: cause.into(),
        }
    }

    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        Self::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    /// Create a new settings validation error.
    #[must_use]
    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            message: message.into(),
        }
    }

    /// Create a new record validation error.
    #[must_use]
    pub fn invalid_record(entity: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            entity,
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means a record was missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is a rejected input rather than an I/O failure.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSettings { .. }
                | Self::ConfigValidation { .. }
                | Self::InvalidRecord { .. }
                | Self::DuplicateVehicle { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::repository("permission denied");
        assert_eq!(err.to_string(), "repository unavailable: permission denied");

        let err = Error::not_found("vehicle", "AB-123-CD");
        assert_eq!(err.to_string(), "vehicle not found: AB-123-CD");
    }

    #[test]
    fn test_error_is_not_found() {
        assert!(Error::not_found("document", 42).is_not_found());
        assert!(!Error::repository("offline").is_not_found());
    }

    #[test]
    fn test_error_is_validation_error() {
        assert!(Error::invalid_settings("hours empty").is_validation_error());
        assert!(Error::DuplicateVehicle {
            plate: "X".to_string()
        }
        .is_validation_error());
        assert!(!Error::internal("bug").is_validation_error());
    }

    #[test]
    fn test_invalid_settings_display() {
        let err = Error::invalid_settings("at least one notification hour is required");
        assert!(err.to_string().contains("at least one notification hour"));
    }

    #[test]
    fn test_reminders_busy_display() {
        assert!(Error::RemindersBusy.to_string().contains("another process"));
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("something went wrong");
        assert_eq!(err.to_string(), "internal error: something went wrong");
    }

    #[test]
    fn test_notifier_error_is_transparent() {
        let err: Error = NotifierError::PermissionDenied.into();
        assert_eq!(err.to_string(), NotifierError::PermissionDenied.to_string());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_database_migration_error_display() {
        let err = Error::DatabaseMigration {
            message: "version mismatch".to_string(),
        };
        assert!(err.to_string().contains("version mismatch"));
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
