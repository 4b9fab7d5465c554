//! `carnet` - Vehicle document tracker with expiration reminders
//!
//! This library stores vehicles and their documents, classifies documents by
//! how close they are to expiring, and keeps a set of timed reminders in sync
//! with the documents and the user's notification settings.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod auth;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod dashboard;
pub mod error;
pub mod expiration;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod planner;
pub mod scheduler;
pub mod settings;
pub mod storage;

pub use auth::{AuthGate, InitGate};
pub use config::Config;
pub use daemon::{Daemon, DaemonHandle, DaemonOptions, Trigger};
pub use dashboard::DashboardStats;
pub use error::{Error, Result};
pub use expiration::{classify, Expiration, ExpirationStatus, Urgency};
pub use logging::init_logging;
pub use model::{Document, DocumentKind, Vehicle, VehicleType};
pub use notifier::{Notification, Notifier, NotifierError, OutboxNotifier};
pub use planner::{plan, ReminderRequest};
pub use scheduler::{
    Clock, DocumentRepository, FixedClock, ReminderEntry, ReminderScheduler, ReminderStore,
    SystemClock, UpdateOutcome, UpdateReport,
};
pub use settings::{NotificationSettings, SettingsBackend, SettingsStore};
pub use storage::{Storage, StorageStats};
