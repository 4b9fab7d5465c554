//! User-tunable notification settings.
//!
//! [`SettingsStore`] merges persisted values over defaults field by field and
//! validates every update before it reaches the backend. A rejected update
//! leaves the stored settings untouched.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Smallest allowed lead window, in days.
pub const MIN_NOTIFICATION_DAYS: u16 = 1;

/// Largest allowed lead window, in days.
pub const MAX_NOTIFICATION_DAYS: u16 = 365;

/// Largest valid hour of day.
pub const MAX_HOUR: u8 = 23;

/// Notification settings for one profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSettings {
    /// Lead window: documents further than this from expiry get no reminder.
    pub notification_days: u16,
    /// Hours of day at which reminders fire, ascending.
    pub notification_hours: Vec<u8>,
    /// Days before expiry at which a reminder fires, descending.
    pub notification_intervals: Vec<u16>,
    /// Master switch.
    pub enabled: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            notification_days: 30,
            notification_hours: vec![9, 18],
            notification_intervals: vec![7, 3, 1, 0],
            enabled: true,
        }
    }
}

impl NotificationSettings {
    /// Validate the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if !(MIN_NOTIFICATION_DAYS..=MAX_NOTIFICATION_DAYS).contains(&self.notification_days) {
            return Err(Error::invalid_settings(format!(
                "notification_days must be between {MIN_NOTIFICATION_DAYS} and {MAX_NOTIFICATION_DAYS}, got {}",
                self.notification_days
            )));
        }
        validate_hours(&self.notification_hours)?;
        validate_intervals(&self.notification_intervals)?;
        Ok(())
    }

    /// Sort and deduplicate hours and intervals.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.notification_hours.sort_unstable();
        self.notification_hours.dedup();
        self.notification_intervals.sort_unstable_by(|a, b| b.cmp(a));
        self.notification_intervals.dedup();
        self
    }

    /// Format an hour as `HH:00`.
    #[must_use]
    pub fn format_hour(hour: u8) -> String {
        format!("{hour:02}:00")
    }

    /// Replace invalid fields with the matching field from `defaults`.
    fn sanitized(mut self, defaults: &Self) -> Self {
        self.notification_days = self
            .notification_days
            .clamp(MIN_NOTIFICATION_DAYS, MAX_NOTIFICATION_DAYS);
        if validate_hours(&self.notification_hours).is_err() {
            self.notification_hours.clone_from(&defaults.notification_hours);
        }
        if validate_intervals(&self.notification_intervals).is_err() {
            self.notification_intervals
                .clone_from(&defaults.notification_intervals);
        }
        self.normalized()
    }
}

fn validate_hours(hours: &[u8]) -> Result<()> {
    if hours.is_empty() {
        return Err(Error::invalid_settings(
            "at least one notification hour is required",
        ));
    }
    if let Some(hour) = hours.iter().find(|h| **h > MAX_HOUR) {
        return Err(Error::invalid_settings(format!(
            "notification hour must be between 0 and {MAX_HOUR}, got {hour}"
        )));
    }
    Ok(())
}

fn validate_intervals(intervals: &[u16]) -> Result<()> {
    if intervals.is_empty() {
        return Err(Error::invalid_settings(
            "at least one notification interval is required",
        ));
    }
    if let Some(offset) = intervals.iter().find(|o| **o > MAX_NOTIFICATION_DAYS) {
        return Err(Error::invalid_settings(format!(
            "notification interval must be between 0 and {MAX_NOTIFICATION_DAYS}, got {offset}"
        )));
    }
    Ok(())
}

/// Persisted settings. Missing fields fall back to defaults on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoredSettings {
    /// Persisted lead window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_days: Option<u16>,
    /// Persisted hours.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_hours: Option<Vec<u8>>,
    /// Persisted intervals.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_intervals: Option<Vec<u16>>,
    /// Persisted master switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

impl StoredSettings {
    /// Overlay these values on `defaults`.
    #[must_use]
    pub fn merge_over(self, defaults: &NotificationSettings) -> NotificationSettings {
        NotificationSettings {
            notification_days: self
                .notification_days
                .unwrap_or(defaults.notification_days),
            notification_hours: self
                .notification_hours
                .unwrap_or_else(|| defaults.notification_hours.clone()),
            notification_intervals: self
                .notification_intervals
                .unwrap_or_else(|| defaults.notification_intervals.clone()),
            enabled: self.enabled.unwrap_or(defaults.enabled),
        }
    }
}

impl From<&NotificationSettings> for StoredSettings {
    fn from(settings: &NotificationSettings) -> Self {
        Self {
            notification_days: Some(settings.notification_days),
            notification_hours: Some(settings.notification_hours.clone()),
            notification_intervals: Some(settings.notification_intervals.clone()),
            enabled: Some(settings.enabled),
        }
    }
}

/// Persistence for settings, namespaced by profile.
pub trait SettingsBackend: Send + Sync {
    /// Load the stored settings for `profile`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn load_settings(&self, profile: &str) -> Result<Option<StoredSettings>>;

    /// Replace the stored settings for `profile`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn store_settings(&self, profile: &str, settings: &StoredSettings) -> Result<()>;
}

/// Validating front end over a [`SettingsBackend`].
pub struct SettingsStore {
    backend: Arc<dyn SettingsBackend>,
    profile: String,
    defaults: NotificationSettings,
    last_known: Mutex<Option<NotificationSettings>>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("profile", &self.profile)
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Create a store for `profile`, falling back to `defaults`.
    ///
    /// Invalid defaults are replaced by [`NotificationSettings::default`].
    #[must_use]
    pub fn new(
        backend: Arc<dyn SettingsBackend>,
        profile: impl Into<String>,
        defaults: NotificationSettings,
    ) -> Self {
        let defaults = if defaults.validate().is_ok() {
            defaults.normalized()
        } else {
            warn!("Invalid default notification settings, using built-in defaults");
            NotificationSettings::default()
        };
        Self {
            backend,
            profile: profile.into(),
            defaults,
            last_known: Mutex::new(None),
        }
    }

    /// The profile this store reads and writes.
    #[must_use]
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// The defaults persisted values are merged over.
    #[must_use]
    pub fn defaults(&self) -> &NotificationSettings {
        &self.defaults
    }

    /// Current settings: persisted values merged over defaults.
    ///
    /// Never fails. If the backend cannot be read, the last value read
    /// successfully is returned, or the defaults if there is none.
    #[must_use]
    pub fn get(&self) -> NotificationSettings {
        match self.backend.load_settings(&self.profile) {
            Ok(stored) => {
                let settings = stored.map_or_else(
                    || self.defaults.clone(),
                    |s| s.merge_over(&self.defaults).sanitized(&self.defaults),
                );
                *self.cache() = Some(settings.clone());
                settings
            }
            Err(e) => {
                warn!("Failed to read notification settings, using cached values: {e}");
                self.cache().clone().unwrap_or_else(|| self.defaults.clone())
            }
        }
    }

    /// Validate and persist `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] if the settings are invalid, or the
    /// backend error if they cannot be stored.
    pub fn save(&self, settings: NotificationSettings) -> Result<NotificationSettings> {
        let settings = settings.normalized();
        settings.validate()?;
        self.backend
            .store_settings(&self.profile, &StoredSettings::from(&settings))?;
        debug!("Saved notification settings for profile {}", self.profile);
        *self.cache() = Some(settings.clone());
        Ok(settings)
    }

    /// Set the lead window, clamped to `[1, 365]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be stored.
    pub fn update_days(&self, days: i64) -> Result<NotificationSettings> {
        let clamped = days.clamp(
            i64::from(MIN_NOTIFICATION_DAYS),
            i64::from(MAX_NOTIFICATION_DAYS),
        );
        if clamped != days {
            debug!("Clamped notification_days {days} to {clamped}");
        }
        let mut settings = self.get();
        settings.notification_days =
            u16::try_from(clamped).map_err(|e| Error::internal(e.to_string()))?;
        self.save(settings)
    }

    /// Replace the notification hours.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] if `hours` is empty or contains a
    /// value above 23.
    pub fn update_hours(&self, hours: &[u8]) -> Result<NotificationSettings> {
        validate_hours(hours)?;
        let mut settings = self.get();
        settings.notification_hours = hours.to_vec();
        self.save(settings)
    }

    /// Replace the notification intervals.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] if `intervals` is empty or contains
    /// a value above 365.
    pub fn update_intervals(&self, intervals: &[u16]) -> Result<NotificationSettings> {
        validate_intervals(intervals)?;
        let mut settings = self.get();
        settings.notification_intervals = intervals.to_vec();
        self.save(settings)
    }

    /// Add one notification hour.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] if the hour is above 23.
    pub fn add_hour(&self, hour: u8) -> Result<NotificationSettings> {
        let mut settings = self.get();
        settings.notification_hours.push(hour);
        validate_hours(&settings.notification_hours)?;
        self.save(settings)
    }

    /// Remove one notification hour.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] when removing the last hour.
    pub fn remove_hour(&self, hour: u8) -> Result<NotificationSettings> {
        let mut settings = self.get();
        settings.notification_hours.retain(|h| *h != hour);
        if settings.notification_hours.is_empty() {
            return Err(Error::invalid_settings(
                "cannot remove the last notification hour",
            ));
        }
        self.save(settings)
    }

    /// Add one notification interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] if the offset is above 365.
    pub fn add_interval(&self, offset: u16) -> Result<NotificationSettings> {
        let mut settings = self.get();
        settings.notification_intervals.push(offset);
        validate_intervals(&settings.notification_intervals)?;
        self.save(settings)
    }

    /// Remove one notification interval.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSettings`] when removing the last interval.
    pub fn remove_interval(&self, offset: u16) -> Result<NotificationSettings> {
        let mut settings = self.get();
        settings.notification_intervals.retain(|o| *o != offset);
        if settings.notification_intervals.is_empty() {
            return Err(Error::invalid_settings(
                "cannot remove the last notification interval",
            ));
        }
        self.save(settings)
    }

    /// Turn notifications on or off.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be stored.
    pub fn toggle(&self, enabled: bool) -> Result<NotificationSettings> {
        let mut settings = self.get();
        settings.enabled = enabled;
        self.save(settings)
    }

    /// Overwrite the stored settings with the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be stored.
    pub fn reset_to_defaults(&self) -> Result<NotificationSettings> {
        self.save(self.defaults.clone())
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, Option<NotificationSettings>> {
        self.last_known
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory backend whose reads can be made to fail.
    #[derive(Debug, Default)]
    pub(crate) struct MemoryBackend {
        values: Mutex<HashMap<String, StoredSettings>>,
        pub(crate) fail_reads: AtomicBool,
    }

    impl SettingsBackend for MemoryBackend {
        fn load_settings(&self, profile: &str) -> Result<Option<StoredSettings>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(Error::repository("offline"));
            }
            Ok(self.values.lock().unwrap().get(profile).cloned())
        }

        fn store_settings(&self, profile: &str, settings: &StoredSettings) -> Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(profile.to_string(), settings.clone());
            Ok(())
        }
    }

    fn create_store() -> (Arc<MemoryBackend>, SettingsStore) {
        let backend = Arc::new(MemoryBackend::default());
        let store = SettingsStore::new(backend.clone(), "default", NotificationSettings::default());
        (backend, store)
    }

    #[test]
    fn test_get_returns_defaults_when_nothing_stored() {
        let (_, store) = create_store();
        assert_eq!(store.get(), NotificationSettings::default());
    }

    #[test]
    fn test_persisted_fields_win_per_field() {
        let (backend, store) = create_store();
        backend
            .store_settings(
                "default",
                &StoredSettings {
                    notification_days: Some(10),
                    ..StoredSettings::default()
                },
            )
            .unwrap();

        let settings = store.get();
        assert_eq!(settings.notification_days, 10);
        assert_eq!(settings.notification_hours, vec![9, 18]);
        assert_eq!(settings.notification_intervals, vec![7, 3, 1, 0]);
        assert!(settings.enabled);
    }

    #[test]
    fn test_update_hours_empty_is_rejected_and_storage_unchanged() {
        let (backend, store) = create_store();
        store.update_hours(&[8]).unwrap();

        let err = store.update_hours(&[]).unwrap_err();
        assert!(err.is_validation_error());
        assert_eq!(store.get().notification_hours, vec![8]);
        assert_eq!(
            backend.load_settings("default").unwrap().unwrap().notification_hours,
            Some(vec![8])
        );
    }

    #[test]
    fn test_update_hours_out_of_range_is_rejected() {
        let (_, store) = create_store();
        assert!(store.update_hours(&[9, 24]).is_err());
        assert_eq!(store.get().notification_hours, vec![9, 18]);
    }

    #[test]
    fn test_update_hours_sorts_and_dedupes() {
        let (_, store) = create_store();
        let settings = store.update_hours(&[18, 7, 18, 12]).unwrap();
        assert_eq!(settings.notification_hours, vec![7, 12, 18]);
    }

    #[test]
    fn test_update_days_is_clamped() {
        let (_, store) = create_store();
        assert_eq!(store.update_days(400).unwrap().notification_days, 365);
        assert_eq!(store.get().notification_days, 365);
        assert_eq!(store.update_days(0).unwrap().notification_days, 1);
        assert_eq!(store.update_days(-5).unwrap().notification_days, 1);
        assert_eq!(store.update_days(45).unwrap().notification_days, 45);
    }

    #[test]
    fn test_update_intervals_sorted_descending() {
        let (_, store) = create_store();
        let settings = store.update_intervals(&[1, 14, 0, 14]).unwrap();
        assert_eq!(settings.notification_intervals, vec![14, 1, 0]);
        assert!(store.update_intervals(&[]).is_err());
        assert!(store.update_intervals(&[400]).is_err());
    }

    #[test]
    fn test_remove_last_hour_is_rejected() {
        let (_, store) = create_store();
        store.remove_hour(9).unwrap();
        assert_eq!(store.get().notification_hours, vec![18]);
        assert!(store.remove_hour(18).is_err());
        assert_eq!(store.get().notification_hours, vec![18]);
    }

    #[test]
    fn test_remove_last_interval_is_rejected() {
        let (_, store) = create_store();
        store.update_intervals(&[3]).unwrap();
        assert!(store.remove_interval(3).is_err());
        assert_eq!(store.get().notification_intervals, vec![3]);
    }

    #[test]
    fn test_add_hour_and_interval() {
        let (_, store) = create_store();
        assert_eq!(store.add_hour(12).unwrap().notification_hours, vec![9, 12, 18]);
        assert!(store.add_hour(30).is_err());
        assert_eq!(
            store.add_interval(14).unwrap().notification_intervals,
            vec![14, 7, 3, 1, 0]
        );
    }

    #[test]
    fn test_toggle_and_reset() {
        let (_, store) = create_store();
        assert!(!store.toggle(false).unwrap().enabled);
        assert!(!store.get().enabled);
        store.update_days(90).unwrap();
        assert_eq!(store.reset_to_defaults().unwrap(), NotificationSettings::default());
        assert_eq!(store.get(), NotificationSettings::default());
    }

    #[test]
    fn test_read_failure_falls_back_to_last_known() {
        let (backend, store) = create_store();
        store.update_days(12).unwrap();
        assert_eq!(store.get().notification_days, 12);

        backend.fail_reads.store(true, Ordering::SeqCst);
        assert_eq!(store.get().notification_days, 12);
    }

    #[test]
    fn test_read_failure_without_cache_uses_defaults() {
        let backend = Arc::new(MemoryBackend::default());
        backend.fail_reads.store(true, Ordering::SeqCst);
        let store = SettingsStore::new(backend, "default", NotificationSettings::default());
        assert_eq!(store.get(), NotificationSettings::default());
    }

    #[test]
    fn test_profiles_are_isolated() {
        let backend = Arc::new(MemoryBackend::default());
        let alice = SettingsStore::new(backend.clone(), "alice", NotificationSettings::default());
        let bob = SettingsStore::new(backend, "bob", NotificationSettings::default());
        alice.update_days(5).unwrap();
        assert_eq!(alice.get().notification_days, 5);
        assert_eq!(bob.get().notification_days, 30);
    }

    #[test]
    fn test_corrupt_stored_values_are_sanitized() {
        let (backend, store) = create_store();
        backend
            .store_settings(
                "default",
                &StoredSettings {
                    notification_days: Some(0),
                    notification_hours: Some(vec![]),
                    notification_intervals: Some(vec![999]),
                    enabled: None,
                },
            )
            .unwrap();
        let settings = store.get();
        assert_eq!(settings.notification_days, 1);
        assert_eq!(settings.notification_hours, vec![9, 18]);
        assert_eq!(settings.notification_intervals, vec![7, 3, 1, 0]);
    }

    #[test]
    fn test_invalid_defaults_are_replaced() {
        let backend = Arc::new(MemoryBackend::default());
        let bad = NotificationSettings {
            notification_hours: vec![],
            ..NotificationSettings::default()
        };
        let store = SettingsStore::new(backend, "default", bad);
        assert_eq!(store.defaults(), &NotificationSettings::default());
    }

    #[test]
    fn test_format_hour() {
        assert_eq!(NotificationSettings::format_hour(9), "09:00");
        assert_eq!(NotificationSettings::format_hour(18), "18:00");
    }

    #[test]
    fn test_stored_settings_serialization_skips_none() {
        let json = serde_json::to_string(&StoredSettings {
            enabled: Some(false),
            ..StoredSettings::default()
        })
        .unwrap();
        assert_eq!(json, r#"{"enabled":false}"#);
        let parsed: StoredSettings = serde_json::from_str(r#"{"notification_days":3}"#).unwrap();
        assert_eq!(parsed.notification_days, Some(3));
        assert!(parsed.notification_hours.is_none());
    }
}
