//! Reminder scheduling.
//!
//! [`ReminderScheduler::update`] reconciles the notifier with the planner's
//! output by full rebuild: every known reminder is cancelled, then every
//! planned reminder is scheduled under a fresh id. Reminders that are already
//! due but not yet delivered are left in place. The ledger records what was
//! scheduled so later cycles can cancel it, even from another process.
//!
//! Every operation that touches the notifier runs under a lease lock held in
//! the [`ReminderStore`], and ids are allocated by the store, so a CLI process
//! and a running daemon never interleave cycles or hand out the same id.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::AuthGate;
use crate::error::{Error, Result};
use crate::expiration::{self, ExpirationStatus};
use crate::model::Document;
use crate::notifier::{Notification, Notifier};
use crate::planner::{self, REMINDER_TITLE};
use crate::settings::SettingsStore;

/// Name of the lock serializing reminder updates.
const LOCK_NAME: &str = "reminders";

/// Seconds a lock outlives a holder that died without releasing it.
const LOCK_LEASE_SECS: i64 = 300;

/// Default time to wait for another process to finish its cycle.
const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(30);

/// Pause between attempts to take the lock.
const LOCK_RETRY: Duration = Duration::from_millis(100);

/// Distinguishes schedulers within one process.
static SCHEDULER_SEQ: AtomicU64 = AtomicU64::new(0);

/// A reminder that was handed to the notifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderEntry {
    /// Notification id.
    pub id: i64,
    /// Document the reminder is about.
    pub document_id: i64,
    /// When the reminder fires.
    pub scheduled_for: DateTime<Utc>,
    /// Hour of day it was planned for.
    pub notification_hour: u8,
    /// Days until expiration announced by the reminder.
    pub days_until_expiration: i64,
}

/// Persistence for scheduler bookkeeping.
pub trait ReminderStore: Send + Sync {
    /// Every ledger entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read.
    fn load_ledger(&self) -> Result<Vec<ReminderEntry>>;

    /// Replace the whole ledger atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be written.
    fn replace_ledger(&self, entries: &[ReminderEntry]) -> Result<()>;

    /// Last day the expiring-today digest was sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be read.
    fn last_digest_day(&self) -> Result<Option<NaiveDate>>;

    /// Record the day the expiring-today digest was sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set_last_digest_day(&self, day: NaiveDate) -> Result<()>;

    /// Take or renew the lock `name` for `holder` until `now + lease`.
    ///
    /// Returns `false` if another holder has an unexpired lease.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be read or written.
    fn try_lock(
        &self,
        name: &str,
        holder: &str,
        now: DateTime<Utc>,
        lease: chrono::Duration,
    ) -> Result<bool>;

    /// Release the lock `name` if `holder` has it.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be written.
    fn release_lock(&self, name: &str, holder: &str) -> Result<()>;

    /// Reserve `count` consecutive reminder ids, none below `floor`.
    ///
    /// Returns the first reserved id. Ids are never handed out twice.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter cannot be read or written.
    fn reserve_ids(&self, count: usize, floor: i64) -> Result<i64>;
}

/// Source of the user's documents.
#[async_trait::async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Every document of the signed-in user.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Repository`] if the repository cannot be read.
    async fn fetch_documents(&self) -> Result<Vec<Document>>;
}

/// Source of the current instant and local time zone.
pub trait Clock: Send + Sync {
    /// Time zone reminders are planned in.
    type Tz: TimeZone;

    /// The current instant.
    fn now(&self) -> DateTime<Self::Tz>;
}

/// The system clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// A clock stopped at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move the clock to `now`.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: chrono::Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }
}

impl Clock for FixedClock {
    type Tz = Utc;

    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// How an update cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// Reminders were rebuilt from the planner.
    Rebuilt,
    /// Reminders are disabled; everything was cancelled.
    Disabled,
    /// Nobody is signed in; nothing was touched.
    NotSignedIn,
    /// The repository failed; existing reminders were kept.
    RepositoryUnavailable,
    /// Another process held the reminder lock; nothing was touched.
    Busy,
    /// Reminder ids could not be allocated; existing reminders were kept.
    LedgerUnavailable,
}

impl std::fmt::Display for UpdateOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rebuilt => write!(f, "rebuilt"),
            Self::Disabled => write!(f, "disabled"),
            Self::NotSignedIn => write!(f, "not signed in"),
            Self::RepositoryUnavailable => write!(f, "repository unavailable"),
            Self::Busy => write!(f, "busy"),
            Self::LedgerUnavailable => write!(f, "ledger unavailable"),
        }
    }
}

/// Summary of an update cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// How the cycle ended.
    pub outcome: UpdateOutcome,
    /// Reminders scheduled.
    pub scheduled: usize,
    /// Reminders cancelled.
    pub cancelled: usize,
    /// Reminders the notifier refused.
    pub failed: usize,
    /// Due reminders left in place for delivery.
    pub kept: usize,
}

impl UpdateReport {
    fn skipped(outcome: UpdateOutcome) -> Self {
        Self {
            outcome,
            scheduled: 0,
            cancelled: 0,
            failed: 0,
            kept: 0,
        }
    }
}

/// Everything the notifier and the ledger know about.
struct KnownReminders {
    ids: BTreeSet<i64>,
    pending: Option<BTreeSet<i64>>,
    ledger: Vec<ReminderEntry>,
}

impl KnownReminders {
    /// Lowest id no known reminder uses.
    fn floor(&self) -> i64 {
        self.ids.last().map_or(1, |max| max.saturating_add(1))
    }

    /// Whether `entry` has fired but is still waiting for delivery. When the
    /// notifier cannot be listed, ledgered reminders are assumed pending.
    fn awaiting_delivery(&self, entry: &ReminderEntry, now: DateTime<Utc>) -> bool {
        entry.scheduled_for <= now
            && self
                .pending
                .as_ref()
                .map_or(true, |pending| pending.contains(&entry.id))
    }
}

/// Holds the reminder lock; releases it on drop.
struct CycleLock<'a> {
    store: &'a dyn ReminderStore,
    holder: &'a str,
}

impl Drop for CycleLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.store.release_lock(LOCK_NAME, self.holder) {
            warn!("Failed to release reminder lock: {}", e);
        }
    }
}

/// Keeps the notifier in sync with documents and settings.
pub struct ReminderScheduler<C: Clock = SystemClock> {
    repository: Arc<dyn DocumentRepository>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<SettingsStore>,
    store: Arc<dyn ReminderStore>,
    auth: Arc<dyn AuthGate>,
    clock: C,
    holder: String,
    lock_wait: Duration,
}

impl<C: Clock + std::fmt::Debug> std::fmt::Debug for ReminderScheduler<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReminderScheduler")
            .field("settings", &self.settings)
            .field("clock", &self.clock)
            .field("holder", &self.holder)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> ReminderScheduler<C> {
    /// Create a scheduler.
    #[must_use]
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<SettingsStore>,
        store: Arc<dyn ReminderStore>,
        auth: Arc<dyn AuthGate>,
        clock: C,
    ) -> Self {
        Self {
            repository,
            notifier,
            settings,
            store,
            auth,
            clock,
            holder: format!(
                "{}:{}",
                std::process::id(),
                SCHEDULER_SEQ.fetch_add(1, Ordering::Relaxed)
            ),
            lock_wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// Set how long to wait for another process's cycle before giving up.
    #[must_use]
    pub fn with_lock_wait(mut self, lock_wait: Duration) -> Self {
        self.lock_wait = lock_wait;
        self
    }

    /// The clock this scheduler plans with.
    #[must_use]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The settings store this scheduler reads.
    #[must_use]
    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    /// The current instant according to the scheduler's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    /// Run one reconciliation cycle.
    ///
    /// Never fails: problems are logged and reflected in the report.
    pub async fn update(&self) -> UpdateReport {
        self.auth.wait_for_init().await;
        if !self.auth.is_signed_in() {
            info!("Not signed in, skipping reminder update");
            return UpdateReport::skipped(UpdateOutcome::NotSignedIn);
        }

        let Some(_lock) = self.lock().await else {
            return UpdateReport::skipped(UpdateOutcome::Busy);
        };

        let settings = self.settings.get();
        if !settings.enabled {
            let cancelled = self.clear_known().await;
            info!("Reminders disabled, cancelled {} reminder(s)", cancelled);
            return UpdateReport {
                cancelled,
                ..UpdateReport::skipped(UpdateOutcome::Disabled)
            };
        }

        let documents = match self.repository.fetch_documents().await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Skipping reminder update, keeping existing reminders: {}", e);
                return UpdateReport::skipped(UpdateOutcome::RepositoryUnavailable);
            }
        };

        let requests = planner::plan(&documents, &settings, &self.clock.now());
        debug!(
            "Planned {} reminder(s) for {} document(s)",
            requests.len(),
            documents.len()
        );

        let known = self.known().await;
        let first_id = match self.store.reserve_ids(requests.len(), known.floor()) {
            Ok(id) => id,
            Err(e) => {
                warn!("Skipping reminder update, cannot allocate ids: {}", e);
                return UpdateReport::skipped(UpdateOutcome::LedgerUnavailable);
            }
        };

        // Fired but undelivered reminders of live documents stay; the planner
        // never plans them again.
        let now = self.now();
        let live: BTreeSet<i64> = documents
            .iter()
            .filter(|d| d.active)
            .filter_map(|d| d.id)
            .collect();
        let mut entries: Vec<ReminderEntry> = known
            .ledger
            .iter()
            .filter(|entry| {
                live.contains(&entry.document_id) && known.awaiting_delivery(entry, now)
            })
            .cloned()
            .collect();
        let kept = entries.len();
        let kept_ids: BTreeSet<i64> = entries.iter().map(|entry| entry.id).collect();
        let stale: Vec<i64> = known.ids.difference(&kept_ids).copied().collect();
        let (_, cancelled) = self.cancel_ids(&stale).await;

        let mut failed = 0;
        for (request, id) in requests.iter().zip(first_id..) {
            let notification = Notification {
                id,
                title: request.title().to_string(),
                body: request.body(),
                fires_at: request.fires_at,
                document_id: Some(request.document_id),
            };
            match self.notifier.schedule(&notification).await {
                Ok(()) => entries.push(ReminderEntry {
                    id,
                    document_id: request.document_id,
                    scheduled_for: request.fires_at,
                    notification_hour: request.hour,
                    days_until_expiration: request.days_until_expiration,
                }),
                Err(e) => {
                    warn!(
                        "Failed to schedule reminder for document {}: {}",
                        request.document_id, e
                    );
                    failed += 1;
                }
            }
        }

        if let Err(e) = self.store.replace_ledger(&entries) {
            warn!("Failed to record reminder ledger: {}", e);
        }

        let scheduled = entries.len() - kept;
        info!(
            "Reminders rebuilt: {} scheduled, {} cancelled, {} failed, {} awaiting delivery",
            scheduled, cancelled, failed, kept
        );
        UpdateReport {
            outcome: UpdateOutcome::Rebuilt,
            scheduled,
            cancelled,
            failed,
            kept,
        }
    }

    /// Cancel the reminders of one document and drop them from the ledger.
    ///
    /// Returns how many reminders were cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemindersBusy`] if another process holds the reminder
    /// lock, or an error if the ledger cannot be read or written, or if the
    /// notifier refuses the cancellation. The ledger is left unchanged then.
    pub async fn cancel_document(&self, document_id: i64) -> Result<usize> {
        let _lock = self.lock().await.ok_or(Error::RemindersBusy)?;
        let ledger = self.store.load_ledger()?;
        let (doomed, kept): (Vec<_>, Vec<_>) = ledger
            .into_iter()
            .partition(|entry| entry.document_id == document_id);
        if doomed.is_empty() {
            debug!("No reminders to cancel for document {}", document_id);
            return Ok(0);
        }

        let ids: Vec<i64> = doomed.iter().map(|entry| entry.id).collect();
        self.notifier.cancel(&ids).await?;
        self.store.replace_ledger(&kept)?;

        debug!(
            "Cancelled {} reminder(s) for document {}",
            ids.len(),
            document_id
        );
        Ok(ids.len())
    }

    /// Cancel every known reminder and clear the ledger.
    ///
    /// Returns how many reminders were cancelled.
    pub async fn clear_all(&self) -> usize {
        match self.lock().await {
            Some(_lock) => self.clear_known().await,
            None => 0,
        }
    }

    /// Send one immediate notification per active document expiring today.
    ///
    /// Runs at most once per calendar day. A day on which every notice
    /// failed is not marked, so the next run tries again. Returns how many
    /// were sent.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository, the id counter or the digest
    /// marker cannot be read or written.
    pub async fn notify_expiring_today(&self) -> Result<usize> {
        self.auth.wait_for_init().await;
        if !self.auth.is_signed_in() || !self.settings.get().enabled {
            return Ok(0);
        }

        let Some(_lock) = self.lock().await else {
            debug!("Reminder lock busy, expiring-today check postponed");
            return Ok(0);
        };

        let now = self.clock.now();
        let today = now.date_naive();
        if self.store.last_digest_day()? == Some(today) {
            debug!("Expiring-today digest already sent for {}", today);
            return Ok(0);
        }

        let documents = self.repository.fetch_documents().await?;
        let expiring: Vec<(i64, &Document)> = documents
            .iter()
            .filter(|d| d.active)
            .filter_map(|d| d.id.map(|id| (id, d)))
            .filter(|(_, d)| {
                expiration::classify(&d.expires_at, &now).status == ExpirationStatus::ExpiringToday
            })
            .collect();
        if expiring.is_empty() {
            self.store.set_last_digest_day(today)?;
            debug!("No document expires today");
            return Ok(0);
        }

        let known = self.known().await;
        let first_id = self.store.reserve_ids(expiring.len(), known.floor())?;
        let fires_at = now.with_timezone(&Utc);
        let mut sent = Vec::new();
        for (&(document_id, document), id) in expiring.iter().zip(first_id..) {
            let notification = Notification {
                id,
                title: REMINDER_TITLE.to_string(),
                body: planner::reminder_message(
                    &document.document_type,
                    &document.vehicle_plate,
                    0,
                ),
                fires_at,
                document_id: Some(document_id),
            };
            match self.notifier.schedule(&notification).await {
                Ok(()) => sent.push(ReminderEntry {
                    id,
                    document_id,
                    scheduled_for: fires_at,
                    notification_hour: u8::try_from(now.hour()).unwrap_or_default(),
                    days_until_expiration: 0,
                }),
                Err(e) => warn!(
                    "Failed to send expiring-today notice for document {}: {}",
                    document_id, e
                ),
            }
        }

        if sent.is_empty() {
            warn!("No expiring-today notice could be sent, will retry");
            return Ok(0);
        }

        // Ledgered so cancel_document reaches them before delivery.
        let mut ledger = known.ledger;
        ledger.extend(sent.iter().cloned());
        if let Err(e) = self.store.replace_ledger(&ledger) {
            warn!("Failed to record expiring-today notices: {}", e);
        }
        self.store.set_last_digest_day(today)?;
        info!("Sent {} expiring-today notice(s)", sent.len());
        Ok(sent.len())
    }

    /// Cancel every known reminder and clear the ledger. Expects the lock.
    async fn clear_known(&self) -> usize {
        let known = self.known().await;
        let ids: Vec<i64> = known.ids.into_iter().collect();
        let (cancel_ok, cancelled) = self.cancel_ids(&ids).await;
        if cancel_ok {
            if let Err(e) = self.store.replace_ledger(&[]) {
                warn!("Failed to clear reminder ledger: {}", e);
            }
        }
        cancelled
    }

    /// Cancel `ids` on the notifier.
    ///
    /// Returns whether the notifier accepted the cancellation, and how many
    /// ids were cancelled.
    async fn cancel_ids(&self, ids: &[i64]) -> (bool, usize) {
        if ids.is_empty() {
            return (true, 0);
        }

        match self.notifier.cancel(ids).await {
            Ok(()) => (true, ids.len()),
            Err(e) => {
                warn!("Failed to cancel {} reminder(s): {}", ids.len(), e);
                (false, 0)
            }
        }
    }

    /// Every reminder the notifier or the ledger knows about.
    async fn known(&self) -> KnownReminders {
        let mut ids = BTreeSet::new();

        let pending = match self.notifier.pending().await {
            Ok(pending) => Some(pending.into_iter().collect::<BTreeSet<_>>()),
            Err(e) => {
                warn!("Failed to list pending notifications: {}", e);
                None
            }
        };
        if let Some(pending) = &pending {
            ids.extend(pending.iter().copied());
        }

        let ledger = match self.store.load_ledger() {
            Ok(ledger) => ledger,
            Err(e) => {
                warn!("Failed to read reminder ledger: {}", e);
                Vec::new()
            }
        };
        ids.extend(ledger.iter().map(|entry| entry.id));

        KnownReminders {
            ids,
            pending,
            ledger,
        }
    }

    /// Take the reminder lock, waiting up to the configured time for another
    /// holder to finish.
    async fn lock(&self) -> Option<CycleLock<'_>> {
        let deadline = tokio::time::Instant::now() + self.lock_wait;
        loop {
            match self
                .store
                .try_lock(
                    LOCK_NAME,
                    &self.holder,
                    self.now(),
                    chrono::Duration::seconds(LOCK_LEASE_SECS),
                )
            {
                Ok(true) => {
                    return Some(CycleLock {
                        store: self.store.as_ref(),
                        holder: &self.holder,
                    })
                }
                Ok(false) => {}
                Err(e) => {
                    warn!("Failed to take reminder lock: {}", e);
                    return None;
                }
            }
            if tokio::time::Instant::now() >= deadline {
                warn!("Reminder lock held by another process, giving up");
                return None;
            }
            tokio::time::sleep(LOCK_RETRY).await;
        }
    }
}
