//! Long-running reminder daemon.
//!
//! The daemon is a single actor: triggers are handled one at a time, so an
//! update cycle always runs to completion before the next one starts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::notifier::{Notification, OutboxNotifier};
use crate::scheduler::{Clock, ReminderScheduler};

/// Capacity of the trigger channel.
const TRIGGER_BUFFER: usize = 32;

/// Something that should make the daemon act.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The daemon just started.
    Startup,
    /// The machine woke up or the user came back.
    Resume,
    /// The periodic refresh interval elapsed.
    PeriodicTick,
    /// Notification settings changed.
    SettingsChanged,
    /// Documents or vehicles changed.
    DocumentsChanged,
    /// Stop the daemon.
    Shutdown,
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Startup => write!(f, "startup"),
            Self::Resume => write!(f, "resume"),
            Self::PeriodicTick => write!(f, "periodic tick"),
            Self::SettingsChanged => write!(f, "settings changed"),
            Self::DocumentsChanged => write!(f, "documents changed"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Timing knobs for the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonOptions {
    /// How often reminders are rebuilt without any other trigger.
    pub refresh_interval: Duration,
    /// How often the outbox is checked for due notifications.
    pub delivery_poll: Duration,
    /// Wait before the first cycle.
    pub startup_delay: Duration,
}

impl Default for DaemonOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(24 * 60 * 60),
            delivery_poll: Duration::from_secs(60),
            startup_delay: Duration::from_secs(5),
        }
    }
}

/// Where due notifications end up.
pub trait DeliverySink: Send + Sync {
    /// Show a notification to the user.
    fn present(&self, notification: &Notification);
}

/// Prints notifications to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink;

impl DeliverySink for ConsoleSink {
    fn present(&self, notification: &Notification) {
        println!(
            "[{}] {}: {}",
            notification.fires_at.format("%Y-%m-%d %H:%M"),
            notification.title,
            notification.body
        );
    }
}

/// Sends triggers to a running [`Daemon`].
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    tx: mpsc::Sender<Trigger>,
}

impl DaemonHandle {
    /// Queue a trigger. Returns `false` if the daemon has stopped.
    pub async fn trigger(&self, trigger: Trigger) -> bool {
        self.tx.send(trigger).await.is_ok()
    }

    /// Ask the daemon to stop after the current cycle.
    pub async fn shutdown(&self) -> bool {
        self.trigger(Trigger::Shutdown).await
    }
}

/// What a daemon run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DaemonSummary {
    /// Update cycles run.
    pub cycles: usize,
    /// Notifications delivered.
    pub delivered: usize,
}

/// The reminder daemon.
pub struct Daemon<C: Clock> {
    scheduler: Arc<ReminderScheduler<C>>,
    outbox: OutboxNotifier,
    sink: Arc<dyn DeliverySink>,
    options: DaemonOptions,
    rx: mpsc::Receiver<Trigger>,
    summary: DaemonSummary,
}

impl<C: Clock + std::fmt::Debug> std::fmt::Debug for Daemon<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Daemon")
            .field("scheduler", &self.scheduler)
            .field("options", &self.options)
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}

impl<C: Clock> Daemon<C> {
    /// Create a daemon and the handle used to drive it.
    #[must_use]
    pub fn new(
        scheduler: Arc<ReminderScheduler<C>>,
        outbox: OutboxNotifier,
        sink: Arc<dyn DeliverySink>,
        options: DaemonOptions,
    ) -> (Self, DaemonHandle) {
        let (tx, rx) = mpsc::channel(TRIGGER_BUFFER);
        let daemon = Self {
            scheduler,
            outbox,
            sink,
            options,
            rx,
            summary: DaemonSummary::default(),
        };
        (daemon, DaemonHandle { tx })
    }

    /// Run until shut down through a handle or Ctrl-C.
    pub async fn run(mut self) -> DaemonSummary {
        info!(
            "Reminder daemon starting, refresh every {:?}, delivery poll every {:?}",
            self.options.refresh_interval, self.options.delivery_poll
        );

        tokio::select! {
            () = tokio::time::sleep(self.options.startup_delay) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted before startup");
                return self.summary;
            }
        }
        self.handle(Trigger::Startup).await;

        let mut refresh = tokio::time::interval_at(
            Instant::now() + self.options.refresh_interval,
            self.options.refresh_interval,
        );
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut delivery = tokio::time::interval(self.options.delivery_poll);
        delivery.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_poll = Utc::now();

        loop {
            tokio::select! {
                _ = refresh.tick() => self.handle(Trigger::PeriodicTick).await,
                _ = delivery.tick() => {
                    let wall = Utc::now();
                    if woke_from_sleep(last_poll, wall, self.options.delivery_poll) {
                        self.handle(Trigger::Resume).await;
                    } else {
                        self.deliver_due();
                    }
                    last_poll = wall;
                }
                Some(trigger) = self.rx.recv() => {
                    if trigger == Trigger::Shutdown {
                        info!("Shutdown requested");
                        break;
                    }
                    self.handle(trigger).await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping daemon");
                    break;
                }
            }
        }

        info!(
            "Reminder daemon stopped after {} cycle(s), {} notification(s) delivered",
            self.summary.cycles, self.summary.delivered
        );
        self.summary
    }

    async fn handle(&mut self, trigger: Trigger) {
        debug!("Handling trigger: {}", trigger);
        let timed = matches!(
            trigger,
            Trigger::Startup | Trigger::Resume | Trigger::PeriodicTick
        );
        // Reminders that came due while asleep go out before the rebuild.
        if timed {
            self.deliver_due();
        }

        let report = self.scheduler.update().await;
        self.summary.cycles += 1;
        info!(
            "Update after {}: {} ({} scheduled, {} kept, {} failed)",
            trigger, report.outcome, report.scheduled, report.kept, report.failed
        );

        if timed {
            if let Err(e) = self.scheduler.notify_expiring_today().await {
                warn!("Expiring-today check failed: {}", e);
            }
            self.deliver_due();
        }
    }

    fn deliver_due(&mut self) {
        match self.outbox.take_due(self.scheduler.now()) {
            Ok(due) => {
                for notification in &due {
                    self.sink.present(notification);
                }
                if !due.is_empty() {
                    debug!("Delivered {} notification(s)", due.len());
                }
                self.summary.delivered += due.len();
            }
            Err(e) => warn!("Failed to deliver notifications: {}", e),
        }
    }
}

/// Whether the gap between two polls means the machine was asleep.
fn woke_from_sleep(
    last: chrono::DateTime<Utc>,
    now: chrono::DateTime<Utc>,
    poll: Duration,
) -> bool {
    let threshold = chrono::Duration::from_std(poll)
        .ok()
        .and_then(|expected| expected.checked_mul(2))
        .and_then(|doubled| doubled.checked_add(&chrono::Duration::minutes(1)));
    threshold.is_some_and(|threshold| now - last > threshold)
}
