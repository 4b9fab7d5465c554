//! `carnet` - CLI for the vehicle document tracker
//!
//! This binary manages vehicles and documents, notification settings and
//! reminders, and runs the reminder daemon.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::Parser;
use tracing::{debug, warn};

use carnet::cli::{
    Cli, Command, ConfigCommand, DocumentArgs, DocumentCommand, OutputFormat, RemindersCommand,
    SettingsCommand, VehicleArgs, VehicleCommand,
};
use carnet::daemon::{ConsoleSink, DeliverySink};
use carnet::logging::Verbosity;
use carnet::{
    classify, init_logging, plan, Config, Daemon, DashboardStats, Document, Error, InitGate,
    NotificationSettings, OutboxNotifier, ReminderScheduler, ReminderStore, SettingsStore,
    Storage, SystemClock, UpdateOutcome, Vehicle,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let verbosity = match cli.command {
        Command::Daemon => cli.verbosity().at_least(Verbosity::Info),
        _ => cli.verbosity(),
    };
    init_logging(verbosity);

    let config = Config::load_from(cli.config.clone())?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let app = App::open(&config)?;
    match cli.command {
        Command::Vehicle(cmd) => handle_vehicle(&app, cmd).await,
        Command::Document(cmd) => handle_document(&app, cmd).await,
        Command::Settings(cmd) => handle_settings(&app, cmd).await,
        Command::Reminders(cmd) => handle_reminders(&app, cmd).await,
        Command::Status(status_cmd) => handle_status(&app, status_cmd.json).await,
        Command::Daemon => handle_daemon(app, &config).await,
        Command::Config(_) => Ok(()),
    }
}

/// Everything a command needs, wired together.
struct App {
    storage: Arc<Storage>,
    outbox: OutboxNotifier,
    scheduler: Arc<ReminderScheduler<SystemClock>>,
}

impl App {
    fn open(config: &Config) -> Result<Self> {
        let path = config.database_path();
        let storage = Arc::new(
            Storage::open(&path)
                .with_context(|| format!("opening database at {}", path.display()))?,
        );
        let outbox = OutboxNotifier::new(storage.clone());
        let settings = Arc::new(SettingsStore::new(
            storage.clone(),
            config.reminders.profile.clone(),
            config.default_settings(),
        ));
        let scheduler = Arc::new(ReminderScheduler::new(
            storage.clone(),
            Arc::new(outbox.clone()),
            settings,
            storage.clone(),
            Arc::new(InitGate::signed_in()),
            SystemClock,
        ));
        Ok(Self {
            storage,
            outbox,
            scheduler,
        })
    }

    fn settings(&self) -> &SettingsStore {
        self.scheduler.settings()
    }

    /// Rebuild reminders after a mutation.
    async fn resync(&self) {
        let report = self.scheduler.update().await;
        debug!(
            "Reminders {}: {} scheduled, {} cancelled",
            report.outcome, report.scheduled, report.cancelled
        );
        if report.outcome == UpdateOutcome::Busy {
            warn!("Reminders are being updated by another process, run `carnet reminders sync` later");
        }
        if report.failed > 0 {
            warn!("{} reminder(s) could not be scheduled", report.failed);
        }
    }

    async fn forget_document(&self, id: i64) {
        if let Err(e) = self.scheduler.cancel_document(id).await {
            warn!("Failed to cancel reminders of document {}: {}", id, e);
        }
    }
}

// === Vehicles ===

async fn handle_vehicle(app: &App, cmd: VehicleCommand) -> Result<()> {
    match cmd {
        VehicleCommand::Add(args) => {
            let vehicle = vehicle_from_args(args);
            let id = app.storage.add_vehicle(&vehicle)?;
            println!("Added vehicle {} (id {id})", vehicle.plate.trim());
        }
        VehicleCommand::List { format } => {
            print_vehicles(&app.storage.list_vehicles()?, format)?;
        }
        VehicleCommand::Update {
            plate,
            new_plate,
            make,
            model,
            driver,
            phone,
            vehicle_type,
        } => {
            let mut vehicle = app
                .storage
                .vehicle(&plate)?
                .ok_or_else(|| Error::not_found("vehicle", &plate))?;
            if let Some(new_plate) = new_plate {
                vehicle.plate = new_plate;
            }
            if let Some(make) = make {
                vehicle.make = make;
            }
            if let Some(model) = model {
                vehicle.model = model;
            }
            if let Some(driver) = driver {
                vehicle.driver = driver;
            }
            if let Some(phone) = phone {
                vehicle.phone = phone;
            }
            if let Some(vehicle_type) = vehicle_type {
                vehicle.vehicle_type = vehicle_type.into();
            }
            app.storage.update_vehicle(&vehicle)?;
            app.resync().await;
            println!("Updated vehicle {}", vehicle.plate.trim());
        }
        VehicleCommand::Remove { plate } => {
            let removed = app.storage.delete_vehicle(&plate)?;
            for id in &removed {
                app.forget_document(*id).await;
            }
            println!(
                "Removed vehicle {} and {} document(s)",
                plate.trim(),
                removed.len()
            );
        }
    }
    Ok(())
}

fn vehicle_from_args(args: VehicleArgs) -> Vehicle {
    let mut vehicle = Vehicle::new(args.plate, args.vehicle_type.into());
    vehicle.make = args.make;
    vehicle.model = args.model;
    vehicle.driver = args.driver;
    vehicle.phone = args.phone;
    vehicle
}

fn print_vehicles(vehicles: &[Vehicle], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(vehicles)?),
        OutputFormat::Table => {
            println!(
                "{:<12} {:<11} {:<20} {:<16} {}",
                "PLATE", "TYPE", "MAKE / MODEL", "DRIVER", "PHONE"
            );
            for v in vehicles {
                println!(
                    "{:<12} {:<11} {:<20} {:<16} {}",
                    v.plate,
                    v.vehicle_type.to_string(),
                    format!("{} {}", v.make, v.model).trim(),
                    v.driver,
                    v.phone
                );
            }
        }
        OutputFormat::Plain => {
            for v in vehicles {
                println!("{} ({}) {} {}", v.plate, v.vehicle_type, v.make, v.model);
            }
        }
    }
    if vehicles.is_empty() && format != OutputFormat::Json {
        println!("No vehicles.");
    }
    Ok(())
}

// === Documents ===

async fn handle_document(app: &App, cmd: DocumentCommand) -> Result<()> {
    match cmd {
        DocumentCommand::Add(args) => {
            let document = document_from_args(args);
            let id = app.storage.add_document(&document)?;
            app.resync().await;
            println!(
                "Added {} for {} (id {id}), expires {}",
                document.document_type,
                document.vehicle_plate,
                local_date(&document.expires_at)
            );
        }
        DocumentCommand::List { plate, format } => {
            let documents = match plate {
                Some(plate) => app.storage.documents_for_vehicle(&plate)?,
                None => app.storage.list_documents()?,
            };
            print_documents(&documents, format)?;
        }
        DocumentCommand::Show { id, format } => {
            let document = find_document(app, id)?;
            if format == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&document)?);
            } else {
                let expiration = classify(&document.expires_at, &Local::now());
                println!("Document {id}");
                println!("  Type:       {}", document.document_type);
                println!("  Vehicle:    {}", document.vehicle_plate);
                println!("  Reference:  {}", document.reference);
                println!("  Valid from: {}", local_date(&document.valid_from));
                println!("  Expires:    {}", local_date(&document.expires_at));
                println!("  Active:     {}", document.active);
                println!(
                    "  Status:     {} ({})",
                    expiration.status,
                    expiration.describe()
                );
            }
        }
        DocumentCommand::Update {
            id,
            document_type,
            plate,
            reference,
            from,
            expires,
            active,
            inactive,
        } => {
            let mut document = find_document(app, id)?;
            if let Some(document_type) = document_type {
                document.document_type = document_type;
            }
            if let Some(plate) = plate {
                document.vehicle_plate = plate;
            }
            if let Some(reference) = reference {
                document.reference = reference;
            }
            if let Some(from) = from {
                document.valid_from = start_of_day(from);
            }
            if let Some(expires) = expires {
                document.expires_at = end_of_day(expires);
            }
            if active {
                document.active = true;
            }
            if inactive {
                document.active = false;
            }
            app.storage.update_document(&document)?;
            app.resync().await;
            println!("Updated document {id}");
        }
        DocumentCommand::Remove { id } => {
            if !app.storage.delete_document(id)? {
                return Err(Error::not_found("document", id).into());
            }
            app.forget_document(id).await;
            println!("Removed document {id}");
        }
        DocumentCommand::Search { query, format } => {
            print_documents(&app.storage.search_documents(&query)?, format)?;
        }
        DocumentCommand::Expiring { days, format } => {
            print_documents(&app.storage.expiring_documents(days, Utc::now())?, format)?;
        }
        DocumentCommand::Expired { format } => {
            print_documents(&app.storage.expired_documents(Utc::now())?, format)?;
        }
    }
    Ok(())
}

fn find_document(app: &App, id: i64) -> Result<Document> {
    Ok(app
        .storage
        .document(id)?
        .ok_or_else(|| Error::not_found("document", id))?)
}

fn document_from_args(args: DocumentArgs) -> Document {
    let from = args.from.unwrap_or_else(|| Local::now().date_naive());
    Document::new(
        args.document_type,
        args.plate,
        start_of_day(from),
        end_of_day(args.expires),
    )
    .with_reference(args.reference)
    .with_active(!args.inactive)
}

fn print_documents(documents: &[Document], format: OutputFormat) -> Result<()> {
    let now = Local::now();
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(documents)?),
        OutputFormat::Table => {
            println!(
                "{:>5} {:<20} {:<12} {:<11} {:<14} {}",
                "ID", "TYPE", "PLATE", "EXPIRES", "STATUS", "REFERENCE"
            );
            for d in documents {
                let status = if d.active {
                    classify(&d.expires_at, &now).status.to_string()
                } else {
                    "inactive".to_string()
                };
                println!(
                    "{:>5} {:<20} {:<12} {:<11} {:<14} {}",
                    d.id.unwrap_or_default(),
                    d.document_type,
                    d.vehicle_plate,
                    local_date(&d.expires_at).to_string(),
                    status,
                    d.reference
                );
            }
        }
        OutputFormat::Plain => {
            for d in documents {
                let expiration = classify(&d.expires_at, &now);
                println!(
                    "#{} {} for {}: {}",
                    d.id.unwrap_or_default(),
                    d.document_type,
                    d.vehicle_plate,
                    expiration.describe()
                );
            }
        }
    }
    if documents.is_empty() && format != OutputFormat::Json {
        println!("No documents.");
    }
    Ok(())
}

// === Settings ===

async fn handle_settings(app: &App, cmd: SettingsCommand) -> Result<()> {
    let store = app.settings();
    let updated = match cmd {
        SettingsCommand::Show { json } => {
            let settings = store.get();
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print_settings(store.profile(), &settings);
            }
            return Ok(());
        }
        SettingsCommand::Days { days } => store.update_days(days)?,
        SettingsCommand::Hours { hours } => store.update_hours(&hours)?,
        SettingsCommand::Intervals { intervals } => store.update_intervals(&intervals)?,
        SettingsCommand::AddHour { hour } => store.add_hour(hour)?,
        SettingsCommand::RemoveHour { hour } => store.remove_hour(hour)?,
        SettingsCommand::AddInterval { days } => store.add_interval(days)?,
        SettingsCommand::RemoveInterval { days } => store.remove_interval(days)?,
        SettingsCommand::Enable => store.toggle(true)?,
        SettingsCommand::Disable => store.toggle(false)?,
        SettingsCommand::Reset { yes } => {
            if !yes {
                println!("This will reset notification settings to defaults.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            store.reset_to_defaults()?
        }
    };

    app.resync().await;
    print_settings(store.profile(), &updated);
    Ok(())
}

fn print_settings(profile: &str, settings: &NotificationSettings) {
    let hours: Vec<String> = settings
        .notification_hours
        .iter()
        .map(|h| NotificationSettings::format_hour(*h))
        .collect();
    let intervals: Vec<String> = settings
        .notification_intervals
        .iter()
        .map(ToString::to_string)
        .collect();

    println!("Notification settings ({profile})");
    println!("  Enabled:          {}", settings.enabled);
    println!("  Lead window:      {} day(s)", settings.notification_days);
    println!("  Hours:            {}", hours.join(", "));
    println!("  Days before:      {}", intervals.join(", "));
}

// === Reminders ===

async fn handle_reminders(app: &App, cmd: RemindersCommand) -> Result<()> {
    match cmd {
        RemindersCommand::Plan { format } => {
            let documents = app.storage.list_documents()?;
            let requests = plan(&documents, &app.settings().get(), &Local::now());
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&requests)?),
                _ => {
                    for r in &requests {
                        println!("{}  {}", local_time(&r.fires_at), r.body());
                    }
                    if requests.is_empty() {
                        println!("Nothing to schedule.");
                    }
                }
            }
        }
        RemindersCommand::Sync => {
            let report = app.scheduler.update().await;
            println!(
                "Reminders {}: {} scheduled, {} kept, {} cancelled, {} failed",
                report.outcome, report.scheduled, report.kept, report.cancelled, report.failed
            );
        }
        RemindersCommand::List { format } => {
            let ledger = app.storage.load_ledger()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&ledger)?),
                _ => {
                    for entry in &ledger {
                        println!(
                            "{:>6}  {}  document {:<5} {} day(s) left",
                            entry.id,
                            local_time(&entry.scheduled_for),
                            entry.document_id,
                            entry.days_until_expiration
                        );
                    }
                    if ledger.is_empty() {
                        println!("No reminders scheduled.");
                    }
                }
            }
        }
        RemindersCommand::Pending { format } => {
            let pending = app.outbox.list()?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&pending)?),
                _ => {
                    for n in &pending {
                        println!("{:>6}  {}  {}", n.id, local_time(&n.fires_at), n.body);
                    }
                    if pending.is_empty() {
                        println!("No pending notifications.");
                    }
                }
            }
        }
        RemindersCommand::Cancel { document, all } => {
            if all {
                let cancelled = app.scheduler.clear_all().await;
                println!("Cancelled {cancelled} reminder(s)");
            } else if let Some(id) = document {
                let cancelled = app.scheduler.cancel_document(id).await?;
                println!("Cancelled {cancelled} reminder(s) for document {id}");
            }
        }
        RemindersCommand::Deliver => {
            let due = app.outbox.take_due(Utc::now())?;
            for notification in &due {
                ConsoleSink.present(notification);
            }
            if due.is_empty() {
                println!("Nothing due.");
            }
        }
    }
    Ok(())
}

// === Status ===

async fn handle_status(app: &App, json: bool) -> Result<()> {
    let dashboard = DashboardStats::load(&app.storage, &Local::now()).await;
    let stats = app.storage.stats()?;
    let settings = app.settings().get();

    if json {
        let status = serde_json::json!({
            "database_path": app.storage.path(),
            "reminders_enabled": settings.enabled,
            "dashboard": dashboard,
            "scheduled_reminders": stats.ledger_entries,
            "pending_notifications": stats.pending_notifications,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("carnet status");
    println!("-------------");
    println!("Database:            {}", app.storage.path().display());
    println!("Vehicles:            {}", dashboard.total_vehicles);
    println!("Active documents:    {}", dashboard.active_documents);
    println!("Expired:             {}", dashboard.expired_documents);
    println!("Expiring this week:  {}", dashboard.expiring_this_week);
    println!(
        "Reminders:           {} scheduled ({})",
        stats.ledger_entries,
        if settings.enabled { "enabled" } else { "disabled" }
    );
    println!("Pending delivery:    {}", stats.pending_notifications);

    if !dashboard.soon_to_expire.is_empty() {
        println!();
        println!("Next to expire:");
        for upcoming in &dashboard.soon_to_expire {
            println!(
                "  {} for {}: {} ({})",
                upcoming.document.document_type,
                upcoming.document.vehicle_plate,
                local_date(&upcoming.document.expires_at),
                upcoming.status
            );
        }
    }
    Ok(())
}

// === Daemon ===

async fn handle_daemon(app: App, config: &Config) -> Result<()> {
    println!(
        "Starting reminder daemon, database {}",
        app.storage.path().display()
    );
    let (daemon, _handle) = Daemon::new(
        app.scheduler.clone(),
        app.outbox.clone(),
        Arc::new(ConsoleSink),
        config.daemon_options(),
    );
    let summary = daemon.run().await;
    println!(
        "Daemon stopped: {} cycle(s), {} notification(s) delivered",
        summary.cycles, summary.delivered
    );
    Ok(())
}

// === Config ===

fn handle_config(config: &Config, cmd: ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                let settings = config.default_settings();
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Reminders]");
                println!("  Profile:            {}", config.reminders.profile);
                println!("  Enabled:            {}", settings.enabled);
                println!("  Lead window (days): {}", settings.notification_days);
                println!("  Hours:              {:?}", settings.notification_hours);
                println!("  Days before:        {:?}", settings.notification_intervals);
                println!();
                println!("[Daemon]");
                println!(
                    "  Refresh (hours):    {}",
                    config.daemon.refresh_interval_hours
                );
                println!(
                    "  Delivery poll (s):  {}",
                    config.daemon.delivery_poll_seconds
                );
                println!(
                    "  Startup delay (s):  {}",
                    config.daemon.startup_delay_seconds
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => bail!("configuration error: {e}"),
            }
        }
    }
    Ok(())
}

// === Dates ===

/// First instant of `day` in the local time zone.
fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    local_to_utc(day, NaiveTime::MIN)
}

/// Last second of `day` in the local time zone: a document is valid through
/// its expiration day.
fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    let last_second = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
    local_to_utc(day, last_second)
}

fn local_to_utc(day: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    let naive = day.and_time(time);
    match Local.from_local_datetime(&naive).earliest() {
        Some(local) => local.with_timezone(&Utc),
        None => naive.and_utc(),
    }
}

fn local_date(instant: &DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

fn local_time(instant: &DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}
