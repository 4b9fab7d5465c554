//! Command-line interface for carnet.
//!
//! This module provides the CLI structure for the `carnet` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, DocumentArgs, DocumentCommand, OutputFormat, RemindersCommand,
    SettingsCommand, StatusCommand, VehicleArgs, VehicleCommand, VehicleTypeArg,
};

/// carnet - Keep track of your vehicle papers
///
/// Records insurance, registration, inspection and other vehicle documents,
/// and reminds you before they expire.
#[derive(Debug, Parser)]
#[command(name = "carnet")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage vehicles
    #[command(subcommand)]
    Vehicle(VehicleCommand),

    /// Manage vehicle documents
    #[command(subcommand)]
    Document(DocumentCommand),

    /// View or change notification settings
    #[command(subcommand)]
    Settings(SettingsCommand),

    /// Inspect and control reminders
    #[command(subcommand)]
    Reminders(RemindersCommand),

    /// Show a dashboard of documents and reminders
    Status(StatusCommand),

    /// Run the reminder daemon in the foreground
    Daemon,

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Info,
                2 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::Verbosity;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "carnet");
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(parse(&["carnet", "status"]).verbosity(), Verbosity::Normal);
        assert_eq!(parse(&["carnet", "-v", "status"]).verbosity(), Verbosity::Info);
        assert_eq!(parse(&["carnet", "-vv", "status"]).verbosity(), Verbosity::Verbose);
        assert_eq!(parse(&["carnet", "-vvv", "status"]).verbosity(), Verbosity::Trace);
        assert_eq!(parse(&["carnet", "-q", "-v", "status"]).verbosity(), Verbosity::Quiet);
    }

    #[test]
    fn test_parse_with_config() {
        let cli = parse(&["carnet", "-c", "/custom/config.toml", "status"]);
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_vehicle_add() {
        let cli = parse(&[
            "carnet", "vehicle", "add", "AB-123-CD", "--make", "Peugeot", "-t", "motorcycle",
        ]);
        let Command::Vehicle(VehicleCommand::Add(args)) = cli.command else {
            panic!("expected vehicle add");
        };
        assert_eq!(args.plate, "AB-123-CD");
        assert_eq!(args.make, "Peugeot");
        assert_eq!(args.vehicle_type, VehicleTypeArg::Motorcycle);
    }

    #[test]
    fn test_parse_document_add() {
        let cli = parse(&[
            "carnet",
            "document",
            "add",
            "AB-123-CD",
            "-t",
            "Assurance",
            "--expires",
            "2025-01-31",
        ]);
        let Command::Document(DocumentCommand::Add(args)) = cli.command else {
            panic!("expected document add");
        };
        assert_eq!(args.document_type, "Assurance");
        assert_eq!(args.expires.to_string(), "2025-01-31");
        assert!(args.from.is_none());
        assert!(!args.inactive);
    }

    #[test]
    fn test_parse_document_add_rejects_bad_date() {
        let result = Cli::try_parse_from([
            "carnet", "document", "add", "X", "-t", "Assurance", "--expires", "tomorrow",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_document_update_flags_conflict() {
        let result =
            Cli::try_parse_from(["carnet", "document", "update", "3", "--active", "--inactive"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_settings_hours() {
        let cli = parse(&["carnet", "settings", "hours", "8", "12", "19"]);
        let Command::Settings(SettingsCommand::Hours { hours }) = cli.command else {
            panic!("expected settings hours");
        };
        assert_eq!(hours, vec![8, 12, 19]);
    }

    #[test]
    fn test_parse_settings_days_negative() {
        let cli = parse(&["carnet", "settings", "days", "-4"]);
        assert!(matches!(
            cli.command,
            Command::Settings(SettingsCommand::Days { days: -4 })
        ));
    }

    #[test]
    fn test_parse_settings_hours_requires_value() {
        assert!(Cli::try_parse_from(["carnet", "settings", "hours"]).is_err());
    }

    #[test]
    fn test_parse_reminders_cancel() {
        let cli = parse(&["carnet", "reminders", "cancel", "--document", "7"]);
        assert!(matches!(
            cli.command,
            Command::Reminders(RemindersCommand::Cancel {
                document: Some(7),
                all: false
            })
        ));
        assert!(Cli::try_parse_from(["carnet", "reminders", "cancel"]).is_err());
    }

    #[test]
    fn test_parse_daemon() {
        assert!(matches!(parse(&["carnet", "daemon"]).command, Command::Daemon));
    }

    #[test]
    fn test_parse_status_json() {
        let cli = parse(&["carnet", "status", "--json"]);
        assert!(matches!(cli.command, Command::Status(StatusCommand { json: true })));
    }
}
