//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::model::VehicleType;

/// Vehicle commands.
#[derive(Debug, Subcommand)]
pub enum VehicleCommand {
    /// Register a vehicle
    Add(VehicleArgs),

    /// List vehicles
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Update a vehicle, looked up by its current plate
    Update {
        /// Current plate
        plate: String,

        /// New plate
        #[arg(long)]
        new_plate: Option<String>,

        /// Manufacturer
        #[arg(long)]
        make: Option<String>,

        /// Model
        #[arg(long)]
        model: Option<String>,

        /// Usual driver
        #[arg(long)]
        driver: Option<String>,

        /// Driver phone number
        #[arg(long)]
        phone: Option<String>,

        /// Vehicle type
        #[arg(short = 't', long = "type", value_enum)]
        vehicle_type: Option<VehicleTypeArg>,
    },

    /// Remove a vehicle and all of its documents
    Remove {
        /// Plate of the vehicle to remove
        plate: String,
    },
}

/// Arguments for registering a vehicle.
#[derive(Debug, Args)]
pub struct VehicleArgs {
    /// License plate
    pub plate: String,

    /// Manufacturer
    #[arg(long, default_value = "")]
    pub make: String,

    /// Model
    #[arg(long, default_value = "")]
    pub model: String,

    /// Usual driver
    #[arg(long, default_value = "")]
    pub driver: String,

    /// Driver phone number
    #[arg(long, default_value = "")]
    pub phone: String,

    /// Vehicle type
    #[arg(short = 't', long = "type", value_enum, default_value = "car")]
    pub vehicle_type: VehicleTypeArg,
}

/// Document commands.
#[derive(Debug, Subcommand)]
pub enum DocumentCommand {
    /// Add a document to a vehicle
    Add(DocumentArgs),

    /// List documents, soonest expiry first
    List {
        /// Only documents of this vehicle
        #[arg(short, long)]
        plate: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show one document
    Show {
        /// Document id
        id: i64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "plain")]
        format: OutputFormat,
    },

    /// Update a document
    Update {
        /// Document id
        id: i64,

        /// Document type
        #[arg(short = 't', long = "type")]
        document_type: Option<String>,

        /// Move the document to another vehicle
        #[arg(long)]
        plate: Option<String>,

        /// Reference number
        #[arg(short, long)]
        reference: Option<String>,

        /// First day of validity (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        from: Option<NaiveDate>,

        /// Expiration day (YYYY-MM-DD)
        #[arg(long, value_parser = parse_date)]
        expires: Option<NaiveDate>,

        /// Mark the document active
        #[arg(long, conflicts_with = "inactive")]
        active: bool,

        /// Mark the document inactive: it no longer gets reminders
        #[arg(long)]
        inactive: bool,
    },

    /// Remove a document
    Remove {
        /// Document id
        id: i64,
    },

    /// Search documents by plate or type
    Search {
        /// Text to look for, case-insensitive
        query: String,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Documents expiring within a number of days
    Expiring {
        /// Window in days
        #[arg(short, long, default_value = "30")]
        days: i64,

        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Documents already expired
    Expired {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
}

/// Arguments for adding a document.
#[derive(Debug, Args)]
pub struct DocumentArgs {
    /// Plate of the vehicle the document belongs to
    pub plate: String,

    /// Document type, e.g. "Assurance"
    #[arg(short = 't', long = "type")]
    pub document_type: String,

    /// Expiration day (YYYY-MM-DD)
    #[arg(short, long, value_parser = parse_date)]
    pub expires: NaiveDate,

    /// First day of validity (YYYY-MM-DD), defaults to today
    #[arg(long, value_parser = parse_date)]
    pub from: Option<NaiveDate>,

    /// Reference number
    #[arg(short, long, default_value = "")]
    pub reference: String,

    /// Store the document as inactive
    #[arg(long)]
    pub inactive: bool,
}

/// Notification settings commands.
#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show current settings
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Set the lead window in days (clamped to 1-365)
    Days {
        /// Number of days
        #[arg(allow_negative_numbers = true)]
        days: i64,
    },

    /// Replace the notification hours
    Hours {
        /// Hours of day (0-23)
        #[arg(required = true, num_args = 1..)]
        hours: Vec<u8>,
    },

    /// Replace the reminder intervals
    Intervals {
        /// Days before expiry
        #[arg(required = true, num_args = 1..)]
        intervals: Vec<u16>,
    },

    /// Add a notification hour
    AddHour {
        /// Hour of day (0-23)
        hour: u8,
    },

    /// Remove a notification hour
    RemoveHour {
        /// Hour of day (0-23)
        hour: u8,
    },

    /// Add a reminder interval
    AddInterval {
        /// Days before expiry
        days: u16,
    },

    /// Remove a reminder interval
    RemoveInterval {
        /// Days before expiry
        days: u16,
    },

    /// Turn reminders on
    Enable,

    /// Turn reminders off and cancel pending ones
    Disable,

    /// Restore default settings
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Reminder commands.
#[derive(Debug, Subcommand)]
pub enum RemindersCommand {
    /// Show the reminders that would be scheduled now, without scheduling
    Plan {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Rebuild scheduled reminders
    Sync,

    /// List scheduled reminders from the ledger
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// List notifications waiting to be delivered
    Pending {
        /// Output format
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Cancel reminders
    Cancel {
        /// Only the reminders of this document
        #[arg(short, long, conflicts_with = "all", required_unless_present = "all")]
        document: Option<i64>,

        /// Every reminder
        #[arg(long)]
        all: bool,
    },

    /// Deliver due notifications once and exit
    Deliver,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Vehicle type argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VehicleTypeArg {
    /// Car
    Car,
    /// Motorcycle
    Motorcycle,
}

impl From<VehicleTypeArg> for VehicleType {
    fn from(arg: VehicleTypeArg) -> Self {
        match arg {
            VehicleTypeArg::Car => Self::Car,
            VehicleTypeArg::Motorcycle => Self::Motorcycle,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD, got '{value}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vehicle_type_arg_conversion() {
        assert_eq!(VehicleType::from(VehicleTypeArg::Car), VehicleType::Car);
        assert_eq!(
            VehicleType::from(VehicleTypeArg::Motorcycle),
            VehicleType::Motorcycle
        );
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Plain);
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(
            parse_date("2024-12-31").unwrap(),
            NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
        );
        assert!(parse_date("31/12/2024").unwrap_err().contains("YYYY-MM-DD"));
        assert!(parse_date("2024-02-30").is_err());
    }

    #[test]
    fn test_config_command_debug() {
        let cmd = ConfigCommand::Show { json: false };
        let debug_str = format!("{cmd:?}");
        assert!(debug_str.contains("Show"));
    }
}
