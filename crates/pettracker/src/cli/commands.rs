//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use crate::geo::AlertType;
use crate::pages::home::EmergencyType;
use crate::pages::location::HistoryFilter;
use crate::pages::medical::{EmergencyKind, VaccineType};

/// Tag binding commands.
#[derive(Debug, Subcommand)]
pub enum TagCommand {
    /// Connect to a pet tracker by tag id
    Set {
        /// Tag id, 6-20 letters and digits
        tag_id: String,
    },

    /// Show the connected tag
    Show,

    /// Simulate an NFC read of a hardware serial
    Scan {
        /// Serial as reported by the reader, e.g. 04:a2:5b:1c:9f:61:80
        serial: String,
    },
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Navigate command arguments.
#[derive(Debug, Args)]
pub struct NavigateCommand {
    /// Route token, e.g. /home or /medical
    pub route: String,
}

/// Contact page commands.
#[derive(Debug, Subcommand)]
pub enum ContactCommand {
    /// Show the saved contact information
    Show,

    /// Edit fields and save
    Set {
        /// Fields as name=value, e.g. petName=Rex
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Print the contact card
    Card,

    /// Print the QR code text
    Qr,

    /// Report the pet as lost
    Lost {
        /// Where the pet was last seen
        #[arg(long)]
        last_seen: String,

        /// Additional details
        #[arg(long, default_value = "")]
        details: String,

        /// Attach the device position
        #[arg(long)]
        with_location: bool,
    },
}

/// Location page commands.
#[derive(Debug, Subcommand)]
pub enum LocationCommand {
    /// Show tracking status and recent positions
    Show,

    /// Record a position
    Update {
        /// Latitude in degrees
        #[arg(allow_hyphen_values = true)]
        latitude: f64,

        /// Longitude in degrees
        #[arg(allow_hyphen_values = true)]
        longitude: f64,

        /// Accuracy radius in meters
        #[arg(short, long)]
        accuracy: Option<f64>,
    },

    /// Record the device's current position
    Locate,

    /// List recorded positions, newest first
    History {
        /// Time window
        #[arg(short, long, value_enum, default_value = "all")]
        filter: HistoryFilterArg,
    },

    /// Export the history as CSV
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print a shareable link to the latest position
    Share,
}

/// Safe zone commands.
#[derive(Debug, Subcommand)]
pub enum GeofenceCommand {
    /// List safe zones
    List,

    /// Create a safe zone
    Add {
        /// Zone name
        name: String,

        /// Center as "lat, lng"
        #[arg(long, allow_hyphen_values = true)]
        center: String,

        /// Radius in meters
        #[arg(long)]
        radius: f64,

        /// Which edges raise an alert
        #[arg(long, value_enum, default_value = "both")]
        alert: AlertTypeArg,
    },

    /// Toggle a safe zone on or off
    Toggle {
        /// Zone id
        id: String,
    },

    /// Delete a safe zone
    Delete {
        /// Zone id
        id: String,
    },
}

/// Medical page commands.
#[derive(Debug, Subcommand)]
pub enum MedicalCommand {
    /// Show the medical summary and vaccination status
    Show,

    /// Edit fields and save
    Set {
        /// Fields as name=value, e.g. weight=12.5
        #[arg(required = true, value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Record a vaccination and save
    Vaccinate {
        /// Vaccine
        #[arg(value_enum)]
        vaccine: VaccineArg,

        /// Date given, YYYY-MM-DD
        date: NaiveDate,

        /// Mark as not current
        #[arg(long)]
        lapsed: bool,
    },

    /// Add a medication and save
    AddMedication {
        /// Drug name
        name: String,

        /// Dose and schedule
        #[arg(long, default_value = "")]
        dosage: String,

        /// Purpose or notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Export the medical report
    Export {
        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the medical card
    Card,

    /// Show how to reach the vet
    Vet,

    /// Report a medical emergency
    Emergency {
        /// What happened
        #[arg(value_enum)]
        kind: EmergencyKindArg,

        /// Symptoms and current condition
        #[arg(long)]
        symptoms: String,

        /// Where the pet is now
        #[arg(long, default_value = "")]
        location: String,
    },
}

/// Care reminder commands.
#[derive(Debug, Subcommand)]
pub enum ReminderCommand {
    /// List reminders
    List,

    /// Schedule a reminder
    Add {
        /// Kind of care, e.g. vaccination
        kind: String,

        /// Due date, YYYY-MM-DD
        date: NaiveDate,

        /// Notes
        #[arg(long, default_value = "")]
        notes: String,
    },
}

/// Emergency command arguments.
#[derive(Debug, Args)]
pub struct EmergencyCommand {
    /// What happened
    #[arg(value_enum)]
    pub kind: EmergencyTypeArg,

    /// Details
    #[arg(long, default_value = "")]
    pub details: String,

    /// Do not attach the device position
    #[arg(long)]
    pub no_location: bool,
}

/// Identity commands.
#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in: prints the login URL, then reads the redirect URL from stdin
    Login,

    /// Sign out
    Logout,

    /// Show who is signed in
    Status,
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

/// History window argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HistoryFilterArg {
    /// Today
    Today,
    /// Last seven days
    Week,
    /// Last thirty days
    Month,
    /// Everything
    All,
}

impl From<HistoryFilterArg> for HistoryFilter {
    fn from(arg: HistoryFilterArg) -> Self {
        match arg {
            HistoryFilterArg::Today => Self::Today,
            HistoryFilterArg::Week => Self::Week,
            HistoryFilterArg::Month => Self::Month,
            HistoryFilterArg::All => Self::All,
        }
    }
}

/// Geofence alert argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AlertTypeArg {
    /// On entering
    Enter,
    /// On leaving
    Exit,
    /// On both
    Both,
}

impl From<AlertTypeArg> for AlertType {
    fn from(arg: AlertTypeArg) -> Self {
        match arg {
            AlertTypeArg::Enter => Self::Enter,
            AlertTypeArg::Exit => Self::Exit,
            AlertTypeArg::Both => Self::Both,
        }
    }
}

/// Vaccine argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VaccineArg {
    /// Rabies
    Rabies,
    /// Distemper combination
    Dhpp,
    /// Kennel cough
    Bordetella,
    /// Lyme disease
    Lyme,
}

impl From<VaccineArg> for VaccineType {
    fn from(arg: VaccineArg) -> Self {
        match arg {
            VaccineArg::Rabies => Self::Rabies,
            VaccineArg::Dhpp => Self::Dhpp,
            VaccineArg::Bordetella => Self::Bordetella,
            VaccineArg::Lyme => Self::Lyme,
        }
    }
}

/// Dashboard emergency argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmergencyTypeArg {
    /// Pet is lost
    Lost,
    /// Pet is injured
    Injured,
    /// Pet is sick
    Sick,
    /// Found a pet
    Found,
    /// Anything else
    Other,
}

impl From<EmergencyTypeArg> for EmergencyType {
    fn from(arg: EmergencyTypeArg) -> Self {
        match arg {
            EmergencyTypeArg::Lost => Self::Lost,
            EmergencyTypeArg::Injured => Self::Injured,
            EmergencyTypeArg::Sick => Self::Sick,
            EmergencyTypeArg::Found => Self::Found,
            EmergencyTypeArg::Other => Self::Other,
        }
    }
}

/// Medical emergency argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EmergencyKindArg {
    /// Injury
    Injured,
    /// Poisoning
    Poisoned,
    /// Allergic reaction
    AllergicReaction,
    /// Seizure
    Seizure,
    /// Breathing trouble
    Respiratory,
    /// Unconscious
    Unconscious,
    /// Anything else
    Other,
}

impl From<EmergencyKindArg> for EmergencyKind {
    fn from(arg: EmergencyKindArg) -> Self {
        match arg {
            EmergencyKindArg::Injured => Self::Injured,
            EmergencyKindArg::Poisoned => Self::Poisoned,
            EmergencyKindArg::AllergicReaction => Self::AllergicReaction,
            EmergencyKindArg::Seizure => Self::Seizure,
            EmergencyKindArg::Respiratory => Self::Respiratory,
            EmergencyKindArg::Unconscious => Self::Unconscious,
            EmergencyKindArg::Other => Self::Other,
        }
    }
}

/// Parse a `name=value` form field.
fn parse_field(s: &str) -> Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{s}'"))?;
    if name.is_empty() {
        return Err(format!("missing field name in '{s}'"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field() {
        assert_eq!(
            parse_field("petName=Rex").unwrap(),
            ("petName".to_string(), "Rex".to_string())
        );
        assert_eq!(
            parse_field("notes=a=b").unwrap(),
            ("notes".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_field("email=").unwrap().1, "");
        assert!(parse_field("petName").is_err());
        assert!(parse_field("=Rex").is_err());
    }

    #[test]
    fn test_value_enum_conversions() {
        assert_eq!(HistoryFilter::from(HistoryFilterArg::Week), HistoryFilter::Week);
        assert_eq!(AlertType::from(AlertTypeArg::Exit), AlertType::Exit);
        assert_eq!(VaccineType::from(VaccineArg::Dhpp), VaccineType::Dhpp);
        assert_eq!(EmergencyType::from(EmergencyTypeArg::Found), EmergencyType::Found);
        assert_eq!(
            EmergencyKind::from(EmergencyKindArg::AllergicReaction),
            EmergencyKind::AllergicReaction
        );
    }
}
