//! Command-line interface for pettracker.
//!
//! This module provides the CLI structure for the `pettrack` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AlertTypeArg, AuthCommand, ConfigCommand, ContactCommand, EmergencyCommand, EmergencyKindArg,
    EmergencyTypeArg, GeofenceCommand, HistoryFilterArg, LocationCommand, MedicalCommand,
    NavigateCommand, ReminderCommand, StatusCommand, TagCommand, VaccineArg,
};

/// pettrack - Keep your pet's NFC tracker profile at hand
///
/// Binds an NFC tag to a pet profile with contact, medical and location
/// records, watches safe zones and reports events to an issue tracker.
#[derive(Debug, Parser)]
#[command(name = "pettrack")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
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
    /// Connect to or inspect the pet tracker tag
    #[command(subcommand)]
    Tag(TagCommand),

    /// Show the dashboard
    Status(StatusCommand),

    /// Open a page by route token
    Navigate(NavigateCommand),

    /// Contact information
    #[command(subcommand)]
    Contact(ContactCommand),

    /// Location tracking
    #[command(subcommand)]
    Location(LocationCommand),

    /// Safe zones
    #[command(subcommand)]
    Geofence(GeofenceCommand),

    /// Medical records
    #[command(subcommand)]
    Medical(MedicalCommand),

    /// Care reminders
    #[command(subcommand)]
    Reminder(ReminderCommand),

    /// Send an emergency alert
    Emergency(EmergencyCommand),

    /// Supporter sign-in
    #[command(subcommand)]
    Auth(AuthCommand),

    /// Read bridge messages from stdin, one JSON object per line
    Listen,

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
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
