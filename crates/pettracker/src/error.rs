//! Error types for pettracker.
//!
//! This module defines the error types used throughout the crate. The
//! variants follow the failure taxonomy of the tracker: validation errors
//! block a save and are fixed by the user, transient I/O errors abandon the
//! operation, state-integrity errors fail closed, and notification delivery
//! errors never reach this type at all (the notifier swallows them).

use std::path::PathBuf;
use thiserror::Error;

use crate::geolocation::GeolocationError;
use crate::pages::validation::FormErrors;

/// The main error type for pettracker operations.
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

    // === Tag and State Integrity Errors ===
    /// The supplied string is not a valid tag identifier.
    #[error("invalid tag id '{input}': expected 6-20 alphanumeric characters")]
    InvalidTag {
        /// The rejected input.
        input: String,
    },

    /// The operation needs a bound tag id and none is set.
    #[error("no pet tracker connected; scan or enter a tag id first")]
    TagRequired,

    /// The OAuth callback `state` did not match the stored anti-forgery value.
    #[error("authentication failed: invalid state")]
    OAuthStateMismatch,

    /// The identity provider reported an error or returned unusable data.
    #[error("authentication failed: {0}")]
    Provider(String),

    /// The identity provider is not configured.
    #[error("identity provider is not configured")]
    ProviderNotConfigured,

    // === Validation Errors ===
    /// One or more form fields failed validation; nothing was persisted.
    #[error("please fix validation errors before saving: {0}")]
    Validation(FormErrors),

    /// A form field name that the page does not have.
    #[error("unknown field '{field}'")]
    UnknownField {
        /// The rejected field name.
        field: String,
    },

    /// Coordinates could not be parsed.
    #[error("invalid coordinates format: {input}")]
    InvalidCoordinates {
        /// The rejected input.
        input: String,
    },

    // === Network Errors ===
    /// An HTTP request failed to complete.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// An HTTP request completed with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// The requested URL.
        url: String,
        /// The response status code.
        status: u16,
    },

    /// A URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Position lookup failed.
    #[error("{}", .0.user_message())]
    Geolocation(#[from] GeolocationError),

    // === Router Errors ===
    /// A page bundle could not be loaded.
    #[error("failed to load page bundle {path}: {message}")]
    BundleLoad {
        /// The bundle path that failed.
        path: String,
        /// Description of what went wrong.
        message: String,
    },

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

/// A specialized Result type for pettracker operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a new identity provider error.
    #[must_use]
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider(message.into())
    }

    /// Create a bundle load error.
    #[must_use]
    pub fn bundle_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BundleLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Check if this error is a form validation failure.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::InvalidTag { .. }
                | Self::UnknownField { .. }
                | Self::InvalidCoordinates { .. }
        )
    }

    /// Check if this error is a fail-closed state-integrity error.
    #[must_use]
    pub fn is_state_integrity(&self) -> bool {
        matches!(self, Self::TagRequired | Self::OAuthStateMismatch)
    }

    /// Check if this error is a transient network or device failure.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::HttpStatus { .. } | Self::Geolocation(_) | Self::BundleLoad { .. }
        )
    }
}
