//! Plain-text rendering of page view models.
//!
//! Pages build typed view models; everything that turns them into text for
//! display lives here and in the [`Render`] impls beside each model.

use std::fmt;

use chrono::{DateTime, Local, SecondsFormat, Utc};

/// Severity of a transient user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    /// The action succeeded.
    Success,
    /// Neutral information.
    Info,
    /// The action could not proceed.
    Warning,
    /// The action failed.
    Error,
}

impl fmt::Display for ToastLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A transient user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    /// Severity.
    pub level: ToastLevel,
    /// Text shown to the user.
    pub message: String,
}

impl Toast {
    /// Create a toast.
    #[must_use]
    pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for Toast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// A generated file for the user to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Suggested file name.
    pub file_name: String,
    /// File contents.
    pub contents: String,
}

/// Render a view model as display text.
pub trait Render {
    /// The rendered text.
    fn render(&self) -> String;
}

/// `"Just now"`, `"5 minutes ago"`, ... falling back to a date after a week.
#[must_use]
pub fn time_ago(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds();
    let minutes = seconds / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    let plural = |n: i64| if n == 1 { "" } else { "s" };
    if seconds < 60 {
        "Just now".to_string()
    } else if minutes < 60 {
        format!("{minutes} minute{} ago", plural(minutes))
    } else if hours < 24 {
        format!("{hours} hour{} ago", plural(hours))
    } else if days < 7 {
        format!("{days} day{} ago", plural(days))
    } else {
        format_date(then)
    }
}

/// Short local date, e.g. `Jan 15, 2024`.
#[must_use]
pub fn format_date(when: DateTime<Utc>) -> String {
    when.with_timezone(&Local).format("%b %-d, %Y").to_string()
}

/// Long local date and time, e.g. `January 15, 2024 at 10:30 AM`.
#[must_use]
pub fn format_date_long(when: DateTime<Utc>) -> String {
    when.with_timezone(&Local)
        .format("%B %-d, %Y at %I:%M %p")
        .to_string()
}

/// UTC timestamp with milliseconds, e.g. `2024-01-15T10:30:00.000Z`.
#[must_use]
pub fn iso_timestamp(when: DateTime<Utc>) -> String {
    when.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `"lat, lng"` with fixed precision.
#[must_use]
pub fn format_coordinates(lat: f64, lng: f64, precision: usize) -> String {
    format!("{lat:.precision$}, {lng:.precision$}")
}

/// Google Maps link for a point.
#[must_use]
pub fn maps_link(lat: f64, lng: f64) -> String {
    format!("https://maps.google.com/maps?q={lat},{lng}")
}

/// Append `label: value` when `value` is non-empty.
pub(crate) fn push_field(lines: &mut Vec<String>, label: &str, value: &str) {
    if !value.is_empty() {
        lines.push(format!("{label}: {value}"));
    }
}
