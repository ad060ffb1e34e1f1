//! Location page: position history, analytics, exports and safe zones.
//!
//! Location records are append-only; `history` is in arrival order, which is
//! also chronological. Safe zones live under their own key and carry the
//! inside/outside status from the last check.

use std::fmt;

use chrono::{DateTime, Duration, Local, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::validation::FormErrors;
use super::PageContext;
use crate::error::{Error, Result};
use crate::geo::{self, AlertType, Geofence, GeofenceEvent};
use crate::geolocation::{self, PositionOptions};
use crate::profile::ProfilePatch;
use crate::storage::StorageKey;
use crate::tag::TagId;
use crate::timer::{self, TimerHandle, TimerKind};
use crate::view::{self, Export, Render, ToastLevel};

/// Header row of the history export.
pub const CSV_HEADER: &str = "Timestamp,Latitude,Longitude,Accuracy,Source";

/// Entries shown in the recent-history list.
const RECENT_COUNT: usize = 5;

/// Where a position came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationSource {
    /// Requested from the location page.
    Manual,
    /// Pushed over the automation bridge.
    Tasker,
    /// Anything else found in storage.
    #[serde(other)]
    Other,
}

impl fmt::Display for LocationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Tasker => write!(f, "tasker"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// One recorded position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRecord {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Accuracy radius in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// When the position was recorded.
    pub timestamp: DateTime<Utc>,
    /// Where it came from.
    #[serde(default)]
    pub source: Option<LocationSource>,
}

impl LocationRecord {
    /// Accuracy as `"<n>m"`, or `"Unknown"`.
    #[must_use]
    pub fn accuracy_text(&self) -> String {
        self.accuracy
            .map_or_else(|| "Unknown".to_string(), |a| format!("{a}m"))
    }
}

/// Last known position and full history for one tag.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LocationState {
    /// Most recent position.
    pub last_known: Option<LocationRecord>,
    /// Every position, oldest first.
    pub history: Vec<LocationRecord>,
}

impl LocationState {
    /// Append a position and make it the last known one.
    pub fn push(&mut self, record: LocationRecord) {
        self.last_known = Some(record.clone());
        self.history.push(record);
    }

    /// The newest history entry.
    #[must_use]
    pub fn latest(&self) -> Option<&LocationRecord> {
        self.history.last()
    }

    /// Up to `count` entries, newest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> Vec<LocationRecord> {
        self.history.iter().rev().take(count).cloned().collect()
    }
}

/// Freshness of the tracked position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingStatus {
    /// No tag bound.
    Disconnected,
    /// Nothing recorded yet.
    NoData,
    /// Under five minutes old.
    Live,
    /// Under thirty minutes old.
    Recent,
    /// Older.
    Stale,
}

impl TrackingStatus {
    /// Classify the newest record.
    #[must_use]
    pub fn classify(tag_bound: bool, latest: Option<&LocationRecord>, now: DateTime<Utc>) -> Self {
        if !tag_bound {
            return Self::Disconnected;
        }
        let Some(latest) = latest else {
            return Self::NoData;
        };
        let minutes = (now - latest.timestamp).num_minutes();
        if minutes < 5 {
            Self::Live
        } else if minutes < 30 {
            Self::Recent
        } else {
            Self::Stale
        }
    }
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::NoData => write!(f, "No Data"),
            Self::Live => write!(f, "Live"),
            Self::Recent => write!(f, "Recent"),
            Self::Stale => write!(f, "Stale"),
        }
    }
}

/// Summary figures over the whole history.
#[derive(Debug, Clone, PartialEq)]
pub struct Analytics {
    /// Sum of distances between consecutive records, in km.
    pub total_distance_km: f64,
    /// Records from today's local date.
    pub locations_today: usize,
    /// Timestamp of the newest record.
    pub last_update: Option<DateTime<Utc>>,
    /// Mean of the non-zero accuracies, in meters.
    pub average_accuracy: Option<f64>,
    now: DateTime<Utc>,
}

impl Analytics {
    /// Compute analytics as of `now`.
    #[must_use]
    pub fn compute(history: &[LocationRecord], now: DateTime<Utc>) -> Self {
        let total_distance_km = history
            .windows(2)
            .map(|pair| {
                geo::distance_km(
                    pair[0].latitude,
                    pair[0].longitude,
                    pair[1].latitude,
                    pair[1].longitude,
                )
            })
            .sum();

        let today = now.with_timezone(&Local).date_naive();
        let locations_today = history
            .iter()
            .filter(|r| r.timestamp.with_timezone(&Local).date_naive() == today)
            .count();

        let accuracies: Vec<f64> = history
            .iter()
            .filter_map(|r| r.accuracy)
            .filter(|a| *a > 0.0)
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let average_accuracy = (!accuracies.is_empty())
            .then(|| accuracies.iter().sum::<f64>() / accuracies.len() as f64);

        Self {
            total_distance_km,
            locations_today,
            last_update: history.last().map(|r| r.timestamp),
            average_accuracy,
            now,
        }
    }
}

impl Render for Analytics {
    fn render(&self) -> String {
        let last_update = self
            .last_update
            .map_or_else(|| "--".to_string(), |t| view::time_ago(t, self.now));
        let accuracy = self
            .average_accuracy
            .map_or_else(|| "--".to_string(), |a| format!("±{}m", a.round()));
        format!(
            "Total Distance: {}\nLocations Today: {}\nLast Update: {last_update}\nAverage Accuracy: {accuracy}",
            geo::format_distance(self.total_distance_km),
            self.locations_today
        )
    }
}

/// Time window for the history list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryFilter {
    /// Today's local date.
    Today,
    /// The last seven days.
    Week,
    /// The last thirty days.
    Month,
    /// Everything.
    #[default]
    All,
}

impl HistoryFilter {
    /// Whether `record` falls in the window ending at `now`.
    #[must_use]
    pub fn matches(self, record: &LocationRecord, now: DateTime<Utc>) -> bool {
        match self {
            Self::Today => {
                record.timestamp.with_timezone(&Local).date_naive()
                    == now.with_timezone(&Local).date_naive()
            }
            Self::Week => record.timestamp >= now - Duration::days(7),
            Self::Month => record.timestamp >= now - Duration::days(30),
            Self::All => true,
        }
    }
}

impl std::str::FromStr for HistoryFilter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "today" => Ok(Self::Today),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "all" => Ok(Self::All),
            other => Err(Error::internal(format!("unknown history filter: {other}"))),
        }
    }
}

/// The history as CSV, header first, one row per record in stored order.
#[must_use]
pub fn history_csv(history: &[LocationRecord]) -> String {
    let mut lines = Vec::with_capacity(history.len() + 1);
    lines.push(CSV_HEADER.to_string());
    lines.extend(history.iter().map(|r| {
        format!(
            "{},{},{},{},{}",
            view::iso_timestamp(r.timestamp),
            r.latitude,
            r.longitude,
            r.accuracy.map(|a| a.to_string()).unwrap_or_default(),
            r.source.map(|s| s.to_string()).unwrap_or_default()
        )
    }));
    lines.join("\n")
}

/// A new safe zone as entered by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceDraft {
    /// Zone name.
    pub name: String,
    /// Center as `"lat, lng"`.
    pub center: String,
    /// Radius in meters.
    pub radius: f64,
    /// Which edges alert.
    pub alert_type: AlertType,
}

/// Everything the location page shows.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationView {
    /// Freshness.
    pub status: TrackingStatus,
    /// Last known position.
    pub current: Option<LocationRecord>,
    /// Newest entries first.
    pub recent: Vec<LocationRecord>,
    /// Summary figures.
    pub analytics: Analytics,
    /// Configured safe zones.
    pub geofences: Vec<Geofence>,
    now: DateTime<Utc>,
}

impl Render for LocationView {
    fn render(&self) -> String {
        let mut lines = vec![format!("Status: {}", self.status)];

        match &self.current {
            Some(current) => {
                let accuracy = current
                    .accuracy
                    .map_or_else(|| "Unknown".to_string(), |a| format!("±{}m", a.round()));
                let source = current
                    .source
                    .map_or_else(|| "Unknown".to_string(), |s| s.to_string());
                lines.push(format!(
                    "Current: {} ({accuracy}, {source}, {})",
                    view::format_coordinates(current.latitude, current.longitude, 6),
                    view::time_ago(current.timestamp, self.now)
                ));
            }
            None => lines.push("Current: No location data available".to_string()),
        }

        lines.push(String::new());
        lines.push("Recent:".to_string());
        if self.recent.is_empty() {
            lines.push("  No location history available".to_string());
        }
        for record in &self.recent {
            lines.push(format!(
                "  {} - {}",
                view::format_coordinates(record.latitude, record.longitude, 4),
                view::time_ago(record.timestamp, self.now)
            ));
        }

        lines.push(String::new());
        lines.push(self.analytics.render());

        lines.push(String::new());
        lines.push("Safe Zones:".to_string());
        lines.push(render_geofences(&self.geofences));
        lines.join("\n")
    }
}

fn render_geofences(geofences: &[Geofence]) -> String {
    if geofences.is_empty() {
        return "  No safe zones configured".to_string();
    }
    geofences
        .iter()
        .map(|g| {
            format!(
                "  {} [{}] {}m radius, alert on {}{}",
                g.name,
                g.id,
                g.radius,
                g.alert_type,
                if g.is_active { "" } else { " (disabled)" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn load_state(ctx: &PageContext<'_>, tag: &TagId) -> Result<LocationState> {
    let stored: Option<LocationState> = ctx.store.load(&StorageKey::Location(tag.clone()))?;
    Ok(stored
        .or_else(|| ctx.user.map(|u| u.location.clone()))
        .unwrap_or_default())
}

/// Append a position for `tag`, persist it and check safe zones.
///
/// Shared by the location page and the shell's bridge handler.
///
/// # Errors
///
/// Returns an error if storage cannot be read or written.
pub async fn record_location(
    ctx: &mut PageContext<'_>,
    tag: &TagId,
    record: LocationRecord,
) -> Result<LocationState> {
    let mut state = load_state(ctx, tag)?;
    state.push(record.clone());
    ctx.store.save(&StorageKey::Location(tag.clone()), &state)?;
    debug!(tag = %tag, entries = state.history.len(), "Location recorded");

    check_geofences(ctx, tag, &record).await?;
    Ok(state)
}

/// Classify `record` against the tag's safe zones and raise alerts.
///
/// Every zone's status is persisted whether or not it alerted.
///
/// # Errors
///
/// Returns an error if storage cannot be read or written.
pub async fn check_geofences(
    ctx: &mut PageContext<'_>,
    tag: &TagId,
    record: &LocationRecord,
) -> Result<Vec<GeofenceEvent>> {
    let key = StorageKey::Geofences(tag.clone());
    let mut geofences: Vec<Geofence> = ctx.store.load_or_default(&key)?;
    if geofences.is_empty() {
        return Ok(Vec::new());
    }

    let events = geo::evaluate(&mut geofences, record.latitude, record.longitude);
    ctx.store.save(&key, &geofences)?;

    for event in &events {
        let zone = &event.geofence;
        let direction = event.direction.to_string();
        info!(tag = %tag, zone = %zone.name, %direction, "Geofence edge");

        ctx.notifier
            .create_issue(
                format!("🚨 Geofence Alert - {tag}"),
                format!(
                    "Geofence alert for pet tracker {tag}\n\n\
                     Pet {direction} safe zone: {}\n\
                     Location: {}, {}\n\
                     Zone Center: {}, {}\n\
                     Zone Radius: {}m\n\
                     Timestamp: {}",
                    zone.name,
                    record.latitude,
                    record.longitude,
                    zone.center_lat,
                    zone.center_lng,
                    zone.radius,
                    view::iso_timestamp(record.timestamp)
                ),
                &["geofence-alert", &direction, &tag.label()],
                Some(tag),
            )
            .await;

        let message = format!(
            "{} has {direction} the safe zone \"{}\"",
            ctx.pet_name(),
            zone.name
        );
        ctx.toast(ToastLevel::Warning, message);
    }
    Ok(events)
}

/// A position pushed from outside the location page.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LocationUpdate {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Accuracy radius in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
}

/// Report and record a pushed position for `tag`.
///
/// Returns `None` without recording when the owner has turned tracking off.
///
/// # Errors
///
/// Returns an error if storage cannot be read or written.
pub async fn report_location_update(
    ctx: &mut PageContext<'_>,
    tag: &TagId,
    update: LocationUpdate,
    source: LocationSource,
) -> Result<Option<LocationState>> {
    if ctx.user.is_some_and(|u| !u.preferences.tracking_enabled) {
        info!(tag = %tag, "Tracking disabled, ignoring location update");
        return Ok(None);
    }

    let record = LocationRecord {
        latitude: update.latitude,
        longitude: update.longitude,
        accuracy: update.accuracy,
        timestamp: ctx.now,
        source: Some(source),
    };

    ctx.notifier
        .create_issue(
            format!("Location Update - {tag}"),
            format!(
                "Location updated for pet tracker {tag}\n\n\
                 Latitude: {}\nLongitude: {}\nAccuracy: {}\nTimestamp: {}",
                record.latitude,
                record.longitude,
                record.accuracy_text(),
                view::iso_timestamp(record.timestamp)
            ),
            &["location-update", &tag.label()],
            Some(tag),
        )
        .await;

    let state = record_location(ctx, tag, record).await?;
    ctx.toast(ToastLevel::Success, "Location updated successfully");
    Ok(Some(state))
}

/// Location page state.
#[derive(Debug, Default)]
pub struct LocationPage {
    initialized: bool,
    state: LocationState,
    geofences: Vec<Geofence>,
    refresh_timer: Option<TimerHandle>,
}

impl LocationPage {
    /// An uninitialized page.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `init` has run.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Load history and safe zones and start the refresh timer.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn init(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        debug!("Initializing location page");

        self.reload(ctx)?;
        self.refresh_timer = Some(timer::spawn_periodic(
            TimerKind::LocationRefresh,
            std::time::Duration::from_secs(ctx.timers.refresh_secs),
            ctx.ticks.clone(),
        ));
        self.initialized = true;
        Ok(())
    }

    /// Stop the refresh timer.
    pub fn destroy(&mut self) {
        if let Some(mut handle) = self.refresh_timer.take() {
            handle.stop();
        }
        self.initialized = false;
    }

    /// Re-read history and safe zones, picking up bridge updates.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn refresh(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        self.reload(ctx)
    }

    fn reload(&mut self, ctx: &PageContext<'_>) -> Result<()> {
        let Some(tag) = ctx.tag else {
            self.state = LocationState::default();
            self.geofences.clear();
            return Ok(());
        };
        self.state = load_state(ctx, tag)?;
        self.geofences = ctx.store.load_or_default(&StorageKey::Geofences(tag.clone()))?;
        Ok(())
    }

    /// Current history and last known position.
    #[must_use]
    pub fn state(&self) -> &LocationState {
        &self.state
    }

    /// Configured safe zones.
    #[must_use]
    pub fn geofences(&self) -> &[Geofence] {
        &self.geofences
    }

    /// Freshness of the newest record.
    #[must_use]
    pub fn status(&self, ctx: &PageContext<'_>) -> TrackingStatus {
        TrackingStatus::classify(ctx.tag.is_some(), self.state.latest(), ctx.now)
    }

    /// Everything the page shows.
    #[must_use]
    pub fn view(&self, ctx: &PageContext<'_>) -> LocationView {
        LocationView {
            status: self.status(ctx),
            current: self.state.last_known.clone(),
            recent: self.state.recent(RECENT_COUNT),
            analytics: Analytics::compute(&self.state.history, ctx.now),
            geofences: self.geofences.clone(),
            now: ctx.now,
        }
    }

    /// History entries in the window, newest first.
    #[must_use]
    pub fn history(&self, filter: HistoryFilter, now: DateTime<Utc>) -> Vec<&LocationRecord> {
        self.state
            .history
            .iter()
            .rev()
            .filter(|r| filter.matches(r, now))
            .collect()
    }

    /// Ask the device for its position and record it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, [`Error::Geolocation`]
    /// if the position lookup fails, or a storage error.
    pub async fn update_current_location(
        &mut self,
        ctx: &mut PageContext<'_>,
    ) -> Result<ProfilePatch> {
        let tag = ctx.require_tag()?;

        let position = match geolocation::locate(ctx.geolocator, PositionOptions::tracking()).await
        {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "Failed to update location");
                ctx.toast(ToastLevel::Error, e.user_message());
                return Err(e.into());
            }
        };

        let record = LocationRecord {
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy: position.accuracy,
            timestamp: ctx.now,
            source: Some(LocationSource::Manual),
        };

        ctx.notifier
            .create_issue(
                format!("Location Update - {tag}"),
                format!(
                    "Manual location update for pet tracker {tag}\n\n\
                     Latitude: {}\nLongitude: {}\nAccuracy: {}\nTimestamp: {}",
                    record.latitude,
                    record.longitude,
                    record.accuracy_text(),
                    view::iso_timestamp(record.timestamp)
                ),
                &["location-update", "manual", &tag.label()],
                Some(&tag),
            )
            .await;

        let state = record_location(ctx, &tag, record).await?;
        self.state = state.clone();
        self.geofences = ctx.store.load_or_default(&StorageKey::Geofences(tag))?;

        ctx.toast(ToastLevel::Success, "Location updated successfully!");
        Ok(ProfilePatch::Location(state))
    }

    /// Reverse-geocode the last known position.
    pub async fn address(&self, ctx: &mut PageContext<'_>) -> Option<String> {
        let Some(current) = self.state.latest() else {
            ctx.toast(ToastLevel::Warning, "No current location available");
            return None;
        };
        let address = ctx
            .geocoder
            .address_for(current.latitude, current.longitude)
            .await;
        ctx.toast(ToastLevel::Info, format!("Address: {address}"));
        Some(address)
    }

    /// `"lat, lng"` of the newest record, for a new zone's center.
    pub fn current_center(&self, ctx: &mut PageContext<'_>) -> Option<String> {
        if let Some(latest) = self.state.latest() {
            Some(format!("{}, {}", latest.latitude, latest.longitude))
        } else {
            ctx.toast(ToastLevel::Warning, "No current location available");
            None
        }
    }

    /// `(title, text)` sharing a map link to the newest record.
    pub fn share(&self, ctx: &mut PageContext<'_>) -> Option<(String, String)> {
        let Some(latest) = self.state.latest() else {
            ctx.toast(ToastLevel::Warning, "No location to share");
            return None;
        };
        let pet = ctx.pet_name();
        Some((
            format!("{pet} Location"),
            format!(
                "{pet}'s location: {}",
                view::maps_link(latest.latitude, latest.longitude)
            ),
        ))
    }

    /// The full history as CSV.
    pub fn export_csv(&self, ctx: &mut PageContext<'_>) -> Option<Export> {
        if self.state.history.is_empty() {
            ctx.toast(ToastLevel::Warning, "No location history to export");
            return None;
        }
        let tag = ctx.tag.map(ToString::to_string).unwrap_or_default();
        let export = Export {
            file_name: format!(
                "pet-location-history-{tag}-{}.csv",
                ctx.now.format("%Y-%m-%d")
            ),
            contents: history_csv(&self.state.history),
        };
        ctx.toast(ToastLevel::Success, "Location history exported");
        Some(export)
    }

    /// Create a safe zone and report it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, [`Error::Validation`] for
    /// an empty name or non-positive radius, [`Error::InvalidCoordinates`]
    /// for a malformed center, or a storage error.
    pub async fn add_geofence(
        &mut self,
        ctx: &mut PageContext<'_>,
        draft: GeofenceDraft,
    ) -> Result<Geofence> {
        let tag = ctx.require_tag()?;

        let checked = if draft.name.trim().is_empty() {
            Err(Error::Validation(FormErrors::single(
                "zoneName",
                "Zone Name is required",
            )))
        } else if !(draft.radius.is_finite() && draft.radius > 0.0) {
            Err(Error::Validation(FormErrors::single(
                "radius",
                "Radius must be a positive number",
            )))
        } else {
            geo::parse_center(&draft.center)
        };
        let center = match checked {
            Ok(center) => center,
            Err(e) => {
                ctx.toast(
                    ToastLevel::Error,
                    format!("Failed to create safe zone: {e}"),
                );
                return Err(e);
            }
        };

        let key = StorageKey::Geofences(tag.clone());
        let mut geofences: Vec<Geofence> = ctx.store.load_or_default(&key)?;
        let geofence = Geofence::new(
            draft.name.trim(),
            center,
            draft.radius,
            draft.alert_type,
            ctx.now,
        );
        geofences.push(geofence.clone());
        ctx.store.save(&key, &geofences)?;
        self.geofences = geofences;
        info!(tag = %tag, zone = %geofence.name, "Geofence created");

        ctx.notifier
            .create_issue(
                format!("Geofence Created - {tag}"),
                format!(
                    "New geofence created for pet tracker {tag}\n\n\
                     Zone Name: {}\nCenter: {}, {}\nRadius: {}m\nAlert Type: {}\nCreated: {}",
                    geofence.name,
                    geofence.center_lat,
                    geofence.center_lng,
                    geofence.radius,
                    geofence.alert_type,
                    view::iso_timestamp(geofence.created_at)
                ),
                &["geofence", "configuration", &tag.label()],
                Some(&tag),
            )
            .await;

        ctx.toast(ToastLevel::Success, "Safe zone created successfully!");
        Ok(geofence)
    }

    /// Flip a zone between enabled and disabled.
    ///
    /// Returns the new state, or `None` if no zone has that id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, or a storage error.
    pub fn toggle_geofence(&mut self, ctx: &mut PageContext<'_>, id: &str) -> Result<Option<bool>> {
        let tag = ctx.require_tag()?;
        let key = StorageKey::Geofences(tag);
        let mut geofences: Vec<Geofence> = ctx.store.load_or_default(&key)?;

        let Some(zone) = geofences.iter_mut().find(|g| g.id == id) else {
            return Ok(None);
        };
        zone.is_active = !zone.is_active;
        let active = zone.is_active;

        ctx.store.save(&key, &geofences)?;
        self.geofences = geofences;
        ctx.toast(
            ToastLevel::Success,
            if active {
                "Safe zone enabled"
            } else {
                "Safe zone disabled"
            },
        );
        Ok(Some(active))
    }

    /// Remove a zone. Returns whether one was removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, or a storage error.
    pub fn delete_geofence(&mut self, ctx: &mut PageContext<'_>, id: &str) -> Result<bool> {
        let tag = ctx.require_tag()?;
        let key = StorageKey::Geofences(tag);
        let mut geofences: Vec<Geofence> = ctx.store.load_or_default(&key)?;

        let before = geofences.len();
        geofences.retain(|g| g.id != id);
        if geofences.len() == before {
            return Ok(false);
        }

        ctx.store.save(&key, &geofences)?;
        self.geofences = geofences;
        ctx.toast(ToastLevel::Success, "Safe zone deleted");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Harness;
    use super::*;
    use crate::geo::EdgeDirection;
    use crate::geolocation::GeolocationError;

    fn record_at(latitude: f64, longitude: f64, minutes_ago: i64) -> LocationRecord {
        LocationRecord {
            latitude,
            longitude,
            accuracy: Some(10.0),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
            source: Some(LocationSource::Tasker),
        }
    }

    #[test]
    fn test_status_thresholds() {
        let now = Utc::now();
        let at = |m| record_at(0.0, 0.0, m);
        assert_eq!(
            TrackingStatus::classify(false, Some(&at(0)), now),
            TrackingStatus::Disconnected
        );
        assert_eq!(TrackingStatus::classify(true, None, now), TrackingStatus::NoData);
        assert_eq!(TrackingStatus::classify(true, Some(&at(2)), now), TrackingStatus::Live);
        assert_eq!(TrackingStatus::classify(true, Some(&at(10)), now), TrackingStatus::Recent);
        assert_eq!(TrackingStatus::classify(true, Some(&at(45)), now), TrackingStatus::Stale);
        assert_eq!(TrackingStatus::NoData.to_string(), "No Data");
    }

    #[test]
    fn test_analytics() {
        let now = Utc::now();
        let history = vec![
            LocationRecord {
                accuracy: Some(20.0),
                ..record_at(0.0, 0.0, 2)
            },
            LocationRecord {
                accuracy: None,
                ..record_at(0.0045, 0.0, 1)
            },
            record_at(0.009, 0.0, 0),
        ];
        let analytics = Analytics::compute(&history, now);
        assert!((analytics.total_distance_km - 1.0).abs() < 0.01);
        assert_eq!(analytics.average_accuracy, Some(15.0));
        assert_eq!(analytics.last_update, Some(history[2].timestamp));

        let rendered = analytics.render();
        assert!(rendered.contains("Average Accuracy: ±15m"));
        assert!(rendered.contains("Last Update: Just now"));
    }

    #[test]
    fn test_analytics_empty() {
        let analytics = Analytics::compute(&[], Utc::now());
        assert_eq!(analytics.locations_today, 0);
        let rendered = analytics.render();
        assert!(rendered.contains("Total Distance: 0m"));
        assert!(rendered.contains("Last Update: --"));
        assert!(rendered.contains("Average Accuracy: --"));
    }

    #[test]
    fn test_history_filter() {
        let now = Utc::now();
        let recent = record_at(0.0, 0.0, 0);
        let ten_days = record_at(0.0, 0.0, 10 * 24 * 60);
        let sixty_days = record_at(0.0, 0.0, 60 * 24 * 60);

        assert!(HistoryFilter::Today.matches(&recent, now));
        assert!(!HistoryFilter::Week.matches(&ten_days, now));
        assert!(HistoryFilter::Month.matches(&ten_days, now));
        assert!(!HistoryFilter::Month.matches(&sixty_days, now));
        assert!(HistoryFilter::All.matches(&sixty_days, now));
        assert_eq!("week".parse::<HistoryFilter>().unwrap(), HistoryFilter::Week);
        assert!("year".parse::<HistoryFilter>().is_err());
    }

    #[test]
    fn test_csv_has_header_plus_one_row_per_record() {
        let history = vec![
            LocationRecord {
                latitude: 40.712_776,
                longitude: -74.005_974,
                accuracy: Some(12.5),
                timestamp: DateTime::parse_from_rfc3339("2024-01-15T10:30:00Z")
                    .unwrap()
                    .with_timezone(&Utc),
                source: Some(LocationSource::Manual),
            },
            LocationRecord {
                accuracy: None,
                source: None,
                ..record_at(51.5, -0.12, 0)
            },
        ];
        let csv = history_csv(&history);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), history.len() + 1);
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(
            lines[1],
            "2024-01-15T10:30:00.000Z,40.712776,-74.005974,12.5,manual"
        );
        assert!(lines[2].ends_with(",51.5,-0.12,,"));
    }

    #[test]
    fn test_unknown_source_deserializes() {
        let json = r#"{"latitude": 1.0, "longitude": 2.0, "timestamp": "2024-01-15T10:30:00Z", "source": "gps"}"#;
        let record: LocationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.source, Some(LocationSource::Other));
        assert_eq!(record.accuracy, None);
    }

    #[tokio::test]
    async fn test_update_current_location() {
        let mut harness = Harness::new().located_at(40.7128, -74.006);
        let mut page = LocationPage::new();
        page.init(&mut harness.ctx()).unwrap();

        let patch = page.update_current_location(&mut harness.ctx()).await.unwrap();
        harness.apply(Some(patch));

        let state = page.state();
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.last_known.as_ref().unwrap().source, Some(LocationSource::Manual));
        assert_eq!(harness.user.as_ref().unwrap().location.history.len(), 1);

        let stored: LocationState = harness
            .store
            .load(&StorageKey::Location(harness.tag.clone().unwrap()))
            .unwrap()
            .unwrap();
        assert_eq!(&stored, state);

        let events = harness.issues.events();
        assert_eq!(events[0].title, "Location Update - Rex2024");
        assert_eq!(events[0].labels, vec!["location-update", "manual", "tag-Rex2024"]);
        assert!(events[0].body.contains("Accuracy: 10m"));
        assert_eq!(
            harness.last_toast().unwrap().message,
            "Location updated successfully!"
        );
        assert_eq!(page.status(&harness.ctx()), TrackingStatus::Live);
        page.destroy();
    }

    #[tokio::test]
    async fn test_report_location_update() {
        let mut harness = Harness::new();
        let tag = harness.tag.clone().unwrap();
        let update = LocationUpdate {
            latitude: 51.5,
            longitude: -0.12,
            accuracy: Some(8.0),
        };

        let state = report_location_update(&mut harness.ctx(), &tag, update, LocationSource::Tasker)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.history[0].source, Some(LocationSource::Tasker));

        let events = harness.issues.events();
        assert_eq!(events[0].labels, vec!["location-update", "tag-Rex2024"]);
        assert!(events[0].body.starts_with("Location updated for pet tracker Rex2024"));
        assert!(events[0].body.contains("Accuracy: 8m"));
        assert_eq!(
            harness.last_toast().unwrap().message,
            "Location updated successfully"
        );
    }

    #[tokio::test]
    async fn test_report_location_update_respects_tracking_preference() {
        let mut harness = Harness::new();
        let tag = harness.tag.clone().unwrap();
        harness.user.as_mut().unwrap().preferences.tracking_enabled = false;
        let update: LocationUpdate =
            serde_json::from_str(r#"{"latitude": 1.0, "longitude": 2.0}"#).unwrap();

        let outcome = report_location_update(&mut harness.ctx(), &tag, update, LocationSource::Tasker)
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(harness.issues.events().is_empty());
        assert!(harness
            .store
            .load::<LocationState>(&StorageKey::Location(tag))
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_update_current_location_unavailable() {
        let mut harness = Harness::new();
        let mut page = LocationPage::new();
        let err = page
            .update_current_location(&mut harness.ctx())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Geolocation(GeolocationError::PositionUnavailable)
        ));
        assert!(err.is_transient());
        assert_eq!(
            harness.last_toast().unwrap().message,
            GeolocationError::PositionUnavailable.user_message()
        );
        assert!(harness.issues.events().is_empty());
    }

    #[tokio::test]
    async fn test_geofence_enter_fires_once() {
        let mut harness = Harness::new();
        let tag = harness.tag.clone().unwrap();
        let mut page = LocationPage::new();
        page.add_geofence(
            &mut harness.ctx(),
            GeofenceDraft {
                name: "Home".to_string(),
                center: "0, 0".to_string(),
                radius: 1000.0,
                alert_type: AlertType::Both,
            },
        )
        .await
        .unwrap();

        // ~2000 m out, then ~500 m in, then still inside.
        let outside = record_at(0.018, 0.0, 2);
        let inside = record_at(0.0045, 0.0, 1);
        let still_inside = record_at(0.004, 0.0, 0);

        let events = check_geofences(&mut harness.ctx(), &tag, &outside).await.unwrap();
        assert!(events.is_empty());
        let events = check_geofences(&mut harness.ctx(), &tag, &inside).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, EdgeDirection::Entered);
        let events = check_geofences(&mut harness.ctx(), &tag, &still_inside)
            .await
            .unwrap();
        assert!(events.is_empty());

        let alerts: Vec<_> = harness
            .issues
            .events()
            .into_iter()
            .filter(|e| e.title == "🚨 Geofence Alert - Rex2024")
            .collect();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].labels, vec!["geofence-alert", "entered", "tag-Rex2024"]);
        assert!(alerts[0].body.contains("Pet entered safe zone: Home"));
        assert_eq!(
            harness.last_toast().unwrap().message,
            "Pet has entered the safe zone \"Home\""
        );
    }

    #[tokio::test]
    async fn test_exit_only_zone_ignores_entry() {
        let mut harness = Harness::new();
        let tag = harness.tag.clone().unwrap();
        let mut page = LocationPage::new();
        page.add_geofence(
            &mut harness.ctx(),
            GeofenceDraft {
                name: "Yard".to_string(),
                center: "0, 0".to_string(),
                radius: 1000.0,
                alert_type: AlertType::Exit,
            },
        )
        .await
        .unwrap();

        record_location(&mut harness.ctx(), &tag, record_at(0.0045, 0.0, 1))
            .await
            .unwrap();
        let zones: Vec<Geofence> = harness
            .store
            .load_or_default(&StorageKey::Geofences(tag.clone()))
            .unwrap();
        assert_eq!(zones[0].last_status, Some(geo::ZoneStatus::Inside));

        let events = check_geofences(&mut harness.ctx(), &tag, &record_at(0.018, 0.0, 0))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].direction, EdgeDirection::Exited);
        assert_eq!(harness.issues.titles().len(), 2);
    }

    #[tokio::test]
    async fn test_add_geofence_rejects_bad_center() {
        let mut harness = Harness::new();
        let mut page = LocationPage::new();
        let err = page
            .add_geofence(
                &mut harness.ctx(),
                GeofenceDraft {
                    name: "Park".to_string(),
                    center: "north of the river".to_string(),
                    radius: 200.0,
                    alert_type: AlertType::Enter,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidCoordinates { .. }));
        assert!(page.geofences().is_empty());
        assert!(harness.issues.events().is_empty());
        assert!(harness
            .last_toast()
            .unwrap()
            .message
            .starts_with("Failed to create safe zone"));
    }

    #[tokio::test]
    async fn test_add_geofence_rejects_zero_radius() {
        let mut harness = Harness::new();
        let mut page = LocationPage::new();
        let err = page
            .add_geofence(
                &mut harness.ctx(),
                GeofenceDraft {
                    name: "Park".to_string(),
                    center: "1, 2".to_string(),
                    radius: 0.0,
                    alert_type: AlertType::Enter,
                },
            )
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_toggle_and_delete_geofence() {
        let mut harness = Harness::new();
        let mut page = LocationPage::new();
        let zone = page
            .add_geofence(
                &mut harness.ctx(),
                GeofenceDraft {
                    name: "Park".to_string(),
                    center: "40.7829, -73.9654".to_string(),
                    radius: 300.0,
                    alert_type: AlertType::Both,
                },
            )
            .await
            .unwrap();
        let created = harness.issues.events();
        assert_eq!(created[0].title, "Geofence Created - Rex2024");
        assert_eq!(created[0].labels, vec!["geofence", "configuration", "tag-Rex2024"]);
        assert!(created[0].body.contains("Center: 40.7829, -73.9654"));

        assert_eq!(
            page.toggle_geofence(&mut harness.ctx(), &zone.id).unwrap(),
            Some(false)
        );
        assert_eq!(harness.last_toast().unwrap().message, "Safe zone disabled");
        assert!(!page.geofences()[0].is_active);
        assert_eq!(page.toggle_geofence(&mut harness.ctx(), "missing").unwrap(), None);

        assert!(page.delete_geofence(&mut harness.ctx(), &zone.id).unwrap());
        assert!(!page.delete_geofence(&mut harness.ctx(), &zone.id).unwrap());
        assert!(page.geofences().is_empty());
    }

    #[tokio::test]
    async fn test_share_and_export() {
        let mut harness = Harness::new();
        let tag = harness.tag.clone().unwrap();
        let mut page = LocationPage::new();
        assert!(page.share(&mut harness.ctx()).is_none());
        assert!(page.export_csv(&mut harness.ctx()).is_none());
        assert_eq!(
            harness.last_toast().unwrap().message,
            "No location history to export"
        );

        record_location(&mut harness.ctx(), &tag, record_at(40.7128, -74.006, 0))
            .await
            .unwrap();
        page.refresh(&mut harness.ctx()).unwrap();

        let (title, text) = page.share(&mut harness.ctx()).unwrap();
        assert_eq!(title, "Pet Location");
        assert_eq!(
            text,
            "Pet's location: https://maps.google.com/maps?q=40.7128,-74.006"
        );

        let export = page.export_csv(&mut harness.ctx()).unwrap();
        assert!(export.file_name.starts_with("pet-location-history-Rex2024-"));
        assert!(export.file_name.ends_with(".csv"));
        assert_eq!(export.contents.lines().count(), 2);
        assert_eq!(
            page.current_center(&mut harness.ctx()).as_deref(),
            Some("40.7128, -74.006")
        );
    }

    #[tokio::test]
    async fn test_view_render() {
        let mut harness = Harness::new();
        let tag = harness.tag.clone().unwrap();
        let mut page = LocationPage::new();
        for i in 0..7 {
            record_location(
                &mut harness.ctx(),
                &tag,
                record_at(40.0 + f64::from(i) * 0.001, -74.0, i64::from(17 - i)),
            )
            .await
            .unwrap();
        }
        page.refresh(&mut harness.ctx()).unwrap();

        let view = page.view(&harness.ctx());
        assert_eq!(view.recent.len(), 5);
        assert!(view.recent[0].timestamp > view.recent[4].timestamp);
        assert_eq!(view.status, TrackingStatus::Recent);

        let text = view.render();
        assert!(text.starts_with("Status: Recent"));
        assert!(text.contains("No safe zones configured"));
        assert_eq!(page.history(HistoryFilter::All, Utc::now()).len(), 7);
    }
}
