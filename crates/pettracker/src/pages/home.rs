//! Dashboard: pet details, recent activity, last known location and
//! emergency reporting.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::location::{self, LocationRecord, LocationSource, LocationUpdate};
use super::PageContext;
use crate::error::{Error, Result};
use crate::geolocation::{self, PositionOptions};
use crate::profile::ProfilePatch;
use crate::tag::TagId;
use crate::timer::{self, TimerHandle, TimerKind};
use crate::view::{self, Render, ToastLevel};

/// Activities listed on the dashboard.
const ACTIVITY_COUNT: usize = 5;

/// How recently the pet was seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityStatus {
    /// No tag bound.
    Disconnected,
    /// No position on record.
    Unknown,
    /// Seen within the hour.
    Active,
    /// Seen within six hours.
    RecentlyActive,
    /// Older.
    Inactive,
}

impl ActivityStatus {
    /// Classify the last known position time.
    #[must_use]
    pub fn classify(tag_bound: bool, last_seen: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        if !tag_bound {
            return Self::Disconnected;
        }
        let Some(last_seen) = last_seen else {
            return Self::Unknown;
        };
        let minutes = (now - last_seen).num_minutes();
        if minutes < 60 {
            Self::Active
        } else if minutes < 6 * 60 {
            Self::RecentlyActive
        } else {
            Self::Inactive
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Unknown => write!(f, "Unknown"),
            Self::Active => write!(f, "Active"),
            Self::RecentlyActive => write!(f, "Recently Active"),
            Self::Inactive => write!(f, "Inactive"),
        }
    }
}

/// Pet details card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PetInfo {
    /// Display name.
    pub name: String,
    /// Bound tag.
    pub tag: TagId,
    /// Owner, if known.
    pub owner: Option<String>,
    /// When the tag was registered.
    pub registered: DateTime<Utc>,
}

/// Last known location card.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationSummary {
    /// The position.
    pub record: LocationRecord,
    /// Reverse-geocoded address.
    pub address: String,
}

/// Everything the dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// Pet card; `None` shows the connection prompt.
    pub pet: Option<PetInfo>,
    /// Activity status.
    pub status: ActivityStatus,
    /// Newest positions first.
    pub activities: Vec<LocationRecord>,
    /// Last known location.
    pub location: Option<LocationSummary>,
    now: DateTime<Utc>,
}

impl Render for DashboardView {
    fn render(&self) -> String {
        let mut lines = Vec::new();
        match &self.pet {
            Some(pet) => {
                lines.push(pet.name.clone());
                lines.push(format!("Tag ID: {}", pet.tag));
                lines.push(format!(
                    "Owner: {}",
                    pet.owner.as_deref().unwrap_or("Not specified")
                ));
                lines.push(format!("Registered: {}", view::format_date(pet.registered)));
            }
            None => {
                lines.push("Connect your pet tracker by scanning its NFC tag or entering the tag ID".to_string());
            }
        }
        lines.push(format!("Status: {}", self.status));

        lines.push(String::new());
        lines.push("Recent Activity:".to_string());
        if self.activities.is_empty() {
            lines.push("  No recent activity".to_string());
        }
        for activity in &self.activities {
            lines.push(format!(
                "  Location Updated: {} ({})",
                view::format_coordinates(activity.latitude, activity.longitude, 4),
                view::time_ago(activity.timestamp, self.now)
            ));
        }

        lines.push(String::new());
        lines.push("Location:".to_string());
        match &self.location {
            Some(summary) => {
                let record = &summary.record;
                lines.push(format!(
                    "  Coordinates: {}",
                    view::format_coordinates(record.latitude, record.longitude, 4)
                ));
                lines.push(format!("  Address: {}", summary.address));
                lines.push(format!(
                    "  Last Updated: {}",
                    view::time_ago(record.timestamp, self.now)
                ));
                if let Some(accuracy) = record.accuracy {
                    lines.push(format!("  Accuracy: ±{accuracy}m"));
                }
            }
            None => lines.push("  No location data available".to_string()),
        }
        lines.join("\n")
    }
}

/// Kind of emergency raised from the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyType {
    /// The pet is lost.
    Lost,
    /// The pet is injured.
    Injured,
    /// The pet is sick.
    Sick,
    /// Someone found a pet.
    Found,
    /// Anything else.
    Other,
}

impl fmt::Display for EmergencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lost => write!(f, "lost"),
            Self::Injured => write!(f, "injured"),
            Self::Sick => write!(f, "sick"),
            Self::Found => write!(f, "found"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl std::str::FromStr for EmergencyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lost" => Ok(Self::Lost),
            "injured" => Ok(Self::Injured),
            "sick" => Ok(Self::Sick),
            "found" => Ok(Self::Found),
            "other" => Ok(Self::Other),
            other => Err(Error::internal(format!("unknown emergency type: {other}"))),
        }
    }
}

/// The dashboard's emergency form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmergencyForm {
    /// What happened.
    pub kind: EmergencyType,
    /// Free-text details.
    pub details: String,
    /// Attach the device position.
    pub include_location: bool,
}

/// An emergency as sent to the issue sink.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct Emergency {
    /// Emergency type token.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Free-text details.
    #[serde(default)]
    pub details: String,
    /// Where, as free text.
    #[serde(default)]
    pub location: Option<String>,
}

/// Raise a high-priority emergency issue for `tag`.
pub async fn send_emergency(ctx: &mut PageContext<'_>, tag: &TagId, emergency: &Emergency) {
    let details = if emergency.details.trim().is_empty() {
        "No additional details"
    } else {
        emergency.details.as_str()
    };
    let location = emergency
        .location
        .as_deref()
        .filter(|l| !l.is_empty())
        .unwrap_or("Location not available");

    warn!(tag = %tag, kind = %emergency.kind, "Emergency reported");
    ctx.notifier
        .create_issue(
            format!("🚨 EMERGENCY - {tag}"),
            format!(
                "EMERGENCY ALERT for pet tracker {tag}\n\n\
                 Type: {}\nDetails: {details}\nLocation: {location}\nTimestamp: {}",
                emergency.kind,
                view::iso_timestamp(ctx.now)
            ),
            &["emergency", "high-priority", &tag.label()],
            Some(tag),
        )
        .await;
}

/// Dashboard page state.
#[derive(Debug, Default)]
pub struct HomePage {
    initialized: bool,
    view: Option<DashboardView>,
    refresh_timer: Option<TimerHandle>,
}

impl HomePage {
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

    /// Build the dashboard and start the periodic refresh.
    ///
    /// # Errors
    ///
    /// Does not fail at present.
    pub async fn init(&mut self, ctx: &mut PageContext<'_>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        debug!("Initializing home page");

        self.refresh(ctx).await;
        self.refresh_timer = Some(timer::spawn_periodic(
            TimerKind::HomeRefresh,
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

    /// Rebuild the dashboard from the current user record.
    pub async fn refresh(&mut self, ctx: &mut PageContext<'_>) {
        let tag = ctx.tag.cloned();
        let user = ctx.user;

        let pet = tag.clone().zip(user).map(|(tag, user)| PetInfo {
            name: user.display_name().to_string(),
            tag,
            owner: (!user.owner_name.is_empty()).then(|| user.owner_name.clone()),
            registered: user.created_at,
        });

        let last_known = user.and_then(|u| u.location.last_known.clone());
        let activities = user
            .map(|u| u.location.recent(ACTIVITY_COUNT))
            .unwrap_or_default();
        let status = ActivityStatus::classify(
            tag.is_some(),
            last_known.as_ref().map(|r| r.timestamp),
            ctx.now,
        );

        let location = match last_known {
            Some(record) => {
                let address = ctx
                    .geocoder
                    .address_for(record.latitude, record.longitude)
                    .await;
                Some(LocationSummary { record, address })
            }
            None => None,
        };

        self.view = Some(DashboardView {
            pet,
            status,
            activities,
            location,
            now: ctx.now,
        });
    }

    /// Refresh on request and confirm it.
    pub async fn refresh_activity(&mut self, ctx: &mut PageContext<'_>) {
        self.refresh(ctx).await;
        ctx.toast(ToastLevel::Success, "Activity refreshed");
    }

    /// The dashboard as last built.
    #[must_use]
    pub fn view(&self) -> Option<&DashboardView> {
        self.view.as_ref()
    }

    /// Record the device's current position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag, [`Error::Geolocation`]
    /// if the lookup fails, or a storage error.
    pub async fn update_location(&mut self, ctx: &mut PageContext<'_>) -> Result<Option<ProfilePatch>> {
        let tag = ctx.require_tag()?;

        let position = match geolocation::locate(ctx.geolocator, PositionOptions::dashboard()).await
        {
            Ok(position) => position,
            Err(e) => {
                warn!(error = %e, "Failed to update location");
                ctx.toast(ToastLevel::Error, e.user_message());
                return Err(e.into());
            }
        };

        let update = LocationUpdate {
            latitude: position.latitude,
            longitude: position.longitude,
            accuracy: position.accuracy,
        };
        let state =
            location::report_location_update(ctx, &tag, update, LocationSource::Manual).await?;
        ctx.toast(ToastLevel::Success, "Location updated successfully!");
        Ok(state.map(ProfilePatch::Location))
    }

    /// Send an emergency alert, attaching the position when asked.
    ///
    /// A failed position lookup is reported as `Location unavailable`
    /// rather than blocking the alert.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TagRequired`] with no tag.
    pub async fn report_emergency(
        &self,
        ctx: &mut PageContext<'_>,
        form: &EmergencyForm,
    ) -> Result<Emergency> {
        let tag = ctx.require_tag()?;

        let location = if form.include_location {
            match geolocation::locate(ctx.geolocator, PositionOptions::emergency()).await {
                Ok(position) => Some(format!("{}, {}", position.latitude, position.longitude)),
                Err(e) => {
                    warn!(error = %e, "Failed to get location for emergency");
                    Some("Location unavailable".to_string())
                }
            }
        } else {
            None
        };

        let emergency = Emergency {
            kind: form.kind.to_string(),
            details: form.details.trim().to_string(),
            location,
        };
        send_emergency(ctx, &tag, &emergency).await;
        info!(tag = %tag, "Emergency alert sent");

        ctx.toast(ToastLevel::Success, "Emergency alert sent successfully!");
        Ok(emergency)
    }
}
