//! Great-circle distance and geofence edge detection.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometers.
#[must_use]
pub fn distance_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Haversine distance between two points, in meters.
#[must_use]
pub fn distance_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    distance_km(lat1, lng1, lat2, lng2) * 1000.0
}

/// Human-readable distance: meters below 1 km, one decimal below 10 km.
#[must_use]
pub fn format_distance(km: f64) -> String {
    if km < 1.0 {
        format!("{:.0}m", km * 1000.0)
    } else if km < 10.0 {
        format!("{km:.1}km")
    } else {
        format!("{km:.0}km")
    }
}

/// Parse `"lat, lng"` into a coordinate pair.
///
/// # Errors
///
/// Returns [`Error::InvalidCoordinates`] unless the input is exactly two
/// comma-separated numbers.
pub fn parse_center(input: &str) -> Result<(f64, f64)> {
    let invalid = || Error::InvalidCoordinates {
        input: input.to_string(),
    };
    let parts: Vec<&str> = input.split(',').map(str::trim).collect();
    let [lat, lng] = parts.as_slice() else {
        return Err(invalid());
    };
    let lat: f64 = lat.parse().map_err(|_| invalid())?;
    let lng: f64 = lng.parse().map_err(|_| invalid())?;
    if !lat.is_finite() || !lng.is_finite() {
        return Err(invalid());
    }
    Ok((lat, lng))
}

/// Random identifier of the form `<prefix>_<9 chars>`.
#[must_use]
pub fn generate_id(prefix: &str) -> String {
    let suffix = Alphanumeric
        .sample_string(&mut rand::rng(), 9)
        .to_ascii_lowercase();
    format!("{prefix}_{suffix}")
}

/// Which edges raise an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    /// Alert when entering.
    Enter,
    /// Alert when leaving.
    Exit,
    /// Alert on both edges.
    Both,
}

impl AlertType {
    /// Whether an edge in `direction` raises an alert.
    #[must_use]
    pub fn matches(self, direction: EdgeDirection) -> bool {
        matches!(
            (self, direction),
            (Self::Both, _)
                | (Self::Enter, EdgeDirection::Entered)
                | (Self::Exit, EdgeDirection::Exited)
        )
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => write!(f, "enter"),
            Self::Exit => write!(f, "exit"),
            Self::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for AlertType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "enter" => Ok(Self::Enter),
            "exit" => Ok(Self::Exit),
            "both" => Ok(Self::Both),
            other => Err(Error::internal(format!("unknown alert type: {other}"))),
        }
    }
}

/// Last classification of a position against a geofence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneStatus {
    /// Within the radius.
    Inside,
    /// Beyond the radius.
    Outside,
}

impl fmt::Display for ZoneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inside => write!(f, "inside"),
            Self::Outside => write!(f, "outside"),
        }
    }
}

/// Direction of a boundary crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    /// Went from outside to inside.
    Entered,
    /// Went from inside to outside.
    Exited,
}

impl fmt::Display for EdgeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entered => write!(f, "entered"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// A circular safe zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geofence {
    /// Identifier, `geofence_<random>`.
    pub id: String,
    /// Zone name.
    pub name: String,
    /// Center latitude.
    pub center_lat: f64,
    /// Center longitude.
    pub center_lng: f64,
    /// Radius in meters.
    pub radius: f64,
    /// Which edges alert.
    pub alert_type: AlertType,
    /// Inactive zones are skipped by [`evaluate`].
    pub is_active: bool,
    /// Classification at the last check, if any.
    #[serde(default)]
    pub last_status: Option<ZoneStatus>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Geofence {
    /// Create an active zone with no status yet.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        center: (f64, f64),
        radius: f64,
        alert_type: AlertType,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_id("geofence"),
            name: name.into(),
            center_lat: center.0,
            center_lng: center.1,
            radius,
            alert_type,
            is_active: true,
            last_status: None,
            created_at,
        }
    }

    /// Whether a point lies within the zone (boundary inclusive).
    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        distance_m(lat, lng, self.center_lat, self.center_lng) <= self.radius
    }
}

/// A boundary crossing that should raise an alert.
#[derive(Debug, Clone, PartialEq)]
pub struct GeofenceEvent {
    /// The zone crossed.
    pub geofence: Geofence,
    /// Crossing direction.
    pub direction: EdgeDirection,
}

/// Classify a new position against every active zone.
///
/// A zone with no prior status counts as outside. Each zone's `last_status`
/// is updated whether or not an alert fires; there is no hysteresis, so a
/// position jittering across the boundary alerts on every flip.
pub fn evaluate(geofences: &mut [Geofence], lat: f64, lng: f64) -> Vec<GeofenceEvent> {
    let mut events = Vec::new();
    for geofence in geofences.iter_mut().filter(|g| g.is_active) {
        let is_inside = geofence.contains(lat, lng);
        let was_inside = geofence.last_status == Some(ZoneStatus::Inside);

        if is_inside != was_inside {
            let direction = if is_inside {
                EdgeDirection::Entered
            } else {
                EdgeDirection::Exited
            };
            if geofence.alert_type.matches(direction) {
                events.push(GeofenceEvent {
                    geofence: geofence.clone(),
                    direction,
                });
            }
        }

        geofence.last_status = Some(if is_inside {
            ZoneStatus::Inside
        } else {
            ZoneStatus::Outside
        });
    }
    events
}
