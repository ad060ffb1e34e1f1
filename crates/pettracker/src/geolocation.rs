//! Device position lookups.
//!
//! The platform geolocation service sits behind [`Geolocator`]. Callers pick
//! a timeout per use: the location page waits longest, an emergency report
//! the shortest.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Why a position could not be obtained.
///
/// Codes match the platform's: 1 denied, 2 unavailable, 3 timed out.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeolocationError {
    /// The user or platform refused access.
    #[error("permission denied")]
    PermissionDenied,
    /// No fix could be obtained.
    #[error("position unavailable")]
    PositionUnavailable,
    /// No fix within the requested timeout.
    #[error("timeout")]
    Timeout,
}

impl GeolocationError {
    /// Map a platform error code.
    #[must_use]
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => Self::PermissionDenied,
            3 => Self::Timeout,
            _ => Self::PositionUnavailable,
        }
    }

    /// Platform error code.
    #[must_use]
    pub fn code(self) -> u16 {
        match self {
            Self::PermissionDenied => 1,
            Self::PositionUnavailable => 2,
            Self::Timeout => 3,
        }
    }

    /// Message shown to the user.
    #[must_use]
    pub fn user_message(self) -> &'static str {
        match self {
            Self::PermissionDenied => "Location access denied. Please enable location services.",
            Self::PositionUnavailable => "Location unavailable. Please try again.",
            Self::Timeout => "Location request timed out. Please try again.",
        }
    }
}

/// A position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Accuracy radius in meters, if reported.
    pub accuracy: Option<f64>,
    /// When the fix was taken.
    pub timestamp: DateTime<Utc>,
}

/// Options for one position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask for a high-accuracy fix.
    pub high_accuracy: bool,
    /// Give up after this long.
    pub timeout: Duration,
    /// Accept a cached fix up to this old.
    pub maximum_age: Duration,
}

impl PositionOptions {
    /// Location page: high accuracy, 15 s, no cached fixes.
    #[must_use]
    pub const fn tracking() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(15),
            maximum_age: Duration::ZERO,
        }
    }

    /// Home dashboard: 10 s, fixes up to a minute old.
    #[must_use]
    pub const fn dashboard() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::from_secs(60),
        }
    }

    /// Emergency report: 5 s, fixes up to a minute old.
    #[must_use]
    pub const fn emergency() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(5),
            maximum_age: Duration::from_secs(60),
        }
    }
}

/// Source of device positions.
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Obtain the current position.
    async fn current_position(
        &self,
        options: PositionOptions,
    ) -> std::result::Result<Position, GeolocationError>;
}

/// Run a lookup, turning an elapsed `options.timeout` into [`GeolocationError::Timeout`].
///
/// # Errors
///
/// Returns the geolocator's error, or `Timeout` if it does not answer in time.
pub async fn locate(
    geolocator: &dyn Geolocator,
    options: PositionOptions,
) -> std::result::Result<Position, GeolocationError> {
    if let Ok(result) = tokio::time::timeout(options.timeout, geolocator.current_position(options)).await {
        result
    } else {
        debug!(timeout = ?options.timeout, "Position request timed out");
        Err(GeolocationError::Timeout)
    }
}

/// A geolocator with a fixed answer.
///
/// Used where the host has no positioning hardware; positions then arrive
/// through bridge messages or manual entry.
#[derive(Debug, Clone, Default)]
pub struct FixedGeolocator {
    position: Option<Position>,
}

impl FixedGeolocator {
    /// Always answer with `position`.
    #[must_use]
    pub fn at(position: Position) -> Self {
        Self {
            position: Some(position),
        }
    }

    /// Always report the position as unavailable.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { position: None }
    }
}

#[async_trait]
impl Geolocator for FixedGeolocator {
    async fn current_position(
        &self,
        _options: PositionOptions,
    ) -> std::result::Result<Position, GeolocationError> {
        self.position
            .map(|p| Position {
                timestamp: Utc::now(),
                ..p
            })
            .ok_or(GeolocationError::PositionUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StalledGeolocator;

    #[async_trait]
    impl Geolocator for StalledGeolocator {
        async fn current_position(
            &self,
            _options: PositionOptions,
        ) -> std::result::Result<Position, GeolocationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(GeolocationError::PositionUnavailable)
        }
    }

    #[test]
    fn test_codes_round_trip() {
        for err in [
            GeolocationError::PermissionDenied,
            GeolocationError::PositionUnavailable,
            GeolocationError::Timeout,
        ] {
            assert_eq!(GeolocationError::from_code(err.code()), err);
        }
        assert_eq!(
            GeolocationError::from_code(99),
            GeolocationError::PositionUnavailable
        );
    }

    #[test]
    fn test_user_messages_are_distinct() {
        let denied = GeolocationError::PermissionDenied.user_message();
        let unavailable = GeolocationError::PositionUnavailable.user_message();
        let timeout = GeolocationError::Timeout.user_message();
        assert!(denied.contains("denied"));
        assert!(unavailable.contains("unavailable"));
        assert!(timeout.contains("timed out"));
    }

    #[test]
    fn test_option_timeouts() {
        assert_eq!(PositionOptions::tracking().timeout, Duration::from_secs(15));
        assert_eq!(PositionOptions::dashboard().timeout, Duration::from_secs(10));
        assert_eq!(PositionOptions::emergency().timeout, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_fixed_geolocator() {
        let fixed = FixedGeolocator::at(Position {
            latitude: 40.7128,
            longitude: -74.006,
            accuracy: Some(12.0),
            timestamp: Utc::now(),
        });
        let position = locate(&fixed, PositionOptions::tracking()).await.unwrap();
        assert!((position.latitude - 40.7128).abs() < f64::EPSILON);

        let err = locate(&FixedGeolocator::unavailable(), PositionOptions::tracking())
            .await
            .unwrap_err();
        assert_eq!(err, GeolocationError::PositionUnavailable);
    }

    #[tokio::test(start_paused = true)]
    async fn test_locate_times_out() {
        let err = locate(&StalledGeolocator, PositionOptions::emergency())
            .await
            .unwrap_err();
        assert_eq!(err, GeolocationError::Timeout);
    }
}
