#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Fire detection data model and severity classification.
//!
//! This crate defines the types shared by every stage of the wildfire map
//! synchronization pipeline: viewport geometry, outgoing fetch requests,
//! raw and normalized detections, and the five-tier severity scale.
//!
//! [`classify`] is the single source of truth for mapping a confidence
//! score to a [`Severity`] and display color. The map legend is built from
//! the same table via [`legend`], so marker colors and the legend cannot
//! drift apart.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A geographic point in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

impl Coordinates {
    /// Creates a new coordinate pair.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns `true` if both components are finite and inside the valid
    /// latitude/longitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Error returned when constructing a [`ViewportBounds`] from edges that
/// violate its invariants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidBoundsError {
    /// Southern edge that was provided.
    pub south_lat: f64,
    /// Western edge that was provided.
    pub west_lng: f64,
    /// Northern edge that was provided.
    pub north_lat: f64,
    /// Eastern edge that was provided.
    pub east_lng: f64,
}

impl std::fmt::Display for InvalidBoundsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid viewport bounds (S {}, W {}, N {}, E {}): edges must be finite \
             with south <= north and west <= east",
            self.south_lat, self.west_lng, self.north_lat, self.east_lng
        )
    }
}

impl std::error::Error for InvalidBoundsError {}

/// The lat/lng rectangle currently visible on the map.
///
/// Always finite, with `south <= north` and `west <= east`. Longitude
/// wraparound across the antimeridian is not supported. Values are
/// immutable; a new viewport event produces a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportBounds {
    south_lat: f64,
    west_lng: f64,
    north_lat: f64,
    east_lng: f64,
}

impl ViewportBounds {
    /// Creates bounds from the four edges.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidBoundsError`] if any edge is non-finite or the
    /// edges are inverted.
    pub fn new(
        south_lat: f64,
        west_lng: f64,
        north_lat: f64,
        east_lng: f64,
    ) -> Result<Self, InvalidBoundsError> {
        let all_finite = [south_lat, west_lng, north_lat, east_lng]
            .iter()
            .all(|v| v.is_finite());

        if !all_finite || south_lat > north_lat || west_lng > east_lng {
            return Err(InvalidBoundsError {
                south_lat,
                west_lng,
                north_lat,
                east_lng,
            });
        }

        Ok(Self {
            south_lat,
            west_lng,
            north_lat,
            east_lng,
        })
    }

    /// Southern edge latitude.
    #[must_use]
    pub const fn south_lat(&self) -> f64 {
        self.south_lat
    }

    /// Western edge longitude.
    #[must_use]
    pub const fn west_lng(&self) -> f64 {
        self.west_lng
    }

    /// Northern edge latitude.
    #[must_use]
    pub const fn north_lat(&self) -> f64 {
        self.north_lat
    }

    /// Eastern edge longitude.
    #[must_use]
    pub const fn east_lng(&self) -> f64 {
        self.east_lng
    }

    /// Midpoint of the rectangle.
    #[must_use]
    pub fn center(&self) -> Coordinates {
        Coordinates::new(
            f64::midpoint(self.south_lat, self.north_lat),
            f64::midpoint(self.west_lng, self.east_lng),
        )
    }

    /// Returns `true` if the point lies inside the rectangle (edges
    /// inclusive).
    #[must_use]
    pub fn contains(&self, point: Coordinates) -> bool {
        (self.south_lat..=self.north_lat).contains(&point.lat)
            && (self.west_lng..=self.east_lng).contains(&point.lng)
    }
}

/// Monotonic identifier assigned to each outgoing detection request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single call to the backend detection endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FetchRequest {
    /// Center of the search area.
    pub center: Coordinates,
    /// Search radius in kilometers, already clamped to the configured range.
    pub radius_km: f64,
    /// Identity used to discard superseded responses.
    pub request_id: RequestId,
}

/// An untrusted detection record exactly as the backend returned it.
///
/// No field is guaranteed to exist or to have the expected type. Use the
/// normalizer in `wildfire_map_source` to turn these into [`Detection`]s.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDetection(pub serde_json::Value);

impl From<serde_json::Value> for RawDetection {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Severity tier derived from a detection's confidence score.
///
/// Ordered from least to most severe, so `Severity::Low < Severity::High`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Severity {
    /// Confidence at or below 20.
    Low,
    /// Confidence in (20, 40].
    LowMedium,
    /// Confidence in (40, 60].
    Medium,
    /// Confidence in (60, 80].
    MediumHigh,
    /// Confidence above 80.
    High,
}

impl Severity {
    /// All tiers from least to most severe.
    pub const ALL: &[Self] = &[
        Self::Low,
        Self::LowMedium,
        Self::Medium,
        Self::MediumHigh,
        Self::High,
    ];

    /// Numeric rank, 0 (low) through 4 (high).
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }

    /// Hex display color for markers and the legend.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::High => "#ff0000",
            Self::MediumHigh => "#ff6600",
            Self::Medium => "#ff9900",
            Self::LowMedium => "#ffcc00",
            Self::Low => "#ffff00",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::High => "High",
            Self::MediumHigh => "Medium-high",
            Self::Medium => "Medium",
            Self::LowMedium => "Low-medium",
            Self::Low => "Low",
        }
    }
}

/// Lower (exclusive) confidence bound for each tier above [`Severity::Low`],
/// most severe first. Anything not above any bound is `Low`.
const TIER_FLOORS: &[(f64, Severity)] = &[
    (80.0, Severity::High),
    (60.0, Severity::MediumHigh),
    (40.0, Severity::Medium),
    (20.0, Severity::LowMedium),
];

/// Result of classifying a confidence score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Severity tier.
    pub severity: Severity,
    /// Hex display color.
    pub color: &'static str,
}

/// Clamps a confidence score into `[0, 100]`. `NaN` becomes 0.
#[must_use]
pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 100.0)
    }
}

/// Maps a confidence score to a severity tier and color.
///
/// The input is clamped to `[0, 100]` first. Bucket boundaries are
/// inclusive on the upper side: exactly 80 is `MediumHigh`, exactly 20 is
/// `Low`.
#[must_use]
pub fn classify(confidence: f64) -> Classification {
    let confidence = clamp_confidence(confidence);

    let severity = TIER_FLOORS
        .iter()
        .find(|(floor, _)| confidence > *floor)
        .map_or(Severity::Low, |(_, severity)| *severity);

    Classification {
        severity,
        color: severity.color(),
    }
}

/// A single row of the map legend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendEntry {
    /// Severity tier.
    pub severity: Severity,
    /// Hex display color.
    pub color: &'static str,
    /// Confidence range description (e.g. `"60–80%"`).
    pub range: String,
}

/// Builds the legend rows, most severe first, from the same thresholds
/// that [`classify`] uses.
#[must_use]
pub fn legend() -> Vec<LegendEntry> {
    let mut entries = Vec::with_capacity(TIER_FLOORS.len() + 1);
    let mut ceiling: Option<f64> = None;

    for (floor, severity) in TIER_FLOORS {
        let range = ceiling.map_or_else(
            || format!(">{floor}%"),
            |ceiling| format!("{floor}–{ceiling}%"),
        );
        entries.push(LegendEntry {
            severity: *severity,
            color: severity.color(),
            range,
        });
        ceiling = Some(*floor);
    }

    let lowest = ceiling.unwrap_or(100.0);
    entries.push(LegendEntry {
        severity: Severity::Low,
        color: Severity::Low.color(),
        range: format!("≤{lowest}%"),
    });

    entries
}

/// A validated thermal-anomaly detection ready for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Detection {
    /// Identifier unique within one fetch cycle.
    pub id: String,
    /// Latitude, always finite and in range.
    pub lat: f64,
    /// Longitude, always finite and in range.
    pub lng: f64,
    /// Confidence score in `[0, 100]`.
    pub confidence: f64,
    /// Brightness temperature in kelvin (display only).
    pub brightness: f64,
    /// Fire radiative power in megawatts, when reported.
    pub frp: Option<f64>,
    /// Acquisition time, when the record carried a parseable date.
    pub acquired_at: Option<DateTime<Utc>>,
    /// Severity tier derived from `confidence`.
    pub severity: Severity,
    /// Remaining source fields, kept for detail display.
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Detection {
    /// Position of the detection.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.lat, self.lng)
    }

    /// Display color for this detection's marker.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        self.severity.color()
    }

    /// Heatmap weight, `confidence / 100`.
    #[must_use]
    pub fn heat_weight(&self) -> f64 {
        clamp_confidence(self.confidence) / 100.0
    }
}
