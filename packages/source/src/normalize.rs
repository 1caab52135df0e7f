//! Normalizes raw backend records into [`Detection`] values.
//!
//! Backend records are untrusted: coordinates may use `latitude/longitude`
//! or `lat/lng`, numbers may arrive as strings (FIRMS CSV rows), and any
//! field may be missing. Records without a usable coordinate are dropped
//! rather than defaulted, so no phantom markers appear at (0, 0).
//!
//! Normalization is a pure function of its input and options.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{Map, Value};
use wildfire_map_fire_models::{
    Coordinates, Detection, RawDetection, clamp_confidence, classify,
};

use crate::region_registry::RegionFilter;

/// Confidence assumed when a record has none (medium uncertainty).
pub const DEFAULT_CONFIDENCE: f64 = 50.0;

/// Brightness temperature (kelvin) assumed when a record has none. Display
/// only; never used for filtering or classification.
pub const BASELINE_BRIGHTNESS_K: f64 = 300.0;

const LAT_KEYS: &[&str] = &["latitude", "lat"];
const LNG_KEYS: &[&str] = &["longitude", "lng"];

/// Keys consumed into typed [`Detection`] fields; everything else is kept
/// in [`Detection::extra`].
const CONSUMED_KEYS: &[&str] = &[
    "id",
    "latitude",
    "lat",
    "longitude",
    "lng",
    "confidence",
    "brightness",
    "frp",
    "acq_date",
    "acq_time",
];

/// Options controlling normalization.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    /// When set, detections outside this region are dropped.
    pub region: Option<RegionFilter>,
}

/// Result of normalizing one batch of records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizeOutcome {
    /// Valid detections in input order.
    pub detections: Vec<Detection>,
    /// Records dropped because they were not objects or had no usable
    /// coordinate.
    pub dropped_invalid: usize,
    /// Records dropped by the region filter.
    pub dropped_outside_region: usize,
}

/// Normalizes a batch of raw records.
///
/// Drops records without a finite, in-range coordinate and, when a region
/// is configured, records outside it. Drop counts are logged and returned
/// in the outcome.
#[must_use]
pub fn normalize_detections(raws: &[RawDetection], options: &NormalizeOptions) -> NormalizeOutcome {
    let mut outcome = NormalizeOutcome::default();
    let mut seen_ids: BTreeMap<String, usize> = BTreeMap::new();

    for (index, raw) in raws.iter().enumerate() {
        let Some(record) = raw.0.as_object() else {
            log::debug!("Dropping detection {index}: record is not an object");
            outcome.dropped_invalid += 1;
            continue;
        };

        let Some(position) = extract_coordinates(record) else {
            log::debug!("Dropping detection {index}: missing or invalid coordinates");
            outcome.dropped_invalid += 1;
            continue;
        };

        if let Some(region) = options.region.as_ref().filter(|r| !r.contains(position)) {
            log::debug!(
                "Dropping detection {index} at ({:.4}, {:.4}): outside region {}",
                position.lat,
                position.lng,
                region.id()
            );
            outcome.dropped_outside_region += 1;
            continue;
        }

        let mut detection = build_detection(record, position);
        detection.id = unique_id(&mut seen_ids, detection.id);
        outcome.detections.push(detection);
    }

    if outcome.dropped_invalid > 0 {
        log::warn!(
            "Dropped {} of {} detections with invalid coordinates",
            outcome.dropped_invalid,
            raws.len()
        );
    }
    if outcome.dropped_outside_region > 0 {
        log::info!(
            "Dropped {} of {} detections outside the region of interest",
            outcome.dropped_outside_region,
            raws.len()
        );
    }

    outcome
}

fn build_detection(record: &Map<String, Value>, position: Coordinates) -> Detection {
    let confidence = number_field(record, &["confidence"])
        .filter(|c| !c.is_nan())
        .map_or(DEFAULT_CONFIDENCE, clamp_confidence);

    let brightness = number_field(record, &["brightness"])
        .filter(|b| b.is_finite())
        .unwrap_or(BASELINE_BRIGHTNESS_K);

    let frp = number_field(record, &["frp"]).filter(|f| f.is_finite());
    let acquired_at = acquisition_time(record);

    let extra = record
        .iter()
        .filter(|(key, _)| !CONSUMED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Detection {
        id: record_id(record, position),
        lat: position.lat,
        lng: position.lng,
        confidence,
        brightness,
        frp,
        acquired_at,
        severity: classify(confidence).severity,
        extra,
    }
}

/// Resolves the coordinate, accepting either key spelling. The first key
/// present wins; a present-but-invalid value is not rescued by the other
/// spelling.
fn extract_coordinates(record: &Map<String, Value>) -> Option<Coordinates> {
    let lat = number_field(record, LAT_KEYS)?;
    let lng = number_field(record, LNG_KEYS)?;
    let position = Coordinates::new(lat, lng);
    position.is_valid().then_some(position)
}

/// Reads the first present key as a number, accepting numeric strings.
fn number_field(record: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    let value = keys.iter().find_map(|key| record.get(*key))?;
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Combines `acq_date` (`YYYY-MM-DD` or RFC 3339) with an optional
/// `acq_time` (`HHMM`, UTC).
fn acquisition_time(record: &Map<String, Value>) -> Option<DateTime<Utc>> {
    let date_str = record.get("acq_date")?.as_str()?.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(date_str) {
        return Some(timestamp.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
    let time = record
        .get("acq_time")
        .and_then(parse_hhmm)
        .unwrap_or_default();

    Some(date.and_time(time).and_utc())
}

fn parse_hhmm(value: &Value) -> Option<NaiveTime> {
    let hhmm = match value {
        Value::Number(n) => n.as_u64()?,
        Value::String(s) => s.trim().parse::<u64>().ok()?,
        _ => return None,
    };
    let hours = u32::try_from(hhmm / 100).ok()?;
    let minutes = u32::try_from(hhmm % 100).ok()?;
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// The record's own `id` when present, otherwise one derived from the
/// position and acquisition fields.
fn record_id(record: &Map<String, Value>, position: Coordinates) -> String {
    match record.get("id") {
        Some(Value::String(id)) if !id.trim().is_empty() => return id.trim().to_string(),
        Some(Value::Number(id)) => return id.to_string(),
        _ => {}
    }

    let stamp = |key: &str| match record.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };

    let date = stamp("acq_date");
    let time = stamp("acq_time");
    let mut id = format!("{:.4},{:.4}", position.lat, position.lng);
    if !date.is_empty() || !time.is_empty() {
        id.push('@');
        id.push_str(&date);
        if !time.is_empty() {
            id.push('T');
            id.push_str(&time);
        }
    }
    id
}

/// Appends `#n` to repeated ids so every id in a batch is unique.
fn unique_id(seen: &mut BTreeMap<String, usize>, id: String) -> String {
    let count = seen.entry(id.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        id
    } else {
        let candidate = format!("{id}#{}", *count - 1);
        // Register the suffixed id too, so a later literal match is suffixed.
        unique_id(seen, candidate)
    }
}
