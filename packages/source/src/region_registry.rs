//! Compile-time registry of regions of interest.
//!
//! Each region is a polygon defined in a TOML file under `regions/`. The
//! registry embeds these at compile time and exposes them via
//! [`all_regions`], [`enabled_regions`] and [`region_by_id`]. A region is
//! turned into a [`RegionFilter`] for point-in-polygon checks during
//! normalization.

use geo::{Intersects, LineString, Point, Polygon};
use serde::Deserialize;
use wildfire_map_fire_models::Coordinates;

/// A region of interest loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct Region {
    /// Unique identifier (e.g., `"north_america"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this region is offered for selection.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Outer ring as `[lng, lat]` vertices. Closing the ring is optional.
    pub polygon: Vec<[f64; 2]>,
}

const fn default_true() -> bool {
    true
}

impl Region {
    /// Builds the point-in-polygon filter for this region.
    #[must_use]
    pub fn filter(&self) -> RegionFilter {
        let ring: LineString<f64> = self
            .polygon
            .iter()
            .map(|[lng, lat]| (*lng, *lat))
            .collect::<Vec<_>>()
            .into();

        RegionFilter {
            id: self.id.clone(),
            polygon: Polygon::new(ring, vec![]),
        }
    }
}

/// A prepared region polygon used to keep or drop detections.
#[derive(Debug, Clone)]
pub struct RegionFilter {
    id: String,
    polygon: Polygon<f64>,
}

impl RegionFilter {
    /// Identifier of the region this filter was built from.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns `true` if the point lies inside the polygon or on its
    /// boundary.
    #[must_use]
    pub fn contains(&self, point: Coordinates) -> bool {
        Point::new(point.lng, point.lat).intersects(&self.polygon)
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const REGION_TOMLS: &[(&str, &str)] = &[
    ("north_america", include_str!("../regions/north_america.toml")),
    ("contiguous_us", include_str!("../regions/contiguous_us.toml")),
];

#[cfg(test)]
const EXPECTED_REGION_COUNT: usize = 2;

/// Returns all region definitions (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML definition is malformed. The definitions are
/// embedded at compile time, so a failure here is a development error
/// caught by the tests below.
#[must_use]
pub fn all_regions() -> Vec<Region> {
    REGION_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse region '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled regions, sorted by id.
#[must_use]
pub fn enabled_regions() -> Vec<Region> {
    let mut regions: Vec<Region> = all_regions().into_iter().filter(|r| r.enabled).collect();
    regions.sort_by(|a, b| a.id.cmp(&b.id));
    regions
}

/// Looks up an enabled region by id.
#[must_use]
pub fn region_by_id(id: &str) -> Option<Region> {
    enabled_regions().into_iter().find(|r| r.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn loads_all_regions() {
        let regions = all_regions();
        assert_eq!(
            regions.len(),
            EXPECTED_REGION_COUNT,
            "Expected {EXPECTED_REGION_COUNT} regions, found {}. \
             Update EXPECTED_REGION_COUNT after adding/removing regions.",
            regions.len()
        );
    }

    #[test]
    fn region_ids_are_unique() {
        let mut seen = BTreeSet::new();
        for region in &all_regions() {
            assert!(seen.insert(&region.id), "Duplicate region ID: {}", region.id);
        }
    }

    #[test]
    fn all_regions_have_valid_polygons() {
        for region in &all_regions() {
            assert!(!region.name.is_empty(), "Region {} has empty name", region.id);
            assert!(
                region.polygon.len() >= 3,
                "Region {} needs at least 3 vertices",
                region.id
            );
            for [lng, lat] in &region.polygon {
                assert!(
                    Coordinates::new(*lat, *lng).is_valid(),
                    "Region {} has out-of-range vertex [{lng}, {lat}]",
                    region.id
                );
            }
        }
    }

    #[test]
    fn north_america_filter_contains_san_francisco() {
        let filter = region_by_id("north_america").unwrap().filter();
        assert_eq!(filter.id(), "north_america");
        assert!(filter.contains(Coordinates::new(37.77, -122.41)));
        assert!(!filter.contains(Coordinates::new(48.85, 2.35)));
    }

    #[test]
    fn filter_includes_boundary() {
        let filter = region_by_id("contiguous_us").unwrap().filter();
        assert!(filter.contains(Coordinates::new(24.5, -100.0)));
        assert!(!filter.contains(Coordinates::new(24.4, -100.0)));
    }

    #[test]
    fn unknown_region_is_none() {
        assert!(region_by_id("atlantis").is_none());
    }
}
