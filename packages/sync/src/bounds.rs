//! Viewport bounds tracking.
//!
//! The tracker turns the map's reported visible rectangle into a
//! normalized [`ViewportBounds`]. It only reads from the map; fetching and
//! overlay mutation happen elsewhere.

use wildfire_map_fire_models::{InvalidBoundsError, ViewportBounds};

use crate::overlay::MapSurface;

/// The visible rectangle exactly as the map widget reports it.
///
/// Edges may be reversed or slightly out of range (some widgets report
/// longitudes past ±180 when panned).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    /// Southern edge latitude.
    pub south: f64,
    /// Western edge longitude.
    pub west: f64,
    /// Northern edge latitude.
    pub north: f64,
    /// Eastern edge longitude.
    pub east: f64,
}

impl ViewRect {
    /// Creates a rectangle from `south, west, north, east` edges.
    #[must_use]
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }
}

/// Errors from normalizing a reported rectangle.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum BoundsError {
    /// One or more edges were NaN or infinite.
    #[error("viewport has non-finite edges: {0:?}")]
    NonFinite(ViewRect),

    /// The normalized rectangle still violated the bounds invariants.
    #[error("{0}")]
    Invalid(#[from] InvalidBoundsError),
}

/// Normalizes a reported rectangle: swaps reversed edges and clamps to
/// the valid latitude/longitude ranges.
///
/// # Errors
///
/// Returns [`BoundsError::NonFinite`] if any edge is not finite.
pub fn normalize_rect(rect: ViewRect) -> Result<ViewportBounds, BoundsError> {
    let edges = [rect.south, rect.west, rect.north, rect.east];
    if !edges.iter().all(|v| v.is_finite()) {
        return Err(BoundsError::NonFinite(rect));
    }

    let (south, north) = ordered(rect.south, rect.north);
    let (west, east) = ordered(rect.west, rect.east);

    Ok(ViewportBounds::new(
        south.clamp(-90.0, 90.0),
        west.clamp(-180.0, 180.0),
        north.clamp(-90.0, 90.0),
        east.clamp(-180.0, 180.0),
    )?)
}

fn ordered(a: f64, b: f64) -> (f64, f64) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Observes viewport changes and emits normalized bounds.
#[derive(Debug, Default)]
pub struct BoundsTracker {
    latest: Option<ViewportBounds>,
    emitted: u64,
}

impl BoundsTracker {
    /// Creates a tracker that has not seen any viewport yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            latest: None,
            emitted: 0,
        }
    }

    /// Reads the surface's current rectangle when the map is created, so
    /// the first fetch does not wait for user interaction.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError`] if the surface reports an unusable
    /// rectangle.
    pub fn initialize<S: MapSurface>(&mut self, surface: &S) -> Result<ViewportBounds, BoundsError> {
        log::debug!("Reading initial viewport from map surface");
        self.observe(surface.visible_rect())
    }

    /// Handles a move or zoom-end event.
    ///
    /// # Errors
    ///
    /// Returns [`BoundsError`] if the rectangle is unusable. The previous
    /// bounds are kept in that case.
    pub fn observe(&mut self, rect: ViewRect) -> Result<ViewportBounds, BoundsError> {
        let bounds = normalize_rect(rect).inspect_err(|e| {
            log::warn!("Ignoring viewport event: {e}");
        })?;
        self.latest = Some(bounds);
        self.emitted += 1;
        Ok(bounds)
    }

    /// Most recently emitted bounds.
    #[must_use]
    pub const fn latest(&self) -> Option<ViewportBounds> {
        self.latest
    }

    /// Number of bounds values emitted so far.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }
}
