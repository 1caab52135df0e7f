//! Overlay reconciliation.
//!
//! The [`OverlayReconciler`] is the only writer of fire-layer state on the
//! map surface. Each reconciliation removes every marker and the heatmap
//! from the previous cycle and rebuilds them from the new detection list,
//! so no stale or duplicate overlay objects survive a cycle.
//!
//! Until a surface is attached, the latest detection list is held as
//! pending and applied on attach.

use std::collections::BTreeMap;

use wildfire_map_fire_models::{Coordinates, Detection};

use crate::bounds::ViewRect;

/// Handle to a marker placed on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MarkerHandle(pub u64);

/// Handle to a heatmap layer placed on the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HeatmapHandle(pub u64);

/// Errors a surface may report when adding overlay objects.
#[derive(Debug, thiserror::Error)]
pub enum SurfaceError {
    /// The surface refused the object.
    #[error("surface rejected {kind}: {message}")]
    Rejected {
        /// What was being added (`"marker"`, `"heatmap"`).
        kind: &'static str,
        /// Surface-provided reason.
        message: String,
    },
}

/// Everything a surface needs to draw one marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec<'a> {
    /// Detection id the marker represents.
    pub id: &'a str,
    /// Marker position.
    pub position: Coordinates,
    /// Fill color from the classifier.
    pub color: &'static str,
    /// Popup text bound to the marker.
    pub popup: String,
}

/// One weighted heatmap sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeatPoint {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Weight in `[0, 1]`.
    pub weight: f64,
}

/// The map widget, as seen by the synchronization layer.
///
/// Implementations draw and remove overlay objects and report the visible
/// rectangle. Clicks on markers are reported back through the controller
/// with the [`MarkerHandle`] returned from [`MapSurface::add_marker`].
pub trait MapSurface: Send {
    /// The rectangle currently visible.
    fn visible_rect(&self) -> ViewRect;

    /// Adds a marker and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the marker could not be placed.
    fn add_marker(&mut self, marker: &MarkerSpec<'_>) -> Result<MarkerHandle, SurfaceError>;

    /// Removes a marker. Unknown handles are ignored.
    fn remove_marker(&mut self, handle: MarkerHandle);

    /// Adds a heatmap layer built from `points`.
    ///
    /// # Errors
    ///
    /// Returns [`SurfaceError`] if the layer could not be created.
    fn add_heatmap(&mut self, points: &[HeatPoint]) -> Result<HeatmapHandle, SurfaceError>;

    /// Removes a heatmap layer. Unknown handles are ignored.
    fn remove_heatmap(&mut self, handle: HeatmapHandle);
}

/// The live overlay objects owned by the reconciler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverlaySet {
    markers: BTreeMap<String, MarkerHandle>,
    heatmap: Option<HeatmapHandle>,
}

impl OverlaySet {
    /// Marker handles keyed by detection id.
    #[must_use]
    pub const fn markers(&self) -> &BTreeMap<String, MarkerHandle> {
        &self.markers
    }

    /// The heatmap layer, if one is live.
    #[must_use]
    pub const fn heatmap(&self) -> Option<HeatmapHandle> {
        self.heatmap
    }

    /// Number of live markers.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Returns `true` if nothing is drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markers.is_empty() && self.heatmap.is_none()
    }
}

/// Lifecycle state of the overlay for one map instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayState {
    /// No surface attached yet.
    Uninitialized,
    /// Surface attached.
    Ready {
        /// Whether any markers or heatmap are drawn.
        has_overlays: bool,
        /// Whether the last fetch failed and an error banner is showing.
        error_banner: bool,
    },
}

/// Counts from one applied reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Markers removed from the previous cycle.
    pub markers_removed: usize,
    /// Markers added in this cycle.
    pub markers_added: usize,
    /// Detections skipped because the surface rejected their marker.
    pub skipped: usize,
    /// Whether a heatmap layer is live after this cycle.
    pub heatmap: bool,
}

/// Result of a [`OverlayReconciler::reconcile`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Applied to the surface.
    Applied(ReconcileStats),
    /// No surface yet; held until one is attached.
    Deferred,
}

/// Sole owner and mutator of the fire overlay on a map surface.
#[derive(Debug)]
pub struct OverlayReconciler<S: MapSurface> {
    surface: Option<S>,
    overlay: OverlaySet,
    by_handle: BTreeMap<MarkerHandle, Detection>,
    committed: Vec<Detection>,
    pending: Option<Vec<Detection>>,
    error_banner: Option<String>,
}

impl<S: MapSurface> Default for OverlayReconciler<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: MapSurface> OverlayReconciler<S> {
    /// Creates a reconciler with no surface attached.
    #[must_use]
    pub fn new() -> Self {
        Self {
            surface: None,
            overlay: OverlaySet::default(),
            by_handle: BTreeMap::new(),
            committed: Vec::new(),
            pending: None,
            error_banner: None,
        }
    }

    /// Attaches the map surface. If detections arrived before the surface
    /// existed, they are applied now and the stats are returned.
    ///
    /// Attaching a second surface clears the fire overlay from the first
    /// one and redraws the current detections on the new one.
    pub fn attach(&mut self, surface: S) -> Option<ReconcileStats> {
        let replaced = if let Some(mut previous) = self.surface.take() {
            log::warn!("Map surface replaced; moving overlays to the new surface");
            self.clear_overlays(&mut previous);
            true
        } else {
            false
        };
        self.surface = Some(surface);
        log::debug!("Map surface attached");

        if let Some(pending) = self.pending.take() {
            log::debug!("Applying {} deferred detections", pending.len());
            return self.apply(pending);
        }
        if !replaced || self.committed.is_empty() {
            return None;
        }

        let banner = self.error_banner.take();
        let stats = self.apply(self.committed.clone());
        self.error_banner = banner;
        stats
    }

    fn apply(&mut self, detections: Vec<Detection>) -> Option<ReconcileStats> {
        match self.reconcile(detections) {
            ReconcileOutcome::Applied(stats) => Some(stats),
            ReconcileOutcome::Deferred => None,
        }
    }

    /// Replaces the overlay with markers and a heatmap for `detections`.
    ///
    /// A detection whose marker the surface rejects is skipped and logged;
    /// the rest are still committed. Without a surface the list is kept
    /// as pending (replacing any earlier pending list).
    pub fn reconcile(&mut self, detections: Vec<Detection>) -> ReconcileOutcome {
        let Some(surface) = self.surface.as_mut() else {
            log::debug!(
                "Map surface not ready; deferring {} detections",
                detections.len()
            );
            self.pending = Some(detections);
            return ReconcileOutcome::Deferred;
        };

        let mut stats = ReconcileStats {
            markers_removed: self.overlay.markers.len(),
            ..ReconcileStats::default()
        };

        for handle in std::mem::take(&mut self.overlay.markers).into_values() {
            surface.remove_marker(handle);
        }
        if let Some(heatmap) = self.overlay.heatmap.take() {
            surface.remove_heatmap(heatmap);
        }
        self.by_handle.clear();

        let mut committed = Vec::with_capacity(detections.len());
        for detection in detections {
            let spec = MarkerSpec {
                id: &detection.id,
                position: detection.coordinates(),
                color: detection.color(),
                popup: popup_text(&detection),
            };

            match surface.add_marker(&spec) {
                Ok(handle) => {
                    if let Some(duplicate) = self.overlay.markers.insert(detection.id.clone(), handle)
                    {
                        log::warn!("Duplicate detection id {}; replacing marker", detection.id);
                        surface.remove_marker(duplicate);
                        self.by_handle.remove(&duplicate);
                        committed.retain(|d: &Detection| d.id != detection.id);
                    }
                    self.by_handle.insert(handle, detection.clone());
                    committed.push(detection);
                }
                Err(e) => {
                    log::warn!("Skipping detection {}: {e}", detection.id);
                    stats.skipped += 1;
                }
            }
        }
        stats.markers_added = self.overlay.markers.len();

        if !committed.is_empty() {
            let points: Vec<HeatPoint> = committed
                .iter()
                .map(|d| HeatPoint {
                    lat: d.lat,
                    lng: d.lng,
                    weight: d.heat_weight(),
                })
                .collect();

            match surface.add_heatmap(&points) {
                Ok(handle) => self.overlay.heatmap = Some(handle),
                Err(e) => log::warn!("Heatmap not rebuilt: {e}"),
            }
        }
        stats.heatmap = self.overlay.heatmap.is_some();

        log::debug!(
            "Reconciled overlay: -{} +{} markers, {} skipped, heatmap={}",
            stats.markers_removed,
            stats.markers_added,
            stats.skipped,
            stats.heatmap
        );

        self.committed = committed;
        self.error_banner = None;
        ReconcileOutcome::Applied(stats)
    }

    /// Looks up the detection behind a clicked marker.
    #[must_use]
    pub fn detail(&self, handle: MarkerHandle) -> Option<&Detection> {
        self.by_handle.get(&handle)
    }

    /// Shows the error banner. Overlays are left untouched.
    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error_banner = Some(message.into());
    }

    /// The current error banner message, if any.
    #[must_use]
    pub fn error_banner(&self) -> Option<&str> {
        self.error_banner.as_deref()
    }

    /// Detections currently drawn.
    #[must_use]
    pub fn detections(&self) -> &[Detection] {
        &self.committed
    }

    /// The live overlay objects.
    #[must_use]
    pub const fn overlay(&self) -> &OverlaySet {
        &self.overlay
    }

    /// The attached surface, if any.
    #[must_use]
    pub const fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> OverlayState {
        if self.surface.is_none() {
            return OverlayState::Uninitialized;
        }
        OverlayState::Ready {
            has_overlays: !self.overlay.is_empty(),
            error_banner: self.error_banner.is_some(),
        }
    }

    fn clear_overlays(&mut self, surface: &mut S) {
        for handle in std::mem::take(&mut self.overlay.markers).into_values() {
            surface.remove_marker(handle);
        }
        if let Some(heatmap) = self.overlay.heatmap.take() {
            surface.remove_heatmap(heatmap);
        }
        self.by_handle.clear();
    }
}

/// Popup text for a marker: confidence, brightness, acquisition date and,
/// when reported, fire radiative power.
#[must_use]
pub fn popup_text(detection: &Detection) -> String {
    let acquired = detection.acquired_at.map_or_else(
        || "unknown".to_string(),
        |t| t.format("%Y-%m-%d %H:%M UTC").to_string(),
    );

    let mut text = format!(
        "Confidence: {:.0}% ({})\nBrightness: {:.1} K\nAcquired: {acquired}",
        detection.confidence,
        detection.severity.label(),
        detection.brightness,
    );
    if let Some(frp) = detection.frp {
        text.push_str(&format!("\nFRP: {frp:.1} MW"));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use wildfire_map_fire_models::classify;

    /// In-memory surface that tracks live objects and can reject markers.
    #[derive(Debug, Default)]
    struct RecordingSurface {
        next: u64,
        markers: BTreeSet<MarkerHandle>,
        heatmaps: BTreeSet<HeatmapHandle>,
        reject_ids: BTreeSet<String>,
        last_heat: Vec<HeatPoint>,
    }

    impl MapSurface for RecordingSurface {
        fn visible_rect(&self) -> ViewRect {
            ViewRect::new(30.0, -125.0, 45.0, -110.0)
        }

        fn add_marker(&mut self, marker: &MarkerSpec<'_>) -> Result<MarkerHandle, SurfaceError> {
            if self.reject_ids.contains(marker.id) {
                return Err(SurfaceError::Rejected {
                    kind: "marker",
                    message: "bad record".to_string(),
                });
            }
            self.next += 1;
            let handle = MarkerHandle(self.next);
            self.markers.insert(handle);
            Ok(handle)
        }

        fn remove_marker(&mut self, handle: MarkerHandle) {
            self.markers.remove(&handle);
        }

        fn add_heatmap(&mut self, points: &[HeatPoint]) -> Result<HeatmapHandle, SurfaceError> {
            self.next += 1;
            let handle = HeatmapHandle(self.next);
            self.heatmaps.insert(handle);
            self.last_heat = points.to_vec();
            Ok(handle)
        }

        fn remove_heatmap(&mut self, handle: HeatmapHandle) {
            self.heatmaps.remove(&handle);
        }
    }

    fn detection(id: &str, lat: f64, lng: f64, confidence: f64) -> Detection {
        Detection {
            id: id.to_string(),
            lat,
            lng,
            confidence,
            brightness: 300.0,
            frp: None,
            acquired_at: None,
            severity: classify(confidence).severity,
            extra: BTreeMap::new(),
        }
    }

    fn sample() -> Vec<Detection> {
        vec![
            detection("a", 37.0, -120.0, 90.0),
            detection("b", 38.0, -121.0, 50.0),
            detection("c", 39.0, -122.0, 10.0),
        ]
    }

    #[test]
    fn reconcile_twice_does_not_leak_handles() {
        let mut reconciler = OverlayReconciler::new();
        reconciler.attach(RecordingSurface::default());

        reconciler.reconcile(sample());
        reconciler.reconcile(sample());

        let surface = reconciler.surface().unwrap();
        assert_eq!(reconciler.overlay().marker_count(), 3);
        assert_eq!(surface.markers.len(), 3);
        assert_eq!(surface.heatmaps.len(), 1);
    }

    #[test]
    fn empty_detections_remove_heatmap_and_markers() {
        let mut reconciler = OverlayReconciler::new();
        reconciler.attach(RecordingSurface::default());
        reconciler.reconcile(sample());

        let outcome = reconciler.reconcile(Vec::new());

        assert_eq!(
            outcome,
            ReconcileOutcome::Applied(ReconcileStats {
                markers_removed: 3,
                markers_added: 0,
                skipped: 0,
                heatmap: false,
            })
        );
        let surface = reconciler.surface().unwrap();
        assert!(surface.markers.is_empty());
        assert!(surface.heatmaps.is_empty());
        assert!(reconciler.overlay().is_empty());
        assert_eq!(
            reconciler.state(),
            OverlayState::Ready {
                has_overlays: false,
                error_banner: false
            }
        );
    }

    #[test]
    fn rejected_marker_skips_only_that_record() {
        let mut surface = RecordingSurface::default();
        surface.reject_ids.insert("b".to_string());
        let mut reconciler = OverlayReconciler::new();
        reconciler.attach(surface);

        let ReconcileOutcome::Applied(stats) = reconciler.reconcile(sample()) else {
            panic!("surface is attached");
        };

        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.markers_added, 2);
        assert!(stats.heatmap);
        let ids: Vec<&str> = reconciler.detections().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["a", "c"]);
        assert_eq!(reconciler.surface().unwrap().last_heat.len(), 2);
    }

    #[test]
    fn heatmap_weights_are_confidence_fraction() {
        let mut reconciler = OverlayReconciler::new();
        reconciler.attach(RecordingSurface::default());
        reconciler.reconcile(sample());

        let weights: Vec<f64> = reconciler
            .surface()
            .unwrap()
            .last_heat
            .iter()
            .map(|p| p.weight)
            .collect();
        assert_eq!(weights, [0.9, 0.5, 0.1]);
    }

    #[test]
    fn deferred_until_surface_attached() {
        let mut reconciler: OverlayReconciler<RecordingSurface> = OverlayReconciler::new();
        assert_eq!(reconciler.state(), OverlayState::Uninitialized);

        assert_eq!(reconciler.reconcile(sample()), ReconcileOutcome::Deferred);
        assert!(reconciler.overlay().is_empty());

        let stats = reconciler.attach(RecordingSurface::default()).unwrap();
        assert_eq!(stats.markers_added, 3);
        assert_eq!(
            reconciler.state(),
            OverlayState::Ready {
                has_overlays: true,
                error_banner: false
            }
        );
    }

    #[test]
    fn marker_click_resolves_detection() {
        let mut reconciler = OverlayReconciler::new();
        reconciler.attach(RecordingSurface::default());
        reconciler.reconcile(sample());

        let handle = reconciler.overlay().markers()["b"];
        assert_eq!(reconciler.detail(handle).map(|d| d.id.as_str()), Some("b"));
        assert!(reconciler.detail(MarkerHandle(9999)).is_none());
    }

    #[test]
    fn error_banner_keeps_overlays_and_clears_on_success() {
        let mut reconciler = OverlayReconciler::new();
        reconciler.attach(RecordingSurface::default());
        reconciler.reconcile(sample());

        reconciler.set_error("HTTP 502");
        assert_eq!(
            reconciler.state(),
            OverlayState::Ready {
                has_overlays: true,
                error_banner: true
            }
        );
        assert_eq!(reconciler.overlay().marker_count(), 3);

        reconciler.reconcile(sample());
        assert!(reconciler.error_banner().is_none());
    }

    #[test]
    fn popup_includes_frp_only_when_present() {
        let mut d = detection("x", 1.0, 1.0, 85.0);
        assert_eq!(
            popup_text(&d),
            "Confidence: 85% (High)\nBrightness: 300.0 K\nAcquired: unknown"
        );

        d.frp = Some(12.34);
        assert!(popup_text(&d).ends_with("\nFRP: 12.3 MW"));
    }

    #[test]
    fn replacing_surface_redraws_current_detections() {
        let mut reconciler = OverlayReconciler::new();
        reconciler.attach(RecordingSurface::default());
        reconciler.reconcile(sample());

        reconciler.set_error("HTTP 502");

        let stats = reconciler.attach(RecordingSurface::default()).unwrap();

        assert_eq!(stats.markers_added, 3);
        assert!(stats.heatmap);
        let surface = reconciler.surface().unwrap();
        assert_eq!(surface.markers.len(), 3);
        assert_eq!(surface.heatmaps.len(), 1);
        assert_eq!(reconciler.detections().len(), 3);
        assert_eq!(
            reconciler.state(),
            OverlayState::Ready {
                has_overlays: true,
                error_banner: true
            }
        );
    }

    #[test]
    fn replacing_empty_surface_draws_nothing() {
        let mut reconciler: OverlayReconciler<RecordingSurface> = OverlayReconciler::new();
        assert!(reconciler.attach(RecordingSurface::default()).is_none());
        assert!(reconciler.attach(RecordingSurface::default()).is_none());
        assert!(reconciler.overlay().is_empty());
    }
}
