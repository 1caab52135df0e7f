//! A [`MapSurface`] that prints overlay changes instead of drawing them.

use std::collections::BTreeMap;

use wildfire_map_sync::{
    HeatPoint, HeatmapHandle, MapSurface, MarkerHandle, MarkerSpec, SurfaceError, ViewRect,
};

/// Viewport shown when a session starts (California and Nevada).
pub const INITIAL_VIEW: ViewRect = ViewRect::new(32.5, -124.5, 42.0, -114.0);

/// Terminal stand-in for a map widget.
///
/// Markers are listed with their handle so they can be clicked with
/// `click N`.
#[derive(Debug)]
pub struct TerminalSurface {
    view: ViewRect,
    next_handle: u64,
    markers: BTreeMap<MarkerHandle, String>,
    heatmap: Option<(HeatmapHandle, usize)>,
}

impl TerminalSurface {
    #[must_use]
    pub const fn new(view: ViewRect) -> Self {
        Self {
            view,
            next_handle: 0,
            markers: BTreeMap::new(),
            heatmap: None,
        }
    }

    const fn allocate(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }
}

impl MapSurface for TerminalSurface {
    fn visible_rect(&self) -> ViewRect {
        self.view
    }

    fn add_marker(&mut self, marker: &MarkerSpec<'_>) -> Result<MarkerHandle, SurfaceError> {
        let handle = MarkerHandle(self.allocate());
        println!(
            "  marker {:>4}  {:<28} ({:>8.4}, {:>9.4})  {}",
            handle.0, marker.id, marker.position.lat, marker.position.lng, marker.color
        );
        self.markers.insert(handle, marker.id.to_string());
        Ok(handle)
    }

    fn remove_marker(&mut self, handle: MarkerHandle) {
        if let Some(id) = self.markers.remove(&handle) {
            log::trace!("Removed marker {} ({id})", handle.0);
        }
    }

    fn add_heatmap(&mut self, points: &[HeatPoint]) -> Result<HeatmapHandle, SurfaceError> {
        if self.heatmap.is_some() {
            return Err(SurfaceError::Rejected {
                kind: "heatmap",
                message: "a heatmap layer is already shown".to_string(),
            });
        }
        let handle = HeatmapHandle(self.allocate());
        log::debug!("Heatmap {} with {} points", handle.0, points.len());
        self.heatmap = Some((handle, points.len()));
        Ok(handle)
    }

    fn remove_heatmap(&mut self, handle: HeatmapHandle) {
        if self.heatmap.is_some_and(|(live, _)| live == handle) {
            self.heatmap = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wildfire_map_fire_models::Coordinates;

    fn spec(id: &str) -> MarkerSpec<'_> {
        MarkerSpec {
            id,
            position: Coordinates::new(37.0, -120.0),
            color: "#ff0000",
            popup: String::new(),
        }
    }

    #[test]
    fn handles_are_unique_across_object_kinds() {
        let mut surface = TerminalSurface::new(INITIAL_VIEW);
        let a = surface.add_marker(&spec("a")).unwrap();
        let heat = surface.add_heatmap(&[]).unwrap();
        let b = surface.add_marker(&spec("b")).unwrap();

        assert_eq!(a, MarkerHandle(1));
        assert_eq!(heat, HeatmapHandle(2));
        assert_eq!(b, MarkerHandle(3));
        assert_eq!(surface.markers.len(), 2);
    }

    #[test]
    fn second_heatmap_is_rejected_until_removed() {
        let mut surface = TerminalSurface::new(INITIAL_VIEW);
        let point = HeatPoint {
            lat: 1.0,
            lng: 1.0,
            weight: 0.5,
        };
        let first = surface.add_heatmap(&[point]).unwrap();
        assert!(surface.add_heatmap(&[point]).is_err());

        surface.remove_heatmap(first);
        assert!(surface.heatmap.is_none());
        assert!(surface.add_heatmap(&[point, point]).is_ok());
        assert_eq!(surface.heatmap.map(|(_, points)| points), Some(2));
    }

    #[test]
    fn reports_initial_view() {
        let surface = TerminalSurface::new(INITIAL_VIEW);
        assert_eq!(surface.visible_rect(), INITIAL_VIEW);
    }
}
