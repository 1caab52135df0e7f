//! Fetch scheduling: debounce, radius derivation, and request identity.
//!
//! The scheduler is a plain state machine driven with explicit instants,
//! so the controller owns all waiting. A burst of viewport changes
//! collapses into one request built from the last bounds once the quiet
//! period has elapsed. Every issued request gets a strictly increasing id,
//! and only the response to the latest id is accepted. A request identical
//! to the latest one is not issued again unless that one failed.

use std::time::Duration;

use tokio::time::Instant;
use wildfire_map_fire_models::{Coordinates, FetchRequest, RequestId, ViewportBounds};

use crate::config::SyncConfig;

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0088;

/// Approximate request radius covering the viewport.
///
/// Uses an equirectangular projection: the east–west span is scaled by
/// `cos(center latitude)`. The radius is half the diagonal, clamped to
/// `[min_km, max_km]`.
#[must_use]
pub fn derive_radius_km(bounds: &ViewportBounds, min_km: f64, max_km: f64) -> f64 {
    let center_lat = bounds.center().lat.to_radians();
    let d_lat = (bounds.north_lat() - bounds.south_lat()).to_radians();
    let d_lng = (bounds.east_lng() - bounds.west_lng()).to_radians() * center_lat.cos();

    let diagonal_km = EARTH_RADIUS_KM * d_lat.hypot(d_lng);
    (diagonal_km / 2.0).clamp(min_km, max_km)
}

/// What makes two requests the same backend query.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RequestKey {
    center: Coordinates,
    radius_km: f64,
}

/// Debounces viewport changes and issues identified fetch requests.
#[derive(Debug)]
pub struct FetchScheduler {
    debounce: Duration,
    min_radius_km: f64,
    max_radius_km: f64,
    search_radius_km: f64,
    next_id: u64,
    latest: Option<RequestId>,
    latest_key: Option<RequestKey>,
    pending: Option<ViewportBounds>,
    deadline: Option<Instant>,
}

impl FetchScheduler {
    /// Creates a scheduler from the configured debounce and radii.
    #[must_use]
    pub const fn new(config: &SyncConfig) -> Self {
        Self {
            debounce: config.debounce(),
            min_radius_km: config.min_radius_km,
            max_radius_km: config.max_radius_km,
            search_radius_km: config.search_radius_km,
            next_id: 1,
            latest: None,
            latest_key: None,
            pending: None,
            deadline: None,
        }
    }

    /// Records a viewport change and restarts the quiet period.
    pub fn bounds_changed(&mut self, bounds: ViewportBounds, now: Instant) {
        self.pending = Some(bounds);
        self.deadline = Some(now + self.debounce);
    }

    /// When the pending debounce fires, if a change is waiting.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Issues the debounced request if the quiet period has elapsed and
    /// the settled viewport differs from the latest request.
    pub fn poll_due(&mut self, now: Instant) -> Option<FetchRequest> {
        if self.deadline.is_none_or(|deadline| now < deadline) {
            return None;
        }
        self.deadline = None;

        let bounds = self.pending.take()?;
        let radius_km = derive_radius_km(&bounds, self.min_radius_km, self.max_radius_km);
        self.issue(bounds.center(), radius_km)
    }

    /// Issues a request for an explicit location immediately, using the
    /// fixed search radius. Any pending viewport change is dropped.
    ///
    /// Returns `None` if the latest request already covers this location.
    pub fn search(&mut self, center: Coordinates) -> Option<FetchRequest> {
        if self.pending.take().is_some() {
            log::debug!("Search supersedes pending viewport change");
        }
        self.deadline = None;
        self.issue(center, self.search_radius_km)
    }

    /// Records that `id` failed so an identical request may be issued
    /// again. Ignored unless `id` is the latest request.
    pub fn request_failed(&mut self, id: RequestId) {
        if self.is_current(id) {
            self.latest_key = None;
        }
    }

    /// Returns `true` if `id` is the latest issued request. Responses for
    /// any other id are stale.
    #[must_use]
    pub fn is_current(&self, id: RequestId) -> bool {
        self.latest == Some(id)
    }

    /// The most recently issued request id.
    #[must_use]
    pub const fn latest_request(&self) -> Option<RequestId> {
        self.latest
    }

    fn issue(&mut self, center: Coordinates, radius_km: f64) -> Option<FetchRequest> {
        let key = RequestKey { center, radius_km };
        if self.latest_key == Some(key) {
            log::debug!(
                "Skipping duplicate of request {:?} at ({:.4}, {:.4})",
                self.latest,
                center.lat,
                center.lng
            );
            return None;
        }

        let request_id = RequestId(self.next_id);
        self.next_id += 1;
        self.latest = Some(request_id);
        self.latest_key = Some(key);

        log::info!(
            "Issuing detection request {request_id} at ({:.4}, {:.4}) radius {radius_km:.1} km",
            center.lat,
            center.lng
        );

        Some(FetchRequest {
            center,
            radius_km,
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(south: f64, west: f64, north: f64, east: f64) -> ViewportBounds {
        ViewportBounds::new(south, west, north, east).unwrap()
    }

    #[test]
    fn radius_uses_cosine_scaled_longitude() {
        // One degree of latitude ≈ 111.2 km; at the equator a 1°×1° box
        // has a diagonal of ≈ 157.3 km.
        let equator = derive_radius_km(&bounds(-0.5, -0.5, 0.5, 0.5), 1.0, 1000.0);
        assert!((equator - 78.6).abs() < 0.5, "got {equator}");

        // At 60° the longitude span counts half.
        let north = derive_radius_km(&bounds(59.5, -0.5, 60.5, 0.5), 1.0, 1000.0);
        assert!(north < equator);
        assert!((north - 62.2).abs() < 0.5, "got {north}");
    }

    #[test]
    fn radius_is_clamped() {
        let world = bounds(-80.0, -180.0, 80.0, 180.0);
        assert!((derive_radius_km(&world, 5.0, 500.0) - 500.0).abs() < f64::EPSILON);

        let tiny = bounds(10.0, 10.0, 10.0001, 10.0001);
        assert!((derive_radius_km(&tiny, 5.0, 500.0) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn burst_issues_single_request_with_last_bounds() {
        let mut scheduler = FetchScheduler::new(&SyncConfig::default());
        let start = Instant::now();

        for i in 0..5u32 {
            let offset = f64::from(i);
            scheduler.bounds_changed(
                bounds(offset, offset, offset + 1.0, offset + 1.0),
                start + Duration::from_millis(u64::from(i) * 100),
            );
            assert!(scheduler.poll_due(start + Duration::from_millis(u64::from(i) * 100 + 50)).is_none());
        }

        let last_change = start + Duration::from_millis(400);
        assert!(scheduler.poll_due(last_change + Duration::from_millis(499)).is_none());

        let request = scheduler
            .poll_due(last_change + Duration::from_millis(500))
            .expect("debounce should fire");
        assert_eq!(request.request_id, RequestId(1));
        assert_eq!(request.center, Coordinates::new(4.5, 4.5));

        assert!(scheduler.poll_due(last_change + Duration::from_secs(10)).is_none());
        assert!(scheduler.deadline().is_none());
    }

    #[test]
    fn request_ids_strictly_increase_and_only_latest_is_current() {
        let mut scheduler = FetchScheduler::new(&SyncConfig::default());
        let first = scheduler.search(Coordinates::new(1.0, 1.0)).unwrap();
        let second = scheduler.search(Coordinates::new(2.0, 2.0)).unwrap();

        assert!(second.request_id > first.request_id);
        assert!(!scheduler.is_current(first.request_id));
        assert!(scheduler.is_current(second.request_id));
        assert_eq!(scheduler.latest_request(), Some(second.request_id));
    }

    #[test]
    fn search_uses_fixed_radius_and_drops_pending_bounds() {
        let config = SyncConfig::default();
        let mut scheduler = FetchScheduler::new(&config);
        let now = Instant::now();
        scheduler.bounds_changed(bounds(0.0, 0.0, 10.0, 10.0), now);

        let request = scheduler.search(Coordinates::new(37.77, -122.41)).unwrap();
        assert!((request.radius_km - config.search_radius_km).abs() < f64::EPSILON);
        assert!(scheduler.poll_due(now + Duration::from_secs(5)).is_none());
    }

    #[test]
    fn nothing_is_due_without_changes() {
        let mut scheduler = FetchScheduler::new(&SyncConfig::default());
        assert!(scheduler.poll_due(Instant::now()).is_none());
        assert!(scheduler.latest_request().is_none());
    }

    #[test]
    fn viewport_settling_on_same_bounds_is_not_refetched() {
        let mut scheduler = FetchScheduler::new(&SyncConfig::default());
        let start = Instant::now();
        let settle = Duration::from_millis(500);

        scheduler.bounds_changed(bounds(30.0, -120.0, 32.0, -118.0), start);
        let first = scheduler.poll_due(start + settle).unwrap();

        scheduler.bounds_changed(bounds(30.0, -120.0, 32.0, -118.0), start + settle);
        assert!(scheduler.poll_due(start + settle * 2).is_none());
        assert!(scheduler.is_current(first.request_id));

        scheduler.bounds_changed(bounds(31.0, -120.0, 33.0, -118.0), start + settle * 2);
        let moved = scheduler.poll_due(start + settle * 3).unwrap();
        assert_eq!(moved.request_id, RequestId(2));

        scheduler.bounds_changed(bounds(30.0, -120.0, 32.0, -118.0), start + settle * 3);
        let back = scheduler.poll_due(start + settle * 4).unwrap();
        assert_eq!(back.request_id, RequestId(3));
    }

    #[test]
    fn identical_search_is_skipped_until_it_fails() {
        let mut scheduler = FetchScheduler::new(&SyncConfig::default());
        let center = Coordinates::new(37.77, -122.41);

        let first = scheduler.search(center).unwrap();
        assert!(scheduler.search(center).is_none());
        assert_eq!(scheduler.latest_request(), Some(first.request_id));

        scheduler.request_failed(RequestId(999));
        assert!(scheduler.search(center).is_none());

        scheduler.request_failed(first.request_id);
        let retry = scheduler.search(center).unwrap();
        assert!(retry.request_id > first.request_id);
    }
}
