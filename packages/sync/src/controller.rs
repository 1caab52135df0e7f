//! Event loop wiring the tracker, scheduler, backend, and reconciler.
//!
//! The controller runs on a single task. One `tokio::select!` loop waits
//! on inbound map signals, the debounce deadline, and in-flight backend
//! calls. Requests are never cancelled; a response whose id is no longer
//! the latest is discarded when it arrives.

use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tokio::time::Instant;
use wildfire_map_fire_models::{Coordinates, Detection, FetchRequest, RequestId};
use wildfire_map_source::normalize::{NormalizeOptions, normalize_detections};
use wildfire_map_source::{BackendError, DetectionBackend, DetectionResponse};

use crate::bounds::{BoundsTracker, ViewRect};
use crate::config::{ConfigError, SyncConfig};
use crate::overlay::{MapSurface, MarkerHandle, OverlayReconciler, ReconcileOutcome};
use crate::scheduler::FetchScheduler;

type InFlight = BoxFuture<'static, (RequestId, Result<DetectionResponse, BackendError>)>;

/// Signals from the map host.
#[derive(Debug)]
pub enum MapSignal<S> {
    /// The map widget finished loading; the controller takes the surface.
    Created(S),
    /// The viewport was panned.
    Moved(ViewRect),
    /// A zoom gesture ended.
    ZoomEnded(ViewRect),
    /// An explicit location was chosen (search box or voice command).
    Search(Coordinates),
    /// A fire marker was clicked.
    MarkerClicked(MarkerHandle),
}

/// Notifications for the host UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// The overlay now shows exactly these detections.
    DetectionsUpdated(Vec<Detection>),
    /// A marker was clicked; show this detection's details.
    DetailRequested(Detection),
    /// The latest fetch failed. Overlays from the previous cycle remain.
    Error(String),
}

/// Keeps the fire overlay in sync with the viewport.
pub struct SyncController<S: MapSurface> {
    backend: Arc<dyn DetectionBackend>,
    tracker: BoundsTracker,
    scheduler: FetchScheduler,
    normalize: NormalizeOptions,
    reconciler: OverlayReconciler<S>,
    events: mpsc::UnboundedSender<SyncEvent>,
}

impl<S: MapSurface> std::fmt::Debug for SyncController<S>
where
    S: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncController")
            .field("tracker", &self.tracker)
            .field("scheduler", &self.scheduler)
            .field("reconciler", &self.reconciler)
            .finish_non_exhaustive()
    }
}

impl<S: MapSurface> SyncController<S> {
    /// Creates a controller. Events are published on `events`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the config fails validation or names an
    /// unknown region.
    pub fn new(
        config: &SyncConfig,
        backend: Arc<dyn DetectionBackend>,
        events: mpsc::UnboundedSender<SyncEvent>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            backend,
            tracker: BoundsTracker::new(),
            scheduler: FetchScheduler::new(config),
            normalize: NormalizeOptions {
                region: config.region_filter()?,
            },
            reconciler: OverlayReconciler::new(),
            events,
        })
    }

    /// Runs until the signal channel closes. Requests still in flight at
    /// that point are dropped.
    pub async fn run(&mut self, mut signals: mpsc::Receiver<MapSignal<S>>) {
        let mut in_flight: FuturesUnordered<InFlight> = FuturesUnordered::new();

        loop {
            tokio::select! {
                signal = signals.recv() => {
                    let Some(signal) = signal else {
                        log::debug!("Map signal channel closed; stopping sync loop");
                        break;
                    };
                    if let Some(request) = self.handle_signal(signal) {
                        in_flight.push(self.dispatch(request));
                    }
                }
                () = sleep_until(self.scheduler.deadline()) => {
                    if let Some(request) = self.scheduler.poll_due(Instant::now()) {
                        in_flight.push(self.dispatch(request));
                    }
                }
                Some((request_id, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    self.handle_response(request_id, result);
                }
            }
        }
    }

    /// Applies one map signal. Returns a request to dispatch immediately,
    /// if the signal calls for one.
    pub fn handle_signal(&mut self, signal: MapSignal<S>) -> Option<FetchRequest> {
        match signal {
            MapSignal::Created(surface) => {
                if let Ok(bounds) = self.tracker.initialize(&surface) {
                    self.scheduler.bounds_changed(bounds, Instant::now());
                }
                if let Some(stats) = self.reconciler.attach(surface) {
                    log::info!("Drew {} markers on attach", stats.markers_added);
                    self.emit(SyncEvent::DetectionsUpdated(
                        self.reconciler.detections().to_vec(),
                    ));
                }
                None
            }
            MapSignal::Moved(rect) | MapSignal::ZoomEnded(rect) => {
                if let Ok(bounds) = self.tracker.observe(rect) {
                    self.scheduler.bounds_changed(bounds, Instant::now());
                }
                None
            }
            MapSignal::Search(center) => {
                if !center.is_valid() {
                    log::warn!("Ignoring search for invalid location {center:?}");
                    return None;
                }
                self.scheduler.search(center)
            }
            MapSignal::MarkerClicked(handle) => {
                match self.reconciler.detail(handle).cloned() {
                    Some(detection) => self.emit(SyncEvent::DetailRequested(detection)),
                    None => log::debug!("Click on unknown marker {handle:?}"),
                }
                None
            }
        }
    }

    /// Applies a backend response, discarding it if a newer request has
    /// been issued since.
    pub fn handle_response(
        &mut self,
        request_id: RequestId,
        result: Result<DetectionResponse, BackendError>,
    ) {
        if !self.scheduler.is_current(request_id) {
            log::debug!(
                "Discarding stale response {request_id} (latest is {:?})",
                self.scheduler.latest_request()
            );
            return;
        }

        match result {
            Ok(response) => {
                let outcome = normalize_detections(&response.detections, &self.normalize);
                log::info!(
                    "Request {request_id}: {} detections ({} invalid, {} outside region)",
                    outcome.detections.len(),
                    outcome.dropped_invalid,
                    outcome.dropped_outside_region
                );

                match self.reconciler.reconcile(outcome.detections) {
                    ReconcileOutcome::Applied(_) => self.emit(SyncEvent::DetectionsUpdated(
                        self.reconciler.detections().to_vec(),
                    )),
                    ReconcileOutcome::Deferred => {
                        log::debug!("Request {request_id} held until the map surface exists");
                    }
                }
            }
            Err(e) => {
                log::warn!("Request {request_id} failed: {e}");
                self.scheduler.request_failed(request_id);
                let message = e.to_string();
                self.reconciler.set_error(message.clone());
                self.emit(SyncEvent::Error(message));
            }
        }
    }

    /// The overlay reconciler, for inspecting drawn state.
    #[must_use]
    pub const fn reconciler(&self) -> &OverlayReconciler<S> {
        &self.reconciler
    }

    /// The bounds tracker.
    #[must_use]
    pub const fn tracker(&self) -> &BoundsTracker {
        &self.tracker
    }

    fn dispatch(&self, request: FetchRequest) -> InFlight {
        let backend = Arc::clone(&self.backend);
        async move {
            let result = backend.fetch_detections(&request).await;
            (request.request_id, result)
        }
        .boxed()
    }

    fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            log::debug!("No listener for sync events");
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
