#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Keeps a map's fire overlay in sync with its viewport.
//!
//! Viewport events flow through [`bounds::BoundsTracker`] into the
//! debouncing [`scheduler::FetchScheduler`]. Issued requests go to a
//! [`wildfire_map_source::DetectionBackend`], and the latest response is
//! normalized and handed to the [`overlay::OverlayReconciler`], the only
//! component that touches the map's fire layers.
//! [`controller::SyncController`] wires these together on one task.

pub mod bounds;
pub mod config;
pub mod controller;
pub mod overlay;
pub mod scheduler;

pub use bounds::{BoundsError, BoundsTracker, ViewRect};
pub use config::{ConfigError, SyncConfig};
pub use controller::{MapSignal, SyncController, SyncEvent};
pub use overlay::{
    HeatPoint, HeatmapHandle, MapSurface, MarkerHandle, MarkerSpec, OverlayReconciler,
    OverlayState, SurfaceError,
};
