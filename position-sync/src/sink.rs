use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use fleet_core::{Bounds, Coordinates, CoreResult, MarkerHandle, MarkerSink, MarkerSpec, VesselId};
use tracing::info;

/// Rendering surface that only logs what would be drawn, used when the engine
/// runs headless.
#[derive(Debug, Default)]
pub struct LoggingSink {
    next_handle: AtomicU64,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MarkerSink for LoggingSink {
    async fn create(&self, marker: &MarkerSpec) -> CoreResult<MarkerHandle> {
        let handle = MarkerHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        info!(
            "create {handle}, vessel: {}, state: {}, at: ({}, {}), rotation: {}, label: '{}'",
            marker.vessel_id,
            marker.state,
            marker.coordinates.lat,
            marker.coordinates.lng,
            marker.rotation,
            marker.label,
        );
        Ok(handle)
    }

    async fn move_to(
        &self,
        handle: MarkerHandle,
        coordinates: Coordinates,
        rotation: f64,
    ) -> CoreResult<()> {
        info!(
            "move {handle}, to: ({}, {}), rotation: {rotation}",
            coordinates.lat, coordinates.lng
        );
        Ok(())
    }

    async fn restyle(&self, handle: MarkerHandle, marker: &MarkerSpec) -> CoreResult<()> {
        info!(
            "restyle {handle}, state: {}, label: '{}'",
            marker.state, marker.label
        );
        Ok(())
    }

    async fn attach_handlers(&self, handle: MarkerHandle, vessel_id: &VesselId) -> CoreResult<()> {
        info!("attach handlers {handle}, vessel: {vessel_id}");
        Ok(())
    }

    async fn remove(&self, handle: MarkerHandle) -> CoreResult<()> {
        info!("remove {handle}");
        Ok(())
    }

    async fn fit_bounds(&self, bounds: Bounds) -> CoreResult<()> {
        info!(
            "fit bounds, south west: ({}, {}), north east: ({}, {})",
            bounds.south_west.lat,
            bounds.south_west.lng,
            bounds.north_east.lat,
            bounds.north_east.lng
        );
        Ok(())
    }
}
