use async_trait::async_trait;

use crate::{Bounds, Coordinates, CoreResult, MarkerHandle, MarkerSpec, VesselId};

/// The rendering surface markers are drawn on.
#[async_trait]
pub trait MarkerSink: Send + Sync {
    async fn create(&self, marker: &MarkerSpec) -> CoreResult<MarkerHandle>;
    /// Moves an existing marker without recreating its visual representation.
    async fn move_to(
        &self,
        handle: MarkerHandle,
        coordinates: Coordinates,
        rotation: f64,
    ) -> CoreResult<()>;
    /// Swaps the visual representation, which drops any attached interaction handlers.
    async fn restyle(&self, handle: MarkerHandle, marker: &MarkerSpec) -> CoreResult<()>;
    /// Attaches click/popup handlers opening the detail surface of `vessel_id`.
    async fn attach_handlers(&self, handle: MarkerHandle, vessel_id: &VesselId) -> CoreResult<()>;
    async fn remove(&self, handle: MarkerHandle) -> CoreResult<()>;
    async fn fit_bounds(&self, bounds: Bounds) -> CoreResult<()>;
}
