use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use fleet_core::{MarkerEntry, MarkerHandle, MarkerSink, MarkerSpec, ResolvedPosition, VesselId};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

type Slot = Arc<Mutex<Option<MarkerEntry>>>;

/// Outcome of a single marker pass for one vessel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerUpdate {
    Created(MarkerHandle),
    Moved,
    Restyled,
    Removed,
    Unchanged,
    /// Another pass for the same vessel was in progress, this one was dropped.
    Busy,
    /// The rendering surface rejected an operation, the marker keeps its previous state.
    Failed,
}

/// Owns one marker per shown vessel and keeps it in sync with the vessel's
/// resolved position.
///
/// Passes for the same vessel are mutually exclusive. A pass that finds the
/// vessel's lock held is dropped rather than queued, the dropped vessel is
/// remembered so the next reconciliation can pick it up again.
#[derive(Clone)]
pub struct MarkerController {
    sink: Arc<dyn MarkerSink>,
    slots: Arc<Mutex<HashMap<VesselId, Slot>>>,
    dropped: Arc<Mutex<HashSet<VesselId>>>,
}

impl MarkerController {
    pub fn new(sink: Arc<dyn MarkerSink>) -> Self {
        Self {
            sink,
            slots: Default::default(),
            dropped: Default::default(),
        }
    }

    pub fn sink(&self) -> &Arc<dyn MarkerSink> {
        &self.sink
    }

    /// Brings the marker of `resolved.vessel_id` in line with the resolved position,
    /// removing it if the position is not renderable.
    pub async fn apply(&self, resolved: &ResolvedPosition) -> MarkerUpdate {
        self.update(&resolved.vessel_id, resolved.marker_spec())
            .await
    }

    /// Removes the marker of a vessel that is no longer shown.
    pub async fn release(&self, vessel_id: &VesselId) -> MarkerUpdate {
        self.update(vessel_id, None).await
    }

    /// Removes every marker, waiting for in-flight passes to finish.
    pub async fn clear(&self) -> usize {
        let slots: Vec<_> = self.slots.lock().await.values().cloned().collect();

        let mut removed = 0;
        for slot in slots {
            let mut entry = slot.lock().await;
            if let Some(current) = entry.as_ref() {
                match self.sink.remove(current.handle).await {
                    Ok(()) => removed += 1,
                    Err(e) => error!("failed to remove marker {}: {e:?}", current.handle),
                }
                *entry = None;
            }
        }

        self.dropped.lock().await.clear();
        removed
    }

    /// Vessels whose last pass was dropped because another pass held the lock.
    pub async fn take_dropped(&self) -> Vec<VesselId> {
        self.dropped.lock().await.drain().collect()
    }

    pub async fn marker(&self, vessel_id: &VesselId) -> Option<MarkerEntry> {
        let slot = self.slots.lock().await.get(vessel_id).cloned()?;
        let entry = slot.lock().await;
        entry.clone()
    }

    pub async fn markers(&self) -> Vec<MarkerEntry> {
        let slots: Vec<_> = self.slots.lock().await.values().cloned().collect();

        let mut markers = Vec::with_capacity(slots.len());
        for slot in slots {
            if let Some(entry) = slot.lock().await.as_ref() {
                markers.push(entry.clone());
            }
        }
        markers
    }

    async fn slot(&self, vessel_id: &VesselId) -> Slot {
        self.slots
            .lock()
            .await
            .entry(vessel_id.clone())
            .or_default()
            .clone()
    }

    async fn update(&self, vessel_id: &VesselId, spec: Option<MarkerSpec>) -> MarkerUpdate {
        let slot = self.slot(vessel_id).await;

        // The guard is the per-vessel lock, dropping it on any return releases it.
        let Ok(mut entry) = slot.try_lock() else {
            warn!("marker update already in progress, dropping update for vessel {vessel_id}");
            self.dropped.lock().await.insert(vessel_id.clone());
            return MarkerUpdate::Busy;
        };

        let Some(spec) = spec else {
            return self.remove(vessel_id, &mut entry).await;
        };
        let Some(current) = entry.as_mut() else {
            return self.create(vessel_id, spec, &mut entry).await;
        };

        if current.state != spec.state {
            // Restyling swaps the visual representation, the handlers attached
            // to the old one are gone and must be attached again.
            if let Err(e) = self.sink.restyle(current.handle, &spec).await {
                error!("failed to restyle marker {}: {e:?}", current.handle);
                return MarkerUpdate::Failed;
            }
            if let Err(e) = self.sink.attach_handlers(current.handle, vessel_id).await {
                error!(
                    "failed to reattach handlers to marker {}: {e:?}",
                    current.handle
                );
                return MarkerUpdate::Failed;
            }

            debug!(
                "restyled marker {} of vessel {vessel_id}, {} -> {}",
                current.handle, current.state, spec.state
            );
            current.apply(&spec);
            MarkerUpdate::Restyled
        } else if !current.is_placed_at(&spec) {
            if let Err(e) = self
                .sink
                .move_to(current.handle, spec.coordinates, spec.rotation)
                .await
            {
                error!("failed to move marker {}: {e:?}", current.handle);
                return MarkerUpdate::Failed;
            }

            current.apply(&spec);
            MarkerUpdate::Moved
        } else {
            MarkerUpdate::Unchanged
        }
    }

    async fn create(
        &self,
        vessel_id: &VesselId,
        spec: MarkerSpec,
        entry: &mut Option<MarkerEntry>,
    ) -> MarkerUpdate {
        let handle = match self.sink.create(&spec).await {
            Ok(v) => v,
            Err(e) => {
                error!("failed to create marker for vessel {vessel_id}: {e:?}");
                return MarkerUpdate::Failed;
            }
        };
        // Markers without handlers are taken down, the next pass recreates them.
        if let Err(e) = self.sink.attach_handlers(handle, vessel_id).await {
            error!("failed to attach handlers to marker {handle}: {e:?}");
            if let Err(e) = self.sink.remove(handle).await {
                error!("failed to remove marker {handle} without handlers: {e:?}");
            }
            return MarkerUpdate::Failed;
        }

        debug!("created marker {handle} for vessel {vessel_id}");
        *entry = Some(MarkerEntry::new(handle, &spec));
        MarkerUpdate::Created(handle)
    }

    async fn remove(&self, vessel_id: &VesselId, entry: &mut Option<MarkerEntry>) -> MarkerUpdate {
        let Some(handle) = entry.as_ref().map(|e| e.handle) else {
            return MarkerUpdate::Unchanged;
        };
        if let Err(e) = self.sink.remove(handle).await {
            error!("failed to remove marker {handle}: {e:?}");
            return MarkerUpdate::Failed;
        }

        debug!("removed marker {handle} of vessel {vessel_id}");
        *entry = None;
        MarkerUpdate::Removed
    }
}
