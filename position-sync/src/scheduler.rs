use std::{collections::HashSet, time::Duration};

use fleet_core::VesselId;
use tokio::time::Instant;

/// Collects vessels touched by stream updates and releases them as one batch
/// once the debounce window has passed.
///
/// The window starts at the first touch of a batch and is not extended by later
/// touches, a steady stream of updates still produces one pass per window.
#[derive(Debug)]
pub struct UpdateScheduler {
    window: Duration,
    pending: HashSet<VesselId>,
    deadline: Option<Instant>,
}

impl UpdateScheduler {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashSet::new(),
            deadline: None,
        }
    }

    pub fn touch(&mut self, vessel_id: VesselId, now: Instant) {
        self.pending.insert(vessel_id);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.window);
        }
    }

    /// When the current batch is due, `None` when nothing is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Takes the pending batch and resets the window.
    pub fn drain(&mut self) -> Vec<VesselId> {
        self.deadline = None;
        let mut batch: Vec<_> = self.pending.drain().collect();
        batch.sort();
        batch
    }
}
