use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use fleet_core::{Mmsi, RawPosition, StaticInfo, VesselKey, Voyage};

/// Latest known observations of one vessel.
///
/// Snapshot and stream positions are kept apart as they arrive on independent
/// cadences, the resolver decides which one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreEntry {
    pub snapshot: Option<RawPosition>,
    pub voyage: Option<Voyage>,
    pub stream: Option<RawPosition>,
    pub stream_ship_name: Option<String>,
    pub static_info: Option<StaticInfo>,
}

/// In-memory map of the latest raw positions per vessel key.
///
/// Entries are never removed during a session, a vessel that stops broadcasting
/// keeps its last fix and is only marked stale.
#[derive(Debug, Default)]
pub struct PositionStore {
    entries: HashMap<VesselKey, StoreEntry>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &VesselKey) -> Option<&StoreEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records the snapshot observation of a vessel, a snapshot without a
    /// position clears the previous snapshot position as snapshots are wholesale.
    pub fn record_snapshot(
        &mut self,
        key: VesselKey,
        position: Option<RawPosition>,
        voyage: Option<Voyage>,
    ) {
        let entry = self.entries.entry(key).or_default();
        entry.snapshot = position;
        entry.voyage = voyage;
    }

    /// Last write wins, stream positions are applied in arrival order.
    pub fn record_stream(&mut self, mmsi: Mmsi, position: RawPosition, ship_name: Option<String>) {
        let entry = self.entries.entry(VesselKey::Mmsi(mmsi)).or_default();
        entry.stream = Some(position);
        if ship_name.is_some() {
            entry.stream_ship_name = ship_name;
        }
    }

    pub fn record_static(&mut self, mmsi: Mmsi, info: StaticInfo) {
        let entry = self.entries.entry(VesselKey::Mmsi(mmsi)).or_default();
        match entry.static_info.as_mut() {
            Some(existing) => existing.merge(info),
            None => entry.static_info = Some(info),
        }
    }

    /// Marks stream positions older than `stale_after` as stale and returns the
    /// keys whose flag changed. Positions without a timestamp are left alone.
    pub fn mark_stale(&mut self, now: DateTime<Utc>, stale_after: Duration) -> Vec<VesselKey> {
        let mut changed = Vec::new();

        for (key, entry) in self.entries.iter_mut() {
            let Some(stream) = entry.stream.as_mut() else {
                continue;
            };
            if stream.is_stale {
                continue;
            }
            if let Some(timestamp) = stream.timestamp {
                if now - timestamp > stale_after {
                    stream.is_stale = true;
                    changed.push(key.clone());
                }
            }
        }

        changed
    }
}
