use std::fmt::Display;

use crate::{Coordinates, MarkerState, VesselId};

/// Handle of a marker allocated by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerHandle(pub u64);

/// Everything the rendering surface needs to draw a vessel marker.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerSpec {
    pub vessel_id: VesselId,
    pub coordinates: Coordinates,
    pub rotation: f64,
    pub state: MarkerState,
    pub label: String,
}

/// A currently materialized marker and what was last rendered for it.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerEntry {
    pub vessel_id: VesselId,
    pub handle: MarkerHandle,
    pub state: MarkerState,
    pub rotation: f64,
    pub coordinates: Coordinates,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south_west: Coordinates,
    pub north_east: Coordinates,
}

impl MarkerEntry {
    pub fn new(handle: MarkerHandle, spec: &MarkerSpec) -> Self {
        Self {
            vessel_id: spec.vessel_id.clone(),
            handle,
            state: spec.state,
            rotation: spec.rotation,
            coordinates: spec.coordinates,
        }
    }

    pub fn apply(&mut self, spec: &MarkerSpec) {
        self.state = spec.state;
        self.rotation = spec.rotation;
        self.coordinates = spec.coordinates;
    }

    pub fn is_placed_at(&self, spec: &MarkerSpec) -> bool {
        self.coordinates == spec.coordinates && self.rotation == spec.rotation
    }
}

impl Bounds {
    /// Smallest box containing all coordinates, `None` for an empty input.
    pub fn containing(coordinates: impl IntoIterator<Item = Coordinates>) -> Option<Self> {
        coordinates.into_iter().fold(None, |acc, c| {
            Some(match acc {
                None => Bounds {
                    south_west: c,
                    north_east: c,
                },
                Some(Bounds {
                    south_west,
                    north_east,
                }) => Bounds {
                    south_west: Coordinates {
                        lat: south_west.lat.min(c.lat),
                        lng: south_west.lng.min(c.lng),
                    },
                    north_east: Coordinates {
                        lat: north_east.lat.max(c.lat),
                        lng: north_east.lng.max(c.lng),
                    },
                },
            })
        })
    }
}

impl Display for MarkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "marker-{}", self.0)
    }
}
