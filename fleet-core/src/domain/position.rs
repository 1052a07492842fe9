use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter};

use crate::{MarkerSpec, NavigationStatus, VesselId};

/// AIS uses 511 to signal that the true heading is not available.
pub const HEADING_NOT_AVAILABLE: f64 = 511.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr, EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceKind {
    ApiLive,
    ApiStatic,
    ApiLastKnown,
    StreamLive,
    JobLocation,
    HomePortHeuristic,
    DeterministicFallback,
    None,
}

/// Visual classification of a marker, tells the user whether a position is a real fix or a guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MarkerState {
    Live,
    LastKnown,
    Static,
    Estimated,
}

/// A single position observation from any source.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPosition {
    coordinates: Option<Coordinates>,
    pub speed: Option<f64>,
    pub course: Option<f64>,
    pub heading: Option<f64>,
    pub navigational_status: Option<NavigationStatus>,
    pub timestamp: Option<DateTime<Utc>>,
    pub source_kind: SourceKind,
    pub is_stale: bool,
}

/// The authoritative display position of a vessel, recomputed on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPosition {
    pub vessel_id: VesselId,
    pub position: RawPosition,
    pub display_label: String,
    /// `None` when the position is not renderable.
    pub marker_state: Option<MarkerState>,
}

impl Coordinates {
    /// Returns `None` for non-finite, out of range and null island coordinates.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if !lat.is_finite() || !lng.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
            return None;
        }
        if lat == 0.0 && lng == 0.0 {
            return None;
        }
        Some(Self { lat, lng })
    }

    pub fn offset(self, d_lat: f64, d_lng: f64) -> Self {
        Self {
            lat: (self.lat + d_lat).clamp(-90.0, 90.0),
            lng: (self.lng + d_lng).clamp(-180.0, 180.0),
        }
    }
}

impl RawPosition {
    pub fn new(coordinates: Option<Coordinates>, source_kind: SourceKind) -> Self {
        let coordinates = match source_kind {
            SourceKind::None => None,
            _ => coordinates,
        };

        Self {
            coordinates,
            speed: None,
            course: None,
            heading: None,
            navigational_status: None,
            timestamp: None,
            source_kind,
            is_stale: false,
        }
    }

    pub fn at(coordinates: Coordinates, source_kind: SourceKind) -> Self {
        Self::new(Some(coordinates), source_kind)
    }

    /// A position without coordinates, never renderable.
    pub fn none() -> Self {
        Self::new(None, SourceKind::None)
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        self.coordinates
    }

    pub fn is_renderable(&self) -> bool {
        self.source_kind != SourceKind::None && self.coordinates.is_some()
    }

    /// Marker rotation in degrees, heading when available and course otherwise.
    pub fn rotation(&self) -> f64 {
        let heading = self
            .heading
            .filter(|h| *h != HEADING_NOT_AVAILABLE && (0.0..360.0).contains(h));
        let course = self.course.filter(|c| (0.0..360.0).contains(c));

        heading.or(course).unwrap_or(0.0)
    }
}

impl ResolvedPosition {
    pub fn is_renderable(&self) -> bool {
        self.marker_state.is_some() && self.position.is_renderable()
    }

    /// What the rendering surface should show for this vessel, `None` if nothing.
    pub fn marker_spec(&self) -> Option<MarkerSpec> {
        let coordinates = self.position.coordinates()?;
        let state = self.marker_state?;

        if !self.position.is_renderable() {
            return None;
        }

        Some(MarkerSpec {
            vessel_id: self.vessel_id.clone(),
            coordinates,
            rotation: self.position.rotation(),
            state,
            label: self.display_label.clone(),
        })
    }
}
