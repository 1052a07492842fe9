use fleet_core::{MarkerState, RawPosition, ResolvedPosition, SourceKind, Vessel};
use serde::Deserialize;
use tracing::warn;

use crate::{
    settings::ResolverSettings,
    store::{PositionStore, StoreEntry},
};

mod fallback;
mod gazetteer;

pub use fallback::{deterministic_position, is_near_base};
pub use gazetteer::{Gazetteer, NamedLocation};

/// Vessels matching an exclusion rule never get a fallback position.
///
/// All criteria present on a rule must match, a rule without criteria matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExclusionRule {
    #[serde(default)]
    pub mmsi_prefix: Option<String>,
    #[serde(default)]
    pub name_contains: Option<String>,
}

/// Places vessels whose name contains `name_contains` at the gazetteer location `port`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HomePortRule {
    pub name_contains: String,
    pub port: String,
}

/// Computes the single display position of a vessel from everything known about it.
///
/// Sources are tried in strict priority order and the first one producing valid
/// coordinates wins:
/// 1. snapshot position
/// 2. live stream position, unless stale
/// 3. job location matched against the gazetteer
/// 4. home port matched on the vessel name
/// 5. exclusion list, yields no position at all
/// 6. deterministic fallback
#[derive(Debug, Clone)]
pub struct PositionResolver {
    gazetteer: Gazetteer,
    home_ports: Vec<(String, NamedLocation)>,
    exclusions: Vec<ExclusionRule>,
}

struct Resolution {
    position: RawPosition,
    marker_state: Option<MarkerState>,
    label: String,
}

impl ExclusionRule {
    pub fn matches(&self, vessel: &Vessel) -> bool {
        if self.mmsi_prefix.is_none() && self.name_contains.is_none() {
            return false;
        }

        let mmsi = self.mmsi_prefix.as_ref().is_none_or(|prefix| {
            vessel
                .mmsi
                .is_some_and(|m| m.to_string().starts_with(prefix.trim()))
        });
        let name = self.name_contains.as_ref().is_none_or(|needle| {
            vessel
                .name
                .as_deref()
                .is_some_and(|n| n.to_lowercase().contains(&needle.trim().to_lowercase()))
        });

        mmsi && name
    }
}

impl PositionResolver {
    pub fn new(settings: &ResolverSettings) -> Self {
        let gazetteer = match &settings.gazetteer {
            Some(locations) => Gazetteer::new(locations.clone()),
            None => Gazetteer::default(),
        };

        let home_ports = settings
            .home_ports
            .iter()
            .filter_map(|rule| match gazetteer.get(&rule.port) {
                Some(location) => Some((rule.name_contains.trim().to_lowercase(), location.clone())),
                None => {
                    warn!(
                        "skipping home port rule '{}', unknown port '{}'",
                        rule.name_contains, rule.port
                    );
                    None
                }
            })
            .filter(|(needle, _)| !needle.is_empty())
            .collect();

        Self {
            gazetteer,
            home_ports,
            exclusions: settings.exclusions.clone(),
        }
    }

    pub fn resolve(&self, vessel: &Vessel, store: &PositionStore) -> ResolvedPosition {
        let entry = store.get(&vessel.key());

        let Resolution {
            position,
            marker_state,
            label,
        } = entry
            .and_then(snapshot)
            .or_else(|| entry.and_then(stream))
            .or_else(|| self.job_location(vessel))
            .or_else(|| self.home_port(vessel))
            .unwrap_or_else(|| {
                if self.is_excluded(vessel) {
                    excluded()
                } else {
                    fallback(vessel)
                }
            });

        ResolvedPosition {
            vessel_id: vessel.id.clone(),
            position,
            display_label: label,
            marker_state,
        }
    }

    pub fn is_excluded(&self, vessel: &Vessel) -> bool {
        self.exclusions.iter().any(|rule| rule.matches(vessel))
    }

    fn job_location(&self, vessel: &Vessel) -> Option<Resolution> {
        let location = self.gazetteer.find(vessel.last_job_location.as_deref()?)?;
        let coordinates = location.coordinates()?;

        Some(Resolution {
            position: RawPosition::at(coordinates, SourceKind::JobLocation),
            marker_state: Some(MarkerState::Static),
            label: format!("At {} (job location)", location.name),
        })
    }

    fn home_port(&self, vessel: &Vessel) -> Option<Resolution> {
        let name = vessel.name.as_deref()?.to_lowercase();
        let (_, location) = self
            .home_ports
            .iter()
            .find(|(needle, _)| name.contains(needle.as_str()))?;
        let coordinates = location.coordinates()?;

        Some(Resolution {
            position: RawPosition::at(coordinates, SourceKind::HomePortHeuristic),
            marker_state: Some(MarkerState::Estimated),
            label: format!("Home port {} (estimated)", location.name),
        })
    }
}

fn snapshot(entry: &StoreEntry) -> Option<Resolution> {
    let position = entry.snapshot.as_ref().filter(|p| p.is_renderable())?;

    let marker_state = match position.source_kind {
        SourceKind::ApiLive if position.is_stale => MarkerState::LastKnown,
        SourceKind::ApiLive => MarkerState::Live,
        SourceKind::ApiStatic => MarkerState::Static,
        SourceKind::ApiLastKnown => MarkerState::LastKnown,
        SourceKind::StreamLive
        | SourceKind::JobLocation
        | SourceKind::HomePortHeuristic
        | SourceKind::DeterministicFallback
        | SourceKind::None => return None,
    };

    let label = match marker_state {
        MarkerState::LastKnown => source_label(SourceKind::ApiLastKnown),
        _ => source_label(position.source_kind),
    };

    Some(Resolution {
        position: position.clone(),
        marker_state: Some(marker_state),
        label: label.to_owned(),
    })
}

fn stream(entry: &StoreEntry) -> Option<Resolution> {
    let position = entry
        .stream
        .as_ref()
        .filter(|p| !p.is_stale && p.is_renderable())?;

    Some(Resolution {
        position: position.clone(),
        marker_state: Some(MarkerState::Live),
        label: source_label(SourceKind::StreamLive).to_owned(),
    })
}

fn excluded() -> Resolution {
    Resolution {
        position: RawPosition::none(),
        marker_state: None,
        label: source_label(SourceKind::None).to_owned(),
    }
}

fn fallback(vessel: &Vessel) -> Resolution {
    Resolution {
        position: RawPosition::at(
            deterministic_position(vessel),
            SourceKind::DeterministicFallback,
        ),
        marker_state: Some(MarkerState::Estimated),
        label: source_label(SourceKind::DeterministicFallback).to_owned(),
    }
}

/// Display label of a source when nothing more specific is known.
pub fn source_label(kind: SourceKind) -> &'static str {
    match kind {
        SourceKind::ApiLive => "Live position",
        SourceKind::ApiStatic => "Static position",
        SourceKind::ApiLastKnown => "Last known position",
        SourceKind::StreamLive => "Live (AIS stream)",
        SourceKind::JobLocation => "At job location",
        SourceKind::HomePortHeuristic => "Home port (estimated)",
        SourceKind::DeterministicFallback => "Estimated position",
        SourceKind::None => "Awaiting position data",
    }
}

impl Default for PositionResolver {
    fn default() -> Self {
        Self::new(&ResolverSettings::default())
    }
}
