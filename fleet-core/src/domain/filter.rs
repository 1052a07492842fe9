use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::VesselId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, AsRefStr, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TypeFilter {
    #[default]
    All,
    Military,
    Commercial,
}

/// Identifier of an externally managed named subset of vessels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FleetId(String);

/// Which vessels are currently shown. A fleet selection and a type filter are
/// mutually exclusive views, selecting one resets the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    type_filter: TypeFilter,
    selected_fleet: Option<FleetId>,
}

/// Fleet membership as supplied by the fleet-data collaborator.
#[derive(Debug, Clone, Default)]
pub struct FleetDirectory(HashMap<FleetId, HashSet<VesselId>>);

impl FleetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FilterState {
    pub fn type_filter(&self) -> TypeFilter {
        self.type_filter
    }

    pub fn selected_fleet(&self) -> Option<&FleetId> {
        self.selected_fleet.as_ref()
    }

    pub fn set_type_filter(&mut self, filter: TypeFilter) {
        self.type_filter = filter;
        self.selected_fleet = None;
    }

    /// Selecting a fleet resets the type filter, clearing it restores the unfiltered view.
    pub fn set_fleet_filter(&mut self, fleet: Option<FleetId>) {
        self.selected_fleet = fleet;
        self.type_filter = TypeFilter::All;
    }
}

impl FleetDirectory {
    pub fn new(fleets: HashMap<FleetId, HashSet<VesselId>>) -> Self {
        Self(fleets)
    }

    pub fn insert(&mut self, fleet: FleetId, members: impl IntoIterator<Item = VesselId>) {
        self.0.insert(fleet, members.into_iter().collect());
    }

    /// Unknown fleets have no members.
    pub fn contains(&self, fleet: &FleetId, vessel: &VesselId) -> bool {
        self.0.get(fleet).is_some_and(|m| m.contains(vessel))
    }
}
