use fleet_core::{FilterState, FleetDirectory, TypeCategory, TypeFilter, Vessel};

/// Whether a vessel is currently shown.
///
/// This is the only place visibility is decided, the visible list, marker
/// placement and viewport fitting all go through it.
pub fn is_visible(vessel: &Vessel, filter: &FilterState, fleets: &FleetDirectory) -> bool {
    if let Some(fleet) = filter.selected_fleet() {
        return fleets.contains(fleet, &vessel.id);
    }

    match filter.type_filter() {
        TypeFilter::All => true,
        TypeFilter::Military => vessel.type_category == TypeCategory::Military,
        TypeFilter::Commercial => vessel.type_category == TypeCategory::Commercial,
    }
}
