// View-model for the map: markers, initial centre and the detail card

mod detail;

pub use detail::{DetailCard, DetailLine};

use crate::location::{first_location, Location};
use crate::state::{LiveRegistry, Selection};
use serde::Serialize;

/// One pin on the map
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub id: String,
    /// `model` attribute, falling back to the id
    pub label: String,
    pub location: Location,
    pub selected: bool,
}

/// Markers for every thing with a usable location, ordered by id
pub fn markers(registry: &LiveRegistry, selection: &Selection) -> Vec<Marker> {
    registry
        .things()
        .into_iter()
        .filter_map(|thing| {
            let location = thing.location()?;
            Some(Marker {
                label: thing.model().unwrap_or(&thing.id).to_string(),
                selected: selection.is_selected(&thing.id),
                location,
                id: thing.id,
            })
        })
        .collect()
}

/// Initial map centre: the first located thing, else the default centre
pub fn map_center(registry: &LiveRegistry) -> Location {
    first_location(&registry.things()).unwrap_or(Location::DEFAULT_CENTER)
}
