use super::LiveRegistry;
use crate::thing::Thing;
use tracing::debug;

/// Which thing, if any, the user has selected
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SelectionState {
    #[default]
    NoSelection,
    Selected(String),
}

/// Selection tracked by id and resolved against the registry on every read,
/// so it never holds a stale copy of the selected thing.
#[derive(Debug, Default)]
pub struct Selection {
    state: SelectionState,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn selected_id(&self) -> Option<&str> {
        match &self.state {
            SelectionState::Selected(id) => Some(id),
            SelectionState::NoSelection => None,
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.selected_id() == Some(id)
    }

    /// Select `id`, or clear with `None`.
    ///
    /// Selecting the already-selected id toggles the selection off.
    pub fn select(&mut self, id: Option<&str>) -> &SelectionState {
        self.state = match id {
            Some(id) if !self.is_selected(id) => SelectionState::Selected(id.to_string()),
            _ => SelectionState::NoSelection,
        };
        debug!(selection = ?self.state, "Selection changed");
        &self.state
    }

    pub fn deselect(&mut self) {
        self.state = SelectionState::NoSelection;
    }

    /// Drop the selection if its thing is gone from the registry.
    ///
    /// Returns true when the selection was cleared.
    pub fn reconcile(&mut self, registry: &LiveRegistry) -> bool {
        let gone = match &self.state {
            SelectionState::Selected(id) => !registry.contains(id),
            SelectionState::NoSelection => false,
        };
        if gone {
            debug!(selection = ?self.state, "Selected thing left the registry");
            self.state = SelectionState::NoSelection;
        }
        gone
    }

    /// Current data for the selected thing, clearing the selection if it
    /// no longer exists.
    pub fn current(&mut self, registry: &LiveRegistry) -> Option<Thing> {
        let thing = registry.get(self.selected_id()?);
        if thing.is_none() {
            self.state = SelectionState::NoSelection;
        }
        thing
    }
}
