// Live registry and selection state

mod registry;
mod selection;

pub use registry::{LiveRegistry, PushOp, RegistryChange, SnapshotTicket};
pub use selection::{Selection, SelectionState};
