// Configuration (env + TOML)
pub mod config;

// Thing model and normalization
pub mod thing;

// Location extraction from free-text attributes
pub mod location;

// Live registry and selection state
pub mod state;

// Backend client: bulk fetch and push stream
pub mod source;

// Synchronization layer
pub mod sync;

// Map view-model
pub mod view;

pub use source::{SourceError, ThingsClient};
pub use state::{LiveRegistry, Selection};
pub use sync::SyncService;
pub use thing::Thing;
