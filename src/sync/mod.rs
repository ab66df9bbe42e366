// State synchronisation for Pong404
// Stages inbound server data and merges it with local input once per frame

pub mod prediction;
pub mod snapshot;
pub mod store;

pub use prediction::PredictionEngine;
pub use snapshot::NetworkSnapshot;
pub use store::{ReconciliationStore, SyncEvent};
