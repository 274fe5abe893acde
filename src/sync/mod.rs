//! The sync core: fingerprinting, persisted state, adapter seams, and the
//! four-phase reconciliation engine.

pub mod body;
pub mod engine;
pub mod fingerprint;
pub mod ports;
pub mod state;

pub use engine::{PassStats, SyncEngine};
pub use ports::{GithubPort, NotionPort};
pub use state::{StateStore, SyncState, SyncedTask};
