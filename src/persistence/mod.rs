//! Persistence module
//!
//! Snapshots of the live session, the storage port they are written to,
//! change-gated autosave and startup crash recovery.

pub mod autosave;
pub mod recovery;
pub mod snapshot;
pub mod store;

pub use autosave::{AutosaveStatus, Autosaver, SaveOutcome, SnapshotSource};
pub use recovery::{load_autosave, recover_session, RecoveryDecision, RecoveryPrompt, TerminalPrompt};
pub use snapshot::{build_snapshot, SessionSnapshot, TeamRecord};
#[cfg(test)]
pub use store::MemoryStore;
pub use store::{JsonFileStore, SnapshotSlot, SnapshotStore};
