//! Change-gated autosave
//!
//! Mutations bump the session revision; the fast dirty check turns a revision
//! change into the `dirty` flag and the slow save tick writes a snapshot only
//! while that flag is set. Every write goes through one async gate, so
//! overlapping save requests queue instead of interleaving on disk.

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{SessionSnapshot, SnapshotSlot, SnapshotStore};
use crate::error::{PersistenceError, StateError};

/// Supplies the state the autosaver persists
pub trait SnapshotSource {
    /// Revision of the live session; changes on every persisted-state mutation
    fn revision(&self) -> Result<u64, StateError>;

    /// Snapshot of the live session together with the revision it reflects
    fn snapshot(&self, now: DateTime<Utc>) -> Result<(u64, SessionSnapshot), StateError>;
}

/// What one save attempt did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing changed since the last save, no I/O
    Clean,
    /// Dirty, but the snapshot matched the last written one
    Unchanged,
    Written,
    Failed,
}

/// Autosave bookkeeping shown on the status endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutosaveStatus {
    pub dirty: bool,
    pub writes: u64,
    pub last_saved_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub struct Autosaver<S> {
    store: Arc<S>,
    dirty: AtomicBool,
    observed_revision: AtomicU64,
    /// Last written snapshot; held for the whole build-write-rename sequence
    gate: tokio::sync::Mutex<Option<SessionSnapshot>>,
    status: Arc<Mutex<AutosaveStatus>>,
}

impl<S: SnapshotStore> Autosaver<S> {
    pub fn new(store: Arc<S>, initial_revision: u64, status: Arc<Mutex<AutosaveStatus>>) -> Self {
        Self {
            store,
            dirty: AtomicBool::new(false),
            observed_revision: AtomicU64::new(initial_revision),
            gate: tokio::sync::Mutex::new(None),
            status,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.update_status(|s| s.dirty = true);
    }

    /// Raise the dirty flag if the session changed since the last look
    pub fn check_dirty(&self, source: &impl SnapshotSource) -> bool {
        match source.revision() {
            Ok(revision) => {
                if self.observed_revision.swap(revision, Ordering::SeqCst) != revision {
                    debug!("Session revision moved to {}", revision);
                    self.mark_dirty();
                }
            }
            Err(e) => warn!("Dirty check failed: {}", e),
        }
        self.is_dirty()
    }

    /// Slow-period tick: save only when dirty
    pub async fn save_tick(&self, source: &impl SnapshotSource, now: DateTime<Utc>) -> SaveOutcome {
        if !self.is_dirty() {
            debug!("Autosave skipped, session clean");
            return SaveOutcome::Clean;
        }
        self.save(source, now).await
    }

    /// Build, compare and write a snapshot, regardless of the dirty flag
    pub async fn save(&self, source: &impl SnapshotSource, now: DateTime<Utc>) -> SaveOutcome {
        let mut last_written = self.gate.lock().await;

        let (revision, snapshot) = match source.snapshot(now) {
            Ok(taken) => taken,
            Err(e) => {
                error!("Autosave could not read session: {}", e);
                self.update_status(|s| s.last_error = Some(e.to_string()));
                return SaveOutcome::Failed;
            }
        };

        if last_written.as_ref().is_some_and(|prev| prev.roughly_equal(&snapshot)) {
            debug!("Autosave skipped, snapshot unchanged");
            self.mark_clean(revision);
            return SaveOutcome::Unchanged;
        }

        match self.write_both(snapshot).await {
            Ok(snapshot) => {
                info!(
                    "Autosaved {} teams ({} running)",
                    snapshot.teams.len(),
                    snapshot.running_count()
                );
                *last_written = Some(snapshot);
                self.mark_clean(revision);
                self.update_status(|s| {
                    s.writes += 1;
                    s.last_saved_at = Some(now);
                    s.last_error = None;
                });
                SaveOutcome::Written
            }
            Err(e) => {
                error!("Autosave failed, retrying next period: {}", e);
                self.update_status(|s| s.last_error = Some(e.to_string()));
                SaveOutcome::Failed
            }
        }
    }

    /// Clean exit: flush pending changes, then drop the recovery copy
    pub async fn shutdown(&self, source: &impl SnapshotSource, now: DateTime<Utc>) -> Result<(), PersistenceError> {
        if self.check_dirty(source) && self.save(source, now).await == SaveOutcome::Failed {
            warn!("Final autosave failed, keeping recovery file");
            return Err(PersistenceError::Invalid("final autosave failed".to_string()));
        }

        let _gate = self.gate.lock().await;
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.remove(SnapshotSlot::Recovery))
            .await
            .map_err(|e| PersistenceError::Worker(e.to_string()))??;
        info!("Clean shutdown, recovery file removed");
        Ok(())
    }

    async fn write_both(&self, snapshot: SessionSnapshot) -> Result<SessionSnapshot, PersistenceError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            store.write(SnapshotSlot::Autosave, &snapshot)?;
            store.write(SnapshotSlot::Recovery, &snapshot)?;
            Ok(snapshot)
        })
        .await
        .map_err(|e| PersistenceError::Worker(e.to_string()))?
    }

    fn mark_clean(&self, revision: u64) {
        self.observed_revision.store(revision, Ordering::SeqCst);
        self.dirty.store(false, Ordering::SeqCst);
        self.update_status(|s| s.dirty = false);
    }

    fn update_status(&self, f: impl FnOnce(&mut AutosaveStatus)) {
        if let Ok(mut status) = self.status.lock() {
            f(&mut status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        persistence::{build_snapshot, MemoryStore},
        state::{CollectingSink, MissionInfo, NewTeam, Session},
    };
    use chrono::TimeDelta;

    struct Live(Mutex<Session>);

    impl SnapshotSource for Live {
        fn revision(&self) -> Result<u64, StateError> {
            Ok(self.0.lock().unwrap().revision())
        }

        fn snapshot(&self, now: DateTime<Utc>) -> Result<(u64, SessionSnapshot), StateError> {
            let s = self.0.lock().unwrap();
            Ok((s.revision(), build_snapshot(&s, now)))
        }
    }

    fn setup() -> (Live, Autosaver<MemoryStore>) {
        let session = Session::new(MissionInfo::new("Ort", "Leitung", Utc::now()));
        let rev = session.revision();
        let saver = Autosaver::new(Arc::new(MemoryStore::new()), rev, Arc::default());
        (Live(Mutex::new(session)), saver)
    }

    #[tokio::test]
    async fn clean_session_is_never_written() {
        let (live, saver) = setup();
        for _ in 0..5 {
            assert!(!saver.check_dirty(&live));
            assert_eq!(saver.save_tick(&live, Utc::now()).await, SaveOutcome::Clean);
        }
        assert_eq!(saver.store().write_count(SnapshotSlot::Autosave), 0);
    }

    #[tokio::test]
    async fn mutation_is_written_once_to_both_slots() {
        let (live, saver) = setup();
        live.0.lock().unwrap().add_team(NewTeam::named("Team 1")).unwrap();

        assert!(saver.check_dirty(&live));
        assert_eq!(saver.save_tick(&live, Utc::now()).await, SaveOutcome::Written);
        assert_eq!(saver.save_tick(&live, Utc::now()).await, SaveOutcome::Clean);
        assert_eq!(saver.store().write_count(SnapshotSlot::Autosave), 1);
        assert_eq!(saver.store().write_count(SnapshotSlot::Recovery), 1);
    }

    #[tokio::test]
    async fn failed_write_keeps_dirty_and_retries() {
        let (live, saver) = setup();
        live.0.lock().unwrap().add_team(NewTeam::named("Team 1")).unwrap();
        saver.check_dirty(&live);

        saver.store().set_failing(true);
        assert_eq!(saver.save_tick(&live, Utc::now()).await, SaveOutcome::Failed);
        assert!(saver.is_dirty());
        assert!(saver.status.lock().unwrap().last_error.is_some());

        saver.store().set_failing(false);
        assert_eq!(saver.save_tick(&live, Utc::now()).await, SaveOutcome::Written);
        assert!(!saver.is_dirty());
    }

    #[tokio::test]
    async fn dirty_but_equivalent_snapshot_is_not_rewritten() {
        let (live, saver) = setup();
        let sink = CollectingSink::new();
        let now = Utc::now();
        let id = live.0.lock().unwrap().add_team(NewTeam::named("Team 1")).unwrap();
        saver.check_dirty(&live);
        saver.save_tick(&live, now).await;

        {
            let mut s = live.0.lock().unwrap();
            s.start(id, now, &sink).unwrap();
            s.stop(id, now, &sink).unwrap();
        }
        assert!(saver.check_dirty(&live));
        assert_eq!(
            saver.save_tick(&live, now + TimeDelta::seconds(30)).await,
            SaveOutcome::Unchanged
        );
        assert!(!saver.is_dirty());
        assert_eq!(saver.store().write_count(SnapshotSlot::Autosave), 1);
    }

    #[tokio::test]
    async fn shutdown_flushes_and_removes_recovery() {
        let (live, saver) = setup();
        live.0.lock().unwrap().add_team(NewTeam::named("Team 1")).unwrap();

        saver.shutdown(&live, Utc::now()).await.unwrap();
        assert!(saver.store().contains(SnapshotSlot::Autosave));
        assert!(!saver.store().contains(SnapshotSlot::Recovery));
    }
}
