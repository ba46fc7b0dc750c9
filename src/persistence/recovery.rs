//! Crash recovery at startup

use std::io::{self, BufRead, Write};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use super::{SessionSnapshot, SnapshotSlot, SnapshotStore};
use crate::{error::PersistenceError, state::Session};

/// Answer to "restore the previous mission?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    Restore,
    Discard,
}

/// Asks whether a found recovery snapshot should be restored
pub trait RecoveryPrompt {
    /// `None` when no answer could be obtained, e.g. stdin is closed
    fn decide(&self, snapshot: &SessionSnapshot) -> Option<RecoveryDecision>;
}

/// A fixed answer, for unattended starts
impl RecoveryPrompt for RecoveryDecision {
    fn decide(&self, _snapshot: &SessionSnapshot) -> Option<RecoveryDecision> {
        Some(*self)
    }
}

/// Asks on the terminal; an answer other than yes discards
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl RecoveryPrompt for TerminalPrompt {
    fn decide(&self, snapshot: &SessionSnapshot) -> Option<RecoveryDecision> {
        let mut stdout = io::stdout();
        let _ = write!(
            stdout,
            "Einsatz \"{}\" vom {} mit {} Teams nach unerwartetem Beenden gefunden. Wiederherstellen? [j/N] ",
            snapshot.mission.location,
            snapshot.saved_at.format("%d.%m.%Y %H:%M"),
            snapshot.teams.len()
        );
        let _ = stdout.flush();

        read_answer(io::stdin().lock())
    }
}

/// Read one answer line; end of input or a read error is no answer
fn read_answer(mut input: impl BufRead) -> Option<RecoveryDecision> {
    let mut answer = String::new();
    match input.read_line(&mut answer) {
        Ok(0) => None,
        Ok(_) => Some(parse_answer(&answer)),
        Err(e) => {
            warn!("Could not read recovery answer: {}", e);
            None
        }
    }
}

fn parse_answer(answer: &str) -> RecoveryDecision {
    match answer.trim().to_lowercase().as_str() {
        "j" | "ja" | "y" | "yes" => RecoveryDecision::Restore,
        _ => RecoveryDecision::Discard,
    }
}

/// Offer the recovery snapshot, if any, and consume it either way
///
/// Without an answer the snapshot is restored, so the crashed mission lives
/// on in the new session. Errors are logged and yield `None`; startup
/// continues with a fresh session.
pub fn recover_session(
    store: &impl SnapshotStore,
    prompt: &impl RecoveryPrompt,
    now: DateTime<Utc>,
) -> Option<Session> {
    let snapshot = match store.read(SnapshotSlot::Recovery) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return None,
        Err(e) => {
            error!("Recovery file unreadable: {}", e);
            if let Err(e) = store.quarantine(SnapshotSlot::Recovery) {
                warn!("Could not move unreadable recovery file aside: {}", e);
            }
            return None;
        }
    };

    let decision = prompt.decide(&snapshot).unwrap_or_else(|| {
        warn!("No answer to the recovery prompt, restoring the previous mission");
        RecoveryDecision::Restore
    });

    let restored = match decision {
        RecoveryDecision::Restore => match snapshot.restore(now) {
            Ok(session) => {
                info!(
                    "Restored mission {} with {} teams ({} running)",
                    session.mission().location,
                    session.teams().len(),
                    session.running_count()
                );
                Some(session)
            }
            Err(e) => {
                error!("Recovery snapshot rejected: {}", e);
                None
            }
        },
        RecoveryDecision::Discard => {
            info!("Recovery snapshot discarded");
            None
        }
    };

    if let Err(e) = store.remove(SnapshotSlot::Recovery) {
        warn!("Could not remove recovery file: {}", e);
    }
    restored
}

/// Load the regular autosave to continue a mission after a clean exit
pub fn load_autosave(store: &impl SnapshotStore, now: DateTime<Utc>) -> Result<Option<Session>, PersistenceError> {
    match store.read(SnapshotSlot::Autosave)? {
        Some(snapshot) => snapshot.restore(now).map(Some),
        None => Ok(None),
    }
}
