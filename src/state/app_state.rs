//! Main application state management

use std::{
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::info;

use super::{MissionInfo, NewTeam, Session, Team, TeamEvent, WarningThresholds};
use crate::{
    clock::Clock,
    error::{SessionError, StateError},
    persistence::{build_snapshot, AutosaveStatus, SessionSnapshot, SnapshotSource},
};

/// Shared state of the running service
///
/// The session is the single writer target: ticker, notes task, autosave and
/// HTTP handlers all go through the one lock and never do I/O while holding it.
pub struct AppState {
    /// The live mission
    pub session: Arc<Mutex<Session>>,
    pub clock: Arc<dyn Clock>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Team events, in the order the timers raised them
    pub event_tx: broadcast::Sender<TeamEvent>,
    pub autosave_status: Arc<Mutex<AutosaveStatus>>,
}

impl AppState {
    pub fn new(session: Session, clock: Arc<dyn Clock>, port: u16, host: String) -> Self {
        let (event_tx, _) = broadcast::channel(256);

        Self {
            session: Arc::new(Mutex::new(session)),
            clock,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            event_tx,
            autosave_status: Arc::new(Mutex::new(AutosaveStatus::default())),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Apply a mutation to the session and record it as the last action
    pub fn update_session<F, R>(&self, action: &str, updater: F) -> Result<R, StateError>
    where
        F: FnOnce(&mut Session, DateTime<Utc>, &broadcast::Sender<TeamEvent>) -> Result<R, SessionError>,
    {
        let now = self.now();
        let mut session = self.session.lock()
            .map_err(|e| StateError::Poisoned(e.to_string()))?;
        let result = updater(&mut *session, now, &self.event_tx)?;
        drop(session); // Release the lock early

        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some(action.to_string());
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(now);
        }

        Ok(result)
    }

    /// Read from the session without mutating it
    pub fn read_session<F, R>(&self, reader: F) -> Result<R, StateError>
    where
        F: FnOnce(&Session) -> R,
    {
        self.session.lock()
            .map(|session| reader(&session))
            .map_err(|e| StateError::Poisoned(e.to_string()))
    }

    pub fn get_team(&self, id: u32) -> Result<Team, StateError> {
        self.read_session(|s| s.team(id).cloned())?
            .ok_or(StateError::Session(SessionError::UnknownTeam(id)))
    }

    pub fn add_team(&self, new: NewTeam) -> Result<Team, StateError> {
        self.update_session("team-add", |session, _, _| {
            let id = session.add_team(new)?;
            session.team(id).cloned().ok_or(SessionError::UnknownTeam(id))
        })
    }

    pub fn remove_team(&self, id: u32) -> Result<Team, StateError> {
        self.update_session("team-remove", |session, _, _| session.remove_team(id))
    }

    /// Start a team's timer; returns whether it was stopped before
    pub fn start_team(&self, id: u32) -> Result<bool, StateError> {
        self.update_session("timer-start", |session, now, events| session.start(id, now, events))
    }

    pub fn stop_team(&self, id: u32) -> Result<bool, StateError> {
        self.update_session("timer-stop", |session, now, events| session.stop(id, now, events))
    }

    pub fn reset_team(&self, id: u32) -> Result<(), StateError> {
        self.update_session("timer-reset", |session, now, events| session.reset(id, now, events))
    }

    pub fn set_thresholds(&self, id: u32, first: u32, second: u32) -> Result<WarningThresholds, StateError> {
        self.update_session("thresholds", |session, _, _| session.set_thresholds(id, first, second))
    }

    pub fn add_note(&self, id: u32, text: String) -> Result<(), StateError> {
        self.update_session("note", |session, now, _| session.add_note(id, now, text))
    }

    pub fn update_mission(&self, mission: MissionInfo) -> Result<(), StateError> {
        self.update_session("mission", |session, _, _| {
            session.update_mission(mission);
            Ok(())
        })
    }

    /// Advance every running timer to the clock's current instant
    pub fn tick(&self) -> Result<usize, StateError> {
        let now = self.now();
        let mut session = self.session.lock()
            .map_err(|e| StateError::Poisoned(e.to_string()))?;
        Ok(session.tick_all(now, &self.event_tx))
    }

    pub fn get_autosave_status(&self) -> AutosaveStatus {
        self.autosave_status.lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        crate::utils::format_duration(self.start_time.elapsed())
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }

    /// Log a short summary of the session, used at startup
    pub fn log_summary(&self) {
        if let Ok((location, teams, running)) = self.read_session(|s| {
            (s.mission().location.clone(), s.teams().len(), s.running_count())
        }) {
            info!("Mission '{}': {} teams, {} running", location, teams, running);
        }
    }
}

impl SnapshotSource for AppState {
    fn revision(&self) -> Result<u64, StateError> {
        self.read_session(|s| s.revision())
    }

    fn snapshot(&self, now: DateTime<Utc>) -> Result<(u64, SessionSnapshot), StateError> {
        self.read_session(|s| (s.revision(), build_snapshot(s, now)))
    }
}
