//! Mission session: metadata plus the teams and their timers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{EventSink, TeamEvent, TeamTimer, TimerEvent, WarningThresholds};
use crate::error::SessionError;

/// Mission metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionInfo {
    /// Einsatzort
    pub location: String,
    /// Einsatzleiter
    pub leader: String,
    pub alarmed_at: DateTime<Utc>,
    /// Übung rather than a real Einsatz
    #[serde(default)]
    pub is_exercise: bool,
    /// Thresholds given to newly added teams
    pub default_thresholds: WarningThresholds,
}

impl MissionInfo {
    pub fn new(location: impl Into<String>, leader: impl Into<String>, alarmed_at: DateTime<Utc>) -> Self {
        Self {
            location: location.into(),
            leader: leader.into(),
            alarmed_at,
            is_exercise: false,
            default_thresholds: WarningThresholds::default(),
        }
    }
}

/// Timestamped free-text note attached to a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamNote {
    pub at: DateTime<Utc>,
    pub text: String,
}

/// Master data for a team about to be added
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTeam {
    pub name: String,
    #[serde(default)]
    pub dog_name: String,
    /// Hundeführer
    #[serde(default)]
    pub handler: String,
    /// Helfer
    #[serde(default)]
    pub helper: Option<String>,
    /// Suchgebiet
    #[serde(default)]
    pub search_area: Option<String>,
}

impl NewTeam {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A tracked team: dog, handler, optional helper and its timer
#[derive(Debug, Clone, PartialEq)]
pub struct Team {
    pub id: u32,
    pub name: String,
    pub dog_name: String,
    pub handler: String,
    pub helper: Option<String>,
    pub search_area: Option<String>,
    pub notes: Vec<TeamNote>,
    pub timer: TeamTimer,
}

impl Team {
    fn event(&self, at: DateTime<Utc>, kind: TimerEvent) -> TeamEvent {
        TeamEvent {
            team_id: self.id,
            team_name: self.name.clone(),
            at,
            kind,
        }
    }
}

/// The live state of one mission
///
/// Every mutation that changes persisted state bumps `revision`; ticks that
/// only advance elapsed time do not.
#[derive(Debug, Clone)]
pub struct Session {
    mission: MissionInfo,
    teams: Vec<Team>,
    next_team_id: u32,
    revision: u64,
}

impl Session {
    pub fn new(mission: MissionInfo) -> Self {
        Self {
            mission,
            teams: Vec::new(),
            next_team_id: 1,
            revision: 0,
        }
    }

    /// Assemble a session from already validated parts
    pub(crate) fn from_parts(mission: MissionInfo, teams: Vec<Team>, next_team_id: u32) -> Self {
        Self {
            mission,
            teams,
            next_team_id,
            revision: 0,
        }
    }

    pub fn mission(&self) -> &MissionInfo {
        &self.mission
    }

    pub fn teams(&self) -> &[Team] {
        &self.teams
    }

    pub fn team(&self, id: u32) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == id)
    }

    pub fn next_team_id(&self) -> u32 {
        self.next_team_id
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision += 1;
    }

    fn team_mut(&mut self, id: u32) -> Result<&mut Team, SessionError> {
        self.teams
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(SessionError::UnknownTeam(id))
    }

    pub fn update_mission(&mut self, mission: MissionInfo) {
        info!("Mission updated: {} ({})", mission.location, mission.leader);
        self.mission = mission;
        self.touch();
    }

    /// Add a team with the mission's default thresholds, returning its id
    pub fn add_team(&mut self, new: NewTeam) -> Result<u32, SessionError> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyTeamName);
        }

        let id = self.next_team_id;
        self.next_team_id = id.checked_add(1).ok_or(SessionError::TeamIdsExhausted)?;
        self.teams.push(Team {
            id,
            name: name.to_string(),
            dog_name: new.dog_name,
            handler: new.handler,
            helper: new.helper.filter(|h| !h.trim().is_empty()),
            search_area: new.search_area.filter(|a| !a.trim().is_empty()),
            notes: Vec::new(),
            timer: TeamTimer::new(self.mission.default_thresholds),
        });
        self.touch();
        info!("Team {} added: {}", id, name);
        Ok(id)
    }

    pub fn remove_team(&mut self, id: u32) -> Result<Team, SessionError> {
        let index = self
            .teams
            .iter()
            .position(|t| t.id == id)
            .ok_or(SessionError::UnknownTeam(id))?;
        let team = self.teams.remove(index);
        self.touch();
        info!("Team {} removed: {}", id, team.name);
        Ok(team)
    }

    /// Start a team's timer; `Ok(false)` if it was already running
    pub fn start(&mut self, id: u32, now: DateTime<Utc>, sink: &impl EventSink) -> Result<bool, SessionError> {
        let team = self.team_mut(id)?;
        let Some(kind) = team.timer.start(now) else {
            return Ok(false);
        };
        let event = team.event(now, kind);
        self.touch();
        sink.publish(event);
        Ok(true)
    }

    /// Stop a team's timer; `Ok(false)` if it was already stopped
    pub fn stop(&mut self, id: u32, now: DateTime<Utc>, sink: &impl EventSink) -> Result<bool, SessionError> {
        let team = self.team_mut(id)?;
        let events: Vec<TeamEvent> = team
            .timer
            .stop(now)
            .into_iter()
            .map(|kind| team.event(now, kind))
            .collect();
        if events.is_empty() {
            return Ok(false);
        }
        self.touch();
        for event in events {
            sink.publish(event);
        }
        Ok(true)
    }

    pub fn reset(&mut self, id: u32, now: DateTime<Utc>, sink: &impl EventSink) -> Result<(), SessionError> {
        let team = self.team_mut(id)?;
        let events: Vec<TeamEvent> = team
            .timer
            .reset()
            .into_iter()
            .map(|kind| team.event(now, kind))
            .collect();
        self.touch();
        for event in events {
            sink.publish(event);
        }
        Ok(())
    }

    /// Validate and apply new thresholds to one team
    pub fn set_thresholds(&mut self, id: u32, first: u32, second: u32) -> Result<WarningThresholds, SessionError> {
        let thresholds = WarningThresholds::new(first, second)?;
        let team = self.team_mut(id)?;
        team.timer.set_thresholds(thresholds);
        self.touch();
        info!("Team {} thresholds set to {}/{} min", id, first, second);
        Ok(thresholds)
    }

    pub fn add_note(&mut self, id: u32, at: DateTime<Utc>, text: impl Into<String>) -> Result<(), SessionError> {
        let team = self.team_mut(id)?;
        team.notes.push(TeamNote { at, text: text.into() });
        self.touch();
        Ok(())
    }

    /// Tick every team, publishing events in per-team order; returns the event count
    pub fn tick_all(&mut self, now: DateTime<Utc>, sink: &impl EventSink) -> usize {
        let mut raised = Vec::new();
        for team in &mut self.teams {
            for kind in team.timer.tick(now) {
                raised.push(team.event(now, kind));
            }
        }
        if !raised.is_empty() {
            debug!("Tick raised {} events", raised.len());
            self.touch();
        }
        let count = raised.len();
        for event in raised {
            sink.publish(event);
        }
        count
    }

    pub fn running_count(&self) -> usize {
        self.teams.iter().filter(|t| t.timer.is_running()).count()
    }
}
