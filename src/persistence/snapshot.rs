//! Serializable point-in-time copy of a session

use std::{collections::HashSet, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    error::PersistenceError,
    state::{MissionInfo, Session, Team, TeamNote, TeamTimer, WarningThresholds},
};

/// Current on-disk layout version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Elapsed times closer than this count as unchanged when comparing snapshots
pub const ELAPSED_TOLERANCE: Duration = Duration::from_secs(2);

/// Persisted state of one team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub dog_name: String,
    #[serde(default)]
    pub handler: String,
    #[serde(default)]
    pub helper: Option<String>,
    #[serde(default)]
    pub search_area: Option<String>,
    pub elapsed: Duration,
    pub running: bool,
    pub first_warning: bool,
    pub second_warning: bool,
    pub thresholds: WarningThresholds,
    /// Present for running timers so a reload keeps counting
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub notes: Vec<TeamNote>,
}

impl TeamRecord {
    fn from_team(team: &Team) -> Self {
        let timer = &team.timer;
        Self {
            id: team.id,
            name: team.name.clone(),
            dog_name: team.dog_name.clone(),
            handler: team.handler.clone(),
            helper: team.helper.clone(),
            search_area: team.search_area.clone(),
            elapsed: timer.elapsed(),
            running: timer.is_running(),
            first_warning: timer.first_warning(),
            second_warning: timer.second_warning(),
            thresholds: timer.thresholds(),
            started_at: timer.started_at(),
            notes: team.notes.clone(),
        }
    }

    fn to_team(&self, now: DateTime<Utc>) -> Team {
        let started_at = if self.running { self.started_at } else { None };
        Team {
            id: self.id,
            name: self.name.clone(),
            dog_name: self.dog_name.clone(),
            handler: self.handler.clone(),
            helper: self.helper.clone(),
            search_area: self.search_area.clone(),
            notes: self.notes.clone(),
            timer: TeamTimer::restore(
                self.elapsed,
                started_at,
                self.first_warning,
                self.second_warning,
                self.thresholds,
                now,
            ),
        }
    }

    fn roughly_equal(&self, other: &Self) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.running == other.running
            && self.first_warning == other.first_warning
            && self.second_warning == other.second_warning
            && self.thresholds == other.thresholds
            && self.notes.len() == other.notes.len()
            && self.elapsed.abs_diff(other.elapsed) <= ELAPSED_TOLERANCE
    }
}

/// Persisted state of a whole mission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    pub mission: MissionInfo,
    pub teams: Vec<TeamRecord>,
    pub next_team_id: u32,
    pub saved_at: DateTime<Utc>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Copy the live session into a snapshot
pub fn build_snapshot(session: &Session, now: DateTime<Utc>) -> SessionSnapshot {
    SessionSnapshot {
        version: SNAPSHOT_VERSION,
        mission: session.mission().clone(),
        teams: session.teams().iter().map(TeamRecord::from_team).collect(),
        next_team_id: session.next_team_id(),
        saved_at: now,
    }
}

impl SessionSnapshot {
    /// Check the id invariants a loaded file must satisfy
    pub fn validate(&self) -> Result<(), PersistenceError> {
        if self.version > SNAPSHOT_VERSION {
            return Err(PersistenceError::Invalid(format!(
                "snapshot version {} is newer than supported version {}",
                self.version, SNAPSHOT_VERSION
            )));
        }

        let mut seen = HashSet::new();
        for team in &self.teams {
            if !seen.insert(team.id) {
                return Err(PersistenceError::Invalid(format!("duplicate team id {}", team.id)));
            }
            if team.id >= self.next_team_id {
                return Err(PersistenceError::Invalid(format!(
                    "team id {} is not below next team id {}",
                    team.id, self.next_team_id
                )));
            }
        }
        Ok(())
    }

    /// Rebuild a live session, resuming running timers at `now`
    pub fn restore(&self, now: DateTime<Utc>) -> Result<Session, PersistenceError> {
        self.validate()?;
        let teams = self.teams.iter().map(|t| t.to_team(now)).collect();
        Ok(Session::from_parts(self.mission.clone(), teams, self.next_team_id))
    }

    /// Cheap change check: counts, ids and per-team state, not a deep diff
    pub fn roughly_equal(&self, other: &Self) -> bool {
        self.teams.len() == other.teams.len()
            && self.next_team_id == other.next_team_id
            && self.mission == other.mission
            && self
                .teams
                .iter()
                .zip(&other.teams)
                .all(|(a, b)| a.roughly_equal(b))
    }

    pub fn running_count(&self) -> usize {
        self.teams.iter().filter(|t| t.running).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CollectingSink, NewTeam};
    use chrono::{TimeDelta, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 8, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + TimeDelta::seconds(secs)
    }

    fn live_session() -> Session {
        let sink = CollectingSink::new();
        let mut s = Session::new(MissionInfo::new("Steinbruch Ost", "A. Krüger", t0()));
        let rex = s
            .add_team(NewTeam {
                name: "Team 1".into(),
                dog_name: "Rex".into(),
                handler: "J. Wolf".into(),
                helper: Some("P. Lang".into()),
                search_area: Some("Sektor B".into()),
            })
            .unwrap();
        let luna = s.add_team(NewTeam::named("Team 2")).unwrap();
        s.start(rex, at(0), &sink).unwrap();
        s.start(luna, at(0), &sink).unwrap();
        s.tick_all(at(700), &sink);
        s.stop(luna, at(700), &sink).unwrap();
        s.add_note(rex, at(710), "Spur aufgenommen").unwrap();
        s
    }

    #[test]
    fn running_team_records_started_at() {
        let snap = build_snapshot(&live_session(), at(710));
        assert_eq!(snap.teams[0].started_at, Some(at(0)));
        assert_eq!(snap.teams[1].started_at, None);
        assert_eq!(snap.next_team_id, 3);
        assert_eq!(snap.running_count(), 1);
    }

    #[test]
    fn restore_reproduces_elapsed_and_flags() {
        let mut session = live_session();
        session.tick_all(at(710), &CollectingSink::new());
        let snap = build_snapshot(&session, at(710));
        let json = serde_json::to_string_pretty(&snap).unwrap();
        let loaded: SessionSnapshot = serde_json::from_str(&json).unwrap();
        let restored = loaded.restore(at(710)).unwrap();

        for (orig, back) in session.teams().iter().zip(restored.teams()) {
            assert_eq!(orig.timer.first_warning(), back.timer.first_warning());
            assert_eq!(orig.timer.second_warning(), back.timer.second_warning());
            assert_eq!(orig.timer.is_running(), back.timer.is_running());
            assert!(orig.timer.elapsed().abs_diff(back.timer.elapsed()) <= Duration::from_secs(1));
        }
        // the running team keeps counting through the reload
        assert_eq!(restored.team(1).unwrap().timer.elapsed(), Duration::from_secs(710));
        assert_eq!(restored.team(2).unwrap().timer.elapsed(), Duration::from_secs(700));
        assert_eq!(restored.team(1).unwrap().notes.len(), 1);
        assert_eq!(restored.next_team_id(), 3);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut snap = build_snapshot(&live_session(), at(710));
        snap.teams[1].id = snap.teams[0].id;
        assert!(matches!(snap.validate(), Err(PersistenceError::Invalid(_))));
    }

    #[test]
    fn next_id_must_exceed_every_team_id() {
        let mut snap = build_snapshot(&live_session(), at(710));
        snap.next_team_id = 2;
        assert!(snap.restore(at(710)).is_err());
    }

    #[test]
    fn small_elapsed_drift_counts_as_unchanged() {
        let session = live_session();
        let a = build_snapshot(&session, at(710));
        let mut b = a.clone();
        b.teams[0].elapsed += Duration::from_secs(1);
        b.saved_at = at(711);
        assert!(a.roughly_equal(&b));

        b.teams[0].elapsed += Duration::from_secs(5);
        assert!(!a.roughly_equal(&b));
    }

    #[test]
    fn note_or_state_change_counts_as_changed() {
        let a = build_snapshot(&live_session(), at(710));
        let mut b = a.clone();
        b.teams[1].running = true;
        assert!(!a.roughly_equal(&b));

        let mut c = a.clone();
        c.teams[0].notes.push(TeamNote { at: at(800), text: "x".into() });
        assert!(!a.roughly_equal(&c));
    }
}
