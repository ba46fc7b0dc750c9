//! API request and response structures

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::{
    error::{SessionError, StateError},
    persistence::AutosaveStatus,
    state::{MissionInfo, Team, TeamNote},
    utils::format_clock,
};

/// One team as shown to the UI and the mobile view
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamView {
    pub id: u32,
    pub name: String,
    pub dog_name: String,
    pub handler: String,
    pub helper: Option<String>,
    pub search_area: Option<String>,
    pub elapsed_seconds: u64,
    /// `HH:MM:SS`
    pub elapsed: String,
    pub running: bool,
    pub first_warning: bool,
    pub second_warning: bool,
    pub first_warning_minutes: u32,
    pub second_warning_minutes: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub notes: Vec<TeamNote>,
}

impl From<&Team> for TeamView {
    fn from(team: &Team) -> Self {
        let timer = &team.timer;
        Self {
            id: team.id,
            name: team.name.clone(),
            dog_name: team.dog_name.clone(),
            handler: team.handler.clone(),
            helper: team.helper.clone(),
            search_area: team.search_area.clone(),
            elapsed_seconds: timer.elapsed().as_secs(),
            elapsed: format_clock(timer.elapsed()),
            running: timer.is_running(),
            first_warning: timer.first_warning(),
            second_warning: timer.second_warning(),
            first_warning_minutes: timer.thresholds().first(),
            second_warning_minutes: timer.thresholds().second(),
            started_at: timer.started_at(),
            notes: team.notes.clone(),
        }
    }
}

/// API response structure for team actions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub team: Option<TeamView>,
}

impl ApiResponse {
    /// Create a new API response
    pub fn new(status: &str, message: String, team: Option<TeamView>) -> Self {
        Self {
            status: status.to_string(),
            message,
            timestamp: Utc::now(),
            team,
        }
    }

    pub fn ok(message: String, team: Option<TeamView>) -> Self {
        Self::new("ok", message, team)
    }

    /// The request changed nothing, e.g. starting a running timer
    pub fn unchanged(message: String, team: Option<TeamView>) -> Self {
        Self::new("unchanged", message, team)
    }
}

/// Full mission status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub mission: MissionInfo,
    pub teams: Vec<TeamView>,
    pub running_teams: usize,
    pub next_team_id: u32,
    pub autosave: AutosaveStatus,
    pub uptime: String,
    pub port: u16,
    pub host: String,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl HealthResponse {
    /// Create a new health response
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdsRequest {
    pub first_minutes: u32,
    pub second_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRequest {
    pub text: String,
}

/// Mission edit; default thresholds are validated like team thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionRequest {
    pub location: String,
    pub leader: String,
    pub alarmed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_exercise: bool,
    pub first_warning_minutes: u32,
    pub second_warning_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

/// Error returned by handlers, rendered as JSON
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl From<StateError> for ApiError {
    fn from(e: StateError) -> Self {
        let status = match &e {
            StateError::Session(SessionError::UnknownTeam(_)) => StatusCode::NOT_FOUND,
            StateError::Session(SessionError::EmptyTeamName | SessionError::TeamIdsExhausted | SessionError::Config(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            StateError::Poisoned(_) => {
                error!("Session state unavailable: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            status: "error".to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
