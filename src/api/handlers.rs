//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{Path, State},
    response::Json,
};
use tracing::info;

use crate::{
    error::StateError,
    state::{AppState, MissionInfo, NewTeam, WarningThresholds},
};
use super::responses::{
    ApiError, ApiResponse, HealthResponse, MissionRequest, NoteRequest, StatusResponse,
    TeamView, ThresholdsRequest,
};

type ApiResult<T> = Result<Json<T>, ApiError>;

fn team_view(state: &AppState, id: u32) -> Result<TeamView, ApiError> {
    Ok(TeamView::from(&state.get_team(id)?))
}

/// Handle GET /status - Mission and all teams
pub async fn status_handler(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let (mission, teams, running_teams, next_team_id) = state.read_session(|s| {
        (
            s.mission().clone(),
            s.teams().iter().map(TeamView::from).collect::<Vec<_>>(),
            s.running_count(),
            s.next_team_id(),
        )
    })?;
    let (last_action, last_action_time) = state.get_last_action();

    Ok(Json(StatusResponse {
        mission,
        teams,
        running_teams,
        next_team_id,
        autosave: state.get_autosave_status(),
        uptime: state.get_uptime(),
        port: state.port,
        host: state.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle PUT /mission - Edit mission metadata
pub async fn mission_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MissionRequest>,
) -> ApiResult<ApiResponse> {
    let default_thresholds = WarningThresholds::new(req.first_warning_minutes, req.second_warning_minutes)
        .map_err(StateError::from)?;
    let alarmed_at = match req.alarmed_at {
        Some(at) => at,
        None => state.read_session(|s| s.mission().alarmed_at)?,
    };

    state.update_mission(MissionInfo {
        location: req.location,
        leader: req.leader,
        alarmed_at,
        is_exercise: req.is_exercise,
        default_thresholds,
    })?;
    Ok(Json(ApiResponse::ok("Mission updated".to_string(), None)))
}

/// Handle POST /teams - Add a team
pub async fn add_team_handler(
    State(state): State<Arc<AppState>>,
    Json(new): Json<NewTeam>,
) -> ApiResult<ApiResponse> {
    let team = state.add_team(new)?;
    info!("Team endpoint called - team {} added", team.id);
    Ok(Json(ApiResponse::ok(
        format!("Team {} added", team.name),
        Some(TeamView::from(&team)),
    )))
}

/// Handle GET /teams/:id
pub async fn get_team_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<TeamView> {
    Ok(Json(team_view(&state, id)?))
}

/// Handle DELETE /teams/:id
pub async fn remove_team_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<ApiResponse> {
    let team = state.remove_team(id)?;
    Ok(Json(ApiResponse::ok(format!("Team {} removed", team.name), None)))
}

/// Handle POST /teams/:id/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<ApiResponse> {
    let started = state.start_team(id)?;
    let view = team_view(&state, id)?;
    Ok(Json(if started {
        ApiResponse::ok("Timer started".to_string(), Some(view))
    } else {
        ApiResponse::unchanged("Timer already running".to_string(), Some(view))
    }))
}

/// Handle POST /teams/:id/stop
pub async fn stop_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<ApiResponse> {
    let stopped = state.stop_team(id)?;
    let view = team_view(&state, id)?;
    Ok(Json(if stopped {
        ApiResponse::ok("Timer stopped".to_string(), Some(view))
    } else {
        ApiResponse::unchanged("Timer already stopped".to_string(), Some(view))
    }))
}

/// Handle POST /teams/:id/reset
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
) -> ApiResult<ApiResponse> {
    state.reset_team(id)?;
    Ok(Json(ApiResponse::ok("Timer reset".to_string(), Some(team_view(&state, id)?))))
}

/// Handle PUT /teams/:id/thresholds
pub async fn thresholds_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(req): Json<ThresholdsRequest>,
) -> ApiResult<ApiResponse> {
    let t = state.set_thresholds(id, req.first_minutes, req.second_minutes)?;
    Ok(Json(ApiResponse::ok(
        format!("Warnings at {} and {} min", t.first(), t.second()),
        Some(team_view(&state, id)?),
    )))
}

/// Handle POST /teams/:id/notes
pub async fn note_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u32>,
    Json(req): Json<NoteRequest>,
) -> ApiResult<ApiResponse> {
    let text = req.text.trim();
    if text.is_empty() {
        return Err(ApiError::unprocessable("note text must not be empty"));
    }
    state.add_note(id, text.to_string())?;
    Ok(Json(ApiResponse::ok("Note added".to_string(), Some(team_view(&state, id)?))))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
