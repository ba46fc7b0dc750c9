//! Event log background task

use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::{AppState, TeamEvent, TimerEvent};

/// Turn team events into timestamped team notes and log lines
///
/// Warnings are logged at warn level; the host's alert sound hooks in here.
pub async fn notes_task(state: Arc<AppState>) {
    info!("Starting notes task");

    let mut events = state.event_tx.subscribe();

    loop {
        match events.recv().await {
            Ok(event) => record(&state, &event),
            Err(RecvError::Lagged(missed)) => {
                warn!("Notes task lagged, {} events not logged", missed);
            }
            Err(RecvError::Closed) => {
                info!("Event channel closed, notes task ending");
                break;
            }
        }
    }
}

fn record(state: &AppState, event: &TeamEvent) {
    let text = event.note_text();
    match event.kind {
        TimerEvent::WarningTriggered { .. } => {
            warn!("[{}] {}: {}", event.at.format("%H:%M:%S"), event.team_name, text)
        }
        _ => info!("[{}] {}: {}", event.at.format("%H:%M:%S"), event.team_name, text),
    }

    let result = state.update_session("note", |session, _, _| {
        // The team may have been removed since the event was raised
        if session.team(event.team_id).is_some() {
            session.add_note(event.team_id, event.at, text)?;
        }
        Ok(())
    });
    if let Err(e) = result {
        warn!("Failed to record note for team {}: {}", event.team_id, e);
    }
}
