//! Team events and the sinks they are delivered to

#[cfg(test)]
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use super::TimerEvent;

/// A timer event attributed to a team
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamEvent {
    pub team_id: u32,
    pub team_name: String,
    pub at: DateTime<Utc>,
    pub kind: TimerEvent,
}

impl TeamEvent {
    /// German note text logged for this event
    pub fn note_text(&self) -> &'static str {
        match self.kind {
            TimerEvent::Started => "Timer gestartet",
            TimerEvent::Stopped => "Timer gestoppt",
            TimerEvent::Reset => "Timer zurückgesetzt",
            TimerEvent::WarningTriggered { second: false } => "Erste Warnzeit erreicht",
            TimerEvent::WarningTriggered { second: true } => "Zweite Warnzeit erreicht",
        }
    }
}

/// Receives team events in the order they were raised; must not block
pub trait EventSink {
    fn publish(&self, event: TeamEvent);
}

impl EventSink for broadcast::Sender<TeamEvent> {
    fn publish(&self, event: TeamEvent) {
        // No subscriber is not an error, the event is simply dropped
        if self.send(event).is_err() {
            debug!("No listeners for team event");
        }
    }
}

/// Sink that keeps every event in memory
#[cfg(test)]
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TeamEvent>>,
}

#[cfg(test)]
impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all events collected so far
    pub fn drain(&self) -> Vec<TeamEvent> {
        self.events
            .lock()
            .map(|mut events| std::mem::take(&mut *events))
            .unwrap_or_default()
    }

    pub fn kinds(&self) -> Vec<TimerEvent> {
        self.drain().into_iter().map(|e| e.kind).collect()
    }
}

#[cfg(test)]
impl EventSink for CollectingSink {
    fn publish(&self, event: TeamEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
