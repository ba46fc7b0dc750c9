//! State management module
//!
//! Team timers, the warning policy, the mission session and the shared
//! application state the tasks and HTTP handlers work on.

pub mod app_state;
pub mod events;
pub mod session;
pub mod team_timer;
pub mod warning;

// Re-export main types
pub use app_state::AppState;
#[cfg(test)]
pub use events::CollectingSink;
pub use events::{EventSink, TeamEvent};
pub use session::{MissionInfo, NewTeam, Session, Team, TeamNote};
pub use team_timer::{TeamTimer, TimerEvent};
pub use warning::{Crossings, WarningThresholds};
