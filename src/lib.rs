//! Einsatz Timer - per-team mission timers for search-and-rescue dog teams
//!
//! Each team gets an elapsed-time timer with two warning thresholds. The
//! mission is autosaved whenever it changes and can be recovered after an
//! abnormal exit. A small HTTP API exposes the live state.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod persistence;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{ConfigError, PersistenceError, SessionError, StateError};
pub use state::{AppState, Session, TeamTimer, TimerEvent, WarningThresholds};
pub use utils::signals::shutdown_signal;
