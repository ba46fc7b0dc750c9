//! Error types for configuration, session and persistence failures

use thiserror::Error;

/// Lowest accepted warning threshold in minutes
pub const MIN_THRESHOLD_MINUTES: u32 = 1;
/// Highest accepted warning threshold in minutes
pub const MAX_THRESHOLD_MINUTES: u32 = 120;

/// Rejected warning configuration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{which} warning threshold {minutes} min is outside {}..={} min", MIN_THRESHOLD_MINUTES, MAX_THRESHOLD_MINUTES)]
    ThresholdOutOfRange { which: &'static str, minutes: u32 },

    #[error("second warning threshold ({second} min) must be greater than the first ({first} min)")]
    ThresholdOrder { first: u32, second: u32 },
}

/// Errors raised by session operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("team {0} does not exist in this session")]
    UnknownTeam(u32),

    #[error("team name must not be empty")]
    EmptyTeamName,

    #[error("no team ids left in this session")]
    TeamIdsExhausted,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Errors raised while reading or writing snapshots
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("snapshot I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot is inconsistent: {0}")]
    Invalid(String),

    #[error("snapshot worker failed: {0}")]
    Worker(String),
}

impl PersistenceError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn json(path: impl AsRef<std::path::Path>, source: serde_json::Error) -> Self {
        Self::Json {
            path: path.as_ref().display().to_string(),
            source,
        }
    }
}

/// Errors raised when operating on the shared application state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("session lock poisoned: {0}")]
    Poisoned(String),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<ConfigError> for StateError {
    fn from(e: ConfigError) -> Self {
        Self::Session(SessionError::Config(e))
    }
}
