//! Configuration and CLI argument handling

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use directories::ProjectDirs;

use crate::{error::ConfigError, state::WarningThresholds};

/// What to do with a crash-recovery snapshot found at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecoveryMode {
    /// Ask on the terminal
    Ask,
    Restore,
    Discard,
}

/// CLI argument parsing structure
#[derive(Debug, Parser)]
#[command(name = "einsatz-timer")]
#[command(about = "Mission timers with two-stage warnings for search-and-rescue dog teams")]
#[command(version)]
pub struct Config {
    /// Port to bind the server to
    #[arg(short, long, default_value = "20554")]
    pub port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Directory holding autosave.json and recovery.json
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Default first warning after this many minutes
    #[arg(long, default_value = "10")]
    pub first_warning: u32,

    /// Default second warning after this many minutes
    #[arg(long, default_value = "20")]
    pub second_warning: u32,

    /// Seconds between autosaves
    #[arg(long, default_value = "30")]
    pub autosave_secs: u64,

    /// Seconds between dirty checks
    #[arg(long, default_value = "5")]
    pub dirty_check_secs: u64,

    /// Handling of a crash-recovery snapshot
    #[arg(long, value_enum, default_value = "ask")]
    pub recovery: RecoveryMode,

    /// Continue the mission from the last autosave
    #[arg(long)]
    pub resume_autosave: bool,

    /// Mission location for a fresh session
    #[arg(long, default_value = "")]
    pub location: String,

    /// Mission leader for a fresh session
    #[arg(long, default_value = "")]
    pub leader: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Config {
    /// Parse configuration from command line arguments
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Get the server address as a formatted string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Get the appropriate log level based on verbose flag
    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }

    /// Validated default thresholds; startup fails on a bad pair
    pub fn warning_thresholds(&self) -> Result<WarningThresholds, ConfigError> {
        WarningThresholds::new(self.first_warning, self.second_warning)
    }

    /// Explicit directory, else the platform data directory, else `./einsatz-data`
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            ProjectDirs::from("de", "Einsatzueberwachung", "einsatz-timer")
                .map(|dirs| dirs.data_dir().to_path_buf())
                .unwrap_or_else(|| PathBuf::from("einsatz-data"))
        })
    }

    pub fn autosave_period(&self) -> Duration {
        Duration::from_secs(self.autosave_secs.max(1))
    }

    pub fn dirty_check_period(&self) -> Duration {
        Duration::from_secs(self.dirty_check_secs.max(1))
    }
}
