//! Einsatz Timer - mission timers for search-and-rescue dog teams
//!
//! This is the main entry point for the einsatz-timer service.

use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use einsatz_timer::{
    api::create_router,
    clock::{Clock, SystemClock},
    config::{Config, RecoveryMode},
    persistence::{
        load_autosave, recover_session, Autosaver, JsonFileStore, RecoveryDecision, SnapshotSource,
        TerminalPrompt,
    },
    state::{AppState, MissionInfo, Session},
    tasks::{autosave_task, notes_task, ticker_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("einsatz_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting einsatz-timer v{}", env!("CARGO_PKG_VERSION"));
    let thresholds = config.warning_thresholds()?;
    let data_dir = config.data_dir();
    info!("Configuration: host={}, port={}, warnings={}/{}min, data={}",
          config.host, config.port, thresholds.first(), thresholds.second(), data_dir.display());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = Arc::new(JsonFileStore::new(&data_dir));

    // Crash recovery first, then an explicit resume, else a fresh mission
    let recovered = match config.recovery {
        RecoveryMode::Ask => recover_session(&*store, &TerminalPrompt, clock.now()),
        RecoveryMode::Restore => recover_session(&*store, &RecoveryDecision::Restore, clock.now()),
        RecoveryMode::Discard => recover_session(&*store, &RecoveryDecision::Discard, clock.now()),
    };
    let restored = recovered.is_some();
    let session = match recovered {
        Some(session) => session,
        None if config.resume_autosave => match load_autosave(&*store, clock.now()) {
            Ok(Some(session)) => session,
            Ok(None) => {
                info!("No autosave found, starting a new mission");
                fresh_session(&config, thresholds, clock.now())
            }
            Err(e) => {
                warn!("Autosave could not be loaded, starting a new mission: {}", e);
                fresh_session(&config, thresholds, clock.now())
            }
        },
        None => fresh_session(&config, thresholds, clock.now()),
    };

    // Create application state
    let state = Arc::new(AppState::new(session, Arc::clone(&clock), config.port, config.host.clone()));
    state.log_summary();

    let saver = Arc::new(Autosaver::new(
        Arc::clone(&store),
        state.revision()?,
        Arc::clone(&state.autosave_status),
    ));
    if restored {
        // The recovery file was consumed; write the restored state back out
        saver.mark_dirty();
    }

    // Start the background tasks
    tokio::spawn(notes_task(Arc::clone(&state)));
    tokio::spawn(ticker_task(Arc::clone(&state), Duration::from_secs(1)));
    tokio::spawn(autosave_task(
        Arc::clone(&state),
        Arc::clone(&saver),
        config.dirty_check_period(),
        config.autosave_period(),
    ));

    // Create HTTP router with all endpoints
    let app = create_router(Arc::clone(&state));

    // Bind to the specified address
    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  GET    /status                 - Mission and team overview");
    info!("  PUT    /mission                - Edit mission data");
    info!("  POST   /teams                  - Add a team");
    info!("  GET    /teams/:id              - Team details");
    info!("  DELETE /teams/:id              - Remove a team");
    info!("  POST   /teams/:id/start|stop|reset");
    info!("  PUT    /teams/:id/thresholds   - Configure warnings");
    info!("  POST   /teams/:id/notes        - Add a note");
    info!("  GET    /health                 - Health check");

    // Setup graceful shutdown
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        result = shutdown_signal() => {
            match result {
                Ok(()) => info!("Shutdown signal received"),
                Err(e) => error!("Signal handling failed: {}", e),
            }
        }
    }

    if let Err(e) = saver.shutdown(&*state, clock.now()).await {
        error!("Shutdown save failed, recovery file kept: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

fn fresh_session(
    config: &Config,
    thresholds: einsatz_timer::WarningThresholds,
    now: chrono::DateTime<chrono::Utc>,
) -> Session {
    let mut mission = MissionInfo::new(config.location.clone(), config.leader.clone(), now);
    mission.default_thresholds = thresholds;
    Session::new(mission)
}
