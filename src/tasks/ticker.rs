//! Timer tick background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, trace};

use crate::state::AppState;

/// Tick every team once per `period`
///
/// Late ticks are skipped rather than replayed; elapsed time is derived from
/// the start instant, so nothing is lost.
pub async fn ticker_task(state: Arc<AppState>, period: Duration) {
    info!("Starting timer tick task ({}ms period)", period.as_millis());

    let mut interval = interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        interval.tick().await;

        match state.tick() {
            Ok(0) => trace!("Tick"),
            Ok(raised) => trace!("Tick raised {} events", raised),
            Err(e) => error!("Failed to tick team timers: {}", e),
        }
    }
}
