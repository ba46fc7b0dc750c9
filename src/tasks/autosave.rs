//! Autosave background task

use std::{sync::Arc, time::Duration};
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

use crate::{
    persistence::{Autosaver, SnapshotStore},
    state::AppState,
};

/// Run the fast dirty check and the slow save period side by side
pub async fn autosave_task<S: SnapshotStore>(
    state: Arc<AppState>,
    saver: Arc<Autosaver<S>>,
    check_period: Duration,
    save_period: Duration,
) {
    info!(
        "Starting autosave task (check every {}s, save every {}s)",
        check_period.as_secs(),
        save_period.as_secs()
    );

    let mut check = interval(check_period);
    check.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut save = interval(save_period);
    save.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick of an interval completes immediately
    save.tick().await;

    loop {
        tokio::select! {
            _ = check.tick() => {
                saver.check_dirty(&*state);
            }
            _ = save.tick() => {
                saver.check_dirty(&*state);
                saver.save_tick(&*state, state.now()).await;
            }
        }
    }
}
