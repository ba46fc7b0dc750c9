use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use einsatz_timer::{
    clock::{Clock, ManualClock},
    persistence::{
        recover_session, Autosaver, JsonFileStore, RecoveryDecision, SaveOutcome, SnapshotSlot,
        SnapshotSource, SnapshotStore,
    },
    state::{AppState, MissionInfo, NewTeam, Session},
};
use tempfile::TempDir;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 14, 6, 30, 0).unwrap()
}

struct Harness {
    _dir: TempDir,
    clock: Arc<ManualClock>,
    state: Arc<AppState>,
    store: Arc<JsonFileStore>,
    saver: Autosaver<JsonFileStore>,
}

fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));
    let session = Session::new(MissionInfo::new("Waldstück Süd", "K. Richter", t0()));
    let state = Arc::new(AppState::new(session, clock.clone(), 0, "127.0.0.1".into()));
    let store = Arc::new(JsonFileStore::new(dir.path()));
    let saver = Autosaver::new(
        Arc::clone(&store),
        state.revision().unwrap(),
        Arc::clone(&state.autosave_status),
    );
    Harness { _dir: dir, clock, state, store, saver }
}

impl Harness {
    /// One 30 s save period with a dirty check every 5 s
    async fn run_period(&self) -> SaveOutcome {
        for _ in 0..6 {
            self.clock.advance(TimeDelta::seconds(5));
            self.state.tick().unwrap();
            self.saver.check_dirty(&*self.state);
        }
        self.saver.save_tick(&*self.state, self.clock.now()).await
    }
}

#[tokio::test]
async fn scenario_e_idle_session_writes_nothing_then_one_mutation_writes_once() {
    let h = harness();
    let id = h.state.add_team(NewTeam::named("Team 1")).unwrap().id;
    assert_eq!(h.run_period().await, SaveOutcome::Written);
    let baseline = h.state.get_autosave_status().writes;

    // five idle minutes
    for _ in 0..10 {
        assert_eq!(h.run_period().await, SaveOutcome::Clean);
    }
    assert_eq!(h.state.get_autosave_status().writes, baseline);

    h.state.start_team(id).unwrap();
    assert_eq!(h.run_period().await, SaveOutcome::Written);
    assert_eq!(h.run_period().await, SaveOutcome::Clean);
    assert_eq!(h.state.get_autosave_status().writes, baseline + 1);
}

#[tokio::test]
async fn fresh_session_never_touches_disk() {
    let h = harness();
    for _ in 0..10 {
        h.run_period().await;
    }
    assert!(!h.store.path(SnapshotSlot::Autosave).exists());
    assert!(!h.store.path(SnapshotSlot::Recovery).exists());
}

#[tokio::test]
async fn crash_then_restore_resumes_running_timer() {
    let h = harness();
    let running = h.state.add_team(NewTeam::named("Team 1")).unwrap().id;
    let stopped = h.state.add_team(NewTeam::named("Team 2")).unwrap().id;
    h.state.start_team(running).unwrap();
    h.state.start_team(stopped).unwrap();
    for _ in 0..24 {
        h.run_period().await;
    }
    h.state.stop_team(stopped).unwrap();
    h.run_period().await;

    // the process dies here; the recovery file stays behind
    assert!(h.store.path(SnapshotSlot::Recovery).exists());
    let crash_elapsed = h.state.get_team(running).unwrap().timer.elapsed();

    let later = h.clock.now() + TimeDelta::minutes(2);
    let session = recover_session(&*h.store, &RecoveryDecision::Restore, later).unwrap();

    let team1 = session.team(running).unwrap();
    assert!(team1.timer.is_running());
    assert!(team1.timer.first_warning());
    assert!(team1.timer.elapsed() >= crash_elapsed + std::time::Duration::from_secs(120));

    let team2 = session.team(stopped).unwrap();
    assert!(!team2.timer.is_running());
    assert_eq!(team2.timer.elapsed(), h.state.get_team(stopped).unwrap().timer.elapsed());

    assert_eq!(session.next_team_id(), 3);
    assert!(!h.store.path(SnapshotSlot::Recovery).exists());
    assert!(h.store.path(SnapshotSlot::Autosave).exists());
}

#[tokio::test]
async fn clean_shutdown_keeps_autosave_only() {
    let h = harness();
    h.state.add_team(NewTeam::named("Team 1")).unwrap();

    h.saver.shutdown(&*h.state, h.clock.now()).await.unwrap();

    assert!(h.store.read(SnapshotSlot::Autosave).unwrap().is_some());
    assert!(h.store.read(SnapshotSlot::Recovery).unwrap().is_none());
}

#[tokio::test]
async fn overlapping_saves_queue_on_the_gate() {
    let h = harness();
    h.state.add_team(NewTeam::named("Team 1")).unwrap();
    let saver = Arc::new(h.saver);
    let now = h.clock.now();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let saver = Arc::clone(&saver);
        let state = Arc::clone(&h.state);
        handles.push(tokio::spawn(async move { saver.save(&*state, now).await }));
    }
    let mut written = 0;
    for handle in handles {
        match handle.await.unwrap() {
            SaveOutcome::Written => written += 1,
            SaveOutcome::Unchanged => {}
            other => panic!("unexpected outcome {other:?}"),
        }
    }
    assert_eq!(written, 1);
    assert!(h.store.read(SnapshotSlot::Autosave).unwrap().is_some());
}
