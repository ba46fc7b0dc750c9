//! Per-team elapsed-time timer with two-stage warnings

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::warning::{self, WarningThresholds};

/// Notification raised by a timer transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimerEvent {
    Started,
    Stopped,
    Reset,
    WarningTriggered { second: bool },
}

/// Elapsed-time timer of one team
///
/// While running, elapsed time is always derived from `effective_start`, so a
/// late or skipped tick never loses time. While stopped, elapsed is frozen.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamTimer {
    elapsed: Duration,
    /// Set exactly while running
    effective_start: Option<DateTime<Utc>>,
    first_warning: bool,
    second_warning: bool,
    thresholds: WarningThresholds,
}

impl TeamTimer {
    /// Create a stopped timer at zero
    pub fn new(thresholds: WarningThresholds) -> Self {
        Self {
            elapsed: Duration::ZERO,
            effective_start: None,
            first_warning: false,
            second_warning: false,
            thresholds,
        }
    }

    /// Rebuild a timer from persisted state
    ///
    /// A running timer resumes from `started_at`; elapsed never drops below the
    /// persisted value. Flags are restored as given, the next tick evaluates
    /// any threshold crossed in between.
    pub fn restore(
        elapsed: Duration,
        started_at: Option<DateTime<Utc>>,
        first_warning: bool,
        second_warning: bool,
        thresholds: WarningThresholds,
        now: DateTime<Utc>,
    ) -> Self {
        let mut timer = Self {
            elapsed,
            effective_start: None,
            first_warning,
            second_warning: second_warning && first_warning,
            thresholds,
        };
        if let Some(started_at) = started_at {
            timer.elapsed = elapsed_since(started_at, now)
                .map_or(elapsed, |resumed| resumed.max(elapsed));
            timer.effective_start = Some(now - to_delta(timer.elapsed));
        }
        timer
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Whole minutes elapsed, rounded down
    pub fn elapsed_minutes(&self) -> u64 {
        self.elapsed.as_secs() / 60
    }

    pub fn is_running(&self) -> bool {
        self.effective_start.is_some()
    }

    pub fn first_warning(&self) -> bool {
        self.first_warning
    }

    pub fn second_warning(&self) -> bool {
        self.second_warning
    }

    pub fn thresholds(&self) -> WarningThresholds {
        self.thresholds
    }

    /// Instant the timer would have started at had it never been stopped
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.effective_start
    }

    /// Replace the thresholds; raised warnings stay raised
    pub fn set_thresholds(&mut self, thresholds: WarningThresholds) {
        self.thresholds = thresholds;
    }

    pub fn start(&mut self, now: DateTime<Utc>) -> Option<TimerEvent> {
        if self.is_running() {
            return None;
        }
        self.effective_start = Some(now - to_delta(self.elapsed));
        Some(TimerEvent::Started)
    }

    /// Bring elapsed time up to `now`, then freeze it
    ///
    /// Warnings crossed since the last tick are raised before `Stopped`.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        if !self.is_running() {
            return Vec::new();
        }
        let mut events = self.tick(now);
        self.effective_start = None;
        events.push(TimerEvent::Stopped);
        events
    }

    /// Stop, zero elapsed time and clear both warnings
    pub fn reset(&mut self) -> Vec<TimerEvent> {
        let mut events = Vec::new();
        if self.effective_start.take().is_some() {
            events.push(TimerEvent::Stopped);
        }
        self.elapsed = Duration::ZERO;
        self.first_warning = false;
        self.second_warning = false;
        events.push(TimerEvent::Reset);
        events
    }

    /// Recompute elapsed time and raise newly crossed warnings, first before second
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<TimerEvent> {
        let Some(start) = self.effective_start else {
            return Vec::new();
        };

        match elapsed_since(start, now) {
            Some(elapsed) if elapsed >= self.elapsed => self.elapsed = elapsed,
            _ => {
                warn!(
                    "Clock moved backwards, holding elapsed time at {}s",
                    self.elapsed.as_secs()
                );
                self.effective_start = Some(now - to_delta(self.elapsed));
            }
        }

        let crossings = warning::evaluate(
            self.elapsed_minutes(),
            self.thresholds,
            self.first_warning,
            self.second_warning,
        );

        let mut events = Vec::new();
        if crossings.first {
            self.first_warning = true;
            events.push(TimerEvent::WarningTriggered { second: false });
        }
        if crossings.second {
            self.second_warning = true;
            events.push(TimerEvent::WarningTriggered { second: true });
        }
        if crossings.any() {
            debug!("Warnings crossed at {} min: {:?}", self.elapsed_minutes(), crossings);
        }
        events
    }
}

fn elapsed_since(start: DateTime<Utc>, now: DateTime<Utc>) -> Option<Duration> {
    (now - start).to_std().ok()
}

fn to_delta(d: Duration) -> TimeDelta {
    TimeDelta::from_std(d).unwrap_or(TimeDelta::zero())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 4, 8, 0, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0() + TimeDelta::seconds(secs)
    }

    fn timer() -> TeamTimer {
        TeamTimer::new(WarningThresholds::new(10, 20).unwrap())
    }

    #[test]
    fn new_timer_is_stopped_at_zero() {
        let t = timer();
        assert!(!t.is_running());
        assert_eq!(t.elapsed(), Duration::ZERO);
        assert!(!t.first_warning() && !t.second_warning());
    }

    #[test]
    fn start_and_stop_are_idempotent() {
        let mut t = timer();
        assert_eq!(t.start(at(0)), Some(TimerEvent::Started));
        let before = t.clone();
        assert_eq!(t.start(at(5)), None);
        assert_eq!(t, before);

        t.tick(at(30));
        assert_eq!(t.stop(at(30)), vec![TimerEvent::Stopped]);
        let before = t.clone();
        assert!(t.stop(at(45)).is_empty());
        assert_eq!(t, before);
    }

    #[test]
    fn stop_counts_time_since_the_last_tick() {
        let mut t = timer();
        t.start(at(0));
        t.tick(at(50));
        t.stop(at(59));
        assert_eq!(t.elapsed(), Duration::from_secs(59));
    }

    #[test]
    fn stop_raises_warnings_crossed_since_the_last_tick() {
        let mut t = timer();
        t.start(at(0));
        t.tick(at(599));
        assert_eq!(
            t.stop(at(600)),
            vec![TimerEvent::WarningTriggered { second: false }, TimerEvent::Stopped]
        );
        assert!(t.first_warning());
        assert!(!t.is_running());
    }

    #[test]
    fn elapsed_is_frozen_while_stopped_and_preserved_on_restart() {
        let mut t = timer();
        t.start(at(0));
        t.tick(at(30));
        t.stop(at(60));
        assert!(t.tick(at(600)).is_empty());
        assert_eq!(t.elapsed(), Duration::from_secs(60));

        t.start(at(1000));
        t.tick(at(1030));
        assert_eq!(t.elapsed(), Duration::from_secs(90));
    }

    #[test]
    fn ticks_do_not_reset_warnings() {
        let mut t = timer();
        t.start(at(0));
        t.tick(at(600));
        assert!(t.first_warning());
        for s in [601, 700, 900] {
            assert!(t.tick(at(s)).is_empty());
            assert!(t.first_warning());
        }
    }

    #[test]
    fn reset_stops_and_clears_everything() {
        let mut t = timer();
        t.start(at(0));
        t.tick(at(1500));
        assert_eq!(t.reset(), vec![TimerEvent::Stopped, TimerEvent::Reset]);
        assert!(!t.is_running());
        assert_eq!(t.elapsed(), Duration::ZERO);
        assert!(!t.first_warning() && !t.second_warning());

        assert_eq!(t.reset(), vec![TimerEvent::Reset]);
    }

    #[test]
    fn backward_clock_jump_holds_elapsed() {
        let mut t = timer();
        t.start(at(0));
        t.tick(at(120));
        t.tick(at(60));
        assert_eq!(t.elapsed(), Duration::from_secs(120));

        t.tick(at(70));
        assert_eq!(t.elapsed(), Duration::from_secs(130));
    }

    #[test]
    fn raised_thresholds_keep_existing_warnings() {
        let mut t = timer();
        t.start(at(0));
        t.tick(at(660));
        assert!(t.first_warning());

        t.set_thresholds(WarningThresholds::new(30, 40).unwrap());
        assert!(t.tick(at(700)).is_empty());
        assert!(t.first_warning());
    }

    #[test]
    fn restore_resumes_running_timer_from_started_at() {
        let t = TeamTimer::restore(
            Duration::from_secs(300),
            Some(at(0)),
            false,
            false,
            WarningThresholds::default(),
            at(420),
        );
        assert!(t.is_running());
        assert_eq!(t.elapsed(), Duration::from_secs(420));
        assert_eq!(t.started_at(), Some(at(0)));
    }

    #[test]
    fn restore_never_drops_second_without_first() {
        let t = TeamTimer::restore(
            Duration::from_secs(60),
            None,
            false,
            true,
            WarningThresholds::default(),
            at(0),
        );
        assert!(!t.second_warning());
    }
}
