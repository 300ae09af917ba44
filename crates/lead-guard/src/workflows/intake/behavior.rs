use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

use super::domain::Clock;

/// Interaction signal forwarded by the wizard front end.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InteractionEvent {
    /// Pointer travelled `distance` pixels since the previous sample.
    PointerMove { distance: f64 },
    /// Page scrolled `distance` pixels since the previous sample.
    Scroll { distance: f64 },
    Click,
    /// Key press; synthetic (untrusted) events do not count.
    KeyPress {
        #[serde(default = "trusted_by_default")]
        trusted: bool,
    },
    Focus,
}

fn trusted_by_default() -> bool {
    true
}

/// Plausible per-second band for one interaction signal and the points it may earn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateBand {
    pub min_rate: f64,
    pub max_rate: f64,
    pub points_per_rate: f64,
    pub cap: f64,
}

impl RateBand {
    pub fn contribution(&self, count: u32, elapsed_secs: f64) -> f64 {
        if count == 0 || elapsed_secs <= 0.0 {
            return 0.0;
        }

        let rate = f64::from(count) / elapsed_secs;
        if rate < self.min_rate || rate > self.max_rate {
            return 0.0;
        }

        (rate * self.points_per_rate).clamp(0.0, self.cap)
    }
}

/// Tuning values for the human score. These are heuristics and expected to be recalibrated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanScoreModel {
    /// Below this much observed time the score is zero.
    pub min_observation_secs: f64,
    pub min_pointer_distance: f64,
    pub min_scroll_distance: f64,
    pub mouse: RateBand,
    pub scroll: RateBand,
    pub click: RateBand,
    pub keyboard_bonus: f64,
    pub focus_bonus: f64,
}

impl Default for HumanScoreModel {
    fn default() -> Self {
        Self {
            min_observation_secs: 5.0,
            min_pointer_distance: 10.0,
            min_scroll_distance: 50.0,
            mouse: RateBand {
                min_rate: 0.0,
                max_rate: 50.0,
                points_per_rate: 15.0,
                cap: 30.0,
            },
            scroll: RateBand {
                min_rate: 0.01,
                max_rate: 5.0,
                points_per_rate: 60.0,
                cap: 20.0,
            },
            click: RateBand {
                min_rate: 0.01,
                max_rate: 2.0,
                points_per_rate: 120.0,
                cap: 20.0,
            },
            keyboard_bonus: 15.0,
            focus_bonus: 15.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct InteractionCounters {
    mouse_moves: u32,
    scrolls: u32,
    clicks: u32,
    key_presses: u32,
    focus_changes: u32,
}

/// Point-in-time view of a session's interaction signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorMetrics {
    pub mouse_movements: u32,
    pub scroll_events: u32,
    pub click_events: u32,
    pub keyboard_events: u32,
    pub focus_events: u32,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub human_score: u8,
}

impl BehaviorMetrics {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

/// Passive observer for one form session.
#[derive(Debug, Clone)]
pub struct BehaviorTracker {
    model: HumanScoreModel,
    started_at: DateTime<Utc>,
    counters: InteractionCounters,
    human_score: u8,
}

impl BehaviorTracker {
    pub fn start(now: DateTime<Utc>) -> Self {
        Self::with_model(HumanScoreModel::default(), now)
    }

    pub fn with_model(model: HumanScoreModel, now: DateTime<Utc>) -> Self {
        Self {
            model,
            started_at: now,
            counters: InteractionCounters::default(),
            human_score: 0,
        }
    }

    /// Begin a fresh observation window, discarding earlier signals.
    pub fn restart(&mut self, now: DateTime<Utc>) {
        self.started_at = now;
        self.counters = InteractionCounters::default();
        self.human_score = 0;
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Latest score produced by [`BehaviorTracker::recompute`].
    pub fn human_score(&self) -> u8 {
        self.human_score
    }

    /// Count an event, returning whether it qualified.
    pub fn record_event(&mut self, event: InteractionEvent) -> bool {
        let counters = &mut self.counters;
        let counted = match event {
            InteractionEvent::PointerMove { distance } => {
                distance >= self.model.min_pointer_distance
                    && bump(&mut counters.mouse_moves)
            }
            InteractionEvent::Scroll { distance } => {
                distance.abs() >= self.model.min_scroll_distance && bump(&mut counters.scrolls)
            }
            InteractionEvent::Click => bump(&mut counters.clicks),
            InteractionEvent::KeyPress { trusted } => trusted && bump(&mut counters.key_presses),
            InteractionEvent::Focus => bump(&mut counters.focus_changes),
        };

        if !counted {
            trace!(?event, "interaction below tracking threshold");
        }
        counted
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.started_at).max(Duration::zero())
    }

    /// Score derived from the current counters as of `now`.
    pub fn compute_score(&self, now: DateTime<Utc>) -> u8 {
        let elapsed_secs = self.elapsed(now).num_milliseconds() as f64 / 1000.0;
        if elapsed_secs < self.model.min_observation_secs {
            return 0;
        }

        let model = &self.model;
        let counters = &self.counters;
        let mut score = model.mouse.contribution(counters.mouse_moves, elapsed_secs)
            + model.scroll.contribution(counters.scrolls, elapsed_secs)
            + model.click.contribution(counters.clicks, elapsed_secs);

        if counters.key_presses > 0 {
            score += model.keyboard_bonus;
        }
        if counters.focus_changes > 0 {
            score += model.focus_bonus;
        }

        score.round().clamp(0.0, 100.0) as u8
    }

    pub fn recompute(&mut self, now: DateTime<Utc>) -> u8 {
        self.human_score = self.compute_score(now);
        self.human_score
    }

    /// Counters and elapsed time as of `now`, with the score from the last recompute.
    pub fn snapshot(&self, now: DateTime<Utc>) -> BehaviorMetrics {
        BehaviorMetrics {
            mouse_movements: self.counters.mouse_moves,
            scroll_events: self.counters.scrolls,
            click_events: self.counters.clicks,
            keyboard_events: self.counters.key_presses,
            focus_events: self.counters.focus_changes,
            started_at: self.started_at,
            elapsed_ms: self.elapsed(now).num_milliseconds(),
            human_score: self.human_score,
        }
    }
}

fn bump(counter: &mut u32) -> bool {
    *counter = counter.saturating_add(1);
    true
}

/// Background task refreshing a shared tracker's score on a fixed period.
///
/// The task is aborted when the ticker is dropped, so tearing down a session never leaves a
/// timer behind.
pub struct ScoreTicker {
    handle: JoinHandle<()>,
}

impl ScoreTicker {
    pub const DEFAULT_PERIOD: StdDuration = StdDuration::from_secs(2);

    /// Spawn on the current tokio runtime. Panics outside a runtime, like `tokio::spawn`.
    pub fn spawn(
        tracker: Arc<Mutex<BehaviorTracker>>,
        clock: Arc<dyn Clock>,
        period: StdDuration,
    ) -> Self {
        Self::spawn_on(&Handle::current(), tracker, clock, period)
    }

    /// Spawn when a runtime is available; synchronous callers get `None` and recompute on demand.
    pub fn try_spawn(
        tracker: Arc<Mutex<BehaviorTracker>>,
        clock: Arc<dyn Clock>,
        period: StdDuration,
    ) -> Option<Self> {
        Handle::try_current()
            .ok()
            .map(|runtime| Self::spawn_on(&runtime, tracker, clock, period))
    }

    fn spawn_on(
        runtime: &Handle,
        tracker: Arc<Mutex<BehaviorTracker>>,
        clock: Arc<dyn Clock>,
        period: StdDuration,
    ) -> Self {
        let handle = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let mut guard = tracker.lock().unwrap_or_else(PoisonError::into_inner);
                let score = guard.recompute(clock.now());
                trace!(score, "human score refreshed");
            }
        });

        Self { handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for ScoreTicker {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
