use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{ClientId, WizardType};
use super::store::{KeyValueStore, StoreError};

/// Counting window enforced by the submission rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateWindow {
    Hour,
    Day,
}

impl RateWindow {
    pub fn label(&self) -> &'static str {
        match self {
            RateWindow::Hour => "hourly",
            RateWindow::Day => "daily",
        }
    }

    pub fn length(&self) -> Duration {
        match self {
            RateWindow::Hour => Duration::hours(1),
            RateWindow::Day => Duration::days(1),
        }
    }
}

/// Persisted submission counters for one wizard.
///
/// Windows use a sliding reset: once `now - window_start` reaches the window length the count
/// returns to zero and the window restarts at `now`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionRateRecord {
    pub hourly_count: u32,
    pub daily_count: u32,
    pub hour_window_start: DateTime<Utc>,
    pub day_window_start: DateTime<Utc>,
}

impl SubmissionRateRecord {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            hourly_count: 0,
            daily_count: 0,
            hour_window_start: now,
            day_window_start: now,
        }
    }

    /// Reset any window that `now` has moved past. Returns true when something changed.
    pub fn roll_windows(&mut self, now: DateTime<Utc>) -> bool {
        let mut rolled = false;
        if now - self.hour_window_start >= RateWindow::Hour.length() {
            self.hourly_count = 0;
            self.hour_window_start = now;
            rolled = true;
        }
        if now - self.day_window_start >= RateWindow::Day.length() {
            self.daily_count = 0;
            self.day_window_start = now;
            rolled = true;
        }
        rolled
    }

    /// First window whose ceiling has already been reached, if any.
    pub fn exceeded(&self, max_per_hour: u32, max_per_day: u32) -> Option<RateWindow> {
        if self.hourly_count >= max_per_hour {
            Some(RateWindow::Hour)
        } else if self.daily_count >= max_per_day {
            Some(RateWindow::Day)
        } else {
            None
        }
    }

    pub fn status(&self, max_per_hour: u32, max_per_day: u32) -> RateLimitStatus {
        RateLimitStatus {
            hourly_count: self.hourly_count,
            daily_count: self.daily_count,
            max_per_hour,
            max_per_day,
            exceeded: self.exceeded(max_per_hour, max_per_day),
        }
    }
}

/// Rate-limit snapshot reported alongside validation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub hourly_count: u32,
    pub daily_count: u32,
    pub max_per_hour: u32,
    pub max_per_day: u32,
    pub exceeded: Option<RateWindow>,
}

/// Reads and updates per-wizard submission counters through an injected store.
pub struct RateLimiter<S> {
    store: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S> RateLimiter<S>
where
    S: KeyValueStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Current record for the visitor with expired windows already reset. Nothing is written.
    pub fn current(
        &self,
        wizard: WizardType,
        client: &ClientId,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRateRecord, StoreError> {
        let key = wizard.rate_limit_key(client);
        let mut record = match self.store.get(&key)? {
            Some(raw) => match serde_json::from_str::<SubmissionRateRecord>(&raw) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%key, error = %err, "discarding unreadable submission rate record");
                    SubmissionRateRecord::fresh(now)
                }
            },
            None => SubmissionRateRecord::fresh(now),
        };

        if record.roll_windows(now) {
            debug!(%key, "submission rate window rolled over");
        }
        Ok(record)
    }

    /// Read, decide and record as one step.
    ///
    /// `decide` sees the current record and returns its result plus whether the submission
    /// counts against the limit. No other writer for this limiter runs in between.
    pub fn with_record<T, F>(
        &self,
        wizard: WizardType,
        client: &ClientId,
        now: DateTime<Utc>,
        decide: F,
    ) -> Result<T, StoreError>
    where
        F: FnOnce(&SubmissionRateRecord) -> (T, bool),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut record = self.current(wizard, client, now)?;
        let (decision, counts) = decide(&record);
        if counts {
            record.hourly_count = record.hourly_count.saturating_add(1);
            record.daily_count = record.daily_count.saturating_add(1);

            let encoded = serde_json::to_string(&record)
                .map_err(|err| StoreError::Unavailable(format!("encode rate record: {err}")))?;
            self.store.set(&wizard.rate_limit_key(client), &encoded)?;

            debug!(
                wizard = wizard.label(),
                hourly = record.hourly_count,
                daily = record.daily_count,
                "submission recorded against rate limit"
            );
        }
        Ok(decision)
    }

    /// Count one accepted (or escalated) submission against both windows.
    pub fn record_submission(
        &self,
        wizard: WizardType,
        client: &ClientId,
        now: DateTime<Utc>,
    ) -> Result<SubmissionRateRecord, StoreError> {
        self.with_record(wizard, client, now, |record| {
            let mut updated = record.clone();
            updated.hourly_count = updated.hourly_count.saturating_add(1);
            updated.daily_count = updated.daily_count.saturating_add(1);
            (updated, true)
        })
    }
}
