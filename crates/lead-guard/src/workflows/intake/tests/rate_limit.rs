use super::common::*;
use chrono::Duration;
use std::sync::Arc;

use crate::workflows::intake::domain::WizardType;
use crate::workflows::intake::rate_limit::{RateLimiter, RateWindow, SubmissionRateRecord};
use crate::workflows::intake::store::{KeyValueStore, MemoryStore, StoreError};

#[test]
fn records_are_created_lazily() {
    let store = Arc::new(MemoryStore::default());
    let limiter = RateLimiter::new(store.clone());
    let dana = visitor("dana");

    let record = limiter
        .current(WizardType::CustomBuild, &dana, t0())
        .expect("read succeeds");

    assert_eq!(record, SubmissionRateRecord::fresh(t0()));
    assert!(store
        .get(&WizardType::CustomBuild.rate_limit_key(&dana))
        .expect("store readable")
        .is_none());
}

#[test]
fn recording_persists_camel_case_json_per_wizard_and_visitor() {
    let store = Arc::new(MemoryStore::default());
    let limiter = RateLimiter::new(store.clone());
    let dana = visitor("dana");

    limiter
        .record_submission(WizardType::Remodeling, &dana, t0())
        .expect("record succeeds");
    limiter
        .record_submission(WizardType::Remodeling, &dana, t0() + Duration::minutes(5))
        .expect("record succeeds");

    assert_eq!(
        stored_counts(&store, "submission_rate_remodeling_dana"),
        Some((2, 2))
    );
    assert_eq!(stored_counts(&store, "submission_rate_custom_build_dana"), None);
    assert_eq!(stored_counts(&store, "submission_rate_remodeling_lee"), None);

    let raw = store
        .get("submission_rate_remodeling_dana")
        .expect("store readable")
        .expect("record present");
    assert!(raw.contains("hourWindowStart"));
    assert!(raw.contains("dayWindowStart"));
}

#[test]
fn undecided_submissions_leave_the_record_untouched() {
    let store = Arc::new(MemoryStore::default());
    let limiter = RateLimiter::new(store.clone());
    let dana = visitor("dana");

    let seen = limiter
        .with_record(WizardType::CustomBuild, &dana, t0(), |record| {
            (record.hourly_count, false)
        })
        .expect("decision runs");

    assert_eq!(seen, 0);
    assert_eq!(stored_counts(&store, "submission_rate_custom_build_dana"), None);
}

#[test]
fn hourly_window_rolls_without_touching_daily_count() {
    let store = Arc::new(MemoryStore::default());
    let limiter = RateLimiter::new(store.clone());
    let dana = visitor("dana");
    for minute in 0..3 {
        limiter
            .record_submission(WizardType::CustomBuild, &dana, t0() + Duration::minutes(minute))
            .expect("record succeeds");
    }

    let within = limiter
        .current(WizardType::CustomBuild, &dana, t0() + Duration::minutes(59))
        .expect("read succeeds");
    assert_eq!(within.exceeded(3, 10), Some(RateWindow::Hour));

    let later = t0() + Duration::minutes(61);
    let rolled = limiter
        .current(WizardType::CustomBuild, &dana, later)
        .expect("read succeeds");
    assert_eq!(rolled.hourly_count, 0);
    assert_eq!(rolled.daily_count, 3);
    assert_eq!(rolled.hour_window_start, later);
    assert_eq!(rolled.exceeded(3, 10), None);
}

#[test]
fn daily_window_rolls_after_a_day() {
    let mut record = SubmissionRateRecord {
        hourly_count: 2,
        daily_count: 10,
        ..SubmissionRateRecord::fresh(t0())
    };
    assert_eq!(record.exceeded(3, 10), Some(RateWindow::Day));

    assert!(!record.roll_windows(t0() + Duration::minutes(30)));
    assert!(record.roll_windows(t0() + Duration::hours(24)));
    assert_eq!(record.daily_count, 0);
    assert_eq!(record.hourly_count, 0);
}

#[test]
fn unreadable_records_start_over() {
    let store = Arc::new(MemoryStore::default());
    store
        .set("submission_rate_custom_build_dana", "{not json")
        .expect("seed store");
    let limiter = RateLimiter::new(store.clone());

    let record = limiter
        .record_submission(WizardType::CustomBuild, &visitor("dana"), t0())
        .expect("record succeeds");

    assert_eq!(record.hourly_count, 1);
    assert_eq!(
        stored_counts(&store, "submission_rate_custom_build_dana"),
        Some((1, 1))
    );
}

#[test]
fn store_failures_propagate() {
    let limiter = RateLimiter::new(Arc::new(UnavailableStore));

    match limiter.record_submission(WizardType::Remodeling, &visitor("dana"), t0()) {
        Err(StoreError::Unavailable(_)) => {}
        other => panic!("expected unavailable store, got {other:?}"),
    }
}
