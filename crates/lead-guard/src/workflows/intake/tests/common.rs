use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::intake::behavior::{BehaviorMetrics, InteractionEvent};
use crate::workflows::intake::domain::{ClientId, Clock, ContactFormData, SessionId};
use crate::workflows::intake::service::LeadIntakeService;
use crate::workflows::intake::store::{
    KeyValueStore, LeadNotification, LeadNotifier, MemoryStore, NotifyError, StoreError,
};

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(super) fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(super) fn advance_secs(&self, secs: i64) {
        let mut guard = self.now.lock().expect("clock mutex poisoned");
        *guard += Duration::seconds(secs);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

pub(super) fn valid_form() -> ContactFormData {
    ContactFormData {
        first_name: "Dana".to_string(),
        last_name: "Whitfield".to_string(),
        email: "dana.whitfield@example.com".to_string(),
        phone: "(515) 555-0142".to_string(),
        message: None,
        website: String::new(),
        company: String::new(),
        referral_source: String::new(),
    }
}

pub(super) fn honeypot_form() -> ContactFormData {
    ContactFormData {
        website: "http://spam.biz".to_string(),
        ..valid_form()
    }
}

pub(super) fn metrics(elapsed_secs: i64, human_score: u8) -> BehaviorMetrics {
    BehaviorMetrics {
        mouse_movements: 0,
        scroll_events: 0,
        click_events: 0,
        keyboard_events: 0,
        focus_events: 0,
        started_at: t0(),
        elapsed_ms: elapsed_secs * 1000,
        human_score,
    }
}

pub(super) fn varied_activity() -> Vec<InteractionEvent> {
    let mut events = Vec::new();
    for step in 0..90 {
        events.push(InteractionEvent::PointerMove {
            distance: 12.0 + f64::from(step % 7) * 9.5,
        });
    }
    for _ in 0..8 {
        events.push(InteractionEvent::Scroll { distance: 140.0 });
    }
    for _ in 0..6 {
        events.push(InteractionEvent::Click);
    }
    events.push(InteractionEvent::KeyPress { trusted: true });
    events.push(InteractionEvent::Focus);
    events
}

/// Extract the sum from a "What is a + b?" prompt.
pub(super) fn solve(question: &str) -> String {
    let numbers: Vec<i64> = question
        .trim_start_matches("What is ")
        .trim_end_matches('?')
        .split('+')
        .map(|part| part.trim().parse::<i64>().expect("numeric operand"))
        .collect();
    numbers.iter().sum::<i64>().to_string()
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    events: Mutex<Vec<LeadNotification>>,
}

impl LeadNotifier for MemoryNotifier {
    fn deliver(&self, lead: LeadNotification) -> Result<(), NotifyError> {
        self.events.lock().expect("notifier mutex poisoned").push(lead);
        Ok(())
    }
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<LeadNotification> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

pub(super) struct OfflineNotifier;

impl LeadNotifier for OfflineNotifier {
    fn deliver(&self, _lead: LeadNotification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("mail api offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl KeyValueStore for UnavailableStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
        Err(StoreError::Unavailable("storage offline".to_string()))
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("storage offline".to_string()))
    }
}

pub(super) type MemoryService = LeadIntakeService<MemoryStore, MemoryNotifier>;

pub(super) struct Harness {
    pub(super) service: Arc<MemoryService>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) notifier: Arc<MemoryNotifier>,
    pub(super) clock: Arc<ManualClock>,
}

pub(super) fn harness() -> Harness {
    let store = Arc::new(MemoryStore::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let clock = Arc::new(ManualClock::starting_at(t0()));
    let service = LeadIntakeService::new(store.clone(), notifier.clone()).with_clock(clock.clone());

    Harness {
        service: Arc::new(service),
        store,
        notifier,
        clock,
    }
}

pub(super) fn stored_counts(store: &MemoryStore, key: &str) -> Option<(u64, u64)> {
    let raw = store.get(key).expect("store readable")?;
    let value: Value = serde_json::from_str(&raw).expect("record is json");
    Some((
        value["hourlyCount"].as_u64().expect("hourly count"),
        value["dailyCount"].as_u64().expect("daily count"),
    ))
}

pub(super) fn visitor(raw: &str) -> ClientId {
    ClientId::parse(raw).expect("valid client id")
}

pub(super) fn session_id(raw: &str) -> SessionId {
    SessionId(raw.to_string())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
