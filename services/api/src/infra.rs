use lead_guard::config::ProtectionSettings;
use lead_guard::workflows::intake::{
    JsonFileStore, KeyValueStore, LeadIntakeService, LeadNotification, LeadNotifier,
    MemoryStore, NotifyError, SpamProtectionConfig, StoreError, WizardType,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Rate-limit storage selected from `APP_STATE_DIR`.
#[derive(Debug)]
pub(crate) enum StateStore {
    Memory(MemoryStore),
    Files(JsonFileStore),
}

impl StateStore {
    pub(crate) fn from_settings(settings: &ProtectionSettings) -> Result<Self, StoreError> {
        match &settings.state_dir {
            Some(dir) => Ok(Self::Files(JsonFileStore::open(dir.clone())?)),
            None => Ok(Self::Memory(MemoryStore::default())),
        }
    }

    pub(crate) fn describe(&self) -> String {
        match self {
            StateStore::Memory(_) => "memory".to_string(),
            StateStore::Files(store) => store.root().display().to_string(),
        }
    }
}

impl KeyValueStore for StateStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            StateStore::Memory(store) => store.get(key),
            StateStore::Files(store) => store.get(key),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            StateStore::Memory(store) => store.set(key, value),
            StateStore::Files(store) => store.set(key, value),
        }
    }
}

/// Writes forwarded leads to the service log; contact details stay out of the log line.
#[derive(Debug, Default)]
pub(crate) struct LoggingNotifier {
    delivered: AtomicU64,
}

impl LeadNotifier for LoggingNotifier {
    fn deliver(&self, lead: LeadNotification) -> Result<(), NotifyError> {
        let total = self.delivered.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            session_id = %lead.session_id,
            wizard = lead.wizard.label(),
            trust_score = lead.trust_score,
            verified_by_challenge = lead.verified_by_challenge,
            total,
            "lead forwarded"
        );
        Ok(())
    }
}

impl LoggingNotifier {
    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

pub(crate) type IntakeService = LeadIntakeService<StateStore, LoggingNotifier>;

pub(crate) fn build_intake_service(
    settings: &ProtectionSettings,
    notifier: Arc<LoggingNotifier>,
) -> Result<IntakeService, StoreError> {
    let store = Arc::new(StateStore::from_settings(settings)?);
    info!(store = %store.describe(), "rate-limit store selected");
    Ok(apply_protection_settings(
        LeadIntakeService::new(store, notifier),
        settings,
    ))
}

/// Apply deployment overrides on top of the wizard presets.
pub(crate) fn apply_protection_settings<S, N>(
    mut service: LeadIntakeService<S, N>,
    settings: &ProtectionSettings,
) -> LeadIntakeService<S, N>
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    if let Some(threshold) = settings.trust_threshold {
        for wizard in [WizardType::CustomBuild, WizardType::Remodeling] {
            let config = SpamProtectionConfig::for_wizard(wizard).with_trust_threshold(threshold);
            service = service.with_config(wizard, config);
        }
    }
    service
}
