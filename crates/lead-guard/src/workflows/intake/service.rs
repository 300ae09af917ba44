use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::behavior::{
    BehaviorMetrics, BehaviorTracker, HumanScoreModel, InteractionEvent, ScoreTicker,
};
use super::challenge::{ChallengeAttempt, ChallengeError, ChallengeState, VerificationChallenge};
use super::domain::{ClientId, Clock, ContactFormData, SessionId, SystemClock, WizardType};
use super::rate_limit::RateLimiter;
use super::store::{KeyValueStore, LeadNotification, LeadNotifier, NotifyError, StoreError};
use super::validation::{SpamProtectionConfig, SubmissionValidator, ValidationResult};

/// Sessions idle longer than this are evicted.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 2 * 60 * 60;

fn next_session_id() -> SessionId {
    SessionId(format!("sess-{:032x}", rand::random::<u128>()))
}

struct PendingLead {
    form: ContactFormData,
    trust_score: u8,
    challenge: VerificationChallenge,
}

struct FormSession {
    wizard: WizardType,
    client: ClientId,
    tracker: Arc<Mutex<BehaviorTracker>>,
    last_seen: DateTime<Utc>,
    pending: Option<PendingLead>,
    // Dropping the session aborts the refresh task.
    _ticker: Option<ScoreTicker>,
}

impl FormSession {
    fn tracker(&self) -> MutexGuard<'_, BehaviorTracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

type SessionMap = HashMap<SessionId, FormSession>;

/// Live session for `session_id`, evicting it first when it has sat idle past `ttl`.
fn live_session<'a>(
    sessions: &'a mut SessionMap,
    session_id: &SessionId,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<&'a mut FormSession, IntakeServiceError> {
    let expired = sessions
        .get(session_id)
        .is_some_and(|session| now - session.last_seen >= ttl);
    if expired {
        sessions.remove(session_id);
        debug!(%session_id, "idle form session evicted");
    }

    let session = sessions
        .get_mut(session_id)
        .ok_or_else(|| IntakeServiceError::SessionNotFound(session_id.clone()))?;
    session.last_seen = now;
    Ok(session)
}

/// Public view of an active form session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub session_id: SessionId,
    pub wizard: WizardType,
    pub client_id: ClientId,
    pub started_at: DateTime<Utc>,
    pub metrics: BehaviorMetrics,
}

/// Challenge status returned to the wizard after presenting, answering, or cancelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChallengeView {
    pub session_id: SessionId,
    pub state: ChallengeState,
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub lead_delivered: bool,
}

/// Validation result plus the challenge to show when verification is required.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub result: ValidationResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge: Option<ChallengeView>,
}

/// Service composing behavior sessions, the submission gate, rate limiting, and lead delivery.
pub struct LeadIntakeService<S, N> {
    validator: SubmissionValidator,
    limiter: RateLimiter<S>,
    notifier: Arc<N>,
    clock: Arc<dyn Clock>,
    score_model: HumanScoreModel,
    custom_build: SpamProtectionConfig,
    remodeling: SpamProtectionConfig,
    session_ttl: Duration,
    tick_period: StdDuration,
    sessions: Mutex<SessionMap>,
}

impl<S, N> LeadIntakeService<S, N>
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    pub fn new(store: Arc<S>, notifier: Arc<N>) -> Self {
        Self {
            validator: SubmissionValidator::new(),
            limiter: RateLimiter::new(store),
            notifier,
            clock: Arc::new(SystemClock),
            score_model: HumanScoreModel::default(),
            custom_build: SpamProtectionConfig::custom_build(),
            remodeling: SpamProtectionConfig::remodeling(),
            session_ttl: Duration::seconds(DEFAULT_SESSION_TTL_SECS),
            tick_period: ScoreTicker::DEFAULT_PERIOD,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, wizard: WizardType, config: SpamProtectionConfig) -> Self {
        match wizard {
            WizardType::CustomBuild => self.custom_build = config,
            WizardType::Remodeling => self.remodeling = config,
        }
        self
    }

    pub fn with_score_model(mut self, model: HumanScoreModel) -> Self {
        self.score_model = model;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_validator(mut self, validator: SubmissionValidator) -> Self {
        if validator.bypass_enabled() {
            warn!("lead intake running with the validation bypass enabled");
        }
        self.validator = validator;
        self
    }

    pub fn config_for(&self, wizard: WizardType) -> &SpamProtectionConfig {
        match wizard {
            WizardType::CustomBuild => &self.custom_build,
            WizardType::Remodeling => &self.remodeling,
        }
    }

    fn sessions(&self) -> MutexGuard<'_, SessionMap> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a tracking session for a freshly mounted wizard, evicting idle ones.
    pub fn start_session(&self, wizard: WizardType, client: ClientId) -> SessionView {
        let now = self.clock.now();
        let session_id = next_session_id();
        let tracker = Arc::new(Mutex::new(BehaviorTracker::with_model(
            self.score_model.clone(),
            now,
        )));
        let ticker =
            ScoreTicker::try_spawn(tracker.clone(), self.clock.clone(), self.tick_period);
        let metrics = tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot(now);
        let view = SessionView {
            session_id: session_id.clone(),
            wizard,
            client_id: client.clone(),
            started_at: now,
            metrics,
        };

        let mut sessions = self.sessions();
        let before = sessions.len();
        let ttl = self.session_ttl;
        sessions.retain(|_, session| now - session.last_seen < ttl);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "idle form sessions evicted");
        }

        sessions.insert(
            session_id.clone(),
            FormSession {
                wizard,
                client,
                tracker,
                last_seen: now,
                pending: None,
                _ticker: ticker,
            },
        );
        info!(%session_id, wizard = wizard.label(), "form session started");
        view
    }

    /// Feed interaction events into the session tracker, returning how many qualified.
    pub fn record_events(
        &self,
        session_id: &SessionId,
        events: &[InteractionEvent],
    ) -> Result<usize, IntakeServiceError> {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let session = live_session(&mut sessions, session_id, now, self.session_ttl)?;

        let mut tracker = session.tracker();
        let counted = events
            .iter()
            .filter(|event| tracker.record_event(**event))
            .count();
        tracker.recompute(now);
        Ok(counted)
    }

    pub fn session(&self, session_id: &SessionId) -> Result<SessionView, IntakeServiceError> {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let session = live_session(&mut sessions, session_id, now, self.session_ttl)?;
        let tracker = session.tracker();

        Ok(SessionView {
            session_id: session_id.clone(),
            wizard: session.wizard,
            client_id: session.client.clone(),
            started_at: tracker.started_at(),
            metrics: tracker.snapshot(now),
        })
    }

    /// Gate a submission, charge the rate limit when it passes or escalates, and deliver
    /// accepted leads.
    pub fn validate_and_submit(
        &self,
        session_id: &SessionId,
        form: ContactFormData,
    ) -> Result<SubmissionOutcome, IntakeServiceError> {
        let now = self.clock.now();
        let (wizard, client, metrics) = {
            let mut sessions = self.sessions();
            let session = live_session(&mut sessions, session_id, now, self.session_ttl)?;
            let mut tracker = session.tracker();
            tracker.recompute(now);
            let metrics = tracker.snapshot(now);
            (session.wizard, session.client.clone(), metrics)
        };

        let config = self.config_for(wizard);
        let result = self.limiter.with_record(wizard, &client, now, |rate| {
            let result = self.validator.validate(&form, config, &metrics, rate);
            let counts = result.counts_against_rate_limit();
            (result, counts)
        })?;

        info!(
            %session_id,
            wizard = wizard.label(),
            trust_score = result.trust_score,
            human_score = metrics.human_score,
            verdict = result.verdict().map(|verdict| verdict.label()).unwrap_or("unknown"),
            "submission evaluated"
        );

        if result.is_valid {
            self.notifier.deliver(lead_notification(
                session_id,
                wizard,
                &form,
                result.trust_score,
                false,
                now,
            ))?;
            return Ok(SubmissionOutcome {
                result,
                challenge: None,
            });
        }

        if !result.requires_additional_verification {
            return Ok(SubmissionOutcome {
                result,
                challenge: None,
            });
        }

        let challenge = VerificationChallenge::generate(&mut rand::thread_rng());
        let view = ChallengeView {
            session_id: session_id.clone(),
            state: challenge.state(),
            question: challenge.question(),
            error: None,
            lead_delivered: false,
        };

        let mut sessions = self.sessions();
        let session = live_session(&mut sessions, session_id, now, self.session_ttl)?;
        session.pending = Some(PendingLead {
            form,
            trust_score: result.trust_score,
            challenge,
        });

        Ok(SubmissionOutcome {
            result,
            challenge: Some(view),
        })
    }

    /// Check an answer to the pending challenge; a correct answer delivers the held lead.
    pub fn answer_challenge(
        &self,
        session_id: &SessionId,
        answer: &str,
    ) -> Result<ChallengeView, IntakeServiceError> {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let session = live_session(&mut sessions, session_id, now, self.session_ttl)?;
        let wizard = session.wizard;
        let pending = session
            .pending
            .as_mut()
            .ok_or_else(|| IntakeServiceError::NoPendingChallenge(session_id.clone()))?;

        let question = pending.challenge.question();
        match pending.challenge.answer(answer)? {
            ChallengeAttempt::Retry { error } => Ok(ChallengeView {
                session_id: session_id.clone(),
                state: pending.challenge.state(),
                question,
                error: Some(error.to_string()),
                lead_delivered: false,
            }),
            ChallengeAttempt::Verified => {
                let notification = lead_notification(
                    session_id,
                    wizard,
                    &pending.form,
                    pending.trust_score,
                    true,
                    now,
                );
                // Keep the lead pending until delivery succeeds so the visitor can retry.
                self.notifier.deliver(notification)?;
                session.pending = None;
                info!(%session_id, wizard = wizard.label(), "challenge verified, lead delivered");

                Ok(ChallengeView {
                    session_id: session_id.clone(),
                    state: ChallengeState::Verified,
                    question,
                    error: None,
                    lead_delivered: true,
                })
            }
        }
    }

    /// Abandon the pending challenge and drop the held lead.
    pub fn cancel_challenge(
        &self,
        session_id: &SessionId,
    ) -> Result<ChallengeView, IntakeServiceError> {
        let now = self.clock.now();
        let mut sessions = self.sessions();
        let session = live_session(&mut sessions, session_id, now, self.session_ttl)?;
        let mut pending = session
            .pending
            .take()
            .ok_or_else(|| IntakeServiceError::NoPendingChallenge(session_id.clone()))?;

        pending.challenge.cancel();
        info!(%session_id, "verification challenge cancelled");

        Ok(ChallengeView {
            session_id: session_id.clone(),
            state: pending.challenge.state(),
            question: pending.challenge.question(),
            error: None,
            lead_delivered: false,
        })
    }

    /// Tear down a session, discarding its tracker and any pending challenge.
    pub fn end_session(&self, session_id: &SessionId) -> Result<(), IntakeServiceError> {
        self.sessions()
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| IntakeServiceError::SessionNotFound(session_id.clone()))
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions().len()
    }
}

fn lead_notification(
    session_id: &SessionId,
    wizard: WizardType,
    form: &ContactFormData,
    trust_score: u8,
    verified_by_challenge: bool,
    received_at: DateTime<Utc>,
) -> LeadNotification {
    LeadNotification {
        session_id: session_id.clone(),
        wizard,
        first_name: form.first_name.trim().to_string(),
        last_name: form.last_name.trim().to_string(),
        email: form.email.trim().to_string(),
        phone: form.phone.trim().to_string(),
        message: form
            .message
            .as_deref()
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_string),
        trust_score,
        verified_by_challenge,
        received_at,
    }
}

/// Error raised by the lead intake service.
#[derive(Debug, thiserror::Error)]
pub enum IntakeServiceError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),
    #[error("no verification challenge pending for session {0}")]
    NoPendingChallenge(SessionId),
    #[error(transparent)]
    Challenge(#[from] ChallengeError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Notify(#[from] NotifyError),
}
