//! Lead intake gating for the construction wizards.
//!
//! A form session accumulates interaction signals in a [`BehaviorTracker`]; on submit the
//! [`SubmissionValidator`] folds those signals together with timing, honeypot state, the
//! persisted rate-limit record, and field checks into a single [`ValidationResult`]. Borderline
//! submissions are routed to an arithmetic [`VerificationChallenge`] instead of being rejected.

pub mod behavior;
pub mod challenge;
pub mod domain;
pub mod fields;
pub mod rate_limit;
pub mod router;
pub mod service;
pub mod store;
pub(crate) mod validation;

#[cfg(test)]
mod tests;

pub use behavior::{
    BehaviorMetrics, BehaviorTracker, HumanScoreModel, InteractionEvent, RateBand, ScoreTicker,
};
pub use challenge::{ChallengeAttempt, ChallengeError, ChallengeState, VerificationChallenge};
pub use domain::{
    ClientId, Clock, ContactFormData, InvalidClientId, SessionId, SystemClock, WizardType,
};
pub use rate_limit::{RateLimitStatus, RateLimiter, RateWindow, SubmissionRateRecord};
pub use router::{lead_router, GENERIC_FAILURE_MESSAGE};
pub use service::{
    ChallengeView, IntakeServiceError, LeadIntakeService, SessionView, SubmissionOutcome,
    DEFAULT_SESSION_TTL_SECS,
};
pub use store::{
    JsonFileStore, KeyValueStore, LeadNotification, LeadNotifier, MemoryStore, NotifyError,
    StoreError,
};
pub use validation::{
    RejectionReason, SpamProtectionConfig, SubmissionValidator, TrustComponent, TrustFactor,
    TrustWeights, ValidationDetails, ValidationResult, Verdict, HONEYPOT_MESSAGE,
    RATE_LIMITED_MESSAGE, TOO_FAST_MESSAGE,
};
