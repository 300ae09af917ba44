mod config;
mod policy;
mod rules;

pub use config::{SpamProtectionConfig, TrustWeights};
pub use policy::{
    RejectionReason, Verdict, HONEYPOT_MESSAGE, RATE_LIMITED_MESSAGE, TOO_FAST_MESSAGE,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::behavior::BehaviorMetrics;
use super::domain::ContactFormData;
use super::fields::check_fields;
use super::rate_limit::{RateLimitStatus, SubmissionRateRecord};
use policy::decide_verdict;
use rules::{score_trust, TrustInputs};

/// Signals folded into the trust score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustFactor {
    CompletionTime,
    Behavior,
    Email,
    Phone,
    Message,
    Honeypot,
}

/// Discrete contribution to a trust score, kept for audits and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustComponent {
    pub factor: TrustFactor,
    pub points: u8,
    pub notes: String,
}

/// Diagnostic trail behind a [`ValidationResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationDetails {
    pub verdict: Verdict,
    pub elapsed_secs: f64,
    pub human_score: u8,
    pub components: Vec<TrustComponent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitStatus>,
}

/// Outcome of one validation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub requires_additional_verification: bool,
    pub trust_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ValidationDetails>,
}

impl ValidationResult {
    pub fn verdict(&self) -> Option<&Verdict> {
        self.details.as_ref().map(|details| &details.verdict)
    }

    /// Whether this outcome should be charged against the visitor's rate limit.
    pub fn counts_against_rate_limit(&self) -> bool {
        self.verdict()
            .is_some_and(|verdict| verdict.counts_against_rate_limit())
    }
}

/// Stateless gate applying a [`SpamProtectionConfig`] to one submission.
#[derive(Debug, Clone, Default)]
pub struct SubmissionValidator {
    allow_bypass: bool,
}

impl SubmissionValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator that accepts everything with full trust. Only test harnesses construct this.
    pub fn allowing_bypass() -> Self {
        Self { allow_bypass: true }
    }

    pub fn bypass_enabled(&self) -> bool {
        self.allow_bypass
    }

    pub fn validate(
        &self,
        form: &ContactFormData,
        config: &SpamProtectionConfig,
        metrics: &BehaviorMetrics,
        rate: &SubmissionRateRecord,
    ) -> ValidationResult {
        let elapsed_secs = metrics.elapsed_secs();

        if self.allow_bypass {
            return ValidationResult {
                is_valid: true,
                errors: Vec::new(),
                requires_additional_verification: false,
                trust_score: 100,
                details: Some(ValidationDetails {
                    verdict: Verdict::Bypassed,
                    elapsed_secs,
                    human_score: metrics.human_score,
                    components: Vec::new(),
                    rate_limit: None,
                }),
            };
        }

        if config.enable_honeypot && form.honeypot_triggered() {
            debug!("honeypot field filled, rejecting without further checks");
            return ValidationResult {
                is_valid: false,
                errors: vec![HONEYPOT_MESSAGE.to_string()],
                requires_additional_verification: false,
                trust_score: 0,
                details: Some(ValidationDetails {
                    verdict: Verdict::Rejected {
                        reason: RejectionReason::Honeypot,
                    },
                    elapsed_secs,
                    human_score: metrics.human_score,
                    components: Vec::new(),
                    rate_limit: None,
                }),
            };
        }

        let report = check_fields(form);
        let (components, trust_score) = score_trust(
            &TrustInputs {
                elapsed_secs,
                min_completion_secs: config.min_completion_time,
                human_score: metrics.human_score,
                checks: report.checks,
                honeypot_clean: !form.honeypot_triggered(),
            },
            &config.trust_weights,
        );
        let rate_status = rate.status(config.max_submissions_per_hour, config.max_submissions_per_day);

        let verdict = decide_verdict(config, &rate_status, elapsed_secs, &report, trust_score);
        debug!(verdict = verdict.label(), trust_score, "submission evaluated");

        let (is_valid, requires_additional_verification, errors) = match &verdict {
            Verdict::Accepted | Verdict::Bypassed => (true, false, Vec::new()),
            Verdict::VerificationRequired { .. } => (false, true, Vec::new()),
            Verdict::Rejected { reason } => {
                let errors = match reason {
                    RejectionReason::Honeypot => vec![HONEYPOT_MESSAGE.to_string()],
                    RejectionReason::RateLimited { .. } => vec![RATE_LIMITED_MESSAGE.to_string()],
                    RejectionReason::TooFast { .. } => vec![TOO_FAST_MESSAGE.to_string()],
                    RejectionReason::InvalidFields { .. } => report.errors.clone(),
                };
                (false, false, errors)
            }
        };

        ValidationResult {
            is_valid,
            errors,
            requires_additional_verification,
            trust_score,
            details: Some(ValidationDetails {
                verdict,
                elapsed_secs,
                human_score: metrics.human_score,
                components,
                rate_limit: Some(rate_status),
            }),
        }
    }
}
