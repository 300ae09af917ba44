use serde::{Deserialize, Serialize};

use super::super::fields::FieldReport;
use super::super::rate_limit::{RateLimitStatus, RateWindow};
use super::config::SpamProtectionConfig;

pub const HONEYPOT_MESSAGE: &str = "Form validation failed. Please try again.";
pub const RATE_LIMITED_MESSAGE: &str =
    "Too many submissions. Please try again later or call us directly.";
pub const TOO_FAST_MESSAGE: &str = "Please take a little more time to complete the form.";

/// Gate decision for one submission attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    Bypassed,
    VerificationRequired { trust_score: u8, threshold: u8 },
    Rejected { reason: RejectionReason },
}

impl Verdict {
    pub fn summary(&self) -> String {
        match self {
            Verdict::Accepted => "submission accepted".to_string(),
            Verdict::Bypassed => "submission accepted via test bypass".to_string(),
            Verdict::VerificationRequired {
                trust_score,
                threshold,
            } => format!("verification required (trust {trust_score} below {threshold})"),
            Verdict::Rejected { reason } => reason.summary(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Accepted => "accepted",
            Verdict::Bypassed => "bypassed",
            Verdict::VerificationRequired { .. } => "verification_required",
            Verdict::Rejected { .. } => "rejected",
        }
    }

    /// Outcomes that consume rate-limit quota.
    pub fn counts_against_rate_limit(&self) -> bool {
        matches!(
            self,
            Verdict::Accepted | Verdict::Bypassed | Verdict::VerificationRequired { .. }
        )
    }
}

/// Why a submission was turned away.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum RejectionReason {
    Honeypot,
    RateLimited { window: RateWindow },
    TooFast { elapsed_secs: f64, required_secs: u32 },
    InvalidFields { count: usize },
}

impl RejectionReason {
    pub fn summary(&self) -> String {
        match self {
            RejectionReason::Honeypot => "rejected: honeypot field filled".to_string(),
            RejectionReason::RateLimited { window } => {
                format!("rejected: {} submission limit reached", window.label())
            }
            RejectionReason::TooFast {
                elapsed_secs,
                required_secs,
            } => format!(
                "rejected: completed in {elapsed_secs:.1}s, minimum is {required_secs}s"
            ),
            RejectionReason::InvalidFields { count } => {
                format!("rejected: {count} field error(s)")
            }
        }
    }

    /// Hard rejections end the attempt; field errors can be corrected and resubmitted.
    pub fn is_correctable(&self) -> bool {
        matches!(self, RejectionReason::InvalidFields { .. })
    }
}

/// Rate limit, timing, field and threshold checks in that order. Honeypot and bypass are
/// settled by the caller.
pub(crate) fn decide_verdict(
    config: &SpamProtectionConfig,
    rate: &RateLimitStatus,
    elapsed_secs: f64,
    fields: &FieldReport,
    trust_score: u8,
) -> Verdict {
    if config.enable_rate_limit {
        if let Some(window) = rate.exceeded {
            return Verdict::Rejected {
                reason: RejectionReason::RateLimited { window },
            };
        }
    }

    if elapsed_secs < f64::from(config.min_completion_time) {
        return Verdict::Rejected {
            reason: RejectionReason::TooFast {
                elapsed_secs,
                required_secs: config.min_completion_time,
            },
        };
    }

    if !fields.errors.is_empty() {
        return Verdict::Rejected {
            reason: RejectionReason::InvalidFields {
                count: fields.errors.len(),
            },
        };
    }

    if config.enable_behavior_analysis && trust_score < config.trust_score_threshold {
        return Verdict::VerificationRequired {
            trust_score,
            threshold: config.trust_score_threshold,
        };
    }

    Verdict::Accepted
}
