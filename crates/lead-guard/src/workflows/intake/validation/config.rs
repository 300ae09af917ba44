use serde::{Deserialize, Serialize};

use super::super::domain::WizardType;

/// Gate settings applied to one wizard's submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpamProtectionConfig {
    /// Seconds a genuine visitor needs at minimum to fill the wizard.
    pub min_completion_time: u32,
    pub max_submissions_per_hour: u32,
    pub max_submissions_per_day: u32,
    pub enable_honeypot: bool,
    pub enable_rate_limit: bool,
    pub enable_behavior_analysis: bool,
    /// Trust below this routes the submission to the verification challenge.
    pub trust_score_threshold: u8,
    #[serde(default)]
    pub trust_weights: TrustWeights,
}

impl SpamProtectionConfig {
    /// The custom build wizard has many more steps than remodeling, so it expects more time.
    pub fn custom_build() -> Self {
        Self {
            min_completion_time: 45,
            ..Self::baseline()
        }
    }

    pub fn remodeling() -> Self {
        Self {
            min_completion_time: 30,
            ..Self::baseline()
        }
    }

    pub fn for_wizard(wizard: WizardType) -> Self {
        match wizard {
            WizardType::CustomBuild => Self::custom_build(),
            WizardType::Remodeling => Self::remodeling(),
        }
    }

    pub fn with_trust_threshold(mut self, threshold: u8) -> Self {
        self.trust_score_threshold = threshold.min(100);
        self
    }

    fn baseline() -> Self {
        Self {
            min_completion_time: 30,
            max_submissions_per_hour: 3,
            max_submissions_per_day: 10,
            enable_honeypot: true,
            enable_rate_limit: true,
            enable_behavior_analysis: true,
            trust_score_threshold: 50,
            trust_weights: TrustWeights::default(),
        }
    }
}

/// Point allocation for each trust factor. The defaults add up to 100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustWeights {
    pub completion_time: u8,
    /// Maximum points, awarded in proportion to the human score.
    pub behavior: u8,
    pub email: u8,
    pub phone: u8,
    pub message: u8,
    pub honeypot: u8,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            completion_time: 10,
            behavior: 55,
            email: 10,
            phone: 10,
            message: 5,
            honeypot: 10,
        }
    }
}
