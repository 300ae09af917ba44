use rand::Rng;
use serde::{Deserialize, Serialize};

pub const INCORRECT_ANSWER: &str = "That answer is not correct. Please try again.";
pub const NOT_A_NUMBER: &str = "Please enter the answer as a number.";

const MIN_OPERAND: u8 = 1;
const MAX_OPERAND: u8 = 10;

/// Lifecycle of a verification challenge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeState {
    Presented,
    Verified,
    Cancelled,
}

impl ChallengeState {
    pub fn label(&self) -> &'static str {
        match self {
            ChallengeState::Presented => "presented",
            ChallengeState::Verified => "verified",
            ChallengeState::Cancelled => "cancelled",
        }
    }
}

/// Result of a single answer attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeAttempt {
    Verified,
    Retry { error: &'static str },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("challenge was already cancelled")]
    Cancelled,
}

/// Arithmetic question shown when a submission's trust score is inconclusive.
///
/// Retries are unlimited. Once verified, further answers are ignored; once cancelled, the
/// challenge refuses answers entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationChallenge {
    left: u8,
    right: u8,
    state: ChallengeState,
}

impl VerificationChallenge {
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let left = rng.gen_range(MIN_OPERAND..=MAX_OPERAND);
        let right = rng.gen_range(MIN_OPERAND..=MAX_OPERAND);
        Self::with_operands(left, right)
    }

    pub fn with_operands(left: u8, right: u8) -> Self {
        Self {
            left,
            right,
            state: ChallengeState::Presented,
        }
    }

    pub fn operands(&self) -> (u8, u8) {
        (self.left, self.right)
    }

    pub fn question(&self) -> String {
        format!("What is {} + {}?", self.left, self.right)
    }

    pub fn state(&self) -> ChallengeState {
        self.state
    }

    fn expected(&self) -> i64 {
        i64::from(self.left) + i64::from(self.right)
    }

    pub fn answer(&mut self, raw: &str) -> Result<ChallengeAttempt, ChallengeError> {
        match self.state {
            ChallengeState::Cancelled => return Err(ChallengeError::Cancelled),
            ChallengeState::Verified => return Ok(ChallengeAttempt::Verified),
            ChallengeState::Presented => {}
        }

        let Ok(value) = raw.trim().parse::<i64>() else {
            return Ok(ChallengeAttempt::Retry {
                error: NOT_A_NUMBER,
            });
        };

        if value == self.expected() {
            self.state = ChallengeState::Verified;
            Ok(ChallengeAttempt::Verified)
        } else {
            Ok(ChallengeAttempt::Retry {
                error: INCORRECT_ANSWER,
            })
        }
    }

    pub fn cancel(&mut self) {
        if self.state == ChallengeState::Presented {
            self.state = ChallengeState::Cancelled;
        }
    }
}
