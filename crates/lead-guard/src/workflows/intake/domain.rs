use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Source of the current instant, injected so sessions can be replayed deterministically.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Identifier wrapper for an active form session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

const MAX_CLIENT_ID_LEN: usize = 64;

/// Visitor identity persisted by the wizard front end; rate limits are scoped to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, InvalidClientId> {
        let raw = raw.into();
        let acceptable = !raw.is_empty()
            && raw.len() <= MAX_CLIENT_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if acceptable {
            Ok(Self(raw))
        } else {
            Err(InvalidClientId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ClientId {
    type Error = InvalidClientId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl FromStr for ClientId {
    type Err = InvalidClientId;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl From<ClientId> for String {
    fn from(value: ClientId) -> Self {
        value.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("client id '{0}' must be 1-64 characters of letters, digits, '-' or '_'")]
pub struct InvalidClientId(pub String);

/// Lead capture wizards offered on the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardType {
    CustomBuild,
    Remodeling,
}

impl WizardType {
    pub fn label(&self) -> &'static str {
        match self {
            WizardType::CustomBuild => "custom_build",
            WizardType::Remodeling => "remodeling",
        }
    }

    /// Storage key holding one visitor's submission rate record for this wizard.
    pub fn rate_limit_key(&self, client: &ClientId) -> String {
        format!("submission_rate_{}_{}", self.label(), client)
    }
}

/// Contact details entered by the visitor, plus the decoy fields a human never sees.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactFormData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub referral_source: String,
}

impl ContactFormData {
    pub fn honeypot_triggered(&self) -> bool {
        [&self.website, &self.company, &self.referral_source]
            .iter()
            .any(|value| !value.is_empty())
    }

    pub fn message_text(&self) -> &str {
        self.message.as_deref().unwrap_or_default()
    }
}
