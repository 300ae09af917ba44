//! Content checks applied to the contact fields of a wizard submission.

use std::sync::OnceLock;

use regex::Regex;

use super::domain::ContactFormData;

pub const INVALID_EMAIL: &str = "Please enter a valid email address.";
pub const DISPOSABLE_EMAIL: &str = "Please use a permanent email address rather than a disposable one.";
pub const INVALID_PHONE: &str = "Please enter a valid 10-digit phone number.";
pub const SPAM_MESSAGE: &str = "Your message contains content we cannot accept. Please revise it.";
pub const TOO_MANY_LINKS: &str = "Please include no more than 2 links in your message.";
pub const MISSING_FIRST_NAME: &str = "Please enter your first name.";
pub const MISSING_LAST_NAME: &str = "Please enter your last name.";

pub const MAX_MESSAGE_LINKS: usize = 2;

const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "guerrillamail.com",
    "guerrillamail.net",
    "mailinator.com",
    "tempmail.com",
    "temp-mail.org",
    "throwaway.email",
    "yopmail.com",
    "sharklasers.com",
    "trashmail.com",
    "getnada.com",
    "maildrop.cc",
    "dispostable.com",
    "fakeinbox.com",
];

const SPAM_KEYWORDS: &[&str] = &[
    "viagra",
    "cialis",
    "casino",
    "lottery",
    "bitcoin",
    "crypto",
    "forex",
    "payday loan",
    "make money fast",
    "work from home",
    "click here",
    "free money",
    "seo services",
    "backlinks",
    "guaranteed ranking",
];

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
    })
}

fn link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("link pattern compiles")
    })
}

/// Pass/fail flags for each checked field. The email, phone and message flags feed the trust
/// score; `names_present` only gates validity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldChecks {
    pub names_present: bool,
    pub email_valid: bool,
    pub phone_valid: bool,
    pub message_clean: bool,
}

impl FieldChecks {
    pub fn all_passed(&self) -> bool {
        self.names_present && self.email_valid && self.phone_valid && self.message_clean
    }
}

/// Outcome of checking every contact field; errors are collected rather than short-circuited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReport {
    pub checks: FieldChecks,
    pub errors: Vec<String>,
}

pub fn check_fields(form: &ContactFormData) -> FieldReport {
    let mut errors = Vec::new();

    let first_present = !form.first_name.trim().is_empty();
    if !first_present {
        errors.push(MISSING_FIRST_NAME.to_string());
    }
    let last_present = !form.last_name.trim().is_empty();
    if !last_present {
        errors.push(MISSING_LAST_NAME.to_string());
    }

    let email_valid = match check_email(&form.email) {
        Ok(()) => true,
        Err(message) => {
            errors.push(message.to_string());
            false
        }
    };

    let phone_valid = is_valid_phone(&form.phone);
    if !phone_valid {
        errors.push(INVALID_PHONE.to_string());
    }

    let message_errors = check_message(form.message_text());
    let message_clean = message_errors.is_empty();
    errors.extend(message_errors.into_iter().map(str::to_string));

    FieldReport {
        checks: FieldChecks {
            names_present: first_present && last_present,
            email_valid,
            phone_valid,
            message_clean,
        },
        errors,
    }
}

pub fn check_email(raw: &str) -> Result<(), &'static str> {
    let email = raw.trim();
    if !email_pattern().is_match(email) {
        return Err(INVALID_EMAIL);
    }

    let domain = email
        .rsplit_once('@')
        .map(|(_, domain)| domain.to_ascii_lowercase())
        .unwrap_or_default();
    if DISPOSABLE_DOMAINS.contains(&domain.as_str()) {
        return Err(DISPOSABLE_EMAIL);
    }

    Ok(())
}

pub fn normalize_phone(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

pub fn is_valid_phone(raw: &str) -> bool {
    let digits = normalize_phone(raw);
    if !(10..=11).contains(&digits.len()) {
        return false;
    }

    !is_fake_phone(&digits)
}

/// Repeated digits (which covers all zeros) or a run stepping by one in either direction.
/// A leading country code 1 on an 11-digit number is ignored.
fn is_fake_phone(digits: &str) -> bool {
    let national = match digits.strip_prefix('1') {
        Some(rest) if digits.len() == 11 => rest,
        _ => digits,
    };
    let values: Vec<i8> = national.bytes().map(|b| (b - b'0') as i8).collect();
    let steps: Vec<i8> = values
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).rem_euclid(10))
        .collect();

    steps.iter().all(|step| *step == 0)
        || steps.iter().all(|step| *step == 1)
        || steps.iter().all(|step| *step == 9)
}

pub fn check_message(message: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if message.trim().is_empty() {
        return errors;
    }

    let lowered = message.to_lowercase();
    if SPAM_KEYWORDS.iter().any(|keyword| lowered.contains(keyword)) {
        errors.push(SPAM_MESSAGE);
    }

    if link_pattern().find_iter(message).count() > MAX_MESSAGE_LINKS {
        errors.push(TOO_MANY_LINKS);
    }

    errors
}
