use crate::infra::{apply_protection_settings, LoggingNotifier};
use chrono::{DateTime, Duration, Utc};
use clap::{Args, ValueEnum};
use lead_guard::config::{AppConfig, ProtectionSettings};
use lead_guard::error::AppError;
use lead_guard::workflows::intake::{
    ChallengeState, ClientId, Clock, ContactFormData, IntakeServiceError, InteractionEvent,
    LeadIntakeService, MemoryStore, WizardType,
};
use std::sync::{Arc, Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum WizardArg {
    CustomBuild,
    Remodeling,
}

impl From<WizardArg> for WizardType {
    fn from(value: WizardArg) -> Self {
        match value {
            WizardArg::CustomBuild => WizardType::CustomBuild,
            WizardArg::Remodeling => WizardType::Remodeling,
        }
    }
}

/// Scripted interaction profile replayed into each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ActivityArg {
    /// No interaction at all, as a headless script would produce.
    None,
    /// A handful of pointer moves and a single click.
    Light,
    /// Pointer, scroll, click, keyboard and focus activity.
    Varied,
}

#[derive(Args, Debug)]
pub(crate) struct SimulateArgs {
    /// Wizard whose preset gates the submissions
    #[arg(long, value_enum, default_value_t = WizardArg::CustomBuild)]
    pub(crate) wizard: WizardArg,
    /// Seconds each simulated visitor spends on the form
    #[arg(long, default_value_t = 60)]
    pub(crate) elapsed_secs: u32,
    /// Interaction profile recorded for every session
    #[arg(long, value_enum, default_value_t = ActivityArg::Varied)]
    pub(crate) activity: ActivityArg,
    /// Fill the hidden decoy field the way form bots do
    #[arg(long)]
    pub(crate) honeypot: bool,
    /// Answer the verification challenge correctly when one is presented
    #[arg(long)]
    pub(crate) solve_challenge: bool,
    /// Number of back-to-back submissions to replay
    #[arg(long, default_value_t = 1)]
    pub(crate) submissions: u32,
    /// Visitor id every simulated session reports; quotas are tracked per visitor
    #[arg(long, default_value = "sim-visitor")]
    pub(crate) client_id: ClientId,
}

/// Deterministic clock the simulation advances by hand.
struct SimulationClock {
    now: Mutex<DateTime<Utc>>,
}

impl SimulationClock {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    fn advance(&self, secs: u32) {
        let mut guard = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *guard += Duration::seconds(i64::from(secs));
    }
}

impl Clock for SimulationClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SimulatedSubmission {
    pub(crate) attempt: u32,
    pub(crate) verdict: String,
    pub(crate) trust_score: u8,
    pub(crate) human_score: u8,
    pub(crate) errors: Vec<String>,
    pub(crate) challenge: Option<ChallengeState>,
    pub(crate) delivered: bool,
}

pub(crate) fn run_simulation(args: SimulateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let submissions = simulate(&args, &config.protection)?;

    println!(
        "Lead intake simulation ({} wizard, {}s per session, {:?} activity)",
        WizardType::from(args.wizard).label(),
        args.elapsed_secs,
        args.activity
    );
    for submission in &submissions {
        println!(
            "- Submission {}: {} | trust {} | human {}",
            submission.attempt, submission.verdict, submission.trust_score, submission.human_score
        );
        for error in &submission.errors {
            println!("    error: {error}");
        }
        if let Some(state) = submission.challenge {
            println!("    challenge: {}", state.label());
        }
    }
    let delivered = submissions.iter().filter(|entry| entry.delivered).count();
    println!("Leads forwarded: {delivered} of {}", submissions.len());

    Ok(())
}

pub(crate) fn simulate(
    args: &SimulateArgs,
    settings: &ProtectionSettings,
) -> Result<Vec<SimulatedSubmission>, IntakeServiceError> {
    let clock = Arc::new(SimulationClock::new(Utc::now()));
    let notifier = Arc::new(LoggingNotifier::default());
    let service = apply_protection_settings(
        LeadIntakeService::new(Arc::new(MemoryStore::default()), notifier.clone())
            .with_clock(clock.clone()),
        settings,
    );
    let wizard = WizardType::from(args.wizard);
    let events = activity_events(args.activity);

    let mut results = Vec::new();
    for attempt in 1..=args.submissions {
        let session = service.start_session(wizard, args.client_id.clone());
        clock.advance(args.elapsed_secs);
        service.record_events(&session.session_id, &events)?;

        let delivered_before = notifier.delivered();
        let outcome = service.validate_and_submit(&session.session_id, visitor_form(args.honeypot))?;

        let mut challenge = outcome.challenge.as_ref().map(|view| view.state);
        if let Some(view) = outcome.challenge.as_ref().filter(|_| args.solve_challenge) {
            if let Some(answer) = answer_for(&view.question) {
                challenge = Some(service.answer_challenge(&session.session_id, &answer)?.state);
            }
        }
        service.end_session(&session.session_id)?;

        let details = outcome.result.details.as_ref();
        results.push(SimulatedSubmission {
            attempt,
            verdict: outcome
                .result
                .verdict()
                .map(|verdict| verdict.summary())
                .unwrap_or_else(|| "unknown".to_string()),
            trust_score: outcome.result.trust_score,
            human_score: details.map(|details| details.human_score).unwrap_or(0),
            errors: outcome.result.errors.clone(),
            challenge,
            delivered: notifier.delivered() > delivered_before,
        });
    }

    Ok(results)
}

fn visitor_form(honeypot: bool) -> ContactFormData {
    ContactFormData {
        first_name: "Jordan".to_string(),
        last_name: "Alvarez".to_string(),
        email: "jordan.alvarez@example.com".to_string(),
        phone: "(319) 555-0164".to_string(),
        message: None,
        website: if honeypot {
            "http://spam.biz".to_string()
        } else {
            String::new()
        },
        ..ContactFormData::default()
    }
}

fn activity_events(activity: ActivityArg) -> Vec<InteractionEvent> {
    let mut events = Vec::new();
    match activity {
        ActivityArg::None => {}
        ActivityArg::Light => {
            events.extend((0..12).map(|_| InteractionEvent::PointerMove { distance: 20.0 }));
            events.push(InteractionEvent::Scroll { distance: 120.0 });
            events.push(InteractionEvent::Click);
        }
        ActivityArg::Varied => {
            events.extend((0..90).map(|step| InteractionEvent::PointerMove {
                distance: 14.0 + f64::from(step % 6) * 8.0,
            }));
            events.extend((0..8).map(|_| InteractionEvent::Scroll { distance: 160.0 }));
            events.extend((0..6).map(|_| InteractionEvent::Click));
            events.push(InteractionEvent::KeyPress { trusted: true });
            events.push(InteractionEvent::Focus);
        }
    }
    events
}

/// Read the "What is a + b?" prompt the way a visitor would.
fn answer_for(question: &str) -> Option<String> {
    let (left, right) = question
        .strip_prefix("What is ")?
        .strip_suffix('?')?
        .split_once('+')?;
    let sum = left.trim().parse::<u32>().ok()? + right.trim().parse::<u32>().ok()?;
    Some(sum.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lead_guard::workflows::intake::{HONEYPOT_MESSAGE, RATE_LIMITED_MESSAGE};

    fn args(activity: ActivityArg) -> SimulateArgs {
        SimulateArgs {
            wizard: WizardArg::CustomBuild,
            elapsed_secs: 60,
            activity,
            honeypot: false,
            solve_challenge: false,
            submissions: 1,
            client_id: ClientId::parse("sim-visitor").expect("valid client id"),
        }
    }

    #[test]
    fn engaged_visitor_is_forwarded() {
        let results =
            simulate(&args(ActivityArg::Varied), &ProtectionSettings::default()).expect("runs");

        assert_eq!(results.len(), 1);
        assert!(results[0].delivered);
        assert!(results[0].trust_score >= 50);
        assert!(results[0].errors.is_empty());
        assert!(results[0].challenge.is_none());
    }

    #[test]
    fn silent_visitor_is_forwarded_after_solving_challenge() {
        let mut scenario = args(ActivityArg::None);
        scenario.solve_challenge = true;

        let results = simulate(&scenario, &ProtectionSettings::default()).expect("runs");

        assert_eq!(results[0].challenge, Some(ChallengeState::Verified));
        assert!(results[0].delivered);
    }

    #[test]
    fn silent_visitor_without_answer_is_held() {
        let results =
            simulate(&args(ActivityArg::None), &ProtectionSettings::default()).expect("runs");

        assert_eq!(results[0].challenge, Some(ChallengeState::Presented));
        assert!(!results[0].delivered);
    }

    #[test]
    fn decoy_field_blocks_delivery() {
        let mut scenario = args(ActivityArg::Varied);
        scenario.honeypot = true;

        let results = simulate(&scenario, &ProtectionSettings::default()).expect("runs");

        assert_eq!(results[0].trust_score, 0);
        assert_eq!(results[0].errors, vec![HONEYPOT_MESSAGE.to_string()]);
        assert!(!results[0].delivered);
    }

    #[test]
    fn fourth_submission_in_an_hour_is_rate_limited() {
        let mut scenario = args(ActivityArg::Varied);
        scenario.submissions = 4;

        let results = simulate(&scenario, &ProtectionSettings::default()).expect("runs");

        assert!(results[..3].iter().all(|entry| entry.delivered));
        assert_eq!(results[3].errors, vec![RATE_LIMITED_MESSAGE.to_string()]);
        assert!(!results[3].delivered);
    }

    #[test]
    fn lowered_threshold_accepts_silent_visitors() {
        let settings = ProtectionSettings {
            state_dir: None,
            trust_threshold: Some(40),
        };

        let results = simulate(&args(ActivityArg::None), &settings).expect("runs");

        assert!(results[0].delivered);
        assert!(results[0].challenge.is_none());
    }

    #[test]
    fn challenge_prompt_is_parsed() {
        assert_eq!(answer_for("What is 4 + 9?"), Some("13".to_string()));
        assert_eq!(answer_for("Type the word blue"), None);
    }
}
