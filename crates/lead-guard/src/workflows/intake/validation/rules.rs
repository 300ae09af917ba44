use super::super::fields::FieldChecks;
use super::config::TrustWeights;
use super::{TrustComponent, TrustFactor};

pub(crate) struct TrustInputs {
    pub elapsed_secs: f64,
    pub min_completion_secs: u32,
    pub human_score: u8,
    pub checks: FieldChecks,
    pub honeypot_clean: bool,
}

pub(crate) fn score_trust(inputs: &TrustInputs, weights: &TrustWeights) -> (Vec<TrustComponent>, u8) {
    let mut components = Vec::with_capacity(6);

    let time_adequate = inputs.elapsed_secs >= f64::from(inputs.min_completion_secs);
    components.push(if time_adequate {
        TrustComponent {
            factor: TrustFactor::CompletionTime,
            points: weights.completion_time,
            notes: format!(
                "completed in {:.1}s (minimum {}s)",
                inputs.elapsed_secs, inputs.min_completion_secs
            ),
        }
    } else {
        TrustComponent {
            factor: TrustFactor::CompletionTime,
            points: 0,
            notes: format!(
                "completed in {:.1}s, under the {}s minimum",
                inputs.elapsed_secs, inputs.min_completion_secs
            ),
        }
    });

    let human = u32::from(inputs.human_score.min(100));
    let behavior_points = ((human * u32::from(weights.behavior) + 50) / 100) as u8;
    components.push(TrustComponent {
        factor: TrustFactor::Behavior,
        points: behavior_points,
        notes: format!("human score {human}"),
    });

    components.push(flat(
        TrustFactor::Email,
        inputs.checks.email_valid,
        weights.email,
        "email accepted",
        "email rejected",
    ));
    components.push(flat(
        TrustFactor::Phone,
        inputs.checks.phone_valid,
        weights.phone,
        "phone accepted",
        "phone rejected",
    ));
    components.push(flat(
        TrustFactor::Message,
        inputs.checks.message_clean,
        weights.message,
        "message clean",
        "message flagged",
    ));
    components.push(flat(
        TrustFactor::Honeypot,
        inputs.honeypot_clean,
        weights.honeypot,
        "decoy fields empty",
        "decoy fields filled",
    ));

    let total: u32 = components.iter().map(|c| u32::from(c.points)).sum();
    (components, total.min(100) as u8)
}

fn flat(
    factor: TrustFactor,
    passed: bool,
    points: u8,
    passed_note: &str,
    failed_note: &str,
) -> TrustComponent {
    TrustComponent {
        factor,
        points: if passed { points } else { 0 },
        notes: if passed { passed_note } else { failed_note }.to_string(),
    }
}
