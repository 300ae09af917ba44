use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::behavior::InteractionEvent;
use super::challenge::ChallengeError;
use super::domain::{ClientId, ContactFormData, SessionId, WizardType};
use super::service::{IntakeServiceError, LeadIntakeService};
use super::store::{KeyValueStore, LeadNotifier};

/// Shown whenever the pipeline fails internally; the visitor can retry or phone instead.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Something went wrong while sending your request. Please try again or call us directly.";

#[derive(Debug, Deserialize)]
pub(crate) struct StartSessionRequest {
    pub(crate) wizard: WizardType,
    pub(crate) client_id: ClientId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RecordEventsRequest {
    #[serde(default)]
    pub(crate) events: Vec<InteractionEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChallengeAnswerRequest {
    pub(crate) answer: Value,
}

/// Router builder exposing the wizard-facing lead intake endpoints.
pub fn lead_router<S, N>(service: Arc<LeadIntakeService<S, N>>) -> Router
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    Router::new()
        .route("/api/v1/leads/sessions", post(start_session_handler::<S, N>))
        .route(
            "/api/v1/leads/sessions/:session_id",
            delete(end_session_handler::<S, N>).get(session_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/sessions/:session_id/events",
            post(record_events_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/sessions/:session_id/submit",
            post(submit_handler::<S, N>),
        )
        .route(
            "/api/v1/leads/sessions/:session_id/challenge",
            post(answer_challenge_handler::<S, N>).delete(cancel_challenge_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn start_session_handler<S, N>(
    State(service): State<Arc<LeadIntakeService<S, N>>>,
    axum::Json(request): axum::Json<StartSessionRequest>,
) -> Response
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    let view = service.start_session(request.wizard, request.client_id);
    (StatusCode::CREATED, axum::Json(view)).into_response()
}

pub(crate) async fn session_handler<S, N>(
    State(service): State<Arc<LeadIntakeService<S, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    match service.session(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn record_events_handler<S, N>(
    State(service): State<Arc<LeadIntakeService<S, N>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<RecordEventsRequest>,
) -> Response
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    match service.record_events(&SessionId(session_id), &request.events) {
        Ok(recorded) => {
            let payload = json!({
                "received": request.events.len(),
                "recorded": recorded,
            });
            (StatusCode::ACCEPTED, axum::Json(payload)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler<S, N>(
    State(service): State<Arc<LeadIntakeService<S, N>>>,
    Path(session_id): Path<String>,
    axum::Json(form): axum::Json<ContactFormData>,
) -> Response
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    match service.validate_and_submit(&SessionId(session_id), form) {
        Ok(outcome) => {
            let status = if outcome.result.is_valid {
                StatusCode::ACCEPTED
            } else if outcome.result.requires_additional_verification {
                StatusCode::OK
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            (status, axum::Json(outcome)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn answer_challenge_handler<S, N>(
    State(service): State<Arc<LeadIntakeService<S, N>>>,
    Path(session_id): Path<String>,
    axum::Json(request): axum::Json<ChallengeAnswerRequest>,
) -> Response
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    let answer = match request.answer {
        Value::String(text) => text,
        other => other.to_string(),
    };

    match service.answer_challenge(&SessionId(session_id), &answer) {
        Ok(view) => {
            let status = if view.error.is_some() {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                StatusCode::OK
            };
            (status, axum::Json(view)).into_response()
        }
        Err(err) => error_response(err),
    }
}

pub(crate) async fn cancel_challenge_handler<S, N>(
    State(service): State<Arc<LeadIntakeService<S, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    match service.cancel_challenge(&SessionId(session_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn end_session_handler<S, N>(
    State(service): State<Arc<LeadIntakeService<S, N>>>,
    Path(session_id): Path<String>,
) -> Response
where
    S: KeyValueStore + 'static,
    N: LeadNotifier + 'static,
{
    match service.end_session(&SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: IntakeServiceError) -> Response {
    let (status, message) = match &err {
        IntakeServiceError::SessionNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        IntakeServiceError::NoPendingChallenge(_)
        | IntakeServiceError::Challenge(ChallengeError::Cancelled) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        IntakeServiceError::Store(_) | IntakeServiceError::Notify(_) => {
            error!(error = %err, "lead intake failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                GENERIC_FAILURE_MESSAGE.to_string(),
            )
        }
    };

    (status, axum::Json(json!({ "error": message }))).into_response()
}
