use super::common::*;
use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::intake::domain::WizardType;
use crate::workflows::intake::router::{
    answer_challenge_handler, submit_handler, ChallengeAnswerRequest,
};
use crate::workflows::intake::service::LeadIntakeService;
use crate::workflows::intake::store::MemoryStore;
use crate::workflows::intake::{lead_router, GENERIC_FAILURE_MESSAGE};

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

#[tokio::test]
async fn session_route_creates_tracking_sessions() {
    let h = harness();
    let router = lead_router(h.service.clone());

    let response = router
        .oneshot(json_request(
            "POST",
            "/api/v1/leads/sessions",
            json!({ "wizard": "custom_build", "client_id": "v-7f3a" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["wizard"], "custom_build");
    assert_eq!(payload["client_id"], "v-7f3a");
    assert!(payload["session_id"]
        .as_str()
        .is_some_and(|id| id.starts_with("sess-")));
    assert_eq!(h.service.active_sessions(), 1);
}

#[tokio::test]
async fn session_route_requires_a_usable_client_id() {
    let h = harness();

    for body in [
        json!({ "wizard": "remodeling" }),
        json!({ "wizard": "remodeling", "client_id": "" }),
        json!({ "wizard": "remodeling", "client_id": "../../etc/passwd" }),
    ] {
        let response = lead_router(h.service.clone())
            .oneshot(json_request("POST", "/api/v1/leads/sessions", body))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
    assert_eq!(h.service.active_sessions(), 0);
}

#[tokio::test]
async fn unknown_sessions_return_not_found() {
    let h = harness();
    let router = lead_router(h.service.clone());

    let response = router
        .oneshot(empty_request("GET", "/api/v1/leads/sessions/sess-unknown"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .is_some_and(|message| message.contains("sess-unknown")));
}

#[tokio::test]
async fn human_submissions_are_accepted() {
    let h = harness();
    let session = h.service.start_session(WizardType::Remodeling, visitor("dana"));
    let uri = format!("/api/v1/leads/sessions/{}", session.session_id);
    h.clock.advance_secs(60);

    let events: Vec<Value> = varied_activity()
        .iter()
        .map(|event| serde_json::to_value(event).expect("event serializes"))
        .collect();
    let response = lead_router(h.service.clone())
        .oneshot(json_request(
            "POST",
            &format!("{uri}/events"),
            json!({ "events": events }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["recorded"], 106);

    let form = serde_json::to_value(valid_form()).expect("form serializes");
    let response = lead_router(h.service.clone())
        .oneshot(json_request("POST", &format!("{uri}/submit"), form))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["result"]["is_valid"], true);
    assert!(payload.get("challenge").is_none());
    assert_eq!(h.notifier.events().len(), 1);
}

#[tokio::test]
async fn fast_submissions_are_unprocessable() {
    let h = harness();
    let session = h.service.start_session(WizardType::CustomBuild, visitor("dana"));
    h.clock.advance_secs(2);

    let response = submit_handler::<MemoryStore, MemoryNotifier>(
        State(h.service.clone()),
        Path(session.session_id.0.clone()),
        axum::Json(valid_form()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["result"]["trust_score"], 35);
    assert_eq!(payload["result"]["requires_additional_verification"], false);
}

#[tokio::test]
async fn low_trust_submissions_receive_a_challenge() {
    let h = harness();
    let session = h.service.start_session(WizardType::CustomBuild, visitor("dana"));
    let uri = format!("/api/v1/leads/sessions/{}", session.session_id);
    h.clock.advance_secs(60);

    let form = serde_json::to_value(valid_form()).expect("form serializes");
    let response = lead_router(h.service.clone())
        .oneshot(json_request("POST", &format!("{uri}/submit"), form))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["result"]["requires_additional_verification"], true);
    assert_eq!(payload["challenge"]["state"], "presented");
    let question = payload["challenge"]["question"]
        .as_str()
        .expect("question present")
        .to_string();

    let response = lead_router(h.service.clone())
        .oneshot(json_request(
            "POST",
            &format!("{uri}/challenge"),
            json!({ "answer": "banana" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let sum: i64 = solve(&question).parse().expect("numeric answer");
    let response = lead_router(h.service.clone())
        .oneshot(json_request(
            "POST",
            &format!("{uri}/challenge"),
            json!({ "answer": sum }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["state"], "verified");
    assert_eq!(payload["lead_delivered"], true);
    assert_eq!(h.notifier.events().len(), 1);
}

#[tokio::test]
async fn answering_without_a_challenge_conflicts() {
    let h = harness();
    let session = h.service.start_session(WizardType::Remodeling, visitor("dana"));

    let response = answer_challenge_handler::<MemoryStore, MemoryNotifier>(
        State(h.service.clone()),
        Path(session.session_id.0.clone()),
        axum::Json(ChallengeAnswerRequest { answer: json!("7") }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn internal_failures_return_generic_message() {
    let service = Arc::new(LeadIntakeService::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryNotifier::default()),
    ));
    let session = service.start_session(WizardType::CustomBuild, visitor("dana"));

    let response = submit_handler::<UnavailableStore, MemoryNotifier>(
        State(service),
        Path(session.session_id.0.clone()),
        axum::Json(valid_form()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = read_json_body(response).await;
    assert_eq!(payload["error"], GENERIC_FAILURE_MESSAGE);
}

#[tokio::test]
async fn deleting_a_session_returns_no_content() {
    let h = harness();
    let session = h.service.start_session(WizardType::Remodeling, visitor("dana"));
    let uri = format!("/api/v1/leads/sessions/{}", session.session_id);

    let response = lead_router(h.service.clone())
        .oneshot(empty_request("DELETE", &uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(h.service.active_sessions(), 0);

    let response = lead_router(h.service.clone())
        .oneshot(empty_request("DELETE", &uri))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
