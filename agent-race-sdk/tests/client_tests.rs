// HTTP contract tests against a mock race backend

use std::time::Duration;

use agent_race_sdk::{
    AgentRaceClient, ParticipantStatus, RaceController, RaceId, RaceStatus, RunId, RunState,
    SdkConfig, SdkError, StreamEvent, StreamState,
};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ===== Setup Helpers =====

fn client_for(server: &MockServer) -> AgentRaceClient {
    let config = SdkConfig::new(server.uri())
        .with_retry_backoff(Duration::from_millis(1), Duration::from_millis(5));
    AgentRaceClient::new(config).unwrap()
}

fn race_json(status: &str, agent: Value, human: Value) -> Value {
    json!({
        "race_id": "race-1",
        "status": status,
        "task": {
            "title": "Find the cheapest flight",
            "summary": "Look up a one-way fare",
            "human_instructions": "Search for the fare and type it in.",
            "agent_instructions": "Search for the fare and report it.",
            "task_type": "text_entry",
            "success_criteria": "A price in USD",
            "expected_output_description": "A number",
            "evaluation_guidelines": ["Price must be plausible"]
        },
        "agent": agent,
        "human": human,
        "verdict": null
    })
}

fn pending() -> Value {
    json!({ "status": "pending" })
}

fn sse_body(frames: &[(&str, Value)]) -> String {
    frames
        .iter()
        .map(|(event, data)| format!("event: {}\ndata: {}\n\n", event, data))
        .collect()
}

async fn wait_for_session<F>(controller: &RaceController<AgentRaceClient>, mut done: F)
where
    F: FnMut(&agent_race_sdk::RaceSession) -> bool,
{
    let mut updates = controller.subscribe();
    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(|s| done(s)))
        .await
        .expect("session did not reach the expected state")
        .unwrap();
}

// ===== Race Endpoint Tests =====

#[tokio::test]
async fn test_create_race_unwraps_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/race"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "race": race_json("ready", pending(), pending()) })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let race = client_for(&server).races().create().await.unwrap();

    assert_eq!(race.id, RaceId::new("race-1"));
    assert_eq!(race.status, RaceStatus::Ready);
    assert_eq!(race.task.unwrap().evaluation_guidelines.len(), 1);
}

#[tokio::test]
async fn test_null_submission_is_sent_as_null() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/race/race-1/human/submit"))
        .and(body_json(json!({ "submission": null })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "race": race_json("awaiting_human", pending(), json!({ "status": "completed" }))
        })))
        .expect(1)
        .mount(&server)
        .await;

    let race = client_for(&server)
        .races()
        .submit_human(&RaceId::new("race-1"), None)
        .await
        .unwrap();

    assert_eq!(race.human.status, ParticipantStatus::Completed);
}

#[tokio::test]
async fn test_error_carries_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/race/missing/human/start"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Unknown race id" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .races()
        .start_human(&RaceId::new("missing"))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(404));
    match err {
        SdkError::ApiError { detail, .. } => assert_eq!(detail.as_deref(), Some("Unknown race id")),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_success_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/race/race-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .races()
        .get(&RaceId::new("race-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, SdkError::SerializationError(_)));
}

// ===== Retry Tests =====

#[tokio::test]
async fn test_get_is_retried_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/race/race-1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/race/race-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "race": race_json("judging", pending(), pending()) })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let race = client_for(&server)
        .races()
        .get(&RaceId::new("race-1"))
        .await
        .unwrap();

    assert_eq!(race.status, RaceStatus::Judging);
}

#[tokio::test]
async fn test_post_is_never_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/race"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server).races().create().await.unwrap_err();

    assert_eq!(err.status_code(), Some(503));
    assert_eq!(err.to_string(), "Request failed (503): overloaded");
}

// ===== Run Endpoint Tests =====

#[tokio::test]
async fn test_start_run_and_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run"))
        .and(body_json(json!({ "task": "Find the pricing page" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "run_id": "run-9" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/run/run-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "run_id": "run-9",
            "task": "Find the pricing page",
            "state": "running"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let handle = client.runs().start("Find the pricing page").await.unwrap();
    let status = client.runs().status(&handle.run_id).await.unwrap();

    assert_eq!(handle.run_id, RunId::new("run-9"));
    assert_eq!(status.state, RunState::Running);
}

#[tokio::test]
async fn test_short_run_task_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/run"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = client_for(&server).runs().start("x").await.unwrap_err();
    assert!(matches!(err, SdkError::ValidationError(_)));
}

// ===== Event Stream Tests =====

#[tokio::test]
async fn test_event_stream_decodes_named_frames() {
    let server = MockServer::start().await;
    let body = format!(
        ": connected\n\n{}data: {{\"message\": \"heartbeat\"}}\n\nevent: log\ndata: not json\n\n{}",
        sse_body(&[
            ("status", json!({ "type": "status", "status": "running" })),
            ("log", json!({ "type": "log", "message": "step 1" })),
        ]),
        sse_body(&[("complete", json!({ "type": "complete" }))]),
    );
    Mock::given(method("GET"))
        .and(path("/run/run-1/events"))
        .and(header("accept", "text/event-stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let stream = client_for(&server)
        .runs()
        .events(&RunId::new("run-1"))
        .await
        .unwrap();
    let events: Vec<StreamEvent> = stream.map(|e| e.unwrap()).collect().await;

    assert_eq!(
        events,
        vec![
            StreamEvent::status("running"),
            StreamEvent::log("step 1"),
            StreamEvent::Message {
                message: Some("heartbeat".to_string())
            },
            StreamEvent::Complete,
        ]
    );
}

#[tokio::test]
async fn test_event_stream_unknown_run_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/run/nope/events"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "detail": "Unknown run id" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .races()
        .events(&RunId::new("nope"))
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(404));
}

// ===== Full Race Flow =====

#[tokio::test]
async fn test_race_flow_over_http() {
    let server = MockServer::start().await;
    let running = json!({ "status": "running" });

    Mock::given(method("POST"))
        .and(path("/race"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "race": race_json("ready", pending(), pending()) })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/race/race-1/human/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "race": race_json("running", pending(), running.clone())
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/race/race-1/agent/start"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "race": race_json("running", json!({ "status": "starting" }), running.clone()),
            "run_id": "run-1"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let events = sse_body(&[
        ("status", json!({ "type": "status", "status": "running" })),
        ("status", json!({ "type": "status", "status": "running" })),
        ("status", json!({ "type": "status", "status": "running" })),
        (
            "live_url",
            json!({ "type": "live_url", "url": "https://live.browser-use.com/abc\u{1b}[0m   " }),
        ),
        ("result", json!({ "type": "result", "result": "$129" })),
        ("complete", json!({ "type": "complete" })),
    ]);
    Mock::given(method("GET"))
        .and(path("/run/run-1/events"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(events, "text/event-stream"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/race/race-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "race": race_json(
                "awaiting_human",
                json!({
                    "status": "completed",
                    "live_url": "https://live.browser-use.com/abc",
                    "result": "$129",
                    "duration_seconds": 41.5
                }),
                running
            )
        })))
        .expect(1)
        .mount(&server)
        .await;

    let controller = RaceController::new(client_for(&server));
    controller.create_race().await.unwrap();
    controller.start_race().await.unwrap();

    wait_for_session(&controller, |s| {
        matches!(s.stream_state(), StreamState::Closed(_))
            && !s.busy().refreshing
            && s.race().is_some_and(|r| r.status == RaceStatus::AwaitingHuman)
    })
    .await;

    let session = controller.snapshot();
    let agent = &session.race().unwrap().agent;
    assert_eq!(agent.status, ParticipantStatus::Completed);
    assert_eq!(agent.live_url.as_deref(), Some("https://live.browser-use.com/abc"));
    assert_eq!(agent.result.as_deref(), Some("$129"));
    assert_eq!(session.error(), None);
    assert!(session.prompt_revealed());
}
