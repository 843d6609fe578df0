//! Porch client tests against a mock server: pipeline registration, token
//! minting, and the task lifecycle from submission to completion.

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use seqnotify::ont::{ContactEmail, EventType};
use seqnotify::porch::{PipelineSpec, PorchClient, PorchClientConfig, TaskStatus};
use seqnotify::NotifyError;

fn test_pipeline() -> PipelineSpec {
    PipelineSpec {
        name: "ont-event-email".to_string(),
        uri: "https://gitlab.example.com/seq/seqnotify".to_string(),
        version: "1.0.0".to_string(),
    }
}

fn pipeline_json() -> serde_json::Value {
    json!({
        "name": "ont-event-email",
        "uri": "https://gitlab.example.com/seq/seqnotify",
        "version": "1.0.0"
    })
}

fn test_client(server: &MockServer, max_retries: u32) -> PorchClient {
    let config = PorchClientConfig {
        base_url: server.uri(),
        timeout_ms: 5_000,
        max_retries,
        admin_token: Some("admin-token".to_string()),
        pipeline_token: Some("task-token".to_string()),
        ca_cert_file: None,
    };
    PorchClient::new(config, test_pipeline()).unwrap()
}

fn test_task() -> ContactEmail {
    ContactEmail::new(
        "experiment1",
        1,
        "FAKE12345",
        "/testZone/home/irods/experiment1_1_FAKE12345",
        EventType::Uploaded,
    )
    .unwrap()
}

fn task_input_json() -> serde_json::Value {
    json!({
        "experiment_name": "experiment1",
        "instrument_slot": 1,
        "flowcell_id": "FAKE12345",
        "path": "/testZone/home/irods/experiment1_1_FAKE12345",
        "event": "uploaded"
    })
}

#[tokio::test]
async fn register_pipeline_posts_pipeline_document() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pipelines/"))
        .and(header("authorization", "Bearer admin-token"))
        .and(body_json(pipeline_json()))
        .respond_with(ResponseTemplate::new(201).set_body_json(pipeline_json()))
        .expect(1)
        .mount(&server)
        .await;

    test_client(&server, 1).register_pipeline().await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn register_pipeline_accepts_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pipelines/"))
        .respond_with(ResponseTemplate::new(409).set_body_string("Pipeline already exists"))
        .expect(1)
        .mount(&server)
        .await;

    // An existing registration is not an error
    test_client(&server, 1).register_pipeline().await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn create_token_returns_token_string() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pipelines/ont-event-email/token/deployment"))
        .and(header("authorization", "Bearer admin-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "ont-event-email",
            "description": "deployment",
            "token": "dbfcb0fa2a9bdd37a95e"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = test_client(&server, 1)
        .create_token("deployment")
        .await
        .unwrap();
    assert_eq!(token, "dbfcb0fa2a9bdd37a95e");
    server.verify().await;
}

#[tokio::test]
async fn add_task_reports_created_and_existing() {
    let server = MockServer::start().await;
    let envelope = json!({
        "pipeline": pipeline_json(),
        "task_input": task_input_json(),
        "status": "PENDING"
    });

    // First submission creates the task, the second finds it in place.
    Mock::given(method("POST"))
        .and(path("/tasks/"))
        .and(header("authorization", "Bearer task-token"))
        .and(body_json(envelope.clone()))
        .respond_with(ResponseTemplate::new(201).set_body_json(envelope.clone()))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tasks/"))
        .and(body_json(envelope.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_json(envelope))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server, 1);
    let task = test_task();
    assert!(client.add_task(&task).await.unwrap());
    assert!(!client.add_task(&task).await.unwrap());
    server.verify().await;
}

#[tokio::test]
async fn claim_tasks_sends_pipeline_and_parses_views() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/claim/"))
        .and(query_param("num_tasks", "2"))
        .and(header("authorization", "Bearer task-token"))
        .and(body_json(pipeline_json()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "pipeline": pipeline_json(),
                "task_input": task_input_json(),
                "status": "CLAIMED"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let claimed = test_client(&server, 1)
        .claim_tasks::<ContactEmail>(2)
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert_eq!(claimed[0].status, TaskStatus::Claimed);
    assert_eq!(claimed[0].task_input, test_task());
    server.verify().await;
}

#[tokio::test]
async fn update_task_puts_new_status() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/tasks/"))
        .and(header("authorization", "Bearer task-token"))
        .and(body_json(json!({
            "pipeline": pipeline_json(),
            "task_input": task_input_json(),
            "status": "DONE"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "DONE"})))
        .expect(1)
        .mount(&server)
        .await;

    test_client(&server, 1)
        .update_task(&test_task(), TaskStatus::Done)
        .await
        .unwrap();
    server.verify().await;
}

#[tokio::test]
async fn list_tasks_filters_by_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tasks/"))
        .and(query_param("pipeline_name", "ont-event-email"))
        .and(query_param("status", "FAILED"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "pipeline": pipeline_json(),
                "task_input": task_input_json(),
                "status": "FAILED"
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let tasks = test_client(&server, 1)
        .list_tasks::<ContactEmail>(Some(TaskStatus::Failed))
        .await
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].status, TaskStatus::Failed);
    server.verify().await;
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/"))
        .respond_with(ResponseTemplate::new(422).set_body_string("Unprocessable Entity"))
        .expect(1)
        .mount(&server)
        .await;

    let result = test_client(&server, 3).add_task(&test_task()).await;
    match result {
        Err(NotifyError::ApiError {
            service, status, ..
        }) => {
            assert_eq!(service, "porch");
            assert_eq!(status, 422);
        }
        other => panic!("Expected ApiError, got {:?}", other),
    }
    // expect(1) above proves no retry happened
    server.verify().await;
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/claim/"))
        .respond_with(ResponseTemplate::new(503).set_body_string("Service Unavailable"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/tasks/claim/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let claimed = test_client(&server, 3)
        .claim_tasks::<ContactEmail>(1)
        .await
        .unwrap();
    assert!(claimed.is_empty());
    server.verify().await;
}

#[tokio::test]
async fn server_errors_surface_after_retries_run_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tasks/claim/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let result = test_client(&server, 1).claim_tasks::<ContactEmail>(1).await;
    match result {
        Err(NotifyError::ApiError { status, .. }) => assert_eq!(status, 500),
        other => panic!("Expected ApiError, got {:?}", other),
    }
    server.verify().await;
}

#[tokio::test]
async fn missing_pipeline_token_fails_before_sending() {
    let server = MockServer::start().await;
    let config = PorchClientConfig {
        base_url: server.uri(),
        admin_token: Some("admin-token".to_string()),
        pipeline_token: None,
        ..Default::default()
    };
    let client = PorchClient::new(config, test_pipeline()).unwrap();

    let result = client.add_task(&test_task()).await;
    assert!(matches!(result, Err(NotifyError::ConfigError(_))));
    // No request reaches the server
    assert!(server.received_requests().await.unwrap().is_empty());
}
