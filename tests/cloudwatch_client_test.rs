use rask_log_batcher::domain::Destination;
use rask_log_batcher::sender::{
    ClientConfig, CloudWatchClient, ContinuationToken, CreateOutcome, DeliveryClient,
    DeliveryError, LogEvent,
};
use serde_json::json;
use std::time::Duration;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path},
};

fn client_for(server: &MockServer) -> CloudWatchClient {
    let config = ClientConfig {
        endpoint: Some(server.uri()),
        timeout: Duration::from_secs(5),
        connection_timeout: Duration::from_secs(2),
        user_agent: "test-client/1.0".to_string(),
        ..Default::default()
    };
    CloudWatchClient::new(config).unwrap()
}

fn destination() -> Destination {
    Destination::new("app-logs", "stream-1", "eu-west-1")
}

fn events() -> Vec<LogEvent> {
    vec![
        LogEvent {
            timestamp: 1_700_000_000_000,
            message: r#"{"message":"one"}"#.to_string(),
        },
        LogEvent {
            timestamp: 1_700_000_000_001,
            message: r#"{"message":"two"}"#.to_string(),
        },
    ]
}

fn service_error(kind: &str, message: &str) -> serde_json::Value {
    json!({ "__type": format!("com.amazonaws.logs#{kind}"), "message": message })
}

#[tokio::test]
async fn test_create_stream_created() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(header("x-amz-target", "Logs_20140328.CreateLogStream"))
        .and(header("content-type", "application/x-amz-json-1.1"))
        .and(body_partial_json(json!({
            "logGroupName": "app-logs",
            "logStreamName": "stream-1"
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let outcome = client.create_stream("app-logs", "stream-1").await.unwrap();

    assert_eq!(outcome, CreateOutcome::Created);
}

#[tokio::test]
async fn test_create_group_already_exists_is_not_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", "Logs_20140328.CreateLogGroup"))
        .and(body_partial_json(json!({ "logGroupName": "app-logs" })))
        .respond_with(ResponseTemplate::new(400).set_body_json(service_error(
            "ResourceAlreadyExistsException",
            "The specified log group already exists",
        )))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let outcome = client.create_group("app-logs").await.unwrap();

    assert_eq!(outcome, CreateOutcome::AlreadyExists);
}

#[tokio::test]
async fn test_create_group_access_denied() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", "Logs_20140328.CreateLogGroup"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(service_error("AccessDeniedException", "not allowed")),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    match client.create_group("app-logs").await {
        Err(DeliveryError::Service { code, message }) => {
            assert_eq!(code, "AccessDeniedException");
            assert_eq!(message, "not allowed");
        }
        other => panic!("Expected Service error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_submit_batch_returns_next_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", "Logs_20140328.PutLogEvents"))
        .and(body_partial_json(json!({
            "logGroupName": "app-logs",
            "logStreamName": "stream-1",
            "sequenceToken": "T1",
            "logEvents": [
                { "timestamp": 1_700_000_000_000i64, "message": "{\"message\":\"one\"}" },
                { "timestamp": 1_700_000_000_001i64, "message": "{\"message\":\"two\"}" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextSequenceToken": "T2"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let next = client
        .submit_batch(&destination(), &events(), &ContinuationToken::new("T1"))
        .await
        .unwrap();

    assert_eq!(next, ContinuationToken::new("T2"));
}

#[tokio::test]
async fn test_first_submission_carries_no_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", "Logs_20140328.PutLogEvents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextSequenceToken": "T1"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client
        .submit_batch(&destination(), &events(), &ContinuationToken::none())
        .await
        .unwrap();

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body.get("sequenceToken").is_none());
    assert_eq!(body["logEvents"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_submit_batch_without_next_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let next = client
        .submit_batch(&destination(), &events(), &ContinuationToken::new("T1"))
        .await
        .unwrap();

    assert!(next.is_none());
}

#[tokio::test]
async fn test_invalid_sequence_token_reports_expected_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", "Logs_20140328.PutLogEvents"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "com.amazonaws.logs#InvalidSequenceTokenException",
            "message": "The given sequenceToken is invalid. The next expected sequenceToken is: T9",
            "expectedSequenceToken": "T9"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .submit_batch(&destination(), &events(), &ContinuationToken::new("T1"))
        .await;

    match result {
        Err(DeliveryError::SequenceConflict { expected }) => {
            assert_eq!(expected, ContinuationToken::new("T9"));
        }
        other => panic!("Expected SequenceConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn test_data_already_accepted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "__type": "DataAlreadyAcceptedException",
            "message": "The given batch of log events has already been accepted.",
            "expectedSequenceToken": "T5"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .submit_batch(&destination(), &events(), &ContinuationToken::new("T4"))
        .await;

    match result {
        Err(DeliveryError::AlreadyAccepted { expected }) => {
            assert_eq!(expected, ContinuationToken::new("T5"));
        }
        other => panic!("Expected AlreadyAccepted, got {other:?}"),
    }
}

#[tokio::test]
async fn test_throttling_is_a_service_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(service_error("ThrottlingException", "Rate exceeded")),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .submit_batch(&destination(), &events(), &ContinuationToken::none())
        .await;

    match result {
        Err(DeliveryError::Service { code, .. }) => assert_eq!(code, "ThrottlingException"),
        other => panic!("Expected Service error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_untyped_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .submit_batch(&destination(), &events(), &ContinuationToken::none())
        .await;

    match result {
        Err(DeliveryError::Http { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Internal Server Error");
        }
        other => panic!("Expected Http error, got {other:?}"),
    }

    let stats = client.connection_stats();
    assert_eq!(stats.total_requests, 1);
    assert_eq!(stats.successful_requests, 0);
    assert_eq!(stats.failed_requests, 1);
}

#[tokio::test]
async fn test_slow_service_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&mock_server)
        .await;

    let config = ClientConfig {
        endpoint: Some(mock_server.uri()),
        timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let client = CloudWatchClient::new(config).unwrap();

    let result = client.create_stream("app-logs", "stream-1").await;
    assert!(matches!(result, Err(DeliveryError::Timeout)));
}

#[tokio::test]
async fn test_connection_stats_track_requests() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("x-amz-target", "Logs_20140328.CreateLogStream"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(header("x-amz-target", "Logs_20140328.PutLogEvents"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "nextSequenceToken": "T1"
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    client.create_stream("app-logs", "stream-1").await.unwrap();
    client
        .submit_batch(&destination(), &events(), &ContinuationToken::none())
        .await
        .unwrap();

    let stats = client.connection_stats();
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.successful_requests, 2);
    assert_eq!(stats.failed_requests, 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_a_transport_error() {
    let config = ClientConfig {
        endpoint: Some("http://127.0.0.1:1/".to_string()),
        timeout: Duration::from_secs(2),
        connection_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let client = CloudWatchClient::new(config).unwrap();

    let result = client.create_group("app-logs").await;
    assert!(matches!(result, Err(DeliveryError::Transport(_))));
    assert_eq!(client.connection_stats().failed_requests, 1);
}
