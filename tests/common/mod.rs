#![allow(dead_code)]

use parking_lot::Mutex;
use rask_log_batcher::domain::Destination;
use rask_log_batcher::sender::{
    ContinuationToken, CreateOutcome, DeliveryClient, DeliveryError, LogEvent,
};
use rask_log_batcher::{LogShipper, ShipperConfig};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// One `submit_batch` call as the service saw it.
#[derive(Debug, Clone)]
pub struct Submission {
    pub messages: Vec<String>,
    pub payloads: Vec<serde_json::Value>,
    pub timestamps: Vec<i64>,
    pub token: ContinuationToken,
    pub at: Instant,
}

/// In-memory `DeliveryClient` that records every call and answers from a
/// script, falling back to success.
#[derive(Default)]
pub struct RecordingClient {
    submissions: Mutex<Vec<Submission>>,
    answers: Mutex<VecDeque<Result<ContinuationToken, DeliveryError>>>,
    stream_failures: Mutex<VecDeque<DeliveryError>>,
    stream_calls: AtomicUsize,
    group_calls: AtomicUsize,
    issued: AtomicUsize,
    submit_delay: Option<Duration>,
    conflict_forever: Option<ContinuationToken>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn answer(self, answer: Result<ContinuationToken, DeliveryError>) -> Self {
        self.answers.lock().push_back(answer);
        self
    }

    /// Every `submit_batch` sleeps this long before it is recorded.
    pub fn delay_submissions(mut self, delay: Duration) -> Self {
        self.submit_delay = Some(delay);
        self
    }

    /// Once the script runs out, every submission is answered with a
    /// sequence conflict expecting `expected`.
    pub fn conflict_forever(mut self, expected: ContinuationToken) -> Self {
        self.conflict_forever = Some(expected);
        self
    }

    pub fn fail_stream_creation(self, error: DeliveryError) -> Self {
        self.stream_failures.lock().push_back(error);
        self
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().clone()
    }

    pub fn submitted_messages(&self) -> Vec<Vec<String>> {
        self.submissions
            .lock()
            .iter()
            .map(|s| s.messages.clone())
            .collect()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    pub fn group_calls(&self) -> usize {
        self.group_calls.load(Ordering::SeqCst)
    }
}

impl DeliveryClient for RecordingClient {
    async fn create_group(&self, _group: &str) -> Result<CreateOutcome, DeliveryError> {
        self.group_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CreateOutcome::AlreadyExists)
    }

    async fn create_stream(
        &self,
        _group: &str,
        _stream: &str,
    ) -> Result<CreateOutcome, DeliveryError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        match self.stream_failures.lock().pop_front() {
            Some(error) => Err(error),
            None => Ok(CreateOutcome::Created),
        }
    }

    async fn submit_batch(
        &self,
        _destination: &Destination,
        events: &[LogEvent],
        token: &ContinuationToken,
    ) -> Result<ContinuationToken, DeliveryError> {
        if let Some(delay) = self.submit_delay {
            tokio::time::sleep(delay).await;
        }

        let payloads: Vec<serde_json::Value> = events
            .iter()
            .map(|e| serde_json::from_str(&e.message).expect("payload is JSON"))
            .collect();
        let messages = payloads
            .iter()
            .map(|p| p["message"].as_str().unwrap_or_default().to_string())
            .collect();

        self.submissions.lock().push(Submission {
            messages,
            payloads,
            timestamps: events.iter().map(|e| e.timestamp).collect(),
            token: token.clone(),
            at: Instant::now(),
        });

        if let Some(scripted) = self.answers.lock().pop_front() {
            return scripted;
        }
        if let Some(expected) = &self.conflict_forever {
            return Err(DeliveryError::SequenceConflict {
                expected: expected.clone(),
            });
        }
        let n = self.issued.fetch_add(1, Ordering::SeqCst);
        Ok(ContinuationToken::new(format!("token-{n}")))
    }
}

pub fn shipper_config(max_batch_size: usize, poll_interval: Duration) -> ShipperConfig {
    ShipperConfig {
        log_group_name: "test-group".to_string(),
        log_stream_name: Some("test-stream".to_string()),
        max_batch_size,
        poll_interval,
        ..ShipperConfig::default()
    }
}

pub fn started_shipper(
    client: RecordingClient,
    max_batch_size: usize,
    poll_interval: Duration,
) -> Arc<LogShipper<Arc<RecordingClient>>> {
    let shipper = LogShipper::new(
        shipper_config(max_batch_size, poll_interval),
        Arc::new(client),
    )
    .expect("valid config");
    shipper.start().expect("inside a runtime");
    Arc::new(shipper)
}
