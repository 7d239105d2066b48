use super::client::{ContinuationToken, CreateOutcome, DeliveryClient, DeliveryError};
use super::serialization::LogEvent;
use crate::domain::Destination;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

const TARGET_PREFIX: &str = "Logs_20140328";
const CONTENT_TYPE_JSON: &str = "application/x-amz-json-1.1";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Overrides the regional endpoint, e.g. for a local emulator or a
    /// signing proxy.
    pub endpoint: Option<String>,
    pub region: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: crate::app::config::DEFAULT_REGION.to_string(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            user_agent: format!("rask-log-batcher/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn endpoint_url(&self) -> Result<Url, DeliveryError> {
        let raw = match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://logs.{}.amazonaws.com/", self.region),
        };
        raw.parse().map_err(|e| {
            DeliveryError::InvalidConfiguration(format!("Invalid endpoint URL '{raw}': {e}"))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
}

#[derive(Debug, Default)]
struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time: AtomicU64,
}

impl ClientStats {
    fn record_request(&self, success: bool, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogGroupRequest<'a> {
    log_group_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateLogStreamRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsRequest<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    log_events: &'a [LogEvent],
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: Option<String>,
    rejected_log_events_info: Option<serde_json::Value>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ServiceErrorBody {
    #[serde(rename = "__type")]
    kind: Option<String>,
    #[serde(alias = "Message")]
    message: Option<String>,
    expected_sequence_token: Option<String>,
}

impl ServiceErrorBody {
    /// `com.amazonaws.logs#InvalidSequenceTokenException` → `InvalidSequenceTokenException`
    fn code(&self) -> Option<&str> {
        self.kind
            .as_deref()
            .map(|kind| kind.rsplit('#').next().unwrap_or(kind))
    }
}

/// `DeliveryClient` speaking the CloudWatch Logs JSON 1.1 protocol over HTTP.
///
/// Requests are not signed; point `endpoint` at something that signs or does
/// not require it.
#[derive(Debug, Clone)]
pub struct CloudWatchClient {
    client: Client,
    config: ClientConfig,
    endpoint: Url,
    stats: Arc<ClientStats>,
}

impl CloudWatchClient {
    pub fn new(config: ClientConfig) -> Result<Self, DeliveryError> {
        let endpoint = config.endpoint_url()?;

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            endpoint,
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn region(&self) -> &str {
        &self.config.region
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        let total_requests = self.stats.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.stats.total_response_time.load(Ordering::Relaxed);

        ConnectionStats {
            total_requests,
            successful_requests: self.stats.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.stats.failed_requests.load(Ordering::Relaxed),
            average_response_time: if total_requests > 0 {
                Duration::from_millis(total_response_time / total_requests)
            } else {
                Duration::ZERO
            },
        }
    }

    fn headers(&self, action: &str) -> Result<HeaderMap, DeliveryError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        headers.insert(
            "x-amz-target",
            HeaderValue::from_str(&format!("{TARGET_PREFIX}.{action}")).map_err(|e| {
                DeliveryError::InvalidConfiguration(format!("Invalid target header: {e}"))
            })?,
        );
        Ok(headers)
    }

    /// Posts one action. The outer error covers transport problems; the inner
    /// `Err` is a non-2xx answer from the service.
    async fn call<T: Serialize>(
        &self,
        action: &str,
        body: &T,
    ) -> Result<Result<String, ServiceFailure>, DeliveryError> {
        let payload = serde_json::to_vec(body)
            .map_err(|e| DeliveryError::InvalidResponse(format!("Failed to encode request: {e}")))?;

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.headers(action)?)
            .body(payload)
            .send()
            .await
            .map_err(|e| {
                self.stats.record_request(false, start.elapsed());
                if e.is_timeout() {
                    DeliveryError::Timeout
                } else {
                    DeliveryError::Transport(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            self.stats.record_request(false, start.elapsed());
            if e.is_timeout() {
                DeliveryError::Timeout
            } else {
                DeliveryError::Transport(e)
            }
        })?;
        self.stats.record_request(status.is_success(), start.elapsed());

        debug!("{action} answered {status} in {:?}", start.elapsed());

        if status.is_success() {
            Ok(Ok(text))
        } else {
            let error = serde_json::from_str::<ServiceErrorBody>(&text).unwrap_or_default();
            Ok(Err(ServiceFailure {
                status,
                error,
                text,
            }))
        }
    }

    async fn create(
        &self,
        action: &str,
        body: &impl Serialize,
    ) -> Result<CreateOutcome, DeliveryError> {
        match self.call(action, body).await? {
            Ok(_) => Ok(CreateOutcome::Created),
            Err(failure) => match failure.error.code() {
                Some("ResourceAlreadyExistsException") => Ok(CreateOutcome::AlreadyExists),
                _ => Err(failure.into_delivery_error()),
            },
        }
    }
}

struct ServiceFailure {
    status: StatusCode,
    error: ServiceErrorBody,
    text: String,
}

impl ServiceFailure {
    fn into_delivery_error(self) -> DeliveryError {
        match self.error.code() {
            Some(code) => DeliveryError::Service {
                code: code.to_string(),
                message: self.error.message.unwrap_or_default(),
            },
            None => DeliveryError::Http {
                status: self.status.as_u16(),
                message: self.text,
            },
        }
    }
}

impl DeliveryClient for CloudWatchClient {
    async fn create_group(&self, group: &str) -> Result<CreateOutcome, DeliveryError> {
        self.create(
            "CreateLogGroup",
            &CreateLogGroupRequest {
                log_group_name: group,
            },
        )
        .await
    }

    async fn create_stream(
        &self,
        group: &str,
        stream: &str,
    ) -> Result<CreateOutcome, DeliveryError> {
        self.create(
            "CreateLogStream",
            &CreateLogStreamRequest {
                log_group_name: group,
                log_stream_name: stream,
            },
        )
        .await
    }

    async fn submit_batch(
        &self,
        destination: &Destination,
        events: &[LogEvent],
        token: &ContinuationToken,
    ) -> Result<ContinuationToken, DeliveryError> {
        let request = PutLogEventsRequest {
            log_group_name: destination.group(),
            log_stream_name: destination.stream(),
            log_events: events,
            sequence_token: token.as_deref(),
        };

        match self.call("PutLogEvents", &request).await? {
            Ok(body) => {
                let response: PutLogEventsResponse = if body.trim().is_empty() {
                    PutLogEventsResponse::default()
                } else {
                    serde_json::from_str(&body).map_err(|e| {
                        DeliveryError::InvalidResponse(format!(
                            "Unreadable PutLogEvents answer: {e}"
                        ))
                    })?
                };
                if let Some(rejected) = response.rejected_log_events_info {
                    warn!("Service rejected part of the batch for {destination}: {rejected}");
                }
                Ok(ContinuationToken::from(response.next_sequence_token))
            }
            Err(failure) => match failure.error.code() {
                Some("InvalidSequenceTokenException") => Err(DeliveryError::SequenceConflict {
                    expected: ContinuationToken::from(failure.error.expected_sequence_token),
                }),
                Some("DataAlreadyAcceptedException") => Err(DeliveryError::AlreadyAccepted {
                    expected: ContinuationToken::from(failure.error.expected_sequence_token),
                }),
                _ => Err(failure.into_delivery_error()),
            },
        }
    }
}
