//! HTTP client module for submitting logs to the Logs Ingestion API.
//!
//! This module posts a JSON log body to a Data Collection Rule stream and
//! retries failed attempts with a fixed delay.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::token::AccessToken;

/// API version of the Logs Ingestion endpoint.
pub const API_VERSION: &str = "2021-11-01-preview";

/// Total number of submission attempts.
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed pause after a failed attempt.
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Build the shared reqwest client. `None` leaves the transport default in place.
pub(crate) fn build_http_client(timeout: Option<Duration>) -> reqwest::Result<Client> {
    let mut builder = Client::builder()
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90));

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder.build()
}

/// Destination of a log submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestTarget {
    /// Data Collection Endpoint base URI
    pub endpoint_uri: String,

    /// Immutable ID of the Data Collection Rule
    pub dcr_id: String,

    /// Custom table name, e.g. `AppEvents` for the `Custom-AppEvents_CL` stream
    pub log_type: String,
}

impl IngestTarget {
    pub fn new(
        endpoint_uri: impl Into<String>,
        dcr_id: impl Into<String>,
        log_type: impl Into<String>,
    ) -> Self {
        let endpoint_uri = endpoint_uri.into().trim_end_matches('/').to_string();
        Self {
            endpoint_uri,
            dcr_id: dcr_id.into(),
            log_type: log_type.into(),
        }
    }

    /// Name of the DCR stream for this log type.
    pub fn stream_name(&self) -> String {
        format!("Custom-{}_CL", self.log_type)
    }

    /// Full URL of the stream, including the API version.
    pub fn stream_url(&self) -> String {
        format!(
            "{}/dataCollectionRules/{}/streams/{}?api-version={}",
            self.endpoint_uri,
            self.dcr_id,
            self.stream_name(),
            API_VERSION
        )
    }
}

/// Bounded linear retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,

    /// Pause after each failed attempt that is followed by another
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Why a single attempt did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum AttemptFailure {
    /// No HTTP response was received
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),

    /// A response arrived with a status other than 204
    #[error("unexpected status {code}: {body}")]
    Status { code: StatusCode, body: String },
}

impl AttemptFailure {
    /// Status code of the failed attempt, if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AttemptFailure::Transport(_) => None,
            AttemptFailure::Status { code, .. } => Some(*code),
        }
    }
}

/// Errors that can occur while submitting a log.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The log body could not be encoded as JSON; nothing was sent
    #[error("Failed to serialize log body: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Every attempt failed
    #[error("Failed to submit log after {attempts} attempts. Last failure: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: AttemptFailure,
    },

    /// The HTTP client could not be built
    #[error("Client configuration error: {0}")]
    Client(String),
}

/// Outcome of a successful submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestResponse {
    /// Final status, always 204
    pub status: StatusCode,

    /// Attempts used, including the successful one
    pub attempts: u32,
}

/// HTTP client for the Logs Ingestion API.
///
/// One underlying reqwest client is reused for every attempt.
///
/// # Example
///
/// ```no_run
/// use law_ingest::client::{IngestTarget, LogClient, RetryPolicy};
/// use law_ingest::token::AccessToken;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() {
///     let client = LogClient::with_settings(None, RetryPolicy::default())
///         .expect("Failed to create client");
///     let target = IngestTarget::new("https://dce.ingest.monitor.azure.com", "dcr-123", "AppEvents");
///     let token = AccessToken::new("eyJ0eXAi...");
///
///     match client.submit(&target, &token, &json!([{"Message": "hello"}])).await {
///         Ok(response) => println!("Delivered after {} attempt(s)", response.attempts),
///         Err(e) => eprintln!("Failed to submit: {}", e),
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct LogClient {
    client: Client,
    retry: RetryPolicy,
}

impl LogClient {
    /// Create a log client from the loaded configuration, with the default retry policy.
    pub fn new(config: &Config) -> Result<Self, SubmitError> {
        Self::with_settings(config.request_timeout, RetryPolicy::default())
    }

    /// Create a log client with custom settings.
    pub fn with_settings(timeout: Option<Duration>, retry: RetryPolicy) -> Result<Self, SubmitError> {
        let client = build_http_client(timeout).map_err(|e| SubmitError::Client(e.to_string()))?;
        Ok(Self { client, retry })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Post `log` to the target stream.
    ///
    /// Succeeds only on HTTP 204. Any other status, or a transport error,
    /// counts as a failed attempt and is retried after the policy delay
    /// until `max_attempts` is reached.
    pub async fn submit<T>(
        &self,
        target: &IngestTarget,
        token: &AccessToken,
        log: &T,
    ) -> Result<IngestResponse, SubmitError>
    where
        T: Serialize + ?Sized,
    {
        let url = target.stream_url();
        let body = serde_json::to_vec(log)?;
        let max_attempts = self.retry.max_attempts.max(1);

        debug!(
            url = %url,
            body_bytes = body.len(),
            "Submitting log"
        );

        let mut attempt = 0;
        loop {
            attempt += 1;

            match self.send_request(&url, token, body.clone()).await {
                Ok(status) => {
                    info!(
                        stream = %target.stream_name(),
                        attempts = attempt,
                        "Log submitted"
                    );
                    return Ok(IngestResponse {
                        status,
                        attempts: attempt,
                    });
                }
                Err(failure) if attempt >= max_attempts => {
                    error!(
                        error = %failure,
                        attempts = attempt,
                        "Log submission failed permanently"
                    );
                    return Err(SubmitError::Exhausted {
                        attempts: attempt,
                        last: failure,
                    });
                }
                Err(failure) => {
                    warn!(
                        error = %failure,
                        attempt = attempt,
                        max_attempts = max_attempts,
                        delay_ms = self.retry.delay.as_millis() as u64,
                        "Submission attempt failed, will retry"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
            }
        }
    }

    /// Send a single HTTP request without retry logic.
    async fn send_request(
        &self,
        url: &str,
        token: &AccessToken,
        body: Vec<u8>,
    ) -> Result<StatusCode, AttemptFailure> {
        let response = self
            .client
            .post(url)
            .bearer_auth(token.secret())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(AttemptFailure::Transport)?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(status);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(AttemptFailure::Status { code: status, body })
    }
}

/// Submit a log with the default retry policy and transport defaults.
///
/// Convenience wrapper for one-off callers that do not keep a `LogClient`.
pub async fn submit_log<T>(
    endpoint_uri: &str,
    dcr_id: &str,
    token: &AccessToken,
    log_type: &str,
    log: &T,
) -> Result<IngestResponse, SubmitError>
where
    T: Serialize + ?Sized,
{
    let client = LogClient::with_settings(None, RetryPolicy::default())?;
    let target = IngestTarget::new(endpoint_uri, dcr_id, log_type);
    client.submit(&target, token, log).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_url() {
        let target = IngestTarget::new(
            "https://my-dce.westeurope-1.ingest.monitor.azure.com",
            "dcr-0123456789abcdef",
            "AppEvents",
        );
        assert_eq!(target.stream_name(), "Custom-AppEvents_CL");
        assert_eq!(
            target.stream_url(),
            "https://my-dce.westeurope-1.ingest.monitor.azure.com/dataCollectionRules/\
             dcr-0123456789abcdef/streams/Custom-AppEvents_CL?api-version=2021-11-01-preview"
        );
    }

    #[test]
    fn test_stream_url_trims_trailing_slash() {
        let target = IngestTarget::new("http://localhost:1234/", "dcr", "T");
        assert_eq!(target.endpoint_uri, "http://localhost:1234");
        assert!(target
            .stream_url()
            .starts_with("http://localhost:1234/dataCollectionRules/dcr/"));
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(1));
    }

    #[test]
    fn test_client_with_settings() {
        let policy = RetryPolicy {
            max_attempts: 5,
            delay: Duration::from_millis(10),
        };
        let client = LogClient::with_settings(Some(Duration::from_secs(5)), policy).unwrap();
        assert_eq!(client.retry_policy(), policy);
    }

    #[test]
    fn test_submit_error_display() {
        let err = SubmitError::Exhausted {
            attempts: 3,
            last: AttemptFailure::Status {
                code: StatusCode::INTERNAL_SERVER_ERROR,
                body: "boom".to_string(),
            },
        };
        let message = err.to_string();
        assert!(message.contains("3 attempts"));
        assert!(message.contains("500"));
        assert!(message.contains("boom"));
    }

    #[test]
    fn test_attempt_failure_status() {
        let failure = AttemptFailure::Status {
            code: StatusCode::FORBIDDEN,
            body: String::new(),
        };
        assert_eq!(failure.status(), Some(StatusCode::FORBIDDEN));
    }

    #[tokio::test]
    async fn test_unserializable_body_is_not_sent() {
        use std::collections::HashMap;

        // Non-string map keys cannot be represented in JSON.
        let mut log = HashMap::new();
        log.insert(vec![1u8], "value");

        let client = LogClient::with_settings(None, RetryPolicy::default()).unwrap();
        let target = IngestTarget::new("http://127.0.0.1:1", "dcr", "T");
        let result = client
            .submit(&target, &AccessToken::new("t"), &log)
            .await;

        assert!(matches!(result, Err(SubmitError::Serialize(_))));
    }
}
