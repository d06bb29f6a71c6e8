//! Slack Web API client for posting relay messages.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use toast_core::truncate_chars;
use tracing::debug;

const RETRY_ATTEMPT_HEADER: &str = "x-toast-relay-retry-attempt";
const ERROR_BODY_MAX_CHARS: usize = 800;
const MAX_BACKOFF_DOUBLINGS: u32 = 6;

/// Failure talking to the Slack Web API.
#[derive(Debug, thiserror::Error)]
pub enum SlackApiError {
    /// Slack answered `ok: false` with a named error kind such as `channel_not_found`.
    #[error("slack {operation} failed: {code}")]
    Api {
        operation: &'static str,
        code: String,
    },
    #[error("slack api {operation} failed with status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
        retry_after: Option<Duration>,
    },
    #[error("slack api {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to decode slack {operation}: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

impl SlackApiError {
    /// The Slack error kind when the API rejected the call.
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }

    /// Rate limits, 5xx answers and connection failures may succeed on a later attempt.
    /// An `ok: false` answer never does.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            Self::Api { .. } | Self::Decode { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Wait before the attempt following `attempt`, or `None` when `failure` is final.
    ///
    /// A server-provided `Retry-After` wins over exponential backoff.
    fn backoff_after(&self, attempt: usize, failure: &SlackApiError) -> Option<Duration> {
        if attempt >= self.max_attempts || !failure.is_retryable() {
            return None;
        }
        if let Some(delay) = failure.retry_after() {
            return Some(delay);
        }
        let doublings = (attempt.saturating_sub(1) as u32).min(MAX_BACKOFF_DOUBLINGS);
        Some(self.base_delay.saturating_mul(1_u32 << doublings))
    }
}

fn retry_after_header(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

fn error_body(body: &str) -> String {
    let mut excerpt = truncate_chars(body, ERROR_BODY_MAX_CHARS);
    if excerpt.len() < body.len() {
        excerpt.push_str("...");
    }
    excerpt
}

#[derive(Debug, Clone, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    ts: Option<String>,
    channel: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackPostedMessage {
    pub channel: String,
    pub ts: Option<String>,
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    bot_token: String,
    retry: RetryPolicy,
}

impl SlackApiClient {
    pub fn new(
        api_base: String,
        bot_token: String,
        request_timeout_ms: u64,
        retry_max_attempts: usize,
        retry_base_delay_ms: u64,
    ) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("toast-relay"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.trim().to_string(),
            retry: RetryPolicy {
                max_attempts: retry_max_attempts.max(1),
                base_delay: Duration::from_millis(retry_base_delay_ms.max(1)),
            },
        })
    }

    /// Posts `text` to `channel` via `chat.postMessage`.
    ///
    /// `ok: false` responses are never retried.
    pub async fn post_message(
        &self,
        channel: &str,
        text: &str,
    ) -> Result<SlackPostedMessage, SlackApiError> {
        let payload = json!({
            "channel": channel,
            "text": text,
        });

        let response: SlackChatMessageResponse = self
            .request_json("chat.postMessage", || {
                self.http
                    .post(format!("{}/chat.postMessage", self.api_base))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;

        if !response.ok {
            return Err(SlackApiError::Api {
                operation: "chat.postMessage",
                code: response
                    .error
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| "unknown".to_string()),
            });
        }

        Ok(SlackPostedMessage {
            channel: response.channel.unwrap_or_else(|| channel.to_string()),
            ts: response.ts,
        })
    }

    async fn request_json<T, F>(
        &self,
        operation: &'static str,
        mut builder: F,
    ) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let sent = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            let failure = match sent {
                Ok(response) if response.status().is_success() => {
                    return response
                        .json::<T>()
                        .await
                        .map_err(|source| SlackApiError::Decode { operation, source });
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = retry_after_header(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    SlackApiError::Status {
                        operation,
                        status,
                        body: error_body(&body),
                        retry_after,
                    }
                }
                Err(source) => SlackApiError::Transport { operation, source },
            };

            let Some(delay) = self.retry.backoff_after(attempt, &failure) else {
                return Err(failure);
            };
            debug!(
                operation,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying slack request"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use std::time::Duration;

    use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};

    use super::{error_body, retry_after_header, RetryPolicy, SlackApiClient, SlackApiError};

    fn status_failure(status: u16, retry_after: Option<Duration>) -> SlackApiError {
        SlackApiError::Status {
            operation: "chat.postMessage",
            status,
            body: String::new(),
            retry_after,
        }
    }

    fn policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(250),
        }
    }

    fn client(base_url: String, retry_max_attempts: usize) -> SlackApiClient {
        SlackApiClient::new(base_url, " xoxb-test ".to_string(), 2_000, retry_max_attempts, 1)
            .expect("client")
    }

    #[test]
    fn unit_retry_classification_separates_transient_failures_from_rejections() {
        assert!(status_failure(429, None).is_retryable());
        assert!(status_failure(502, None).is_retryable());
        assert!(!status_failure(403, None).is_retryable());
        let rejected = SlackApiError::Api {
            operation: "chat.postMessage",
            code: "not_in_channel".to_string(),
        };
        assert!(!rejected.is_retryable());
        assert_eq!(policy(5).backoff_after(1, &rejected), None);
    }

    #[test]
    fn unit_backoff_doubles_per_attempt_until_attempts_run_out() {
        let overloaded = status_failure(503, None);
        assert_eq!(
            policy(4).backoff_after(1, &overloaded),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            policy(4).backoff_after(3, &overloaded),
            Some(Duration::from_millis(1_000))
        );
        assert_eq!(policy(4).backoff_after(4, &overloaded), None);
        assert_eq!(policy(1).backoff_after(1, &overloaded), None);
    }

    #[test]
    fn functional_backoff_honors_server_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static(" 7 "));
        let hint = retry_after_header(&headers);
        assert_eq!(hint, Some(Duration::from_secs(7)));
        assert_eq!(
            policy(3).backoff_after(1, &status_failure(429, hint)),
            Some(Duration::from_secs(7))
        );

        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(retry_after_header(&headers), None);
    }

    #[test]
    fn regression_error_body_is_capped_on_char_boundaries() {
        assert_eq!(error_body("unavailable"), "unavailable");
        let long = "é".repeat(900);
        let excerpt = error_body(&long);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), 803);
    }

    #[tokio::test]
    async fn integration_post_message_sends_channel_text_and_bearer_token() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .header("authorization", "Bearer xoxb-test")
                .json_body(json!({ "channel": "#alerts", "text": "hello\n" }));
            then.status(200)
                .json_body(json!({ "ok": true, "channel": "C42", "ts": "1.5" }));
        });

        let posted = client(format!("{}/", server.base_url()), 1)
            .post_message("#alerts", "hello\n")
            .await
            .expect("post succeeds");
        assert_eq!(posted.channel, "C42");
        assert_eq!(posted.ts.as_deref(), Some("1.5"));
        post.assert();
    }

    #[tokio::test]
    async fn integration_post_message_retries_rate_limits() {
        let server = MockServer::start();
        let first = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .header("x-toast-relay-retry-attempt", "0");
            then.status(429).header("retry-after", "0").body("slow down");
        });
        let second = server.mock(|when, then| {
            when.method(POST)
                .path("/chat.postMessage")
                .header("x-toast-relay-retry-attempt", "1");
            then.status(200)
                .json_body(json!({ "ok": true, "channel": "C1", "ts": "1.2" }));
        });

        let posted = client(server.base_url(), 3)
            .post_message("C1", "hello")
            .await
            .expect("post eventually succeeds");
        assert_eq!(posted.channel, "C1");
        assert_eq!(first.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn regression_post_message_never_retries_api_errors() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(200)
                .json_body(json!({ "ok": false, "error": "channel_not_found" }));
        });

        let error = client(server.base_url(), 3)
            .post_message("#missing", "hello")
            .await
            .expect_err("api error");
        assert_eq!(error.api_code(), Some("channel_not_found"));
        assert_eq!(post.calls(), 1);
    }

    #[tokio::test]
    async fn regression_post_message_reports_status_after_single_attempt_by_default() {
        let server = MockServer::start();
        let post = server.mock(|when, then| {
            when.method(POST).path("/chat.postMessage");
            then.status(503).body("unavailable");
        });

        let error = client(server.base_url(), 1)
            .post_message("#alerts", "hello")
            .await
            .expect_err("status error");
        assert!(matches!(
            error,
            SlackApiError::Status { status: 503, ref body, .. } if body == "unavailable"
        ));
        assert_eq!(post.calls(), 1);
    }
}
