//! HTTP client for the ChatWait service.
//!
//! [`ChatWait`] covers the service's three endpoints: the synchronous
//! `/chat/wait` call, the `/chat/streaming` SSE stream, and `/health`. The
//! [`StreamTransport`] trait is the seam the stream controller connects
//! through, so turns can be driven against scripted transports in tests.

use std::env;
use std::pin::Pin;
use std::time::Duration;

use futures::Stream;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::sse::process_sse;
use crate::types::{ChatWaitRequest, ChatWaitResponse, HealthStatus, StreamEvent, StreamParams};

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1/";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// A pinned, boxed stream of decoded records for one turn.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// The connection seam between the stream controller and the service.
///
/// The production implementation is [`ChatWait`]; tests substitute scripted
/// transports to exercise the controller's failure handling.
#[async_trait::async_trait]
pub trait StreamTransport: Send + Sync {
    /// Opens one long-lived unidirectional event stream for a turn.
    async fn open(&self, params: &StreamParams) -> Result<EventStream>;
}

/// Client for the ChatWait service.
#[derive(Debug, Clone)]
pub struct ChatWait {
    client: ReqwestClient,
    base_url: String,
    timeout: Duration,
}

impl ChatWait {
    /// Create a new client.
    ///
    /// The base URL can be provided directly or read from the
    /// CHATWAIT_BASE_URL environment variable, falling back to a local
    /// development server.
    pub fn new(base_url: Option<String>) -> Result<Self> {
        Self::with_options(base_url, None)
    }

    /// Create a new client with custom settings.
    pub fn with_options(base_url: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let base_url = base_url
            .or_else(|| env::var("CHATWAIT_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = if base_url.ends_with('/') {
            base_url
        } else {
            format!("{base_url}/")
        };
        // No client-wide timeout: it would cap the lifetime of the SSE body.
        // Point calls apply `timeout` per request instead.
        let client = ReqwestClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| {
                Error::http_client(
                    format!("failed to build HTTP client: {e}"),
                    Some(Box::new(e)),
                )
            })?;

        Ok(Self {
            client,
            base_url,
            timeout: timeout.unwrap_or(DEFAULT_TIMEOUT),
        })
    }

    /// Returns the configured base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        headers
    }

    fn map_request_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::timeout(
                format!("request timed out: {e}"),
                Some(self.timeout.as_secs_f64()),
            )
        } else if e.is_connect() {
            Error::transport(format!("connection error: {e}"), Some(Box::new(e)))
        } else {
            Error::http_client(format!("request failed: {e}"), Some(Box::new(e)))
        }
    }

    /// Process API response errors and convert to our Error type.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::http_client(
                    format!("failed to read error response: {e}"),
                    Some(Box::new(e)),
                );
            }
        };
        classify_error(status_code, &body)
    }

    /// Ask a question and wait for the complete response.
    pub async fn wait(&self, request: ChatWaitRequest) -> Result<ChatWaitResponse> {
        let url = format!("{}chat/wait", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.default_headers())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<ChatWaitResponse>().await.map_err(|e| {
            Error::parse(format!("failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// Open the streaming endpoint and get incremental records for one turn.
    ///
    /// Returns a stream of [`StreamEvent`] values that can be processed as
    /// they arrive. The stream has no client-side time bound; the caller owns
    /// idle detection and the hard deadline.
    pub async fn stream(&self, params: &StreamParams) -> Result<EventStream> {
        let url = format!("{}chat/streaming", self.base_url);

        let mut headers = self.default_headers();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );

        let response = self
            .client
            .get(&url)
            .headers(headers)
            .query(&params.query())
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let stream = response.bytes_stream();
        Ok(Box::pin(process_sse(stream)))
    }

    /// Check the service's health endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}health", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.default_headers())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        response.json::<HealthStatus>().await.map_err(|e| {
            Error::parse(format!("failed to parse response: {e}"), Some(Box::new(e)))
        })
    }
}

#[async_trait::async_trait]
impl StreamTransport for ChatWait {
    async fn open(&self, params: &StreamParams) -> Result<EventStream> {
        self.stream(params).await
    }
}

/// Map an HTTP status and error body to an [`Error`].
///
/// The service reports failures as `{"detail": {"error_code", "message"}}`;
/// plain-string details and unstructured bodies are tolerated.
fn classify_error(status_code: u16, body: &str) -> Error {
    #[derive(Deserialize)]
    struct ErrorResponse {
        detail: Option<ErrorDetail>,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ErrorDetail {
        Structured {
            error_code: Option<String>,
            message: Option<String>,
        },
        Plain(String),
    }

    let parsed = serde_json::from_str::<ErrorResponse>(body).ok();
    let (error_code, message) = match parsed.and_then(|e| e.detail) {
        Some(ErrorDetail::Structured {
            error_code,
            message,
        }) => (error_code, message.unwrap_or_else(|| body.to_string())),
        Some(ErrorDetail::Plain(message)) => (None, message),
        None => (None, body.to_string()),
    };

    match status_code {
        400 => Error::bad_request(message, error_code),
        408 => Error::timeout(message, None),
        _ => Error::api(status_code, error_code, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = ChatWait::new(Some("http://example.com/api/v1/".to_string())).unwrap();
        assert_eq!(client.base_url(), "http://example.com/api/v1/");

        let client = ChatWait::with_options(
            Some("http://example.com/api/v1".to_string()),
            Some(Duration::from_secs(5)),
        )
        .unwrap();
        assert_eq!(client.base_url(), "http://example.com/api/v1/");
        assert_eq!(client.timeout, Duration::from_secs(5));
    }

    #[test]
    fn classify_structured_detail() {
        let body = r#"{"detail": {"error_code": "EMPTY_MESSAGE", "message": "Message cannot be empty."}}"#;
        let err = classify_error(400, body);
        assert_eq!(err.error_code(), Some("EMPTY_MESSAGE"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn classify_plain_detail() {
        let err = classify_error(503, r#"{"detail": "Service not ready"}"#);
        assert_eq!(err.status_code(), Some(503));
        assert!(err.is_retryable());
    }

    #[test]
    fn classify_unstructured_body() {
        let err = classify_error(500, "internal error");
        assert_eq!(err.status_code(), Some(500));
        assert!(err.is_retryable());
    }
}
