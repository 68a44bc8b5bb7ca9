use std::time::Duration;

use flowsync_common::resilience::{policies::RetryIf, RetryConfig, RetryExecutor, RetryOutcome};
use flowsync_domain::constants::DEFAULT_RETRY_AFTER_SECS;
use flowsync_domain::{ApiError, ResourceHint};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::InfraError;

/// HTTP client for JSON APIs with classified errors and retry on transient
/// failures.
#[derive(Clone)]
pub struct HttpClient {
    client: ReqwestClient,
    retry: RetryConfig,
}

impl HttpClient {
    /// Start building a new HTTP client.
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, ApiError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: reqwest::IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Send `method url` with an optional JSON body and parse the JSON reply.
    pub async fn send_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let mut builder = self.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.send(builder).await
    }

    /// Execute the provided request builder with retry semantics.
    ///
    /// Rate limited and server errors are retried per the configured
    /// schedule; everything else is returned on first occurrence. When
    /// retries run out the last error is returned.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        self.send_with_outcome(builder).await.into_result()
    }

    /// Like [`HttpClient::send`], but also reports the attempt count and the
    /// delays slept between attempts.
    pub async fn send_with_outcome(
        &self,
        builder: RequestBuilder,
    ) -> RetryOutcome<Value, ApiError> {
        let executor = RetryExecutor::new(self.retry.clone(), RetryIf::new(ApiError::is_retryable));

        executor
            .execute_with_outcome(|| {
                let attempt = builder.try_clone();
                async move {
                    let builder = attempt.ok_or_else(|| {
                        ApiError::Config(
                            "request body cannot be cloned; buffer the body to enable retries"
                                .into(),
                        )
                    })?;
                    self.send_once(builder).await
                }
            })
            .await
    }

    async fn send_once(&self, builder: RequestBuilder) -> Result<Value, ApiError> {
        let request = builder.build().map_err(|err| ApiError::from(InfraError::from(err)))?;

        let method = request.method().clone();
        let url = request.url().clone();
        debug!(%method, %url, "sending HTTP request");

        let response = self.client.execute(request).await.map_err(|err| {
            debug!(%method, %url, error = %err, "HTTP request failed");
            ApiError::from(InfraError::from(err))
        })?;

        let status = response.status();
        let retry_after = retry_after_secs(response.headers());
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        debug!(%method, %url, %status, "received HTTP response");

        let text = response.text().await.map_err(|err| ApiError::from(InfraError::from(err)))?;

        if !status.is_success() {
            let error = classify_status(status, url.path(), retry_after, &text);
            warn!(%method, %url, %status, error = %error, "HTTP request rejected");
            return Err(error);
        }

        parse_body(&text, content_type.as_deref())
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug)]
pub struct HttpClientBuilder {
    timeout: Option<Duration>,
    retry: RetryConfig,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            retry: RetryConfig::default(),
            user_agent: None,
            default_headers: None,
        }
    }
}

impl HttpClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Leave request timeouts to the transport defaults.
    pub fn no_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    pub fn build(self) -> Result<HttpClient, ApiError> {
        self.retry.validate().map_err(|err| ApiError::Config(err.to_string()))?;

        let mut builder = ReqwestClient::builder().no_proxy();

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        let client = builder.build().map_err(|err| ApiError::from(InfraError::from(err)))?;

        Ok(HttpClient { client, retry: self.retry })
    }
}

fn retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()
}

/// Map a non-2xx response onto the error taxonomy.
pub(crate) fn classify_status(
    status: StatusCode,
    path: &str,
    retry_after: Option<u64>,
    body: &str,
) -> ApiError {
    let code = status.as_u16();
    let message = extract_error_message(body).unwrap_or_else(|| {
        format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"))
    });

    match code {
        429 => ApiError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
            message,
        },
        401 | 403 => ApiError::Auth { status: code, message },
        404 => {
            let resource = ResourceHint::from_path(path);
            let message = match &resource {
                Some(hint) => format!("{hint} not found: {message}"),
                None => message,
            };
            ApiError::NotFound { resource, message }
        }
        500..=599 => ApiError::Server { status: code, message },
        _ => ApiError::Api { status: code, message },
    }
}

/// Best-effort human message from an error body.
///
/// Looks at `detail`, `message`, the first JSON:API `errors` entry, then
/// an `error` object or string.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return Some(flowsync_domain::utils::text::truncate_with_suffix(trimmed, 200));
    };

    let text = |v: Option<&Value>| v.and_then(Value::as_str).map(str::to_string);

    text(value.get("detail"))
        .or_else(|| text(value.get("message")))
        .or_else(|| {
            let first = value.get("errors")?.as_array()?.first()?;
            text(first.get("detail")).or_else(|| text(first.get("title")))
        })
        .or_else(|| match value.get("error")? {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => text(obj.get("message")).or_else(|| text(obj.get("type"))),
            _ => None,
        })
}

fn parse_body(text: &str, content_type: Option<&str>) -> Result<Value, ApiError> {
    if text.trim().is_empty() {
        return Err(ApiError::Parse("empty response body".into()));
    }

    if let Some(content_type) = content_type {
        if !is_json_content_type(content_type) {
            return Err(ApiError::Parse(format!("unexpected content type '{content_type}'")));
        }
    }

    serde_json::from_str(text).map_err(|err| ApiError::from(InfraError::from(err)))
}

fn is_json_content_type(content_type: &str) -> bool {
    let mime = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}
