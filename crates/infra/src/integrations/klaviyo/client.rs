/// Marketing automation API client (flows, actions, messages, metrics)
use std::time::Duration;

use async_trait::async_trait;
use flowsync_common::resilience::RetryConfig;
use flowsync_core::ports::SourceApi;
use flowsync_domain::constants::{
    REASON_ACTION_NOT_FOUND, REASON_FLOW_NOT_FOUND, REASON_INVALID_ACTION_ID, REASON_NO_MESSAGES,
};
use flowsync_domain::{
    ApiError, FailedFlowRecord, FailureStatus, Flow, FlowAction, FlowMessage, Metric,
    MetricAggregateQuery, MetricAggregateResult, SourceConfig,
};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::types::{
    CollectionDocument, FlowActionAttributes, FlowAttributes, IncludedDocument, MetricAttributes,
    Resource, SingleDocument, FLOW_MESSAGE_TYPE,
};
use crate::errors::InfraError;
use crate::http::HttpClient;

const DEFAULT_BASE_URL: &str = "https://a.klaviyo.com/api";
const DEFAULT_REVISION: &str = "2024-10-15";
const JSON_API_MEDIA_TYPE: &str = "application/vnd.api+json";

static RESOURCE_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9]+$").expect("RESOURCE_ID regex should compile - this is a bug")
});

/// Whether `id` is safe to interpolate into an endpoint path
pub fn is_valid_resource_id(id: &str) -> bool {
    RESOURCE_ID.is_match(id)
}

/// Read-only client for the marketing automation JSON:API.
///
/// Owns the list of actions that could not be enriched during its lifetime;
/// see [`SourceApi::failed_flows`].
pub struct KlaviyoClient {
    http_client: HttpClient,
    api_key: String,
    base_url: String,
    revision: String,
    min_request_delay: Duration,
    max_request_delay: Duration,
    max_pages: usize,
    failed_flows: Vec<FailedFlowRecord>,
}

impl KlaviyoClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - Private API key, sent verbatim
    /// * `http_client` - HTTP client with retry logic
    pub fn new(api_key: impl Into<String>, http_client: HttpClient) -> Self {
        let defaults = SourceConfig::default();
        let (min_request_delay, max_request_delay) = defaults.request_delay_range();
        Self {
            http_client,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            revision: DEFAULT_REVISION.to_string(),
            min_request_delay,
            max_request_delay,
            max_pages: defaults.max_pages,
            failed_flows: Vec::new(),
        }
    }

    /// Build a client and its HTTP transport from configuration
    pub fn from_config(
        api_key: impl Into<String>,
        config: &SourceConfig,
        retry: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = HttpClient::builder().timeout(config.timeout()).retry(retry).build()?;
        let (min, max) = config.request_delay_range();

        Ok(Self::new(api_key, http_client)
            .with_base_url(&config.base_url)
            .with_revision(&config.revision)
            .with_request_delay(min, max)
            .with_max_pages(config.max_pages))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = revision.into();
        self
    }

    /// Random pause drawn from `[min, max]` before every list/query call
    pub fn with_request_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_request_delay = min;
        self.max_request_delay = max.max(min);
        self
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn pace(&self) {
        let delay = if self.max_request_delay > self.min_request_delay {
            rand::thread_rng().gen_range(self.min_request_delay..=self.max_request_delay)
        } else {
            self.min_request_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    async fn call(&self, method: Method, url: &str, body: Option<Value>) -> Result<Value, ApiError> {
        let mut request = self
            .http_client
            .request(method, url)
            .header("Authorization", format!("Klaviyo-API-Key {}", self.api_key))
            .header("revision", &self.revision)
            .header("Accept", JSON_API_MEDIA_TYPE);

        if let Some(body) = body {
            let bytes =
                serde_json::to_vec(&body).map_err(|err| ApiError::from(InfraError::from(err)))?;
            request = request.header("Content-Type", JSON_API_MEDIA_TYPE).body(bytes);
        }

        self.http_client.send(request).await
    }

    async fn get_document<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let value = self.call(Method::GET, url, None).await?;
        decode(value)
    }

    /// Follow `links.next` until exhausted or `max_pages` pages were read.
    async fn get_all<A>(&self, path: &str) -> Result<Vec<Resource<A>>, ApiError>
    where
        A: DeserializeOwned + Default,
    {
        let mut resources = Vec::new();
        let mut next = Some(self.url(path));
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages >= self.max_pages {
                warn!(path, max_pages = self.max_pages, "Page limit reached; remaining pages skipped");
                break;
            }

            self.pace().await;
            let page: CollectionDocument<A> = self.get_document(&url).await?;
            pages += 1;
            resources.extend(page.data);
            next = page.links.next.as_deref().map(next_page_url).transpose()?;
        }

        debug!(path, pages, count = resources.len(), "Fetched collection");
        Ok(resources)
    }
}

/// Pagination links must be absolute URLs
fn next_page_url(link: &str) -> Result<String, ApiError> {
    Url::parse(link)
        .map(String::from)
        .map_err(|err| ApiError::Parse(format!("invalid pagination link '{link}': {err}")))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::from(InfraError::from(err)))
}

#[async_trait]
impl SourceApi for KlaviyoClient {
    #[instrument(skip(self))]
    async fn test_connection(&self) -> Result<(), ApiError> {
        self.call(Method::GET, &self.url("accounts/"), None).await?;
        info!("Source connection verified");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_flows(&self) -> Result<Vec<Flow>, ApiError> {
        let resources = self.get_all::<FlowAttributes>("flows/").await?;
        Ok(resources.into_iter().map(Resource::into_flow).collect())
    }

    #[instrument(skip(self))]
    async fn list_flow_actions(&mut self, flow_id: &str) -> Vec<FlowAction> {
        if !is_valid_resource_id(flow_id) {
            warn!(flow_id, "Skipping flow with invalid id");
            return Vec::new();
        }

        self.pace().await;
        let url = self.url(&format!("flows/{flow_id}/flow-actions/"));
        match self.get_document::<CollectionDocument<FlowActionAttributes>>(&url).await {
            Ok(document) => {
                document.data.into_iter().map(|r| r.into_flow_action(flow_id)).collect()
            }
            Err(err) => {
                warn!(flow_id, error = %err, "Failed to fetch flow actions");
                self.failed_flows.push(
                    FailedFlowRecord::from_error(&err, REASON_FLOW_NOT_FOUND).with_flow(flow_id),
                );
                Vec::new()
            }
        }
    }

    #[instrument(skip(self))]
    async fn list_flow_messages(&mut self, flow_action_id: &str) -> Vec<FlowMessage> {
        if !is_valid_resource_id(flow_action_id) {
            warn!(flow_action_id, "Invalid flow action id");
            self.failed_flows.push(
                FailedFlowRecord::new(REASON_INVALID_ACTION_ID, FailureStatus::InvalidId)
                    .with_action(flow_action_id),
            );
            return Vec::new();
        }

        self.pace().await;
        let url = self.url(&format!("flow-actions/{flow_action_id}/?include=flow-messages"));
        let document = match self.get_document::<IncludedDocument>(&url).await {
            Ok(document) => document,
            Err(err) => {
                warn!(flow_action_id, error = %err, "Failed to fetch flow messages");
                self.failed_flows.push(
                    FailedFlowRecord::from_error(&err, REASON_ACTION_NOT_FOUND)
                        .with_action(flow_action_id),
                );
                return Vec::new();
            }
        };

        let messages: Vec<FlowMessage> = document
            .included
            .unwrap_or_default()
            .into_iter()
            .filter(|resource| resource.kind == FLOW_MESSAGE_TYPE)
            .map(|resource| resource.into_flow_message(flow_action_id))
            .collect();

        if messages.is_empty() {
            debug!(flow_action_id, "Action has no included messages");
            self.failed_flows.push(
                FailedFlowRecord::new(REASON_NO_MESSAGES, FailureStatus::Empty)
                    .with_action(flow_action_id),
            );
        }

        messages
    }

    #[instrument(skip(self))]
    async fn list_metrics(&self) -> Result<Vec<Metric>, ApiError> {
        let resources = self.get_all::<MetricAttributes>("metrics/").await?;
        Ok(resources.into_iter().map(Resource::into_metric).collect())
    }

    #[instrument(skip(self, query), fields(metric_id = %query.metric_id))]
    async fn query_metric_aggregate(
        &self,
        query: &MetricAggregateQuery,
    ) -> Result<MetricAggregateResult, ApiError> {
        self.pace().await;

        let attributes =
            serde_json::to_value(query).map_err(|err| ApiError::from(InfraError::from(err)))?;
        let body = json!({ "data": { "type": "metric-aggregate", "attributes": attributes } });

        let value = self.call(Method::POST, &self.url("metric-aggregates/"), Some(body)).await?;
        let document: SingleDocument<MetricAggregateResult> = decode(value)?;
        Ok(document.into_result())
    }

    fn failed_flows(&self) -> &[FailedFlowRecord] {
        &self.failed_flows
    }
}
