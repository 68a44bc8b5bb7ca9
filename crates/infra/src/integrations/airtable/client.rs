/// Records sink client: batched create/update into named tables
use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use flowsync_common::resilience::RetryConfig;
use flowsync_core::ports::SinkApi;
use flowsync_domain::constants::{
    DEFAULT_FLOWS_TABLE, DEFAULT_MAX_FAILED_BATCHES, DEFAULT_SINK_BATCH_DELAY_MS,
    MAX_SINK_BATCH_SIZE,
};
use flowsync_domain::{ApiError, ResourceHint, SinkConfig, SinkRecord, StoredRecord};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use super::types::{ListRecordsOptions, RecordsResponse, WriteMode};
use crate::errors::InfraError;
use crate::http::HttpClient;

const DEFAULT_BASE_URL: &str = "https://api.airtable.com/v0";

/// Write-capable client for a records base.
///
/// Writes are split into batches of at most ten rows, submitted one at a
/// time with a fixed pause between batches.
pub struct AirtableClient {
    http_client: HttpClient,
    api_key: String,
    base_id: String,
    base_url: String,
    connection_test_table: String,
    batch_size: usize,
    batch_delay: Duration,
    max_failed_batches: usize,
    typecast: bool,
}

impl AirtableClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `api_key` - Personal access token, sent verbatim
    /// * `base_id` - Base (workspace) identifier
    /// * `http_client` - HTTP client with retry logic
    pub fn new(
        api_key: impl Into<String>,
        base_id: impl Into<String>,
        http_client: HttpClient,
    ) -> Self {
        Self {
            http_client,
            api_key: api_key.into(),
            base_id: base_id.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connection_test_table: DEFAULT_FLOWS_TABLE.to_string(),
            batch_size: MAX_SINK_BATCH_SIZE,
            batch_delay: Duration::from_millis(DEFAULT_SINK_BATCH_DELAY_MS),
            max_failed_batches: DEFAULT_MAX_FAILED_BATCHES,
            typecast: true,
        }
    }

    /// Build a client and its HTTP transport from configuration
    pub fn from_config(
        api_key: impl Into<String>,
        base_id: impl Into<String>,
        config: &SinkConfig,
        retry: RetryConfig,
    ) -> Result<Self, ApiError> {
        let http_client = HttpClient::builder().timeout(config.timeout()).retry(retry).build()?;

        Ok(Self::new(api_key, base_id, http_client)
            .with_base_url(&config.base_url)
            .with_connection_test_table(config.connection_test_table())
            .with_batch_size(config.effective_batch_size())
            .with_batch_delay(config.batch_delay())
            .with_max_failed_batches(config.max_failed_batches)
            .with_typecast(config.typecast))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_connection_test_table(mut self, table: impl Into<String>) -> Self {
        self.connection_test_table = table.into();
        self
    }

    /// Rows per request, clamped to `1..=10`
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_SINK_BATCH_SIZE);
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Cumulative failed batches that abort a write
    pub fn with_max_failed_batches(mut self, max_failed_batches: usize) -> Self {
        self.max_failed_batches = max_failed_batches.max(1);
        self
    }

    pub fn with_typecast(mut self, typecast: bool) -> Self {
        self.typecast = typecast;
        self
    }

    pub fn base_id(&self) -> &str {
        &self.base_id
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.base_id, urlencoding::encode(table))
    }

    fn authed(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    /// List records of `table`, following the `offset` cursor.
    #[instrument(skip(self, options))]
    pub async fn list_records(
        &self,
        table: &str,
        options: &ListRecordsOptions,
    ) -> Result<Vec<StoredRecord>, ApiError> {
        let url = self.table_url(table);
        let mut records = Vec::new();
        let mut offset: Option<String> = None;
        let mut seen_offsets = HashSet::new();

        loop {
            let mut request = self.authed(Method::GET, &url).query(&options.to_query());
            if let Some(cursor) = &offset {
                request = request.query(&[("offset", cursor)]);
            }

            let page: RecordsResponse = decode(self.http_client.send(request).await?)?;
            records.extend(page.records);

            let limit_reached = options.max_records.is_some_and(|max| records.len() >= max);
            match page.offset {
                Some(cursor) if !limit_reached => {
                    if !seen_offsets.insert(cursor.clone()) {
                        warn!(table, offset = %cursor, "Offset repeated, stopping pagination");
                        break;
                    }
                    offset = Some(cursor);
                }
                _ => break,
            }
        }

        if let Some(max) = options.max_records {
            records.truncate(max);
        }
        debug!(table, count = records.len(), "Listed records");
        Ok(records)
    }

    /// Update existing records; every row must carry its record `id`.
    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    pub async fn update_records(
        &self,
        table: &str,
        rows: &[Value],
    ) -> Result<Vec<String>, ApiError> {
        self.write_batches(table, rows, WriteMode::Update).await
    }

    async fn write_batches(
        &self,
        table: &str,
        rows: &[Value],
        mode: WriteMode,
    ) -> Result<Vec<String>, ApiError> {
        let total = rows.len().div_ceil(self.batch_size);
        let mut written = Vec::with_capacity(rows.len());
        let mut failed = 0;

        for (index, chunk) in rows.chunks(self.batch_size).enumerate() {
            if index > 0 && !self.batch_delay.is_zero() {
                tokio::time::sleep(self.batch_delay).await;
            }

            let outcome = match build_batch(chunk, mode) {
                Ok(records) => self.submit_batch(table, records, mode).await,
                Err(err) => Err(err),
            };

            match outcome {
                Ok(ids) => {
                    debug!(table, batch = index + 1, total, count = ids.len(), "Batch written");
                    written.extend(ids);
                }
                Err(err) => {
                    failed += 1;
                    warn!(table, batch = index + 1, total, failed, error = %err, "Batch failed");
                    if failed >= self.max_failed_batches {
                        return Err(ApiError::MultiBatchFailure { failed, created: written });
                    }
                }
            }
        }

        if failed > 0 {
            return Err(ApiError::BatchFailures { failed, total, created: written });
        }

        info!(table, count = written.len(), "Records written");
        Ok(written)
    }

    async fn submit_batch(
        &self,
        table: &str,
        records: Vec<Value>,
        mode: WriteMode,
    ) -> Result<Vec<String>, ApiError> {
        let method = match mode {
            WriteMode::Create => Method::POST,
            WriteMode::Update => Method::PATCH,
        };
        let body = json!({ "records": records, "typecast": self.typecast });

        let request = self.authed(method, &self.table_url(table)).json(&body);
        let response: RecordsResponse = decode(self.http_client.send(request).await?)?;
        Ok(response.records.into_iter().map(|record| record.id).collect())
    }
}

/// Sanitize and validate one batch; any bad row rejects the whole batch.
fn build_batch(rows: &[Value], mode: WriteMode) -> Result<Vec<Value>, ApiError> {
    rows.iter()
        .enumerate()
        .map(|(position, row)| {
            let record = SinkRecord::from_row(row).map_err(|err| at_row(err, position))?;
            match mode {
                WriteMode::Create => Ok(record.into_create_payload()),
                WriteMode::Update => record.into_update_payload().map_err(|err| at_row(err, position)),
            }
        })
        .collect()
}

fn at_row(err: ApiError, position: usize) -> ApiError {
    match err {
        ApiError::Validation(message) => ApiError::Validation(format!("row {position}: {message}")),
        other => other,
    }
}

fn decode(value: Value) -> Result<RecordsResponse, ApiError> {
    serde_json::from_value(value).map_err(|err| ApiError::from(InfraError::from(err)))
}

#[async_trait]
impl SinkApi for AirtableClient {
    /// Read at most one record from the connection test table.
    #[instrument(skip(self), fields(table = %self.connection_test_table))]
    async fn test_connection(&self) -> Result<(), ApiError> {
        let table = &self.connection_test_table;
        let options = ListRecordsOptions::default().max_records(1);
        let request = self.authed(Method::GET, &self.table_url(table)).query(&options.to_query());

        match self.http_client.send(request).await {
            Ok(_) => {
                info!("Sink connection verified");
                Ok(())
            }
            Err(ApiError::Auth { status, message }) => Err(ApiError::Auth {
                status,
                message: format!(
                    "Invalid sink API key or insufficient permissions for base '{}' ({message})",
                    self.base_id
                ),
            }),
            Err(ApiError::NotFound { message, .. }) => Err(ApiError::NotFound {
                resource: Some(ResourceHint::Table(table.clone())),
                message: format!(
                    "Base '{}' or table '{table}' not found; check the base id and table name \
                     ({message})",
                    self.base_id
                ),
            }),
            Err(other) => Err(other),
        }
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn create_records(&self, table: &str, rows: &[Value]) -> Result<Vec<String>, ApiError> {
        self.write_batches(table, rows, WriteMode::Create).await
    }
}
