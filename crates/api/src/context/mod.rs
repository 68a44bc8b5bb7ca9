//! Application context - builds the infra clients from configuration

use flowsync_core::{SyncOptions, SyncService};
use flowsync_domain::{ApiError, Config, FlowSyncError, Result};
use flowsync_infra::config::retry_config;
use flowsync_infra::{AirtableClient, KlaviyoClient};

/// Concrete orchestrator used by the binary
pub type FlowSyncService = SyncService<KlaviyoClient, AirtableClient>;

/// Source and sink clients plus the options for one run
pub struct SyncContext {
    pub source: KlaviyoClient,
    pub sink: AirtableClient,
    pub options: SyncOptions,
}

impl SyncContext {
    /// Build both clients from `config`.
    ///
    /// # Errors
    /// Returns `FlowSyncError::Config` when credentials are missing or a
    /// client cannot be constructed.
    pub fn new(config: &Config) -> Result<Self> {
        let credentials = config.require_credentials()?;
        let retry = retry_config(&config.retry)?;

        let source =
            KlaviyoClient::from_config(&credentials.source_api_key, &config.source, retry.clone())
                .map_err(client_error)?;
        let sink = AirtableClient::from_config(
            &credentials.sink_api_key,
            &credentials.sink_base_id,
            &config.sink,
            retry,
        )
        .map_err(client_error)?;

        Ok(Self { source, sink, options: SyncOptions::from_config(config) })
    }

    pub fn into_service(self) -> FlowSyncService {
        SyncService::new(self.source, self.sink).with_options(self.options)
    }
}

fn client_error(err: ApiError) -> FlowSyncError {
    FlowSyncError::Config(format!("failed to build HTTP client: {err}"))
}
