/// Marketing automation source integration
///
/// Read-only JSON:API client for flows, flow actions, flow messages,
/// metrics and metric aggregates.
///
/// # Usage
///
/// ```no_run
/// use flowsync_core::ports::SourceApi;
/// use flowsync_infra::http::HttpClient;
/// use flowsync_infra::integrations::klaviyo::KlaviyoClient;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let http_client = HttpClient::new()?;
/// let api_key = std::env::var("FLOWSYNC_SOURCE_API_KEY")?;
/// let mut client = KlaviyoClient::new(api_key, http_client);
///
/// for flow in client.list_flows().await? {
///     let actions = client.list_flow_actions(&flow.id).await;
///     println!("{}: {} actions", flow.name, actions.len());
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Error Handling
///
/// - **Rate limits (429)** and **server errors (5xx)**: retried by `HttpClient`
/// - **Per-action lookups**: never fail; problems are recorded as
///   `FailedFlowRecord`s on the client
/// - **Flow/metric listing and aggregates**: errors propagate to the caller
pub mod client;
pub mod types;

pub use client::{is_valid_resource_id, KlaviyoClient};
