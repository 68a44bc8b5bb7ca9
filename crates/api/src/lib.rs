//! # FlowSync App
//!
//! Entry surface: wires the source and sink clients into the orchestrator
//! and runs a single sync.
//!
//! This crate contains:
//! - [`run_sync`] and [`run_sync_with_config`]
//! - The client context built from configuration
//! - Tracing setup and outcome logging for the `flowsync` binary
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Owns no business logic

pub mod context;
pub mod utils;

use flowsync_domain::{Config, Credentials, Result, SyncReport};

pub use context::SyncContext;
pub use utils::logging::{init_tracing, log_sync_outcome, LogFormat};

/// Run one sync with default settings and the three credential strings.
///
/// # Errors
/// Fails on blank credentials, unreachable or rejecting services, a failed
/// extraction, or an unrecoverable load into the flows table.
pub async fn run_sync(
    source_api_key: &str,
    sink_api_key: &str,
    sink_base_id: &str,
) -> Result<SyncReport> {
    let credentials = Credentials::new(source_api_key, sink_api_key, sink_base_id);
    run_sync_with_config(&Config::with_credentials(credentials)).await
}

/// Run one sync with loaded configuration.
///
/// # Errors
/// See [`run_sync`]; also fails when `config` does not validate.
pub async fn run_sync_with_config(config: &Config) -> Result<SyncReport> {
    config.validate()?;

    let mut service = SyncContext::new(config)?.into_service();
    let outcome = service.run().await;
    log_sync_outcome(&outcome);
    outcome
}
