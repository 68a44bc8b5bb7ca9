//! # FlowSync Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - The rate-limited HTTP client shared by both integrations
//! - The marketing automation source client (`klaviyo`)
//! - The records sink client (`airtable`)
//! - Transport error conversions and the configuration loader
//!
//! ## Architecture
//! - Implements traits defined in `flowsync-core`
//! - Depends on `flowsync-common` for retry and `flowsync-domain` for types
//! - Contains all "impure" code (network, filesystem, environment)

pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;

// Re-export commonly used items
pub use errors::InfraError;
pub use http::{HttpClient, HttpClientBuilder};
pub use integrations::airtable::AirtableClient;
pub use integrations::klaviyo::KlaviyoClient;
