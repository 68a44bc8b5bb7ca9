//! # FlowSync Domain
//!
//! Business domain types and models for FlowSync.
//!
//! This crate contains:
//! - Source-side entities (flows, flow actions, flow messages, metrics)
//! - Sink-side records and the per-run report
//! - The error taxonomy shared by every client and the orchestrator
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other FlowSync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;
pub mod utils;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
