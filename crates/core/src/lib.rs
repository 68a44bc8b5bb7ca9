//! # FlowSync Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for the source and sink APIs (traits)
//! - The sync orchestrator and its pure helpers
//!
//! ## Architecture Principles
//! - Only depends on `flowsync-domain`
//! - No HTTP or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod ports;
pub mod sync;

pub use ports::{SinkApi, SourceApi};
pub use sync::{SyncOptions, SyncService};
