//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Sink limits
pub const MAX_SINK_BATCH_SIZE: usize = 10;
pub const DEFAULT_SINK_BATCH_DELAY_MS: u64 = 120;
pub const DEFAULT_MAX_FAILED_BATCHES: usize = 3;

// Source pacing floor (applied before every list/query call)
pub const DEFAULT_MIN_REQUEST_DELAY_MS: u64 = 600;
pub const DEFAULT_MAX_REQUEST_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_PAGES: usize = 50;

// Retry defaults
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_INITIAL_RETRY_DELAY_MS: u64 = 2000;
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

// Default table names
pub const DEFAULT_FLOWS_TABLE: &str = "Flows";
pub const DEFAULT_FAILURES_TABLE: &str = "Failed Flows";

// Failure reasons recorded for per-action fetches
pub const REASON_INVALID_ACTION_ID: &str = "Invalid action ID format";
pub const REASON_NO_MESSAGES: &str = "No flow messages found in response";
pub const REASON_ACTION_NOT_FOUND: &str = "Action not found (404)";
pub const REASON_FLOW_NOT_FOUND: &str = "Flow not found (404)";
pub const REASON_AUTH: &str = "Authentication or permission error";
pub const REASON_RATE_LIMIT: &str = "Rate limit exceeded";
pub const MAX_REASON_LENGTH: usize = 100;
pub const TRUNCATE_SUFFIX: &str = "...";

// Keys the sink rejects as column names
pub const RESERVED_FIELD_KEYS: [&str; 2] = ["id", "fields"];
