//! Configuration loading and management
//!
//! This module provides utilities for loading application configuration
//! from environment variables and files, and for turning the retry
//! tunables into a `RetryConfig`.

pub mod loader;
mod retry;

// Re-export commonly used items
pub use loader::{find_config_file, load, load_from_env, load_from_file};
pub use retry::retry_config;
