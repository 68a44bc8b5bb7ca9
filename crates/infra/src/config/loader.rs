//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If the required credentials are missing, falls back to a file
//! 3. Searches multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `FLOWSYNC_SOURCE_API_KEY`: Source API key (required)
//! - `FLOWSYNC_SINK_API_KEY`: Sink API key (required)
//! - `FLOWSYNC_SINK_BASE_ID`: Sink base identifier (required)
//! - `FLOWSYNC_SOURCE_BASE_URL`: Override the source API root
//! - `FLOWSYNC_SINK_BASE_URL`: Override the sink API root
//! - `FLOWSYNC_FLOWS_TABLE`: Table receiving flow records
//! - `FLOWSYNC_FAILURES_TABLE`: Table receiving failure records
//! - `FLOWSYNC_TIMEZONE`: Timezone for metric aggregation
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./flowsync.toml`, `./flowsync.json`, `./config.toml`, `./config.json`
//! 2. The same names in the parent and grandparent directories
//! 3. The same names next to the executable

use std::path::{Path, PathBuf};

use flowsync_domain::{Config, Credentials, FlowSyncError, Result};

const CONFIG_FILE_NAMES: [&str; 4] = ["flowsync.toml", "flowsync.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `FlowSyncError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - The loaded configuration fails validation
pub fn load() -> Result<Config> {
    let config = match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            config
        }
        Err(e) => {
            tracing::debug!(error = %e, "Environment incomplete, trying config file");
            load_from_file(None)?
        }
    };

    config.validate()?;
    Ok(config)
}

/// Load configuration from environment variables
///
/// The three credential variables must be present; optional variables
/// override the matching defaults.
///
/// # Errors
/// Returns `FlowSyncError::Config` if a required variable is missing.
pub fn load_from_env() -> Result<Config> {
    let credentials = Credentials::new(
        env_var("FLOWSYNC_SOURCE_API_KEY")?,
        env_var("FLOWSYNC_SINK_API_KEY")?,
        env_var("FLOWSYNC_SINK_BASE_ID")?,
    );

    let mut config = Config::with_credentials(credentials);
    if let Some(url) = env_opt("FLOWSYNC_SOURCE_BASE_URL") {
        config.source.base_url = url;
    }
    if let Some(url) = env_opt("FLOWSYNC_SINK_BASE_URL") {
        config.sink.base_url = url;
    }
    if let Some(table) = env_opt("FLOWSYNC_FLOWS_TABLE") {
        config.sink.flows_table = table;
    }
    if let Some(table) = env_opt("FLOWSYNC_FAILURES_TABLE") {
        config.sink.failures_table = table;
    }
    if let Some(timezone) = env_opt("FLOWSYNC_TIMEZONE") {
        config.sync.timezone = timezone;
    }

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, searches multiple locations for config files.
/// Format is detected by file extension.
///
/// # Errors
/// Returns `FlowSyncError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(FlowSyncError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => find_config_file().ok_or_else(|| {
            FlowSyncError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| FlowSyncError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content (`.json` or `.toml`)
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| FlowSyncError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| FlowSyncError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(FlowSyncError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Search multiple paths for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn find_config_file() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.extend(cwd.ancestors().take(3).map(Path::to_path_buf));
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    first_existing(&dirs)
}

fn first_existing(dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.is_file())
}

/// Get required environment variable
///
/// # Errors
/// Returns `FlowSyncError::Config` if the variable is unset or blank.
fn env_var(key: &str) -> Result<String> {
    env_opt(key).ok_or_else(|| {
        FlowSyncError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Non-blank environment variable, trimmed
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::TempDir;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: [&str; 8] = [
        "FLOWSYNC_SOURCE_API_KEY",
        "FLOWSYNC_SINK_API_KEY",
        "FLOWSYNC_SINK_BASE_ID",
        "FLOWSYNC_SOURCE_BASE_URL",
        "FLOWSYNC_SINK_BASE_URL",
        "FLOWSYNC_FLOWS_TABLE",
        "FLOWSYNC_FAILURES_TABLE",
        "FLOWSYNC_TIMEZONE",
    ];

    fn clear_env() {
        for key in ALL_VARS {
            std::env::remove_var(key);
        }
    }

    fn set_credentials() {
        std::env::set_var("FLOWSYNC_SOURCE_API_KEY", "pk_source");
        std::env::set_var("FLOWSYNC_SINK_API_KEY", "pat_sink");
        std::env::set_var("FLOWSYNC_SINK_BASE_ID", "appBase");
    }

    fn write_file(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_from_env_credentials_only() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_credentials();

        let config = load_from_env().unwrap();
        let credentials = config.require_credentials().unwrap();
        assert_eq!(credentials.source_api_key, "pk_source");
        assert_eq!(credentials.sink_base_id, "appBase");
        assert_eq!(config.sink.flows_table, "Flows");
        assert_eq!(config.sync.timezone, "UTC");

        clear_env();
    }

    #[test]
    fn test_load_from_env_overrides() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        set_credentials();
        std::env::set_var("FLOWSYNC_SINK_BASE_URL", "http://localhost:9000/v0");
        std::env::set_var("FLOWSYNC_FLOWS_TABLE", "Automations");
        std::env::set_var("FLOWSYNC_TIMEZONE", "Europe/Berlin");

        let config = load_from_env().unwrap();
        assert_eq!(config.sink.base_url, "http://localhost:9000/v0");
        assert_eq!(config.sink.flows_table, "Automations");
        assert_eq!(config.sink.failures_table, "Failed Flows");
        assert_eq!(config.sync.timezone, "Europe/Berlin");

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();
        std::env::set_var("FLOWSYNC_SOURCE_API_KEY", "pk_source");
        std::env::set_var("FLOWSYNC_SINK_API_KEY", "   ");

        let err = load_from_env().unwrap_err();
        assert!(matches!(err, FlowSyncError::Config(_)), "Should be a Config error");
        assert!(err.to_string().contains("FLOWSYNC_SINK_API_KEY"));

        clear_env();
    }

    #[test]
    fn test_load_from_file_toml() {
        let dir = TempDir::new().unwrap();
        let path = write_file(
            &dir,
            "flowsync.toml",
            r#"
[credentials]
source_api_key = "pk_file"
sink_api_key = "pat_file"
sink_base_id = "appFile"

[sink]
failures_table = "Sync Failures"
batch_size = 5

[retry]
max_retries = 1
"#,
        );

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.require_credentials().unwrap().sink_base_id, "appFile");
        assert_eq!(config.sink.failures_table, "Sync Failures");
        assert_eq!(config.sink.batch_size, 5);
        assert_eq!(config.retry.max_retries, 1);
        assert_eq!(config.source.max_pages, Config::default().source.max_pages);
    }

    #[test]
    fn test_load_from_file_json() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "config.json", r#"{ "sync": { "timezone": "America/New_York" } }"#);

        let config = load_from_file(Some(path)).unwrap();
        assert_eq!(config.sync.timezone, "America/New_York");
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/flowsync.toml")));
        assert!(matches!(result, Err(FlowSyncError::Config(_))));
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "config.json", r#"{ "this is": "not valid json" "#);
        assert!(load_from_file(Some(path)).is_err());
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let result = parse_config("some content", Path::new("test.yaml"));
        assert!(result.is_err(), "Should fail with unsupported format");
    }

    #[test]
    fn test_search_prefers_flowsync_names_then_parents() {
        let root = TempDir::new().unwrap();
        let child = root.path().join("child");
        std::fs::create_dir(&child).unwrap();

        write_file(&root, "config.toml", "");
        let dirs = vec![child.clone(), root.path().to_path_buf()];
        assert_eq!(first_existing(&dirs), Some(root.path().join("config.toml")));

        std::fs::write(child.join("config.json"), "{}").unwrap();
        assert_eq!(first_existing(&dirs), Some(child.join("config.json")));

        std::fs::write(child.join("flowsync.toml"), "").unwrap();
        assert_eq!(first_existing(&dirs), Some(child.join("flowsync.toml")));
    }

    #[test]
    fn test_loaded_file_must_carry_credentials() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "flowsync.toml", "[sink]\nflows_table = \"Flows\"\n");

        let config = load_from_file(Some(path)).unwrap();
        assert!(config.validate().is_err());
    }
}
