//! Configuration loading and root folder resolution

use crate::{Error, Result};
use std::path::PathBuf;

/// Server configuration assembled from the environment
///
/// Everything here is read once at startup; components receive the values
/// they need by reference, never by re-reading the environment.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP listen port (`PORT`, default 3000)
    pub port: u16,
    /// Server-side OpenRouter key, lowest-precedence fallback for LLM calls
    pub openrouter_api_key: Option<String>,
    /// Key used for live-probe smoke tests (`OPENROUTER_TEST_KEY`)
    pub openrouter_test_key: Option<String>,
    /// YouTube Data API key; the YouTube source is disabled without it
    pub youtube_api_key: Option<String>,
    /// Suppress error detail in responses when true (`STUMPCAST_ENV=production`)
    pub production: bool,
    /// Event log retention window in days (default 30)
    pub event_retention_days: i64,
}

impl ServerConfig {
    /// Read configuration from process environment.
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3000);

        let production = std::env::var("STUMPCAST_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let event_retention_days = std::env::var("STUMPCAST_EVENT_RETENTION_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        Self {
            port,
            openrouter_api_key: non_empty_env("OPENROUTER_API_KEY"),
            openrouter_test_key: non_empty_env("OPENROUTER_TEST_KEY"),
            youtube_api_key: non_empty_env("YOUTUBE_API_KEY"),
            production,
            event_retention_days,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
///
/// The root folder holds `archive.db`, `audio/`, `rss/`, and `bundles/`.
pub fn resolve_root_folder(cli_arg: Option<&str>, env_var_name: &str) -> Result<PathBuf> {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return Ok(PathBuf::from(path));
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        if !path.trim().is_empty() {
            return Ok(PathBuf::from(path));
        }
    }

    // Priority 3: TOML config file
    if let Ok(config_path) = find_config_file() {
        if let Ok(toml_content) = std::fs::read_to_string(&config_path) {
            if let Ok(config) = toml::from_str::<toml::Value>(&toml_content) {
                if let Some(root_folder) = config.get("root_folder").and_then(|v| v.as_str()) {
                    return Ok(PathBuf::from(root_folder));
                }
            }
        }
    }

    // Priority 4: OS-dependent compiled default
    Ok(default_root_folder())
}

/// Get the configuration file path for the platform, if one exists
fn find_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("stumpcast").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/stumpcast/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// OS-dependent default root folder
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("stumpcast"))
        .unwrap_or_else(|| PathBuf::from("./stumpcast_data"))
}
