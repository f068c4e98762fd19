//! Application configuration for subharvest.
//!
//! User config lives at `~/.subharvest/subharvest.toml`.
//! CLI flags override config file values, which override defaults.
//! Credentials are never stored in the config file — they come from the
//! environment and are validated before any network call.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SubharvestError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "subharvest.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".subharvest";

/// Environment variables holding Reddit API credentials.
const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
const ENV_USERNAME: &str = "REDDIT_USERNAME";
const ENV_PASSWORD: &str = "REDDIT_PASSWORD";
const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

/// Required credential variables, in reporting order.
const REQUIRED_ENV: [&str; 4] = [ENV_CLIENT_ID, ENV_CLIENT_SECRET, ENV_USERNAME, ENV_PASSWORD];

// ---------------------------------------------------------------------------
// Config structs (matching subharvest.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source settings.
    #[serde(default)]
    pub reddit: RedditConfig,

    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Preview settings.
    #[serde(default)]
    pub preview: PreviewConfig,
}

/// `[reddit]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    /// Subreddit to ingest.
    #[serde(default = "default_subreddit")]
    pub subreddit: String,

    /// Maximum submissions fetched per run.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            subreddit: default_subreddit(),
            limit: default_limit(),
        }
    }
}

fn default_subreddit() -> String {
    "RelationShipIndia".into()
}
fn default_limit() -> u32 {
    100
}

/// `[storage]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path of the submissions database.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    "submissions.db".into()
}

/// `[preview]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Rows shown in the most-recent preview table.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
        }
    }
}

fn default_top_n() -> usize {
    10
}

// ---------------------------------------------------------------------------
// Run settings (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Settings for one pipeline invocation — merged from config file + CLI
/// flags, constructed once at process start and passed by reference into
/// each stage entry point.
#[derive(Debug, Clone)]
pub struct RunSettings {
    /// Subreddit to ingest.
    pub subreddit: String,
    /// Maximum submissions fetched per run.
    pub limit: u32,
    /// Rows in the materialized preview.
    pub top_n: usize,
}

impl From<&AppConfig> for RunSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            subreddit: config.reddit.subreddit.clone(),
            limit: config.reddit.limit,
            top_n: config.preview.top_n,
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Reddit API credentials, sourced from the environment.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub user_agent: String,
}

impl Credentials {
    /// Resolve credentials from process environment variables.
    ///
    /// Fails with the full list of missing required keys, before any
    /// network call is made.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Credential resolution with an injectable lookup, so missing-key
    /// reporting is testable without touching the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let missing: Vec<&str> = REQUIRED_ENV
            .iter()
            .copied()
            .filter(|key| lookup(key).is_none_or(|v| v.is_empty()))
            .collect();

        if !missing.is_empty() {
            return Err(SubharvestError::config(format!(
                "missing required Reddit credentials, set: {}",
                missing.join(", ")
            )));
        }

        let get = |key: &str| lookup(key).unwrap_or_default();
        let user_agent = lookup(ENV_USER_AGENT)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_user_agent);

        Ok(Self {
            client_id: get(ENV_CLIENT_ID),
            client_secret: get(ENV_CLIENT_SECRET),
            username: get(ENV_USERNAME),
            password: get(ENV_PASSWORD),
            user_agent,
        })
    }
}

fn default_user_agent() -> String {
    concat!("subharvest/", env!("CARGO_PKG_VERSION")).into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.subharvest/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| SubharvestError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.subharvest/subharvest.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| SubharvestError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| SubharvestError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| SubharvestError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| SubharvestError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| SubharvestError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
