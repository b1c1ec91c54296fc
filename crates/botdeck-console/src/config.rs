//! Application configuration.

use crate::error::{AppError, AppResult};
use botdeck_cache::{CachePolicy, ResourceTuning};
use botdeck_core::Resource;
use botdeck_stream::StreamConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Request/response API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the bot API (e.g., "http://127.0.0.1:8000").
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout (ms).
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_timeout_ms() -> u64 {
    10_000
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Unobserved entries idle longer than this are pruned (0 disables).
    #[serde(default = "default_prune_idle_secs")]
    pub prune_idle_secs: u64,
    /// Per-resource overrides keyed by resource name (e.g., "bot-status").
    #[serde(default)]
    pub resources: HashMap<String, ResourceTuning>,
}

fn default_prune_idle_secs() -> u64 {
    600
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prune_idle_secs: default_prune_idle_secs(),
            resources: HashMap::new(),
        }
    }
}

impl CacheConfig {
    /// Build the store policy, rejecting unknown resource names.
    pub fn policy(&self) -> AppResult<CachePolicy> {
        let mut overrides = HashMap::with_capacity(self.resources.len());
        for (name, tuning) in &self.resources {
            let resource: Resource = name
                .parse()
                .map_err(|e| AppError::Config(format!("[cache.resources] {e}")))?;
            overrides.insert(resource, tuning.clone());
        }
        Ok(CachePolicy::new(overrides))
    }
}

/// Local preferences settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreferencesConfig {
    /// JSON preferences file.
    #[serde(default = "default_prefs_path")]
    pub path: PathBuf,
}

fn default_prefs_path() -> PathBuf {
    PathBuf::from("botdeck-prefs.json")
}

impl Default for PreferencesConfig {
    fn default() -> Self {
        Self {
            path: default_prefs_path(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default = "default_stream")]
    pub stream: StreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub preferences: PreferencesConfig,
}

fn default_stream() -> StreamConfig {
    StreamConfig::new("ws://127.0.0.1:8000/ws")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            stream: default_stream(),
            cache: CacheConfig::default(),
            preferences: PreferencesConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(AppError::Config("api.base_url must not be empty".to_string()));
        }
        if self.stream.url.trim().is_empty() {
            return Err(AppError::Config("stream.url must not be empty".to_string()));
        }
        self.cache.policy()?;
        Ok(())
    }
}
