//! Local preferences (API key, theme).
//!
//! Stored as a flat JSON object with fixed keys so other botdeck front ends
//! can share the file.

use crate::error::{AppError, AppResult};
use botdeck_gateway::ApiKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

/// Color theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
            Self::System => write!(f, "system"),
        }
    }
}

impl FromStr for Theme {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            "system" => Ok(Self::System),
            other => Err(AppError::Preferences(format!("unknown theme: {other}"))),
        }
    }
}

/// Persisted preferences.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(rename = "botdeck.apiKey", default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(rename = "botdeck.theme", default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
}

impl Preferences {
    /// Stored key, if any. A missing or blank key means unauthenticated
    /// requests.
    pub fn api_key(&self) -> Option<ApiKey> {
        self.api_key.as_deref().and_then(ApiKey::new)
    }

    pub fn theme(&self) -> Theme {
        self.theme.unwrap_or_default()
    }
}

impl fmt::Debug for Preferences {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preferences")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("theme", &self.theme)
            .finish()
    }
}

/// JSON-file backed preference storage.
#[derive(Debug, Clone)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load preferences. A missing file yields defaults.
    pub fn load(&self) -> AppResult<Preferences> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No preferences file, using defaults");
                return Ok(Preferences::default());
            }
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Preferences::default());
        }
        serde_json::from_str(&content).map_err(|e| {
            AppError::Preferences(format!("Failed to parse {}: {e}", self.path.display()))
        })
    }

    /// Write preferences atomically (temp file, then rename).
    pub fn save(&self, prefs: &Preferences) -> AppResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(prefs)
            .map_err(|e| AppError::Preferences(format!("Failed to encode preferences: {e}")))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Preferences saved");
        Ok(())
    }

    pub fn set_api_key(&self, key: &str) -> AppResult<()> {
        if ApiKey::new(key).is_none() {
            return Err(AppError::Preferences("API key must not be empty".to_string()));
        }
        let mut prefs = self.load()?;
        prefs.api_key = Some(key.trim().to_string());
        self.save(&prefs)?;
        info!("API key stored");
        Ok(())
    }

    pub fn clear_api_key(&self) -> AppResult<()> {
        let mut prefs = self.load()?;
        prefs.api_key = None;
        self.save(&prefs)?;
        info!("API key removed");
        Ok(())
    }

    pub fn set_theme(&self, theme: Theme) -> AppResult<()> {
        let mut prefs = self.load()?;
        prefs.theme = Some(theme);
        self.save(&prefs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (PreferenceStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = PreferenceStore::new(dir.path().join("nested").join("prefs.json"));
        (store, dir)
    }

    #[test]
    fn test_missing_file_is_default() {
        let (store, _dir) = store();
        let prefs = store.load().unwrap();
        assert!(prefs.api_key().is_none());
        assert_eq!(prefs.theme(), Theme::System);
    }

    #[test]
    fn test_round_trip_uses_fixed_keys() {
        let (store, _dir) = store();
        store.set_api_key("  key-123 ").unwrap();
        store.set_theme(Theme::Dark).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["botdeck.apiKey"], "key-123");
        assert_eq!(raw["botdeck.theme"], "dark");

        let prefs = store.load().unwrap();
        assert_eq!(prefs.api_key().unwrap().expose(), "key-123");
        assert_eq!(prefs.theme(), Theme::Dark);
    }

    #[test]
    fn test_clear_api_key_keeps_theme() {
        let (store, _dir) = store();
        store.set_api_key("k").unwrap();
        store.set_theme(Theme::Light).unwrap();
        store.clear_api_key().unwrap();
        let prefs = store.load().unwrap();
        assert!(prefs.api_key().is_none());
        assert_eq!(prefs.theme(), Theme::Light);
    }

    #[test]
    fn test_blank_key_rejected() {
        let (store, _dir) = store();
        assert!(store.set_api_key("   ").is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        let prefs = Preferences {
            api_key: Some("secret".to_string()),
            theme: None,
        };
        assert!(!format!("{prefs:?}").contains("secret"));
    }

    #[test]
    fn test_theme_parse() {
        assert_eq!("dark".parse::<Theme>().unwrap(), Theme::Dark);
        assert!("neon".parse::<Theme>().is_err());
    }
}
