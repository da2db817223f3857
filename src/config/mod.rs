use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::auth::Credentials;
use crate::api::Endpoints;
use crate::client::RenderMode;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server root, request paths are appended to it
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Whether reads return a list of users or a single user
    #[serde(default)]
    pub mode: RenderMode,

    /// Basic-auth credential sent with reads
    #[serde(default)]
    pub credentials: Credentials,

    /// Send reads without the credential
    #[serde(default)]
    pub anonymous: bool,

    /// Also send alerts as desktop notifications
    #[serde(default)]
    pub notifications: bool,

    /// Unset means requests never time out
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub endpoints: Endpoints,

    /// Color overrides, e.g. `accent = "#ffc107"`
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub theme: HashMap<String, String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            mode: RenderMode::default(),
            credentials: Credentials::default(),
            anonymous: false,
            notifications: false,
            request_timeout_secs: None,
            endpoints: Endpoints::default(),
            theme: HashMap::new(),
        }
    }
}

impl AppConfig {
    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("userdesk");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the default location, or create it
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Ok(path) => Ok(Self::load_from(&path)),
            Err(_) => Ok(AppConfig::default()),
        }
    }

    /// Load config from a file. Unreadable or broken files fall back to
    /// defaults; a missing file is written with defaults.
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match std::fs::read_to_string(path) {
                Ok(content) => match toml::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Failed to parse config {}: {}", path.display(), e),
                },
                Err(e) => tracing::warn!("Failed to read config {}: {}", path.display(), e),
            }
            return AppConfig::default();
        }

        let config = AppConfig::default();
        if let Err(e) = config.save_to(path) {
            tracing::warn!("Could not write default config: {}", e);
        }
        config
    }

    /// Save config to a file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let mut clean_config = self.clone();
        clean_config.base_url = clean_config.base_url.trim().to_string();

        let content = toml::to_string_pretty(&clean_config)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn credentials(&self) -> Option<Credentials> {
        (!self.anonymous).then(|| self.credentials.clone())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let mut config = AppConfig {
            base_url: "https://users.example.com".to_string(),
            mode: RenderMode::Single,
            credentials: Credentials::new("marge", "secret"),
            anonymous: false,
            notifications: true,
            request_timeout_secs: Some(10),
            endpoints: Endpoints::default(),
            theme: HashMap::new(),
        };
        config.theme.insert("accent".to_string(), "#ffc107".to_string());

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: AppConfig = toml::from_str("mode = \"single\"\n").unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.mode, RenderMode::Single);
        assert_eq!(config.credentials(), Some(Credentials::default()));
        assert_eq!(config.endpoints, Endpoints::default());
        assert!(config.request_timeout().is_none());
    }

    #[test]
    fn test_anonymous_drops_credentials() {
        let config: AppConfig = toml::from_str("anonymous = true\n").unwrap();
        assert!(config.credentials().is_none());
    }

    #[test]
    fn test_partial_endpoints_table() {
        let config: AppConfig = toml::from_str("[endpoints]\nlist = \"/api/users/\"\n").unwrap();

        assert_eq!(config.endpoints.list, "/api/users/");
        assert_eq!(config.endpoints.register, "/api/user/register/");
    }

    #[test]
    fn test_load_from_missing_file_writes_defaults() {
        let dir = std::env::temp_dir().join(format!("userdesk-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        let _ = std::fs::remove_file(&path);

        let config = AppConfig::load_from(&path);
        assert_eq!(config, AppConfig::default());
        assert!(path.exists());

        std::fs::write(&path, "this is = = not toml").unwrap();
        assert_eq!(AppConfig::load_from(&path), AppConfig::default());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
