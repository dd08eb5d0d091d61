use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{HttpAnalyst, MockAnalyst};
use crate::backend::{Backend, BackendKind};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:5001";
pub const DEFAULT_USER_ID: &str = "test_user_001";
const DEFAULT_MOCK_DELAY_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Config {
    pub backend: Option<String>,
    pub server_url: Option<String>,
    pub user_id: Option<String>,
    pub mock_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            backend: Some(BackendKind::Mock.as_str().to_string()),
            server_url: None,
            user_id: None,
            mock_delay_ms: None,
            request_timeout_secs: None,
        }
    }

    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::get_config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::new());
        }

        let config_content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&config_content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let config_content = serde_json::to_string_pretty(self)?;
        fs::write(path, config_content)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(backend) = std::env::var("INSIGHT_BACKEND") {
            self.backend = Some(backend);
        }
        if let Ok(url) = std::env::var("INSIGHT_SERVER_URL") {
            self.server_url = Some(url);
        }
    }

    pub fn backend_kind(&self) -> Result<BackendKind> {
        match self.backend.as_deref() {
            None => Ok(BackendKind::Mock),
            Some(name) => BackendKind::from_str(name)
                .ok_or_else(|| anyhow!("Unknown backend '{}' (expected mock or http)", name)),
        }
    }

    pub fn server_url(&self) -> &str {
        self.server_url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn user_id(&self) -> &str {
        self.user_id.as_deref().unwrap_or(DEFAULT_USER_ID)
    }

    pub fn mock_delay(&self) -> Duration {
        Duration::from_millis(self.mock_delay_ms.unwrap_or(DEFAULT_MOCK_DELAY_MS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn build_backend(&self) -> Result<Backend> {
        Ok(match self.backend_kind()? {
            BackendKind::Mock => Backend::Mock(MockAnalyst::new(self.mock_delay())),
            BackendKind::Http => Backend::Http(HttpAnalyst::new(self.server_url(), self.user_id())),
        })
    }

    fn get_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("insight-desk").join("config.json"))
    }
}
