use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use anyhow::{Result, anyhow};

use crate::composer::DEFAULT_MAX_ROWS;
use crate::state::DEFAULT_SIDEBAR_BREAKPOINT;

pub const DEFAULT_API_URL: &str = "http://localhost:5000";
pub const DEFAULT_MODEL: &str = "llama3-8b";
pub const DEFAULT_MODE: &str = "basic";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Config {
    pub api_url: Option<String>,
    pub default_model: Option<String>,
    pub default_mode: Option<String>,
    /// Offered by the model picker when `/models` is unreachable.
    pub models: Option<Vec<String>>,
    pub modes: Option<Vec<String>>,
    pub sidebar_breakpoint: Option<u16>,
    pub composer_max_rows: Option<u16>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::get_config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
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

    pub fn save_default_model(model: &str) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_model = Some(model.to_string());
        config.save()
    }

    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;

        Ok(config_dir.join("chatdesk"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn api_url(&self) -> &str {
        self.api_url.as_deref().unwrap_or(DEFAULT_API_URL)
    }

    pub fn model(&self) -> &str {
        self.default_model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn mode(&self) -> &str {
        self.default_mode.as_deref().unwrap_or(DEFAULT_MODE)
    }

    pub fn known_models(&self) -> Vec<String> {
        self.models.clone().unwrap_or_else(|| {
            ["llama3-8b", "llama3-70b", "mixtral", "gemma", "gpt-oss-20b", "gpt-oss-120b"]
                .iter()
                .map(|m| m.to_string())
                .collect()
        })
    }

    pub fn known_modes(&self) -> Vec<String> {
        self.modes
            .clone()
            .unwrap_or_else(|| vec!["basic".to_string(), "pro".to_string()])
    }

    pub fn sidebar_breakpoint(&self) -> u16 {
        self.sidebar_breakpoint.unwrap_or(DEFAULT_SIDEBAR_BREAKPOINT)
    }

    pub fn composer_max_rows(&self) -> u16 {
        self.composer_max_rows.unwrap_or(DEFAULT_MAX_ROWS)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }
}
