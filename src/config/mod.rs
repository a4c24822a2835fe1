//! Application configuration. The configuration lives in a single JSON file next to the sync
//! database, see [CONFIG_FILE_NAME].

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::utils::dir::ensure_dir;

pub const CONFIG_FILE_NAME: &str = "app-config.json";

pub const DEFAULT_TOGGL_URL: &str = "https://api.track.toggl.com";
pub const DEFAULT_TEMPO_URL: &str = "https://api.tempo.io/core";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Config {
    pub application: ApplicationConfig,
    pub jira: JiraConfig,
    pub tempo: TempoConfig,
    pub toggl: TogglConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// 1 = Monday ... 7 = Sunday.
    #[serde(rename = "firstDateOfWeek")]
    pub first_date_of_week: u8,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            first_date_of_week: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JiraConfig {
    pub host: String,
    pub user: String,
    pub token: String,
}

impl JiraConfig {
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() || self.user.is_empty() || self.token.is_empty() {
            bail!("JIRA host, user and token must be set");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TempoConfig {
    pub token: String,
    #[serde(default = "default_tempo_url")]
    pub url: String,
}

impl Default for TempoConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            url: default_tempo_url(),
        }
    }
}

impl TempoConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            bail!("Tempo token must be set");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TogglConfig {
    pub user_agent: String,
    pub token: String,
    #[serde(default = "default_toggl_url")]
    pub url: String,
}

impl Default for TogglConfig {
    fn default() -> Self {
        Self {
            user_agent: String::new(),
            token: String::new(),
            url: default_toggl_url(),
        }
    }
}

impl TogglConfig {
    pub fn validate(&self) -> Result<()> {
        if self.token.is_empty() || self.user_agent.is_empty() {
            bail!("Toggl token and user agent must be set");
        }
        Ok(())
    }
}

fn default_tempo_url() -> String {
    DEFAULT_TEMPO_URL.into()
}

fn default_toggl_url() -> String {
    DEFAULT_TOGGL_URL.into()
}

impl Config {
    pub fn path(dir: &Path) -> PathBuf {
        dir.join(CONFIG_FILE_NAME)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::path(dir).exists()
    }

    /// Checks that the file at `path` is a readable, well-formed configuration and returns it.
    pub fn validate_file(path: &Path) -> Result<Config> {
        info!("Validate JSON-config file {path:?}");

        if !path.exists() {
            bail!("File '{}' does not exist", path.display());
        }
        if !path.is_file() {
            bail!("Path '{}' is not file", path.display());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let value = serde_json::from_str::<serde_json::Value>(&content)
            .map_err(|e| anyhow!("Failed to read JSON config file: {e}"))?;
        let config = serde_json::from_value::<Config>(value)
            .map_err(|e| anyhow!("JSON config is incorrect: {e}"))?;

        if !(1..=7).contains(&config.application.first_date_of_week) {
            bail!(
                "JSON config is incorrect: firstDateOfWeek must be between 1 and 7, got {}",
                config.application.first_date_of_week
            );
        }

        Ok(config)
    }

    pub fn load(dir: &Path) -> Result<Config> {
        let path = Self::path(dir);
        info!("Load config from {path:?}");
        Self::validate_file(&path)
    }

    /// Loads the configuration or falls back to an empty one if there is no file yet.
    pub fn load_or_default(dir: &Path) -> Result<Config> {
        if Self::exists(dir) {
            Self::load(dir)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        let dir = ensure_dir(dir.to_path_buf())?;
        let path = Self::path(&dir);

        info!("Save config to {path:?}");

        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        fs::write(&path, buffer)?;
        Ok(())
    }
}
