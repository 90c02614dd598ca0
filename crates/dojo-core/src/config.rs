//! Application configuration.
//!
//! Stored at `~/.config/dojo/config.json`. Connection settings can be
//! overridden from the environment (`DOJO_STORE_URL`, `DOJO_APP_ID`); the
//! API token is only ever read from `DOJO_API_TOKEN`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::attendance::{CreditYear, PointPolicy};
use crate::cache::manager::DEFAULT_TTL_MINUTES;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "dojo";

const CONFIG_FILE: &str = "config.json";

pub const ENV_STORE_URL: &str = "DOJO_STORE_URL";
pub const ENV_APP_ID: &str = "DOJO_APP_ID";
pub const ENV_API_TOKEN: &str = "DOJO_API_TOKEN";

fn default_ttl() -> i64 {
    DEFAULT_TTL_MINUTES
}

fn default_exclude_admins() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub store_url: Option<String>,
    pub app_id: Option<String>,
    #[serde(default = "default_ttl")]
    pub cache_ttl_minutes: i64,
    #[serde(default)]
    pub point_policy: PointPolicy,
    /// Year a saved sheet credits: `save_date` (default) or `session_date`.
    #[serde(default)]
    pub credit_year: CreditYear,
    /// Leave admins out of featured students and stats.
    #[serde(default = "default_exclude_admins")]
    pub exclude_admins: bool,
    /// Recorded as the actor of overrides made from this machine.
    #[serde(default)]
    pub actor: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_url: None,
            app_id: None,
            cache_ttl_minutes: DEFAULT_TTL_MINUTES,
            point_policy: PointPolicy::default(),
            credit_year: CreditYear::default(),
            exclude_admins: true,
            actor: None,
        }
    }
}

impl Config {
    /// Load the config file (defaults if missing), then apply environment
    /// overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply overrides from a variable lookup. Empty values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_STORE_URL) {
            self.store_url = Some(url);
        }
        if let Some(app_id) = get(ENV_APP_ID) {
            self.app_id = Some(app_id);
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Per-app cache directory, so switching apps never mixes snapshots.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;

        let mut path = cache_dir.join(APP_NAME);
        if let Some(ref app_id) = self.app_id {
            path = path.join(app_id);
        }
        Ok(path)
    }

    pub fn api_token() -> Option<String> {
        std::env::var(ENV_API_TOKEN).ok().filter(|t| !t.trim().is_empty())
    }

    /// Store URL and app id, or an error naming what is missing.
    pub fn connection(&self) -> Result<(&str, &str)> {
        let url = self
            .store_url
            .as_deref()
            .with_context(|| format!("No store URL configured (set {} or store_url)", ENV_STORE_URL))?;
        let app_id = self
            .app_id
            .as_deref()
            .with_context(|| format!("No app id configured (set {} or app_id)", ENV_APP_ID))?;
        Ok((url, app_id))
    }
}
