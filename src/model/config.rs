use anyhow::{Context, Result, ensure};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULTS: &str = include_str!("../../config/default.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneralConfig {
    pub auto_save_debounce_ms: u64,
    pub tick_ms: u64,
    pub history_limit: usize,
    pub open_list_limit: usize,
    pub order_step: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    pub max_results: usize,
    pub snippet_radius: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub filter: String,
    pub file: String,
}

impl AppConfig {
    /// Load configuration with layering: defaults → user config.
    pub fn load() -> Result<Self> {
        let mut config = Self::defaults()?;

        if let Some(config_path) = Self::user_config_path()
            && config_path.exists()
        {
            config = Self::load_from(&config_path)?; // TODO: deep merge instead of full replace
        }

        Ok(config)
    }

    /// The compiled-in `config/default.toml`.
    pub fn defaults() -> Result<Self> {
        let config: AppConfig =
            toml::from_str(DEFAULTS).context("built-in default config is invalid")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: AppConfig =
            toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Values the workspace cannot run with: a non-positive order step breaks
    /// key uniqueness in a sibling group, and history needs room for one entry.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.general.order_step > 0,
            "general.order_step must be positive, got {}",
            self.general.order_step
        );
        ensure!(
            self.general.history_limit >= 1,
            "general.history_limit must be at least 1"
        );
        Ok(())
    }

    pub fn user_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "treepad")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn log_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "treepad")
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(std::env::temp_dir)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.general.auto_save_debounce_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.general.tick_ms.max(1))
    }
}
