//! Configuration port interface

use async_trait::async_trait;
use std::path::PathBuf;

use crate::domain::config::AppConfig;
use crate::domain::error::ConfigError;

/// Port for configuration storage
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Load the stored config. Missing files yield an empty config.
    async fn load(&self) -> Result<AppConfig, ConfigError>;

    async fn save(&self, config: &AppConfig) -> Result<(), ConfigError>;

    /// Get the configuration file path.
    fn path(&self) -> PathBuf;

    fn exists(&self) -> bool;

    /// Write a config file with defaults. Fails if one already exists.
    async fn init(&self) -> Result<(), ConfigError>;

    /// Defaults overlaid with whatever is stored
    async fn load_effective(&self) -> Result<AppConfig, ConfigError> {
        Ok(AppConfig::defaults().merge(self.load().await?))
    }
}
