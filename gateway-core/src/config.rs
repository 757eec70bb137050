/// Gateway configuration loaded from TOML with environment overrides.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{GatewayError, Result};
use crate::registry::parse_source_list;

pub const MODE_ENV: &str = "GATEWAY_ENV";
pub const DATA_SOURCES_ENV: &str = "GQL_DATA_SOURCES";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Production,
    #[default]
    Development,
}

impl DeploymentMode {
    pub fn is_production(&self) -> bool {
        matches!(self, DeploymentMode::Production)
    }

    /// Anything other than `production` is treated as development.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("production") {
            DeploymentMode::Production
        } else {
            DeploymentMode::Development
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub backend: CacheBackendKind,
    pub sqlite_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300,
            backend: CacheBackendKind::Memory,
            sqlite_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub mode: DeploymentMode,
    /// Unset means "mock outside production".
    pub enable_mock_data: Option<bool>,
    pub preserve_resolvers: bool,
    pub data_sources: Vec<String>,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

impl GatewayConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).await?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: GatewayConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn data_source_paths(&self) -> Vec<PathBuf> {
        self.data_sources.iter().map(PathBuf::from).collect()
    }

    pub fn mock_data_enabled(&self) -> bool {
        self.enable_mock_data.unwrap_or(!self.mode.is_production())
    }

    /// Applies `GATEWAY_ENV` and `GQL_DATA_SOURCES` from the process environment.
    pub fn apply_env(self) -> Self {
        let mode = std::env::var(MODE_ENV).ok();
        let sources = std::env::var(DATA_SOURCES_ENV).ok();
        self.with_overrides(mode.as_deref(), sources.as_deref())
    }

    pub fn with_overrides(mut self, mode: Option<&str>, data_sources: Option<&str>) -> Self {
        if let Some(mode) = mode {
            self.mode = DeploymentMode::parse(mode);
        }
        if let Some(sources) = data_sources {
            self.data_sources = parse_source_list(sources)
                .into_iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect();
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.enabled && self.cache.ttl_seconds == 0 {
            return Err(GatewayError::InvalidConfig(
                "cache.ttl_seconds must be positive when caching is enabled".to_string(),
            ));
        }
        if self.cache.backend == CacheBackendKind::Sqlite && self.cache.sqlite_path.is_none() {
            return Err(GatewayError::InvalidConfig(
                "cache.sqlite_path is required for the sqlite backend".to_string(),
            ));
        }
        Ok(())
    }
}
