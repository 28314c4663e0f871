//! Configuration Management
//!
//! Persistent configuration for aztidal. The main payload is the per-endpoint
//! `api-version` table: Azure versions each resource type independently and
//! bumps them on its own schedule, so these stay editable without a rebuild.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The `api-version` query parameter for each endpoint family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiVersions {
    pub subscriptions: String,
    pub resource_groups: String,
    pub compute: String,
    pub vm_sizes: String,
    pub disks: String,
    pub network: String,
    pub sql: String,
    pub postgres: String,
    pub mysql: String,
    pub redis: String,
    pub web: String,
    pub migrate: String,
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            subscriptions: "2023-07-01".to_string(),
            resource_groups: "2023-07-01".to_string(),
            compute: "2023-07-01".to_string(),
            vm_sizes: "2023-07-01".to_string(),
            disks: "2023-04-02".to_string(),
            network: "2021-05-01".to_string(),
            sql: "2022-02-01-preview".to_string(),
            postgres: "2022-12-01".to_string(),
            mysql: "2023-06-30".to_string(),
            redis: "2023-08-01".to_string(),
            web: "2022-03-01".to_string(),
            migrate: "2020-05-01-preview".to_string(),
        }
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Per-endpoint api-version overrides
    #[serde(default)]
    pub api_versions: ApiVersions,
    /// Default directory for per-subscription output files
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Default Tidal sync chunk size (everything in one chunk when unset)
    #[serde(default)]
    pub sync_page_size: Option<usize>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("aztidal").join("config.json"))
    }

    /// Load the configuration, writing a default file on first run so the
    /// api-version table is visible and editable
    pub fn load_or_init() -> Self {
        let config = Self::load();
        if let Some(path) = Self::config_path() {
            if !path.exists() {
                if let Err(e) = config.save() {
                    tracing::debug!("Could not write default config: {:#}", e);
                }
            }
        }
        config
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }
}
