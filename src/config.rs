use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub geocoder: GeocoderConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocoderConfig {
    /// Nominatim-style search endpoint.
    pub endpoint: String,
    /// Per-call timeout; enrichment never blocks a row longer than this.
    pub timeout_seconds: u64,
    /// Fixed delay between consecutive geocoding calls.
    pub delay_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://nominatim.openstreetmap.org/search".to_string(),
            timeout_seconds: 5,
            delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    /// Column-mapping assistant endpoint; empty disables the assistant path.
    pub endpoint: String,
    pub timeout_seconds: u64,
    /// Number of data rows sent as a sample alongside the column names.
    pub sample_rows: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            timeout_seconds: 20,
            sample_rows: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path of the JSON-file registry used by the CLI.
    pub path: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: "registry.json".to_string(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            crate::error::ImportError::Config(format!(
                "Failed to read config file '{}': {}",
                path, e
            ))
        })?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load `config.toml` when present, otherwise fall back to defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            geocoder: GeocoderConfig::default(),
            assistant: AssistantConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}
