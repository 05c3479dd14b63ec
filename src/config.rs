use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub collector: CollectorConfig,
    pub sources: SourcesConfig,
    pub check: CheckConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectorConfig {
    /// Root directory of the CSV output tree.
    pub out_dir: String,
    /// Writer tag embedded in every filename. Must be unique per running
    /// collector so parallel writers never collide on a file.
    pub uid: String,
    /// Also record every arrival (duplicates included) to the sourcelog.
    pub write_sourcelog: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SourcesConfig {
    /// Direct-peer websocket endpoints for the default adapter.
    pub nodes: Vec<String>,
    /// Relay credentials; an empty token leaves the adapter disabled.
    pub bloxroute_auth_token: String,
    pub eden_auth_token: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CheckConfig {
    /// Chain node used to skip already-mined transactions. Empty = off.
    pub node_uri: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            sources: SourcesConfig::default(),
            check: CheckConfig::default(),
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            uid: String::new(),
            write_sourcelog: false,
        }
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["ws://127.0.0.1:8546".into()],
            bloxroute_auth_token: String::new(),
            eden_auth_token: String::new(),
        }
    }
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            node_uri: String::new(),
        }
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("Config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Required fields with no usable default.
    pub fn validate(&self) -> Result<(), String> {
        if self.collector.out_dir.is_empty() {
            return Err("collector.out_dir must be set".into());
        }
        if self.collector.uid.is_empty() {
            return Err("collector.uid must be set (unique per running collector)".into());
        }
        Ok(())
    }
}
