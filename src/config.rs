use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::rows::parse_delimiter;

pub const DEFAULT_CONFIG_FILE: &str = "lci-import.json";
pub const DEFAULT_LOCATION: &str = "GLO";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub overwrite: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub default_location: Option<String>,
    #[serde(default)]
    pub store: Option<String>,
    #[serde(default)]
    pub units: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub delimiter: u8,
    pub depends: Vec<String>,
    pub overwrite: bool,
    pub name: Option<String>,
    pub default_location: String,
    pub store: Option<String>,
    pub units: BTreeMap<String, String>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the config file. An explicit path must exist; a missing default file
    /// resolves to all defaults.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ImportError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ImportError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ImportError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ImportError> {
        let delimiter = match config.delimiter.as_deref() {
            Some(value) => parse_delimiter(value)?,
            None => b'\t',
        };
        let default_location = config
            .default_location
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_LOCATION.to_string());
        let name = config
            .name
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            delimiter,
            depends: config.depends,
            overwrite: config.overwrite.unwrap_or(false),
            name,
            default_location,
            store: config.store,
            units: config.units,
        })
    }
}
