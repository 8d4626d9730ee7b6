use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ChatError;
use super::storage_service::get_app_data_dir;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234/v1";
pub const DEFAULT_MODEL: &str = "local-model";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// `-1` lets the server pick the completion length
pub const DEFAULT_MAX_TOKENS: i32 = -1;

/// Settings as stored in `config.json`. Every field is optional; missing
/// ones fall back to the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<i32>,
}

impl Config {
    /// Layer `overrides` on top of `self`, field by field
    pub fn merged_with(self, overrides: Config) -> Config {
        Config {
            base_url: overrides.base_url.or(self.base_url),
            model: overrides.model.or(self.model),
            api_key: overrides.api_key.or(self.api_key),
            temperature: overrides.temperature.or(self.temperature),
            max_tokens: overrides.max_tokens.or(self.max_tokens),
        }
    }
}

/// Fully resolved settings for talking to the completion endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: i32,
}

impl ClientConfig {
    pub fn new(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL, DEFAULT_MODEL)
    }
}

pub fn get_config_path() -> Result<PathBuf, ChatError> {
    Ok(get_app_data_dir()?.join("config.json"))
}

pub fn load_config(path: &Path) -> Result<Config, ChatError> {
    if !path.exists() {
        return Ok(Config::default());
    }

    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ChatError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

pub fn save_config(path: &Path, config: &Config) -> Result<(), ChatError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ChatError::Config(format!("Failed to serialize config: {}", e)))?;
    fs::write(path, content)?;
    Ok(())
}

/// Resolve the settings in effect: `overrides` (command line and
/// environment) win over the config file, which wins over defaults.
pub fn get_effective_config(path: &Path, overrides: Config) -> Result<ClientConfig, ChatError> {
    let stored = load_config(path)?;
    resolve(stored.merged_with(overrides))
}

/// Write `overrides` into the config file on top of what it already holds.
///
/// An API key given on the command line or through the environment is not
/// written; a key already in the file is kept. The merged settings are
/// validated first so a bad value never reaches disk.
pub fn save_overrides(path: &Path, overrides: Config) -> Result<(), ChatError> {
    let merged = load_config(path)?.merged_with(Config {
        api_key: None,
        ..overrides
    });
    resolve(merged.clone())?;
    save_config(path, &merged)
}

/// Apply defaults and validate
pub fn resolve(config: Config) -> Result<ClientConfig, ChatError> {
    let base_url = config
        .base_url
        .map(|u| u.trim().trim_end_matches('/').to_string())
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

    let parsed = Url::parse(&base_url)
        .map_err(|e| ChatError::Config(format!("Invalid base URL '{}': {}", base_url, e)))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ChatError::Config(format!(
            "Base URL must use http or https, got '{}'",
            parsed.scheme()
        )));
    }

    let model = match config.model {
        Some(model) if model.trim().is_empty() => {
            return Err(ChatError::Config("Model identifier must not be blank".to_string()));
        }
        Some(model) => model.trim().to_string(),
        None => DEFAULT_MODEL.to_string(),
    };

    Ok(ClientConfig {
        base_url,
        model,
        api_key: config.api_key.filter(|k| !k.trim().is_empty()),
        temperature: config.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        max_tokens: config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
    })
}
