//! Configuration management for harstat.
//!
//! This module defines the `Config` struct and related functionality for
//! managing extraction settings. The configuration can be loaded from a YAML
//! file, created programmatically, or overridden from command-line arguments.
//!
//! API keys are collected from several places, in this order: the
//! `api_keys` entry of the config, a streamlit style `secrets.toml`
//! (`GEMINI_API_KEY` or `GEMINI_API_KEYS`), and the `HARSTAT_API_KEYS`
//! (comma separated) and `GEMINI_API_KEY` environment variables.
//!
//! # Examples
//!
//! ```no_run
//! use harstat_core::config::{Config, ExtractionMode};
//!
//! # #[tokio::main]
//! # async fn main() -> harstat_core::Result<()> {
//! let mut config = Config::from_file("harstat.yaml").await?;
//! config.mode = ExtractionMode::Mapper;
//! config.validate()?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Error;
use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::extract::oracle::{
    CredentialPool, CredentialStrategy, DEFAULT_MAX_ATTEMPTS, DEFAULT_MODEL, default_base_url,
};
use crate::locator::LocatorConfig;

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use serde_value::Value as SerdeValue;
use tokio::fs;
use url::Url;

/// Environment variable holding comma separated API keys.
pub const KEYS_ENV: &str = "HARSTAT_API_KEYS";

/// Environment variable holding a single Gemini API key.
pub const GEMINI_KEY_ENV: &str = "GEMINI_API_KEY";

const SECRETS_KEY: &str = "GEMINI_API_KEY";
const SECRETS_KEYS: &str = "GEMINI_API_KEYS";
const DEFAULT_SECRETS_FILE: &str = ".streamlit/secrets.toml";

/// How records are pulled out of the located payloads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// Prompt a completion service with chunks of payload text
    #[default]
    Oracle,
    /// Read fields directly from the known payload shape
    Mapper,
}

/// Configuration for an extraction run
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Extraction strategy
    #[serde(default)]
    pub mode: ExtractionMode,

    /// Model used by the completion service
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of the completion service API
    #[serde(default = "default_base_url")]
    pub base_url: Url,

    /// API keys, either one string or a list
    #[serde(default, deserialize_with = "deserialize_keys")]
    pub api_keys: Vec<String>,

    /// Optional path to a `secrets.toml` holding API keys
    #[serde(default)]
    pub secrets_file: Option<PathBuf>,

    /// Maximum characters per oracle request chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Attempts per chunk before giving up on it
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Concurrent chunk requests (defaults to the number of keys)
    #[serde(default)]
    pub workers: Option<usize>,

    /// Timeout of a single completion request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// How keys are assigned to chunk requests
    #[serde(default)]
    pub credential_strategy: CredentialStrategy,

    /// Entry selection settings
    #[serde(default)]
    pub locator: LocatorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::default(),
            model: default_model(),
            base_url: default_base_url(),
            api_keys: Vec::new(),
            secrets_file: None,
            chunk_size: default_chunk_size(),
            max_attempts: default_max_attempts(),
            workers: None,
            request_timeout_secs: default_request_timeout(),
            credential_strategy: CredentialStrategy::default(),
            locator: LocatorConfig::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("mode", &self.mode)
            .field("model", &self.model)
            .field("base_url", &self.base_url.as_str())
            .field("api_keys", &format_args!("<{} redacted>", self.api_keys.len()))
            .field("secrets_file", &self.secrets_file)
            .field("chunk_size", &self.chunk_size)
            .field("max_attempts", &self.max_attempts)
            .field("workers", &self.workers)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("credential_strategy", &self.credential_strategy)
            .field("locator", &self.locator)
            .finish()
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path).await?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// `~/.harstat/config.yaml`, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".harstat").join("config.yaml"))
    }

    /// Check value ranges
    pub fn validate(&self) -> crate::Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("max_attempts must be at least 1"));
        }
        if self.workers == Some(0) {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.model.trim().is_empty() {
            return Err(Error::config("model must not be empty"));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Collect API keys from config, secrets file and process environment.
    pub async fn credentials(&self) -> crate::Result<CredentialPool> {
        self.credentials_with_env(|name| std::env::var(name).ok())
            .await
    }

    /// As [`Config::credentials`], reading variables through `env`.
    pub async fn credentials_with_env<F>(&self, env: F) -> crate::Result<CredentialPool>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut keys = self.api_keys.clone();
        keys.extend(self.secrets_keys().await?);
        if let Some(list) = env(KEYS_ENV) {
            keys.extend(list.split(',').map(str::to_string));
        }
        if let Some(key) = env(GEMINI_KEY_ENV) {
            keys.push(key);
        }
        CredentialPool::new(keys)
    }

    async fn secrets_keys(&self) -> crate::Result<Vec<String>> {
        let path = match &self.secrets_file {
            Some(path) => path.clone(),
            None => {
                let fallback = PathBuf::from(DEFAULT_SECRETS_FILE);
                if !fallback.exists() {
                    return Ok(Vec::new());
                }
                fallback
            }
        };

        let content = fs::read_to_string(&path).await.map_err(|e| {
            Error::config(format!(
                "Failed to read secrets file {}: {}",
                path.display(),
                e
            ))
        })?;
        let table: toml::Table = toml::from_str(&content)?;

        let mut keys = Vec::new();
        if let Some(key) = table.get(SECRETS_KEY).and_then(toml::Value::as_str) {
            keys.push(key.to_string());
        }
        if let Some(list) = table.get(SECRETS_KEYS).and_then(toml::Value::as_array) {
            keys.extend(list.iter().filter_map(toml::Value::as_str).map(str::to_string));
        }
        log::debug!("Read {} keys from {}", keys.len(), path.display());
        Ok(keys)
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}

fn default_request_timeout() -> u64 {
    120
}

/// Accept either a single key or a list of keys
fn deserialize_keys<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;

    match value {
        SerdeValue::Unit | SerdeValue::Option(None) => Ok(Vec::new()),
        SerdeValue::String(s) => Ok(vec![s]),
        SerdeValue::Seq(seq) => {
            let mut result = Vec::new();
            for item in seq {
                if let SerdeValue::String(s) = item {
                    result.push(s);
                } else {
                    return Err(serde::de::Error::custom(
                        "Expected string or array of strings",
                    ));
                }
            }
            Ok(result)
        }
        _ => Err(serde::de::Error::custom(
            "Expected string or array of strings",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[tokio::test]
    async fn test_config_roundtrip() -> crate::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.mode = ExtractionMode::Mapper;
        config.workers = Some(4);
        config.save(&file_path).await?;

        let loaded = Config::from_file(&file_path).await?;
        assert_eq!(loaded.mode, ExtractionMode::Mapper);
        assert_eq!(loaded.model, DEFAULT_MODEL);
        assert_eq!(loaded.chunk_size, 40_000);
        assert_eq!(loaded.max_attempts, 3);
        assert_eq!(loaded.workers, Some(4));
        assert_eq!(loaded.credential_strategy, CredentialStrategy::RoundRobin);
        assert_eq!(loaded.locator, LocatorConfig::default());
        assert_eq!(loaded.base_url, default_base_url());
        Ok(())
    }

    #[test]
    fn test_api_keys_string_or_list() -> crate::Result<()> {
        let single: Config = serde_yaml::from_str("api_keys: abc")?;
        assert_eq!(single.api_keys, vec!["abc"]);

        let list: Config = serde_yaml::from_str("api_keys: [a, b]\nmode: oracle")?;
        assert_eq!(list.api_keys, vec!["a", "b"]);

        let empty: Config = serde_yaml::from_str("api_keys:\nmodel: m")?;
        assert!(empty.api_keys.is_empty());

        assert!(serde_yaml::from_str::<Config>("api_keys: [1, 2]").is_err());
        Ok(())
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_ok());
        let bad = Config {
            chunk_size: 0,
            ..Config::default()
        };
        assert!(matches!(bad.validate(), Err(Error::Config(_))));
        let bad = Config {
            workers: Some(0),
            ..Config::default()
        };
        assert!(bad.validate().is_err());
    }

    #[tokio::test]
    async fn test_credentials_merge_sources() -> crate::Result<()> {
        let dir = tempdir()?;
        let secrets = dir.path().join("secrets.toml");
        tokio::fs::write(
            &secrets,
            "GEMINI_API_KEY = \"from-secrets\"\nGEMINI_API_KEYS = [\"s2\", \"from-config\"]\n",
        )
        .await?;

        let config = Config {
            api_keys: vec!["from-config".into()],
            secrets_file: Some(secrets),
            ..Config::default()
        };
        let pool = config
            .credentials_with_env(|name| match name {
                KEYS_ENV => Some("e1, e2,".into()),
                GEMINI_KEY_ENV => Some("e1".into()),
                _ => None,
            })
            .await?;
        assert_eq!(
            pool.iter().collect::<Vec<_>>(),
            vec!["from-config", "from-secrets", "s2", "e1", "e2"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_credentials_is_config_error() -> crate::Result<()> {
        let dir = tempdir()?;
        let secrets = dir.path().join("secrets.toml");
        tokio::fs::write(&secrets, "OTHER = 1\n").await?;
        let config = Config {
            secrets_file: Some(secrets),
            ..Config::default()
        };
        let err = config.credentials_with_env(no_env).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        Ok(())
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = Config {
            api_keys: vec!["super-secret".into()],
            ..Config::default()
        };
        assert!(!format!("{:?}", config).contains("super-secret"));
    }
}
