//! Broker configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `HF_MCP_*` environment variables. The write credential is read
//! from `HF_TOKEN` (or `HUGGINGFACE_TOKEN`) when the layers did not set one.
//!
//! ```no_run
//! use hf_core::config::{load_environment, BrokerConfig};
//!
//! load_environment();
//! let config = BrokerConfig::load(None).expect("valid configuration");
//! assert!(config.capacity >= 1);
//! ```

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Default number of concurrently loaded models.
pub const DEFAULT_CAPACITY: usize = 3;
/// Default number of cached metadata records.
pub const DEFAULT_METADATA_CACHE_SIZE: usize = 100;
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_HUB_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_INFERENCE_ENDPOINT: &str = "https://api-inference.huggingface.co";

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "hf-mcp.toml";

/// Env files checked by [`load_environment`], in order of priority
pub const ENV_FILE_PATHS: &[&str] = &["/etc/hf-mcp/environment", ".env"];

const ENV_PREFIX: &str = "HF_MCP";
const TOKEN_VARS: &[&str] = &["HF_TOKEN", "HUGGINGFACE_TOKEN"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Process-wide broker settings. Read once at startup, never mutated.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    /// Max concurrently loaded models
    pub capacity: usize,
    /// Max cached metadata records
    pub metadata_cache_size: usize,
    /// Ceiling for every remote call
    pub call_timeout_ms: u64,
    /// Ceiling for one model materialization
    pub load_timeout_secs: u64,
    pub hub_endpoint: String,
    pub inference_endpoint: String,
    /// Default target directory for `hf_download`
    pub download_dir: String,
    /// Where the runtime keeps model snapshots
    pub model_dir: String,
    /// Write credential; gates repository write tools
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            metadata_cache_size: DEFAULT_METADATA_CACHE_SIZE,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            load_timeout_secs: DEFAULT_LOAD_TIMEOUT_SECS,
            hub_endpoint: DEFAULT_HUB_ENDPOINT.to_string(),
            inference_endpoint: DEFAULT_INFERENCE_ENDPOINT.to_string(),
            download_dir: ".".to_string(),
            model_dir: "./models".to_string(),
            token: None,
        }
    }
}

impl std::fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("capacity", &self.capacity)
            .field("metadata_cache_size", &self.metadata_cache_size)
            .field("call_timeout_ms", &self.call_timeout_ms)
            .field("load_timeout_secs", &self.load_timeout_secs)
            .field("hub_endpoint", &self.hub_endpoint)
            .field("inference_endpoint", &self.inference_endpoint)
            .field("download_dir", &self.download_dir)
            .field("model_dir", &self.model_dir)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .finish()
    }
}

impl BrokerConfig {
    /// Load defaults, then `path` (or `hf-mcp.toml` if present), then
    /// `HF_MCP_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        match path {
            Some(path) => {
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
        }

        let settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let mut config: BrokerConfig = settings.try_deserialize()?;
        if config.token.is_none() {
            config.token = token_from_env();
        }
        config.validate()?;

        debug!(?config, "Loaded broker configuration");
        Ok(config)
    }

    /// Reject values the caches cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid("capacity must be at least 1".into()));
        }
        if self.metadata_cache_size == 0 {
            return Err(ConfigError::Invalid(
                "metadata_cache_size must be at least 1".into(),
            ));
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("call_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn credentials_present(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_secs(self.load_timeout_secs)
    }
}

fn token_from_env() -> Option<String> {
    TOKEN_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|v| !v.trim().is_empty())
}

/// Import `KEY=VALUE` lines from the first env file found.
///
/// Checks `$HF_MCP_ENV_FILE` first, then [`ENV_FILE_PATHS`]. Variables that
/// are already set are left alone. Returns the path that was loaded.
pub fn load_environment() -> Option<String> {
    if let Ok(custom_path) = std::env::var("HF_MCP_ENV_FILE") {
        if let Some(path) = try_load_env_file(&custom_path) {
            return Some(path);
        }
    }

    for path in ENV_FILE_PATHS {
        if let Some(loaded_path) = try_load_env_file(path) {
            return Some(loaded_path);
        }
    }

    debug!("No environment file found, using existing environment");
    None
}

fn try_load_env_file(path: &str) -> Option<String> {
    let path_obj = Path::new(path);
    if !path_obj.exists() {
        return None;
    }

    match fs::read_to_string(path_obj) {
        Ok(content) => {
            let mut loaded_count = 0;
            let mut skipped_count = 0;

            for line in content.lines() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }

                if let Some((key, value)) = parse_env_line(line) {
                    if std::env::var(&key).is_err() {
                        std::env::set_var(&key, &value);
                        loaded_count += 1;
                    } else {
                        skipped_count += 1;
                    }
                }
            }

            info!(
                "Loaded {} environment variables from {} ({} skipped - already set)",
                loaded_count, path, skipped_count
            );
            Some(path.to_string())
        }
        Err(e) => {
            warn!("Failed to read environment file {}: {}", path, e);
            None
        }
    }
}

/// Parse `KEY=VALUE`, `KEY="VALUE"` or `KEY='VALUE'`.
fn parse_env_line(line: &str) -> Option<(String, String)> {
    let line = line.strip_prefix("export ").unwrap_or(line);
    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let value = value.trim();

    if key.is_empty() {
        return None;
    }

    let value = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value);

    Some((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_documented_values() {
        let config = BrokerConfig::default();
        assert_eq!(config.capacity, 3);
        assert_eq!(config.metadata_cache_size, 100);
        assert_eq!(config.call_timeout(), Duration::from_secs(30));
        assert!(!config.credentials_present());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = BrokerConfig {
            capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = BrokerConfig {
            metadata_cache_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_blank_token_is_not_a_credential() {
        assert!(!BrokerConfig::default().with_token("  ").credentials_present());
        assert!(BrokerConfig::default().with_token("hf_abc").credentials_present());
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = BrokerConfig::default().with_token("hf_secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hf_secret"));
        assert!(rendered.contains("***"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "capacity = 2\nmetadata_cache_size = 7\nmodel_dir = \"/tmp/m\"").unwrap();

        let config = BrokerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.capacity, 2);
        assert_eq!(config.metadata_cache_size, 7);
        assert_eq!(config.model_dir, "/tmp/m");
        assert_eq!(config.load_timeout_secs, DEFAULT_LOAD_TIMEOUT_SECS);
    }

    #[test]
    fn test_load_rejects_invalid_file_values() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "capacity = 0").unwrap();
        assert!(BrokerConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_parse_env_line() {
        assert_eq!(
            parse_env_line("FOO=bar"),
            Some(("FOO".to_string(), "bar".to_string()))
        );
        assert_eq!(
            parse_env_line("export HF_TOKEN=\"hf_x y\""),
            Some(("HF_TOKEN".to_string(), "hf_x y".to_string()))
        );
        assert_eq!(
            parse_env_line("FOO='bar'"),
            Some(("FOO".to_string(), "bar".to_string()))
        );
        assert!(parse_env_line("").is_none());
        assert!(parse_env_line("=value").is_none());
    }
}
