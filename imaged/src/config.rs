//! Server configuration
//!
//! Layered with figment, later sources win:
//! 1. Built-in defaults
//! 2. TOML config file (`imaged.toml`)
//! 3. TOML secrets file (`secrets.toml`, holds `api_key`)
//! 4. `IMAGED_*` environment variables (nested keys split on `__`)
//! 5. `OPENAI_API_KEY`

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default config file name
pub const CONFIG_FILE: &str = "imaged.toml";

/// Default secrets file name
pub const SECRETS_FILE: &str = "secrets.toml";

/// Default directory for generated images
pub const DEFAULT_OUTPUT_DIR: &str = "generated_images";

/// Sessions untouched for this long are discarded
pub const DEFAULT_SESSION_IDLE_SECS: u64 = 3600;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(Box<figment::Error>),
    #[error("no API key configured (set OPENAI_API_KEY or api_key in {SECRETS_FILE})")]
    MissingApiKey,
}

/// Image provider settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL (OpenAI-compatible)
    pub base_url: String,
    /// Image model name
    pub model: String,
    /// Output resolution
    pub size: String,
    /// Quality tier
    pub quality: String,
    /// Per-request timeout; unset means no timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "dall-e-3".to_string(),
            size: "1024x1024".to_string(),
            quality: "standard".to_string(),
            timeout_secs: None,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Server configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub output_dir: PathBuf,
    pub session_idle_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            session_idle_secs: DEFAULT_SESSION_IDLE_SECS,
            api_key: None,
            provider: ProviderConfig::default(),
        }
    }
}

// Hand-written so the API key never reaches the logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("output_dir", &self.output_dir)
            .field("session_idle_secs", &self.session_idle_secs)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("provider", &self.provider)
            .finish()
    }
}

impl Config {
    /// Build the layered figment without extracting it
    pub fn figment(config_file: &Path, secrets_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Toml::file(secrets_file))
            .merge(Env::prefixed("IMAGED_").split("__"))
            .merge(
                Env::raw()
                    .only(&["OPENAI_API_KEY"])
                    .map(|_| "api_key".into()),
            )
    }

    /// Load configuration from files and environment
    pub fn load(config_file: &Path, secrets_file: &Path) -> Result<Self, ConfigError> {
        Self::figment(config_file, secrets_file)
            .extract()
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// The provider credential, required at startup
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}
