use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{Context, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default = "default_dial_timeout")]
    pub dial_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_discovery_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub directory: Option<PathBuf>,
    #[serde(default = "default_host")]
    pub host: String,
    /// Upload size cap in bytes. Unset means no limit.
    #[serde(default)]
    pub max_file_size: Option<u64>,
}

// Default value functions
fn default_user() -> String { "admin".to_string() }
fn default_password() -> String { "password".to_string() }
fn default_dial_timeout() -> u64 { 5 }
fn default_discovery_timeout() -> u64 { 3 }
fn default_host() -> String { "0.0.0.0".to_string() }

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            user: default_user(),
            password: default_password(),
            dial_timeout_secs: default_dial_timeout(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_discovery_timeout(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            directory: None,
            host: default_host(),
            max_file_size: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            transfer: TransferConfig::default(),
            discovery: DiscoveryConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Defaults overlaid with `DROPLOCAL_<SECTION>__<KEY>` environment variables.
    /// No configuration file is read.
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("DROPLOCAL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: AppConfig = settings
            .try_deserialize()
            .context("invalid DROPLOCAL_* environment configuration")?;
        Ok(config)
    }

    pub fn from_toml(toml_content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_content)?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Which half of the tool this process runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Client { file: PathBuf },
    Server { directory: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

/// Immutable settings built once at start-up and handed to each component.
#[derive(Debug, Clone)]
pub struct Settings {
    pub role: Role,
    pub credentials: Credentials,
    pub discovery_timeout: Duration,
    pub dial_timeout: Duration,
    pub bind_host: String,
    pub max_file_size: Option<u64>,
}

impl Settings {
    pub fn new(role: Role, config: &AppConfig) -> Self {
        Self {
            role,
            credentials: Credentials {
                user: config.transfer.user.clone(),
                password: config.transfer.password.clone(),
            },
            discovery_timeout: Duration::from_secs(config.discovery.timeout_secs),
            dial_timeout: Duration::from_secs(config.transfer.dial_timeout_secs),
            bind_host: config.server.host.clone(),
            max_file_size: config.server.max_file_size,
        }
    }
}
