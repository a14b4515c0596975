//! Configuration management for devops-mcp.
//!
//! Settings come from an optional TOML file overlaid with environment
//! variables. The file lives in a platform-specific location:
//!
//! - **macOS/Linux**: `~/.config/devops-mcp/config.toml`
//! - **Windows**: `%APPDATA%\devops-mcp\config.toml`
//!
//! The personal access token is only ever read from `AZURE_DEVOPS_PAT`
//! and is never written to the file.
//!
//! # Example
//!
//! ```ignore
//! use devops_core::config::Config;
//!
//! let config = Config::load()?;
//! let azure = config.azure_settings()?;
//! println!("{}", azure.org_url);
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = "devops-mcp";

/// Organization URL, e.g. `https://dev.azure.com/contoso`.
pub const ENV_ORG: &str = "AZURE_DEVOPS_ORG";
/// Accepted alias of [`ENV_ORG`].
pub const ENV_ORG_URL: &str = "AZURE_DEVOPS_ORG_URL";
pub const ENV_PROJECT: &str = "AZURE_DEVOPS_PROJECT";
pub const ENV_PAT: &str = "AZURE_DEVOPS_PAT";

pub const DEFAULT_API_VERSION: &str = "7.1";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Configuration structures
// =============================================================================

/// Main configuration structure, as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure_devops: Option<AzureDevOpsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalConfig>,
}

/// `[azure_devops]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureDevOpsConfig {
    /// Organization URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_url: Option<String>,
    /// Default project for project-scoped tools
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Per-request HTTP timeout
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

impl Default for AzureDevOpsConfig {
    fn default() -> Self {
        Self {
            org_url: None,
            project: None,
            api_version: default_api_version(),
            timeout_secs: default_http_timeout(),
        }
    }
}

/// `[local]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_command_timeout")]
    pub default_timeout_secs: u64,
    #[serde(default = "default_max_command_timeout")]
    pub max_timeout_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: default_command_timeout(),
            max_timeout_secs: default_max_command_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_http_timeout() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

fn default_command_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_max_command_timeout() -> u64 {
    MAX_COMMAND_TIMEOUT_SECS
}

fn default_probe_timeout() -> u64 {
    DEFAULT_PROBE_TIMEOUT_SECS
}

/// Resolved Azure DevOps settings: file values overlaid with the environment.
#[derive(Clone)]
pub struct AzureSettings {
    /// Organization URL without a trailing slash
    pub org_url: String,
    pub project: Option<String>,
    pub pat: Option<String>,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl std::fmt::Debug for AzureSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureSettings")
            .field("org_url", &self.org_url)
            .field("project", &self.project)
            .field("pat", &self.pat.as_ref().map(|_| "***"))
            .field("api_version", &self.api_version)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

// =============================================================================
// Config implementation
// =============================================================================

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded");
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        self.save_to(&path)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)
            .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

        info!(path = ?path, "Config saved");
        Ok(())
    }

    /// Resolve Azure DevOps settings against the process environment.
    pub fn azure_settings(&self) -> Result<AzureSettings> {
        self.azure_settings_from(|key| std::env::var(key).ok())
    }

    /// Resolve Azure DevOps settings against an arbitrary variable lookup.
    ///
    /// Environment values win over file values. A missing organization URL
    /// is fatal; a missing token only produces a warning, since calls will
    /// then fail individually with the server's 401.
    pub fn azure_settings_from(&self, env: impl Fn(&str) -> Option<String>) -> Result<AzureSettings> {
        let file = self.azure_devops.clone().unwrap_or_default();
        let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let org_url = lookup(ENV_ORG)
            .or_else(|| lookup(ENV_ORG_URL))
            .or(file.org_url)
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                Error::Config(format!(
                    "Azure DevOps organization URL is not set. Set {} or azure_devops.org_url",
                    ENV_ORG
                ))
            })?;

        let project = lookup(ENV_PROJECT).or(file.project);

        let pat = lookup(ENV_PAT);
        if pat.is_none() {
            warn!("{} is not set; Azure DevOps requests will be unauthenticated", ENV_PAT);
        }

        Ok(AzureSettings {
            org_url,
            project,
            pat,
            api_version: file.api_version,
            timeout_secs: file.timeout_secs,
        })
    }

    /// Local tool settings, with defaults for anything not configured.
    pub fn local_settings(&self) -> LocalConfig {
        self.local.clone().unwrap_or_default()
    }

    /// Set a configuration value by key path.
    ///
    /// Key format: `provider.field` (e.g., `azure_devops.org_url`, `local.max_timeout_secs`)
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, field) = split_key(key)?;

        match section {
            "azure_devops" | "azure" => {
                let config = self.azure_devops.get_or_insert_with(AzureDevOpsConfig::default);
                match field {
                    "org_url" | "org" | "url" => config.org_url = Some(value.to_string()),
                    "project" => config.project = Some(value.to_string()),
                    "api_version" => config.api_version = value.to_string(),
                    "timeout_secs" | "timeout" => config.timeout_secs = parse_secs(key, value)?,
                    "pat" | "token" => {
                        return Err(Error::Config(format!(
                            "The access token is not stored in the config file. Set {} instead",
                            ENV_PAT
                        )))
                    }
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown azure_devops config field: {}",
                            field
                        )))
                    }
                }
            }
            "local" => {
                let config = self.local.get_or_insert_with(LocalConfig::default);
                match field {
                    "default_timeout_secs" => config.default_timeout_secs = parse_secs(key, value)?,
                    "max_timeout_secs" => config.max_timeout_secs = parse_secs(key, value)?,
                    "probe_timeout_secs" => config.probe_timeout_secs = parse_secs(key, value)?,
                    _ => {
                        return Err(Error::Config(format!(
                            "Unknown local config field: {}",
                            field
                        )))
                    }
                }
            }
            _ => return Err(Error::Config(format!("Unknown section: {}", section))),
        }

        Ok(())
    }

    /// Get a configuration value by key path.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let (section, field) = split_key(key)?;

        match section {
            "azure_devops" | "azure" => {
                let Some(config) = &self.azure_devops else {
                    return Ok(None);
                };
                match field {
                    "org_url" | "org" | "url" => Ok(config.org_url.clone()),
                    "project" => Ok(config.project.clone()),
                    "api_version" => Ok(Some(config.api_version.clone())),
                    "timeout_secs" | "timeout" => Ok(Some(config.timeout_secs.to_string())),
                    _ => Err(Error::Config(format!(
                        "Unknown azure_devops config field: {}",
                        field
                    ))),
                }
            }
            "local" => {
                let Some(config) = &self.local else {
                    return Ok(None);
                };
                match field {
                    "default_timeout_secs" => Ok(Some(config.default_timeout_secs.to_string())),
                    "max_timeout_secs" => Ok(Some(config.max_timeout_secs.to_string())),
                    "probe_timeout_secs" => Ok(Some(config.probe_timeout_secs.to_string())),
                    _ => Err(Error::Config(format!(
                        "Unknown local config field: {}",
                        field
                    ))),
                }
            }
            _ => Err(Error::Config(format!("Unknown section: {}", section))),
        }
    }
}

fn split_key(key: &str) -> Result<(&str, &str)> {
    match key.split('.').collect::<Vec<_>>()[..] {
        [section, field] => Ok((section, field)),
        _ => Err(Error::Config(format!(
            "Invalid config key '{}'. Expected format: section.field",
            key
        ))),
    }
}

fn parse_secs(key: &str, value: &str) -> Result<u64> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| Error::Config(format!("'{}' expects a number of seconds, got '{}'", key, value)))
}

// =============================================================================
// Tests
// =============================================================================
