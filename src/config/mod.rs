
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.rememberizer.ai/api/v1/";
pub const DEFAULT_SERVER_NAME: &str = "mcp-server-rememberizer";

/// Environment variable holding the upstream bearer token
pub const API_TOKEN_ENV: &str = "REMEMBERIZER_API_TOKEN";
/// Environment variable overriding the upstream base URL
pub const BASE_URL_ENV: &str = "REMEMBERIZER_BASE_URL";

const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("REMEMBERIZER_API_TOKEN environment variable required")]
    MissingToken,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid server name: cannot be empty")]
    InvalidServerName,
    #[error("Configuration directory not found")]
    DirectoryError,
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
}

/// Bearer credential for the upstream API.
///
/// The inner value is only reachable through [`ApiToken::expose`]; `Debug` prints a
/// placeholder so the token never ends up in logs or error chains.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiToken(String);

impl ApiToken {
    #[inline]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiToken {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(********)")
    }
}

/// Connection settings for the upstream API, fixed for the life of the process
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: Url,
    pub api_token: ApiToken,
}

impl ApiConfig {
    /// Build an API configuration, normalizing the base URL so relative
    /// endpoint paths join underneath it.
    #[inline]
    pub fn new(base_url: &str, api_token: ApiToken) -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_token,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub name: String,
    pub instructions: Option<String>,
}

impl Default for ServerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            instructions: Some(
                "Search and retrieve knowledge stored in Rememberizer: semantic search, \
                 documents, integrations and account information."
                    .to_string(),
            ),
        }
    }
}

impl ServerConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidServerName);
        }
        Ok(())
    }
}

/// On-disk representation of `config.toml`. The token is deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    pub api: ApiSection,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api: ApiConfig,
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the optional TOML file and the process environment.
    ///
    /// With no explicit path the default file is used when it exists. The token
    /// must come from the environment.
    #[inline]
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match config_file {
            Some(path) => Self::read_file(path)?,
            None => match Self::default_config_file() {
                Ok(path) if path.exists() => Self::read_file(&path)?,
                _ => ConfigFile::default(),
            },
        };

        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Resolve the effective configuration from a parsed file and a key lookup.
    ///
    /// Environment values win over the file. Empty values count as unset.
    #[inline]
    pub fn from_sources<F>(file: ConfigFile, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_token = non_empty(API_TOKEN_ENV)
            .map(ApiToken::new)
            .ok_or(ConfigError::MissingToken)?;

        let base_url = non_empty(BASE_URL_ENV)
            .or(file.api.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        file.server.validate()?;

        Ok(Self {
            api: ApiConfig::new(&base_url, api_token)?,
            server: file.server,
        })
    }

    #[inline]
    pub fn read_file(path: &Path) -> Result<ConfigFile, ConfigError> {
        debug!("Reading config file {}", path.display());
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Get the configuration directory path
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".rememberizer-mcp"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("rememberizer-mcp"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn default_config_file() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut url = Url::parse(raw.trim()).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
    }
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }

    // Without the trailing slash `Url::join` would replace the last segment.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
