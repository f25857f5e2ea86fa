//! Config load/save for `~/.textai/config.yaml` and the start-up provider settings.
//! Sections: api.* (provider), relay.* (client relay mode), server.* (intermediary).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "API_KEY";
/// Environment variable overriding the config file path.
pub const CONFIG_PATH_ENV: &str = "TEXTAI_CONFIG";

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3000;
pub const GENERATE_PATH: &str = "/api/generate";

/// API section (base_url, api_key, model).
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ApiSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Relay section (mode, endpoint). Only read by the terminal client.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct RelaySection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<RelayMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

/// Server section (host, port). Only read by the intermediary.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ServerSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

/// Full config file.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub relay: RelaySection,
    #[serde(default)]
    pub server: ServerSection,
}

impl Config {
    /// Intermediary endpoint the proxied relay posts to.
    pub fn relay_endpoint(&self) -> String {
        match &self.relay.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!(
                "http://{}:{}{}",
                self.server.host.as_deref().unwrap_or(DEFAULT_HOST),
                self.server.port.unwrap_or(DEFAULT_PORT),
                GENERATE_PATH
            ),
        }
    }
}

/// Which relay implementation a process runs. One per process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum RelayMode {
    /// Call the provider directly with a locally held credential.
    Direct,
    /// POST to the same-origin intermediary, which holds the credential.
    #[default]
    Proxied,
}

impl FromStr for RelayMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(RelayMode::Direct),
            "proxied" | "proxy" => Ok(RelayMode::Proxied),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

// YAML and `--mode` accept the same spellings.
impl TryFrom<String> for RelayMode {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for RelayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayMode::Direct => f.write_str("direct"),
            RelayMode::Proxied => f.write_str("proxied"),
        }
    }
}

/// Provider settings resolved once at process start and handed to whatever
/// performs the direct call.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

impl ProviderSettings {
    /// Resolve from the config file and the value of `API_KEY` (if set).
    /// The environment wins over the file; blank values count as absent.
    pub fn resolve(config: &Config, env_api_key: Option<String>) -> Self {
        let api_key = env_api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| config.api.api_key.clone().filter(|k| !k.trim().is_empty()));
        Self {
            api_key,
            model: config
                .api
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: config
                .api
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// `resolve` against the live process environment.
    pub fn from_env(config: &Config) -> Self {
        Self::resolve(config, std::env::var(API_KEY_ENV).ok())
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}

// Keeps the credential out of logs.
impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Returns the default config file path: `~/.textai/config.yaml` (platform-specific).
pub fn default_config_path() -> Option<PathBuf> {
    let home = home_dir()?;
    Some(home.join(".textai").join("config.yaml"))
}

#[cfg(unix)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(windows)]
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE").map(PathBuf::from)
}

#[cfg(not(any(unix, windows)))]
fn home_dir() -> Option<PathBuf> {
    None
}

/// Resolve the config path: explicit flag, then `TEXTAI_CONFIG`, then the default.
/// The flag says whether the path was named explicitly.
pub fn resolve_config_path(flag: Option<&Path>) -> Option<(PathBuf, bool)> {
    if let Some(path) = flag {
        return Some((path.to_path_buf(), true));
    }
    if let Some(val) = std::env::var_os(CONFIG_PATH_ENV) {
        return Some((PathBuf::from(val), true));
    }
    default_config_path().map(|p| (p, false))
}

/// Load the config a process should run with. An explicitly named file must
/// exist; a missing default file yields the built-in defaults.
pub fn load_or_default(flag: Option<&Path>) -> Result<Config, ConfigError> {
    match resolve_config_path(flag) {
        Some((path, true)) => load(&path),
        Some((path, false)) if path.exists() => load(&path),
        _ => Ok(Config::default()),
    }
}

/// Load config from a YAML file.
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Save config to a YAML file. Creates parent directory if missing.
pub fn save(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let io_err = |e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent() {
        if !parent.exists() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    let contents = serde_yaml::to_string(config).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })?;
    std::fs::write(path, contents).map_err(io_err)
}

/// Config load/save error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("unknown relay mode `{0}` (expected `direct` or `proxied`)")]
    UnknownMode(String),
}
