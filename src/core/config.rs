//! # Configuration
//!
//! Client options with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.halnav/config.toml`. Every layer is folded in with
//! [`merge`](crate::core::merge::merge), so a sparse layer only touches the
//! keys it names.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::merge::{Map, Value, merge};

// ============================================================================
// Constants
// ============================================================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_ACCEPT: &str = "application/hal+json, application/json, */*; q=0.01";
pub const VERSION_HEADER: &str = "X-HalNav";

/// HEAD and GET never carry a request body.
pub fn is_bodyless(method: &str) -> bool {
    method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD")
}

/// The three hypermedia sections that are never exposed as properties.
pub fn is_reserved(prop: &str) -> bool {
    matches!(prop, "_embedded" | "_links" | "_forms")
}

// ============================================================================
// Client Options
// ============================================================================

/// Transport defaults applied to every request.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct XhrOptions {
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientOptions {
    /// Start the homepage request as soon as the client is built.
    pub preload_homepage: bool,
    /// Keep the homepage result for the lifetime of the client.
    pub cache_homepage: bool,
    /// Keep the raw JSON on every resource.
    pub debug: bool,
    pub xhr: XhrOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Accept".to_string(), DEFAULT_ACCEPT.to_string());
        headers.insert(VERSION_HEADER.to_string(), VERSION.to_string());

        Self {
            preload_homepage: true,
            cache_homepage: false,
            debug: false,
            xhr: XhrOptions {
                headers,
                timeout: None,
            },
        }
    }
}

impl ClientOptions {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self)
            .map(Value::from)
            .unwrap_or_else(|_| Value::object())
    }

    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value.into()).map_err(ConfigError::Invalid)
    }

    /// Deep-merges `patch` over these options.
    ///
    /// On a patch that does not fit the option shape the options are left
    /// as they were.
    pub fn apply(&mut self, patch: &Value) -> Result<(), ConfigError> {
        let mut tree = self.to_value();
        merge(&mut tree, &[patch]);
        *self = Self::from_value(tree)?;
        debug!("Options updated: {:?}", self);
        Ok(())
    }
}

// ============================================================================
// Config File Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct HalnavConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub xhr: XhrConfig,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub endpoint: Option<String>,
    pub preload_homepage: Option<bool>,
    pub cache_homepage: Option<bool>,
    pub debug: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct XhrConfig {
    pub timeout: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Concrete values after every layer is collapsed.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub endpoint: Option<String>,
    pub options: ClientOptions,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
            ConfigError::Invalid(e) => write!(f, "invalid option value: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.halnav/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".halnav").join("config.toml"))
}

/// Load config from `~/.halnav/config.toml`.
///
/// A missing file (or home directory) yields `HalnavConfig::default()`.
pub fn load_config() -> Result<HalnavConfig, ConfigError> {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => {
            warn!("Could not determine home directory, using default config");
            Ok(HalnavConfig::default())
        }
    }
}

pub fn load_config_from(path: &Path) -> Result<HalnavConfig, ConfigError> {
    if !path.exists() {
        info!("No config file at {}, using defaults", path.display());
        return Ok(HalnavConfig::default());
    }

    let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
    let config: HalnavConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", config);
    Ok(config)
}

// ============================================================================
// Resolution
// ============================================================================

fn file_layer(config: &HalnavConfig) -> Value {
    let mut layer = Map::new();
    if let Some(preload) = config.general.preload_homepage {
        layer.insert("preload_homepage".into(), preload.into());
    }
    if let Some(cache) = config.general.cache_homepage {
        layer.insert("cache_homepage".into(), cache.into());
    }
    if let Some(debug) = config.general.debug {
        layer.insert("debug".into(), debug.into());
    }

    let mut xhr = Map::new();
    if let Some(timeout) = config.xhr.timeout {
        xhr.insert("timeout".into(), timeout.into());
    }
    if !config.xhr.headers.is_empty() {
        let headers = config
            .xhr
            .headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect::<Map>();
        xhr.insert("headers".into(), headers.into());
    }
    if !xhr.is_empty() {
        layer.insert("xhr".into(), xhr.into());
    }

    Value::Object(layer)
}

fn timeout_layer(timeout: Option<u64>) -> Value {
    let mut layer = Map::new();
    if let Some(ms) = timeout {
        let mut xhr = Map::new();
        xhr.insert("timeout".into(), ms.into());
        layer.insert("xhr".into(), xhr.into());
    }
    Value::Object(layer)
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
///
/// `cli_endpoint` and `cli_timeout` are from CLI flags (None = not specified).
pub fn resolve(
    config: &HalnavConfig,
    cli_endpoint: Option<&str>,
    cli_timeout: Option<u64>,
) -> ResolvedConfig {
    // Endpoint: CLI → env → config
    let endpoint = cli_endpoint
        .map(|s| s.to_string())
        .or_else(|| std::env::var("HALNAV_ENDPOINT").ok())
        .or_else(|| config.general.endpoint.clone());

    let env_timeout = std::env::var("HALNAV_TIMEOUT_MS")
        .ok()
        .and_then(|raw| match raw.parse::<u64>() {
            Ok(ms) => Some(ms),
            Err(e) => {
                warn!("Ignoring HALNAV_TIMEOUT_MS={raw}: {e}");
                None
            }
        });

    let mut tree = ClientOptions::default().to_value();
    merge(
        &mut tree,
        &[
            &file_layer(config),
            &timeout_layer(env_timeout),
            &timeout_layer(cli_timeout),
        ],
    );

    let options = ClientOptions::from_value(tree).unwrap_or_else(|e| {
        warn!("Falling back to default options: {e}");
        ClientOptions::default()
    });

    ResolvedConfig { endpoint, options }
}
