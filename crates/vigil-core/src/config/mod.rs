//! Application configuration with layered loading.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded in this order (later overrides earlier):
//!
//! 1. **Compiled defaults**: Hardcoded in struct `Default` implementations
//! 2. **Config file**: TOML file specified by `VIGIL_CONFIG` env var
//! 3. **Environment variables**: `VIGIL_*` env vars override specific fields
//!
//! # Configuration Sections
//!
//! - [`ServerConfig`]: HTTP server settings (bind address, port)
//! - [`LoggingConfig`]: Log level and format
//! - [`HttpConfig`]: Outbound HTTP client settings
//! - [`CacheConfig`]: Cache capacity bounds
//! - [`TargetConfig`]: The chain being scraped and its endpoints
//!
//! # Validation
//!
//! Configuration is validated at load time. Invalid configurations (missing
//! API URL, zero cache capacity) return errors rather than failing silently.
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_address = "0.0.0.0"
//! bind_port = 27770
//!
//! [target]
//! chain = "tendermint"
//! api_url = "https://lcd.example.com"
//! addresses = "cosmos1abc,cosmos1def"
//! validators = "cosmosvaloper1abc"
//! ```

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::fetch::client::HttpConfig;

/// HTTP server configuration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// IP address to bind the server to. Defaults to `0.0.0.0`.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port number to listen on. Must be greater than 0. Defaults to `27770`.
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    27770
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
        }
    }
}

/// Application logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "trace", "debug", "info", "warn", "error"). Defaults to `"info"`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `"json"` or `"pretty"`. Defaults to `"pretty"`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Cache capacity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Capacity bound for the immutable response cache. Must be greater
    /// than 0. Defaults to `5000`.
    #[serde(default = "default_immutable_max_entries")]
    pub immutable_max_entries: usize,
}

fn default_immutable_max_entries() -> usize {
    crate::cache::DEFAULT_IMMUTABLE_MAX_ENTRIES
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            immutable_max_entries: default_immutable_max_entries(),
        }
    }
}

/// Supported chain families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainKind {
    Tendermint,
    Solana,
    Evm,
}

impl ChainKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tendermint => "tendermint",
            Self::Solana => "solana",
            Self::Evm => "evm",
        }
    }

    /// Number of decimal places the chain's base denomination carries.
    #[must_use]
    pub fn default_decimals(self) -> u32 {
        match self {
            Self::Tendermint => 6,
            Self::Solana => 9,
            Self::Evm => 18,
        }
    }
}

/// The chain being scraped: which collector to run and where to point it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Chain family. Selects the collector. Defaults to `"tendermint"`.
    #[serde(default = "default_chain")]
    pub chain: ChainKind,

    /// Primary query endpoint: the LCD URL for Tendermint chains, the RPC
    /// URL for Solana and EVM chains.
    #[serde(default)]
    pub api_url: String,

    /// Secondary RPC endpoint for chains that split API and RPC traffic.
    /// Falls back to `api_url` when unset.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Comma-separated account addresses to track balances for.
    #[serde(default)]
    pub addresses: String,

    /// Comma-separated validator identifiers (operator addresses or vote
    /// account pubkeys).
    #[serde(default)]
    pub validators: String,

    /// Comma-separated node identity pubkeys (Solana leader schedule).
    #[serde(default)]
    pub identities: String,

    /// URL of an existing metrics page to append verbatim after our own.
    #[serde(default)]
    pub exist_metrics_url: Option<String>,

    /// Decimal places of the base denomination. Falls back to the chain
    /// family default (6 / 9 / 18) when unset.
    #[serde(default)]
    pub decimals: Option<u32>,

    /// Prefix for every exported metric name. Falls back to the chain
    /// family name when unset.
    #[serde(default)]
    pub metric_prefix: Option<String>,
}

fn default_chain() -> ChainKind {
    ChainKind::Tendermint
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            api_url: String::new(),
            rpc_url: None,
            addresses: String::new(),
            validators: String::new(),
            identities: String::new(),
            exist_metrics_url: None,
            decimals: None,
            metric_prefix: None,
        }
    }
}

impl TargetConfig {
    /// The RPC endpoint, falling back to the API endpoint when no separate
    /// one is configured.
    #[must_use]
    pub fn rpc_url(&self) -> &str {
        self.rpc_url.as_deref().unwrap_or(&self.api_url)
    }

    #[must_use]
    pub fn address_list(&self) -> Vec<String> {
        to_unique_list(&self.addresses)
    }

    #[must_use]
    pub fn validator_list(&self) -> Vec<String> {
        to_unique_list(&self.validators)
    }

    #[must_use]
    pub fn identity_list(&self) -> Vec<String> {
        to_unique_list(&self.identities)
    }

    #[must_use]
    pub fn effective_decimals(&self) -> u32 {
        self.decimals.unwrap_or_else(|| self.chain.default_decimals())
    }

    #[must_use]
    pub fn effective_prefix(&self) -> String {
        self.metric_prefix
            .clone()
            .unwrap_or_else(|| self.chain.as_str().to_string())
    }
}

/// Splits a comma-separated list, trimming entries and dropping duplicates
/// while preserving first-seen order.
fn to_unique_list(csv: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for entry in csv.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        if !seen.iter().any(|existing: &String| existing == entry) {
            seen.push(entry.to_string());
        }
    }
    seen
}

/// Root application configuration containing all subsystem settings.
///
/// Loaded from a TOML file with environment variable overrides under the
/// `VIGIL_` prefix, using `__` as the nesting separator
/// (e.g. `VIGIL__SERVER__BIND_PORT=9100`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Outbound HTTP client configuration.
    #[serde(default)]
    pub http: HttpConfig,

    /// Cache capacity configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Scrape target configuration.
    #[serde(default)]
    pub target: TargetConfig,
}

impl AppConfig {
    /// Loads configuration from a TOML file with environment variable overrides.
    ///
    /// Environment variables with the `VIGIL__` prefix can override any
    /// configuration value, using `__` as a separator for nested fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or deserialized.
    pub fn from_file<P: AsRef<Path>>(config_path: P) -> Result<Self, ConfigError> {
        let config_builder = Config::builder()
            .set_default("server.bind_address", "0.0.0.0")?
            .set_default("server.bind_port", 27770)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .set_default("cache.immutable_max_entries", 5000)?
            .set_default("target.chain", "tendermint")?
            .add_source(File::with_name(&config_path.as_ref().to_string_lossy()).required(false))
            .add_source(Environment::with_prefix("VIGIL").separator("__"))
            .build()?;

        config_builder.try_deserialize()
    }

    /// Loads configuration from `config/vigil.toml` with fallback to defaults.
    ///
    /// The config file path can be overridden using the `VIGIL_CONFIG`
    /// environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the configuration cannot be loaded or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("VIGIL_CONFIG").unwrap_or_else(|_| "config/vigil.toml".to_string());
        Self::from_file(&config_path)
    }

    /// Returns the parsed socket address for the HTTP server.
    ///
    /// # Errors
    ///
    /// Returns an error string if the address cannot be parsed into a valid
    /// [`SocketAddr`](std::net::SocketAddr).
    pub fn socket_addr(&self) -> Result<std::net::SocketAddr, String> {
        format!("{}:{}", self.server.bind_address, self.server.bind_port)
            .parse()
            .map_err(|_| {
                format!(
                    "Invalid socket address: {}:{}",
                    self.server.bind_address, self.server.bind_port
                )
            })
    }

    /// Validates the configuration for correctness and consistency.
    ///
    /// Checks include:
    /// - The target API URL is present and looks like an HTTP endpoint
    /// - All numeric values are greater than zero where required
    /// - Logging format is either `"json"` or `"pretty"`
    ///
    /// # Errors
    ///
    /// Returns a descriptive error string if validation fails.
    pub fn validate(&self) -> Result<(), String> {
        if self.target.api_url.is_empty() {
            return Err("No target API URL configured".to_string());
        }
        if !self.target.api_url.starts_with("http") {
            return Err(format!("Invalid target API URL: {}", self.target.api_url));
        }
        if let Some(ref rpc_url) = self.target.rpc_url {
            if !rpc_url.starts_with("http") {
                return Err(format!("Invalid target RPC URL: {rpc_url}"));
            }
        }
        if let Some(ref exist_url) = self.target.exist_metrics_url {
            if !exist_url.starts_with("http") {
                return Err(format!("Invalid exist metrics URL: {exist_url}"));
            }
        }

        if self.server.bind_port == 0 {
            return Err("Bind port must be greater than 0".to_string());
        }

        if self.http.connect_timeout_ms == 0 {
            return Err("HTTP connect timeout must be greater than 0".to_string());
        }
        if self.http.request_timeout_ms == 0 {
            return Err("HTTP request timeout must be greater than 0".to_string());
        }

        if self.cache.immutable_max_entries == 0 {
            return Err("Immutable cache capacity must be greater than 0".to_string());
        }

        if let Some(decimals) = self.target.decimals {
            if decimals > 30 {
                return Err(format!("Unreasonable decimals value: {decimals}"));
            }
        }

        if !["json", "pretty"].contains(&self.logging.format.as_str()) {
            return Err("Logging format must be 'json' or 'pretty'".to_string());
        }

        Ok(())
    }
}
