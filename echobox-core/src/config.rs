// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration parser with strict validation.
//!
//! Every section is optional and falls back to defaults. Any out-of-range
//! field results in a HardValidationError that prevents startup.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{EchoError, EchoResult, HardValidationError};
use crate::keygen::{RandomKeys, DEFAULT_ALPHABET};
use crate::types::{PayloadLimit, Port};

/// Raw server section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawServerConfig {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_payload_limit_mb")]
    payload_limit_mb: u64,
    #[serde(default = "default_public_scheme")]
    public_scheme: String,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_payload_limit_mb() -> u64 {
    30
}

fn default_public_scheme() -> String {
    "http".to_string()
}

impl Default for RawServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            payload_limit_mb: default_payload_limit_mb(),
            public_scheme: default_public_scheme(),
        }
    }
}

/// Raw store section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreConfig {
    #[serde(default = "default_key_length")]
    key_length: usize,
    #[serde(default = "default_max_attempts")]
    max_attempts: usize,
    #[serde(default = "default_ttl_secs")]
    ttl_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    sweep_interval_secs: u64,
    #[serde(default = "default_alphabet")]
    alphabet: String,
}

fn default_key_length() -> usize {
    5
}

fn default_max_attempts() -> usize {
    8
}

fn default_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_sweep_interval_secs() -> u64 {
    30
}

fn default_alphabet() -> String {
    DEFAULT_ALPHABET.to_string()
}

impl Default for RawStoreConfig {
    fn default() -> Self {
        Self {
            key_length: default_key_length(),
            max_attempts: default_max_attempts(),
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            alphabet: default_alphabet(),
        }
    }
}

/// Raw GeoIP section.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGeoIpConfig {
    #[serde(default = "default_geoip_path")]
    database_path: String,
    #[serde(default = "default_lang")]
    default_lang: String,
}

fn default_geoip_path() -> String {
    "geoip/GeoLite2-City.mmdb".to_string()
}

fn default_lang() -> String {
    "en".to_string()
}

impl Default for RawGeoIpConfig {
    fn default() -> Self {
        Self {
            database_path: default_geoip_path(),
            default_lang: default_lang(),
        }
    }
}

/// Raw root configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    server: RawServerConfig,
    #[serde(default)]
    store: RawStoreConfig,
    #[serde(default)]
    geoip: RawGeoIpConfig,
}

/// Validated HTTP server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: Port,
    pub payload_limit: PayloadLimit,
    /// Scheme used in store links when the client sent no `X-Forwarded-Proto`.
    pub public_scheme: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: Port::default(),
            payload_limit: PayloadLimit::default(),
            public_scheme: default_public_scheme(),
        }
    }
}

/// Ephemeral store configuration.
///
/// ```rust
/// use echobox_core::StoreConfig;
/// use std::time::Duration;
///
/// let config = StoreConfig::default()
///     .with_key_length(8)
///     .with_sweep_interval(Duration::from_secs(10));
/// assert_eq!(config.max_attempts, 8);
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Length of every generated key (default: 5).
    pub key_length: usize,
    /// Candidate keys tried by `put` before giving up (default: 8).
    pub max_attempts: usize,
    /// TTL applied by callers that have no better idea (default: 5 minutes).
    pub default_ttl: Duration,
    /// Interval between background sweeps (default: 30 seconds).
    pub sweep_interval: Duration,
    /// Symbols keys are drawn from.
    pub alphabet: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            key_length: default_key_length(),
            max_attempts: default_max_attempts(),
            default_ttl: Duration::from_secs(default_ttl_secs()),
            sweep_interval: Duration::from_secs(default_sweep_interval_secs()),
            alphabet: default_alphabet(),
        }
    }
}

impl StoreConfig {
    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_alphabet(mut self, alphabet: impl Into<String>) -> Self {
        self.alphabet = alphabet.into();
        self
    }

    /// Check the bounds the store relies on.
    ///
    /// Builder-made configs go through this too, so the limits are looser than
    /// the YAML ones: only values that would break the store are rejected.
    pub fn validate(&self) -> Result<(), HardValidationError> {
        if self.key_length == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "key_length",
                value: "0".to_string(),
                reason: "Keys must be at least one character long".to_string(),
            });
        }

        if self.max_attempts == 0 {
            return Err(HardValidationError::InvalidFieldValue {
                field: "max_attempts",
                value: "0".to_string(),
                reason: "At least one key attempt is required".to_string(),
            });
        }

        if self.sweep_interval.is_zero() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "sweep_interval",
                value: "0".to_string(),
                reason: "Sweep interval must be greater than 0".to_string(),
            });
        }

        RandomKeys::new(&self.alphabet)?;
        Ok(())
    }
}

/// Validated GeoIP configuration.
#[derive(Debug, Clone)]
pub struct GeoIpConfig {
    pub database_path: PathBuf,
    pub default_lang: String,
}

impl Default for GeoIpConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(default_geoip_path()),
            default_lang: default_lang(),
        }
    }
}

/// Complete validated configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub geoip: GeoIpConfig,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> EchoResult<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(EchoError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| EchoError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate configuration from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn load_string(content: &str) -> EchoResult<Config> {
        let raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| EchoError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> EchoResult<Config> {
        Ok(Config {
            server: Self::validate_server(raw.server)?,
            store: Self::validate_store(raw.store)?,
            geoip: Self::validate_geoip(raw.geoip)?,
        })
    }

    fn validate_server(raw: RawServerConfig) -> EchoResult<ServerConfig> {
        let bind: IpAddr =
            raw.bind
                .parse()
                .map_err(|_| HardValidationError::InvalidFieldValue {
                    field: "bind",
                    value: raw.bind.clone(),
                    reason: "Must be an IPv4 or IPv6 address".to_string(),
                })?;

        let port = Port::new(raw.port)?;
        let payload_limit = PayloadLimit::from_mb(raw.payload_limit_mb)?;

        if !matches!(raw.public_scheme.as_str(), "http" | "https") {
            return Err(HardValidationError::InvalidFieldValue {
                field: "public_scheme",
                value: raw.public_scheme,
                reason: "Must be 'http' or 'https'".to_string(),
            }
            .into());
        }

        Ok(ServerConfig {
            bind,
            port,
            payload_limit,
            public_scheme: raw.public_scheme,
        })
    }

    fn validate_store(raw: RawStoreConfig) -> EchoResult<StoreConfig> {
        if !(1..=32).contains(&raw.key_length) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "key_length",
                value: raw.key_length.to_string(),
                reason: "Must be between 1 and 32".to_string(),
            }
            .into());
        }

        if !(1..=64).contains(&raw.max_attempts) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "max_attempts",
                value: raw.max_attempts.to_string(),
                reason: "Must be between 1 and 64".to_string(),
            }
            .into());
        }

        // A zero TTL would mean "never expires", which the HTTP store must not allow
        if !(1..=86_400).contains(&raw.ttl_secs) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "ttl_secs",
                value: raw.ttl_secs.to_string(),
                reason: "Must be between 1 and 86400 seconds".to_string(),
            }
            .into());
        }

        if !(1..=3_600).contains(&raw.sweep_interval_secs) {
            return Err(HardValidationError::InvalidFieldValue {
                field: "sweep_interval_secs",
                value: raw.sweep_interval_secs.to_string(),
                reason: "Must be between 1 and 3600 seconds".to_string(),
            }
            .into());
        }

        let store = StoreConfig::default()
            .with_key_length(raw.key_length)
            .with_max_attempts(raw.max_attempts)
            .with_default_ttl(Duration::from_secs(raw.ttl_secs))
            .with_sweep_interval(Duration::from_secs(raw.sweep_interval_secs))
            .with_alphabet(raw.alphabet);
        store.validate()?;
        Ok(store)
    }

    fn validate_geoip(raw: RawGeoIpConfig) -> EchoResult<GeoIpConfig> {
        if raw.default_lang.trim().is_empty() {
            return Err(HardValidationError::InvalidFieldValue {
                field: "default_lang",
                value: raw.default_lang,
                reason: "Language code cannot be empty".to_string(),
            }
            .into());
        }

        Ok(GeoIpConfig {
            database_path: PathBuf::from(raw.database_path),
            default_lang: raw.default_lang,
        })
    }
}
