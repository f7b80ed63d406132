// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `echobox serve` command - Run the HTTP server.
//!
//! Starts the ephemeral store sweeper, loads the GeoIP database if present,
//! and serves either a plain HTTP listener (until Ctrl+C) or AWS Lambda
//! invocations.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use echobox_core::{Config, ConfigLoader, EphemeralStore, HardValidationError, Port};

use crate::gateway::{self, GatewaySettings, GatewayState};
use crate::geoip::GeoIpDatabase;

/// Environment variable the Lambda runtime sets inside a function sandbox.
const LAMBDA_RUNTIME_API_ENV: &str = "AWS_LAMBDA_RUNTIME_API";
/// Any non-empty value forces the plain HTTP listener.
const SIMPLE_HTTP_ENV: &str = "simpleHTTP";

/// How requests reach the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Bind a TCP listener and serve HTTP directly.
    Http,
    /// Receive requests as AWS Lambda invocations.
    Lambda,
}

impl RunMode {
    /// `--lambda` always wins. Otherwise `simpleHTTP` forces a listener, and
    /// running inside a Lambda sandbox selects Lambda.
    pub fn select(
        lambda_flag: bool,
        simple_http: Option<&str>,
        runtime_api: Option<&str>,
    ) -> Self {
        let non_empty = |v: Option<&str>| v.is_some_and(|v| !v.is_empty());

        if lambda_flag {
            Self::Lambda
        } else if non_empty(simple_http) {
            Self::Http
        } else if non_empty(runtime_api) {
            Self::Lambda
        } else {
            Self::Http
        }
    }

    fn from_env(lambda_flag: bool) -> Self {
        Self::select(
            lambda_flag,
            std::env::var(SIMPLE_HTTP_ENV).ok().as_deref(),
            std::env::var(LAMBDA_RUNTIME_API_ENV).ok().as_deref(),
        )
    }
}

pub async fn execute(
    config_path: Option<&str>,
    bind: Option<IpAddr>,
    port: Option<u16>,
    lambda: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    // Load and validate configuration - fail fast on invalid config
    let mut config = match config_path {
        Some(path) => {
            tracing::info!(config = %path, "Loading configuration");
            ConfigLoader::load_file(path)?
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, std::env::var("PORT").ok().as_deref(), bind, port)?;

    let store = EphemeralStore::start(config.store.clone())?;
    tracing::info!(
        key_length = config.store.key_length,
        max_attempts = config.store.max_attempts,
        ttl_secs = config.store.default_ttl.as_secs(),
        "Ephemeral store ready"
    );

    let geoip = match GeoIpDatabase::open(&config.geoip.database_path) {
        Ok(db) => Some(db),
        Err(e) => {
            tracing::warn!(error = %e, "GeoIP lookups disabled");
            None
        }
    };

    crate::metrics::init();

    let state = GatewayState::new(store.clone(), geoip, GatewaySettings::from_config(&config));

    match RunMode::from_env(lambda) {
        RunMode::Http => {
            let addr = SocketAddr::new(config.server.bind, config.server.port.value());
            gateway::start_gateway(addr, state, shutdown_signal()).await?;
        }
        RunMode::Lambda => {
            gateway::start_lambda(state)
                .await
                .map_err(|e| -> Box<dyn std::error::Error> { e })?;
        }
    }

    tracing::info!("Shutting down");
    store.shutdown().await;

    Ok(())
}

/// `PORT` from the environment binds every interface; explicit flags win over both.
fn apply_overrides(
    config: &mut Config,
    env_port: Option<&str>,
    bind: Option<IpAddr>,
    port: Option<u16>,
) -> Result<(), HardValidationError> {
    if let Some(raw) = env_port.filter(|p| !p.is_empty()) {
        let value: u16 = raw
            .parse()
            .map_err(|_| HardValidationError::InvalidFieldValue {
                field: "PORT",
                value: raw.to_string(),
                reason: "Must be a port number".to_string(),
            })?;
        config.server.port = Port::new(value)?;
        config.server.bind = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
    }

    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(port) = port {
        config.server.port = Port::new(port)?;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_overrides() {
        let mut config = Config::default();
        apply_overrides(&mut config, None, None, None).unwrap();
        assert_eq!(config.server.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(config.server.port.value(), 8000);
    }

    #[test]
    fn test_env_port_binds_all_interfaces() {
        let mut config = Config::default();
        apply_overrides(&mut config, Some("9090"), None, None).unwrap();
        assert_eq!(config.server.bind, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.server.port.value(), 9090);
    }

    #[test]
    fn test_flags_win_over_env() {
        let mut config = Config::default();
        let bind: IpAddr = "127.0.0.2".parse().unwrap();
        apply_overrides(&mut config, Some("9090"), Some(bind), Some(7000)).unwrap();
        assert_eq!(config.server.bind, bind);
        assert_eq!(config.server.port.value(), 7000);
    }

    #[test]
    fn test_run_mode_defaults_to_http() {
        assert_eq!(RunMode::select(false, None, None), RunMode::Http);
        assert_eq!(RunMode::select(false, Some(""), Some("")), RunMode::Http);
    }

    #[test]
    fn test_run_mode_detects_lambda_sandbox() {
        assert_eq!(
            RunMode::select(false, None, Some("127.0.0.1:9001")),
            RunMode::Lambda
        );
    }

    #[test]
    fn test_run_mode_simple_http_overrides_sandbox() {
        assert_eq!(
            RunMode::select(false, Some("1"), Some("127.0.0.1:9001")),
            RunMode::Http
        );
    }

    #[test]
    fn test_run_mode_flag_wins() {
        assert_eq!(RunMode::select(true, None, None), RunMode::Lambda);
        assert_eq!(RunMode::select(true, Some("1"), None), RunMode::Lambda);
    }

    #[test]
    fn test_invalid_env_port() {
        let mut config = Config::default();
        assert!(apply_overrides(&mut config, Some("http"), None, None).is_err());
        assert!(apply_overrides(&mut config, Some("0"), None, None).is_err());
    }
}
