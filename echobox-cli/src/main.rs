// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Echobox CLI
//!
//! HTTP echo and diagnostics server with an ephemeral paste store, runnable as
//! a plain listener or an AWS Lambda function.

use std::net::IpAddr;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod gateway;
mod geoip;
mod metrics;
mod system;

/// Echobox - Request echo, lookup utilities and short-lived blob storage
#[derive(Parser)]
#[command(name = "echobox")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Address to bind, overrides config and PORT
        #[arg(short, long)]
        bind: Option<IpAddr>,

        /// Port to listen on, overrides config and PORT
        #[arg(short, long)]
        port: Option<u16>,

        /// Serve AWS Lambda invocations instead of a TCP listener
        /// (auto-detected inside a Lambda sandbox unless simpleHTTP is set)
        #[arg(long)]
        lambda: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve { bind, port, lambda } => {
            commands::serve::execute(cli.config.as_deref(), bind, port, lambda).await
        }
        Commands::Validate { file } => commands::validate::execute(&file).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_flags() {
        let cli = Cli::try_parse_from(["echobox", "serve", "--port", "9000", "--bind", "0.0.0.0"])
            .unwrap();
        match cli.command {
            Commands::Serve { bind, port, lambda } => {
                assert_eq!(port, Some(9000));
                assert_eq!(bind, Some("0.0.0.0".parse().unwrap()));
                assert!(!lambda);
            }
            _ => panic!("expected serve"),
        }
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_parse_serve_lambda() {
        let cli = Cli::try_parse_from(["echobox", "serve", "--lambda"]).unwrap();
        assert!(matches!(cli.command, Commands::Serve { lambda: true, .. }));
    }

    #[test]
    fn test_parse_validate() {
        let cli = Cli::try_parse_from(["echobox", "-c", "echobox.yaml", "validate", "x.yaml"])
            .unwrap();
        assert_eq!(cli.config.as_deref(), Some("echobox.yaml"));
        assert!(matches!(cli.command, Commands::Validate { ref file } if file == "x.yaml"));
    }
}
