// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! echobox Core Library
//!
//! Core library for the echobox diagnostic HTTP utility.
//! Provides the ephemeral TTL key-value store behind the paste endpoints,
//! its random key generator, and YAML configuration parsing.

pub mod config;
pub mod entry;
pub mod error;
pub mod keygen;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use config::{Config, ConfigLoader, GeoIpConfig, ServerConfig, StoreConfig};
pub use error::{EchoError, EchoResult, HardValidationError, StoreError};
pub use keygen::{KeySource, RandomKeys};
pub use store::{EphemeralStore, StoreStats};
pub use types::{PayloadLimit, Port};
