// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for echobox.
//!
//! Explicit enum error types only. No `Box<dyn Error>`, no `anyhow::Result`.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the echobox library.
#[derive(Debug, Error)]
pub enum EchoError {
    // =========================================================================
    // Configuration Errors - Fail-Fast on Invalid Config
    // =========================================================================
    #[error("Hard validation error: {0}")]
    HardValidation(#[from] HardValidationError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors stop the server before it binds a socket.
#[derive(Debug, Error)]
pub enum HardValidationError {
    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Payload limit out of bounds: {limit_bytes} bytes (min: {min}, max: {max})")]
    PayloadLimitOutOfBounds {
        limit_bytes: u64,
        min: u64,
        max: u64,
    },

    #[error("Invalid port: {port} - {reason}")]
    InvalidPort { port: u16, reason: String },
}

/// Errors raised by the ephemeral store.
///
/// `KeyExhausted` is the only one: the keyspace is saturated relative to the
/// TTL, and the caller decides whether to widen it or shorten the TTL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("No free key after {attempts} attempts (key length {key_length})")]
    KeyExhausted { attempts: usize, key_length: usize },
}

/// Result type alias using EchoError.
pub type EchoResult<T> = Result<T, EchoError>;
