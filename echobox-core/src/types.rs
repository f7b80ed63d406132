// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time.

use std::fmt;

use crate::error::HardValidationError;

const MIB: u64 = 1024 * 1024;
/// Smallest accepted upload cap: 1 MiB
const MIN_PAYLOAD_LIMIT: u64 = MIB;
/// Largest accepted upload cap: 1 GiB
const MAX_PAYLOAD_LIMIT: u64 = 1024 * MIB;

/// Validated network port.
/// Must be in range 1-65535 (0 is reserved).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Port(u16);

impl Port {
    /// Create a new Port with validation.
    pub fn new(port: u16) -> Result<Self, HardValidationError> {
        if port == 0 {
            return Err(HardValidationError::InvalidPort {
                port,
                reason: "Port 0 is reserved and cannot be used".to_string(),
            });
        }
        Ok(Self(port))
    }

    /// Get the inner port value.
    pub fn value(&self) -> u16 {
        self.0
    }
}

impl Default for Port {
    fn default() -> Self {
        Self(8000)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum accepted size of an uploaded blob, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadLimit(u64);

impl PayloadLimit {
    /// Create a new PayloadLimit with bounds validation.
    pub fn new(bytes: u64) -> Result<Self, HardValidationError> {
        if !(MIN_PAYLOAD_LIMIT..=MAX_PAYLOAD_LIMIT).contains(&bytes) {
            return Err(HardValidationError::PayloadLimitOutOfBounds {
                limit_bytes: bytes,
                min: MIN_PAYLOAD_LIMIT,
                max: MAX_PAYLOAD_LIMIT,
            });
        }
        Ok(Self(bytes))
    }

    /// Create from mebibytes for convenience.
    pub fn from_mb(mb: u64) -> Result<Self, HardValidationError> {
        Self::new(mb.saturating_mul(MIB))
    }

    /// Get the limit in bytes.
    pub fn bytes(&self) -> u64 {
        self.0
    }

    /// Get the limit in mebibytes.
    pub fn megabytes(&self) -> u64 {
        self.0 / MIB
    }
}

impl Default for PayloadLimit {
    fn default() -> Self {
        Self(30 * MIB)
    }
}

impl fmt::Display for PayloadLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}MB", self.megabytes())
    }
}
