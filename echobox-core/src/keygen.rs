// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Random key generation for the ephemeral store.
//!
//! Keys are sampled uniformly and independently from a fixed ASCII alphabet.
//! Randomness comes from `rand::thread_rng`, which is seeded once per thread
//! from the OS and is never re-seeded per call.

use rand::Rng;

use crate::error::HardValidationError;

/// Default key alphabet: lowercase letters, digits and underscore.
pub const DEFAULT_ALPHABET: &str = "abcdefghijklmnopqrstuvwxyz0123456789_";

/// Source of candidate keys for [`EphemeralStore::put`](crate::EphemeralStore::put).
pub trait KeySource: Send + Sync {
    /// Produce a candidate key of exactly `length` characters.
    fn generate(&self, length: usize) -> String;
}

/// Uniform random keys over a validated alphabet.
#[derive(Debug, Clone)]
pub struct RandomKeys {
    alphabet: Vec<u8>,
}

impl RandomKeys {
    /// Create a generator over `alphabet`.
    ///
    /// The alphabet must be non-empty printable ASCII without duplicates, so
    /// that every symbol is equally likely and keys stay URL-safe.
    pub fn new(alphabet: &str) -> Result<Self, HardValidationError> {
        let invalid = |reason: &str| HardValidationError::InvalidFieldValue {
            field: "alphabet",
            value: alphabet.to_string(),
            reason: reason.to_string(),
        };

        if alphabet.is_empty() {
            return Err(invalid("Alphabet cannot be empty"));
        }
        if !alphabet.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(invalid("Alphabet must be printable ASCII"));
        }

        let mut seen = [false; 128];
        for b in alphabet.bytes() {
            if std::mem::replace(&mut seen[b as usize], true) {
                return Err(invalid("Alphabet contains duplicate symbols"));
            }
        }

        Ok(Self {
            alphabet: alphabet.as_bytes().to_vec(),
        })
    }

    /// Whether every byte of `key` belongs to the alphabet.
    pub fn accepts(&self, key: &str) -> bool {
        key.bytes().all(|b| self.alphabet.contains(&b))
    }
}

impl Default for RandomKeys {
    fn default() -> Self {
        Self {
            alphabet: DEFAULT_ALPHABET.as_bytes().to_vec(),
        }
    }
}

impl KeySource for RandomKeys {
    fn generate(&self, length: usize) -> String {
        let mut rng = rand::thread_rng();
        (0..length)
            .map(|_| char::from(self.alphabet[rng.gen_range(0..self.alphabet.len())]))
            .collect()
    }
}
