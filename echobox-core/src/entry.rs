// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;

/// A stored blob and its optional absolute expiry.
///
/// Entries are never mutated after creation; a key is only ever re-pointed
/// at a new entry or removed.
#[derive(Debug, Clone)]
pub struct Entry {
    value: Bytes,
    expire_at: Option<Instant>,
}

impl Entry {
    /// Create an entry that expires `ttl` after `now`. A zero TTL never expires.
    pub fn new(value: Bytes, ttl: Duration, now: Instant) -> Self {
        let expire_at = if ttl.is_zero() {
            None
        } else {
            now.checked_add(ttl)
        };
        Self { value, expire_at }
    }

    /// Stored value (cheap shared clone).
    pub fn payload(&self) -> Bytes {
        self.value.clone()
    }

    /// Live iff it never expires or `now` is strictly before its deadline.
    pub fn is_live_at(&self, now: Instant) -> bool {
        self.expire_at.map_or(true, |deadline| now < deadline)
    }
}
