// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ephemeral in-memory key-value store with TTL expiry.
//!
//! Values are written under short random keys and disappear once their TTL
//! passes. Expiry is enforced lazily on every read, and a background sweeper
//! physically removes expired entries so memory is bounded by the live set
//! plus one sweep interval of garbage.
//!
//! The map is a `DashMap`: reads take a shard read lock, writes and lazy
//! evictions take the shard write lock, and the sweeper uses `retain`, which
//! visits one shard at a time under its write lock.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use bytes::Bytes;
use dashmap::mapref::entry::Entry as Slot;
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::StoreConfig;
use crate::entry::Entry;
use crate::error::{HardValidationError, StoreError};
use crate::keygen::{KeySource, RandomKeys};

/// Point-in-time store counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Entries physically present, including expired ones not yet swept.
    pub entries: usize,
    /// Entries removed by sweeps since the store was created.
    pub swept_total: u64,
}

struct StoreInner {
    entries: DashMap<String, Entry>,
    config: StoreConfig,
    keys: Box<dyn KeySource>,
    /// Validates keys arriving from clients against the configured alphabet.
    format: RandomKeys,
    swept_total: AtomicU64,
    shutdown_tx: watch::Sender<bool>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl StoreInner {
    fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut removed = 0usize;

        self.entries.retain(|_, entry| {
            if entry.is_live_at(now) {
                true
            } else {
                removed += 1;
                false
            }
        });

        if removed > 0 {
            self.swept_total.fetch_add(removed as u64, Ordering::Relaxed);
            tracing::debug!(
                removed = removed,
                remaining = self.entries.len(),
                "Swept expired entries"
            );
        }

        removed
    }
}

/// Thread-safe TTL store handing out random keys.
///
/// Cloning is cheap and every clone shares the same map. The background
/// sweeper only runs after [`start`](Self::start) or
/// [`start_sweeper`](Self::start_sweeper); it stops on
/// [`shutdown`](Self::shutdown) or when the last clone is dropped.
#[derive(Clone)]
pub struct EphemeralStore {
    inner: Arc<StoreInner>,
}

impl EphemeralStore {
    /// Create a store with random keys and no background sweeper.
    pub fn new(config: StoreConfig) -> Result<Self, HardValidationError> {
        let keys = RandomKeys::new(&config.alphabet)?;
        Self::with_key_source(config, keys)
    }

    /// Create a store drawing candidate keys from `keys`.
    pub fn with_key_source(
        config: StoreConfig,
        keys: impl KeySource + 'static,
    ) -> Result<Self, HardValidationError> {
        config.validate()?;
        let format = RandomKeys::new(&config.alphabet)?;

        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(StoreInner {
                entries: DashMap::new(),
                config,
                keys: Box::new(keys),
                format,
                swept_total: AtomicU64::new(0),
                shutdown_tx,
                sweeper: Mutex::new(None),
            }),
        })
    }

    /// Create a store and start its background sweeper.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start(config: StoreConfig) -> Result<Self, HardValidationError> {
        let store = Self::new(config)?;
        store.start_sweeper();
        Ok(store)
    }

    /// Spawn the background sweeper. Does nothing if one is already running.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn start_sweeper(&self) {
        let mut sweeper = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if sweeper.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }

        // Clear a previous shutdown request before the new receiver subscribes
        self.inner.shutdown_tx.send_replace(false);
        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        let interval = self.inner.config.sweep_interval;

        tracing::info!(interval_ms = interval.as_millis() as u64, "Starting store sweeper");
        *sweeper = Some(tokio::spawn(sweep_loop(
            Arc::downgrade(&self.inner),
            interval,
            shutdown_rx,
        )));
    }

    /// Stop the background sweeper and wait for it to exit.
    pub async fn shutdown(&self) {
        self.inner.shutdown_tx.send_replace(true);

        let handle = self
            .inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Store sweeper did not exit cleanly");
            }
        }
    }

    /// Whether the background sweeper is currently running.
    pub fn is_sweeping(&self) -> bool {
        self.inner
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// True iff `key` holds an entry that has not expired. Never evicts.
    pub fn has(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_live_at(now))
    }

    /// Value stored under `key`, if it is still live.
    ///
    /// An expired entry found here is removed before returning `None`.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();

        {
            let entry = self.inner.entries.get(key)?;
            if entry.is_live_at(now) {
                return Some(entry.payload());
            }
        }

        // The read guard is gone; a concurrent `set` may have refreshed the
        // slot since, so only remove it if it is still expired.
        if self
            .inner
            .entries
            .remove_if(key, |_, entry| !entry.is_live_at(now))
            .is_some()
        {
            tracing::trace!(key = %key, "Evicted expired entry on read");
        }
        None
    }

    /// Insert or replace `key`. A zero `ttl` never expires.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Bytes>, ttl: Duration) {
        let entry = Entry::new(value.into(), ttl, Instant::now());
        self.inner.entries.insert(key.into(), entry);
    }

    /// Store `value` under a freshly generated key and return the key.
    ///
    /// Tries up to `max_attempts` candidates. A candidate is taken if no live
    /// entry holds it; the check and the insert happen under the same shard
    /// lock, so two concurrent writers can never both claim one key.
    pub fn put(&self, value: impl Into<Bytes>, ttl: Duration) -> Result<String, StoreError> {
        let value = value.into();
        let config = &self.inner.config;

        for attempt in 1..=config.max_attempts {
            let candidate = self.inner.keys.generate(config.key_length);
            let now = Instant::now();

            match self.inner.entries.entry(candidate) {
                Slot::Occupied(mut slot) => {
                    if slot.get().is_live_at(now) {
                        tracing::debug!(attempt = attempt, "Key collision, retrying");
                        continue;
                    }
                    let key = slot.key().clone();
                    slot.insert(Entry::new(value, ttl, now));
                    return Ok(key);
                }
                Slot::Vacant(slot) => {
                    let key = slot.key().clone();
                    slot.insert(Entry::new(value, ttl, now));
                    return Ok(key);
                }
            }
        }

        tracing::warn!(
            attempts = config.max_attempts,
            key_length = config.key_length,
            entries = self.inner.entries.len(),
            "Key space exhausted"
        );
        Err(StoreError::KeyExhausted {
            attempts: config.max_attempts,
            key_length: config.key_length,
        })
    }

    /// Remove `key` regardless of expiry. Returns whether anything was removed.
    pub fn remove(&self, key: &str) -> bool {
        self.inner.entries.remove(key).is_some()
    }

    /// Remove every expired entry now and return how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.inner.sweep_expired()
    }

    /// Number of entries physically present, expired or not.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            entries: self.inner.entries.len(),
            swept_total: self.inner.swept_total.load(Ordering::Relaxed),
        }
    }

    /// Whether `key` has the shape of a key this store hands out: the
    /// configured length, drawn from the configured alphabet.
    pub fn is_valid_key_format(&self, key: &str) -> bool {
        key.len() == self.inner.config.key_length && self.inner.format.accepts(key)
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.config.default_ttl
    }
}

impl fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralStore")
            .field("entries", &self.inner.entries.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Periodic sweep until shutdown is requested or the store is dropped.
async fn sweep_loop(
    inner: Weak<StoreInner>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    // First sweep one full interval after start, not immediately
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.sweep_expired();
            }
            changed = shutdown_rx.changed() => {
                // Err means every sender is gone, i.e. the store was dropped
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
        }
    }

    tracing::info!("Store sweeper stopped");
}
