// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec, register_int_gauge, Encoder, IntCounterVec, IntGauge, TextEncoder,
};

use echobox_core::StoreStats;

lazy_static! {
    pub static ref STORE_WRITES: IntCounterVec = register_int_counter_vec!(
        "echobox_store_writes_total",
        "Uploads to the ephemeral store by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref STORE_READS: IntCounterVec = register_int_counter_vec!(
        "echobox_store_reads_total",
        "Reads from the ephemeral store by outcome",
        &["outcome"]
    )
    .unwrap();
    pub static ref STORE_ENTRIES: IntGauge = register_int_gauge!(
        "echobox_store_entries",
        "Entries physically held by the store, including expired ones not yet swept"
    )
    .unwrap();
    pub static ref STORE_SWEPT: IntGauge = register_int_gauge!(
        "echobox_store_swept_entries",
        "Entries removed by the background sweeper since startup"
    )
    .unwrap();
}

/// Force registration so every series shows up on the first scrape.
pub fn init() {
    lazy_static::initialize(&STORE_WRITES);
    lazy_static::initialize(&STORE_READS);
    lazy_static::initialize(&STORE_ENTRIES);
    lazy_static::initialize(&STORE_SWEPT);
}

/// Render all registered metrics in the Prometheus text format.
pub fn render(stats: StoreStats) -> String {
    STORE_ENTRIES.set(i64::try_from(stats.entries).unwrap_or(i64::MAX));
    STORE_SWEPT.set(i64::try_from(stats.swept_total).unwrap_or(i64::MAX));

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }

    String::from_utf8(buffer).unwrap_or_else(|_| String::from("Encoding error"))
}
