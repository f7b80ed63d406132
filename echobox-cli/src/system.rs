// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Process and runtime snapshot served by `/sysinfo`.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sysinfo::System;

use echobox_core::StoreStats;

const UNITS: [&str; 4] = ["b", "kb", "mb", "gb"];

/// Compiler that built this binary, e.g. `rustc 1.83.0 (90b35a623 2024-11-26)`.
pub const RUSTC_VERSION: &str = env!("ECHOBOX_RUSTC_VERSION");

#[derive(Debug, Serialize)]
pub struct SystemReport {
    pub version: &'static str,
    pub rustc_version: &'static str,
    pub start_time: DateTime<Utc>,
    pub uptime_secs: i64,
    pub runtime: RuntimeReport,
    pub memory: MemoryReport,
    pub store: StoreStats,
}

#[derive(Debug, Serialize)]
pub struct RuntimeReport {
    pub workers: usize,
    pub alive_tasks: usize,
}

#[derive(Debug, Serialize)]
pub struct MemoryReport {
    pub resident: String,
    pub virtual_size: String,
}

impl SystemReport {
    /// Collect a snapshot. Must run inside the Tokio runtime.
    pub fn collect(start_time: DateTime<Utc>, store: StoreStats) -> Self {
        let metrics = tokio::runtime::Handle::current().metrics();
        let (resident, virtual_size) = process_memory().unwrap_or_default();

        Self {
            version: env!("CARGO_PKG_VERSION"),
            rustc_version: RUSTC_VERSION,
            start_time,
            uptime_secs: (Utc::now() - start_time).num_seconds(),
            runtime: RuntimeReport {
                workers: metrics.num_workers(),
                alive_tasks: metrics.num_alive_tasks(),
            },
            memory: MemoryReport {
                resident: format_mem_size(resident),
                virtual_size: format_mem_size(virtual_size),
            },
            store,
        }
    }
}

/// Resident and virtual memory of this process, in bytes.
fn process_memory() -> Option<(u64, u64)> {
    let pid = sysinfo::get_current_pid().ok()?;
    let mut sys = System::new();
    sys.refresh_process(pid);
    sys.process(pid)
        .map(|process| (process.memory(), process.virtual_memory()))
}

/// Human-readable size with two decimals, in 1024 steps capped at gigabytes.
pub fn format_mem_size(size: u64) -> String {
    let mut value = size as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mem_size() {
        assert_eq!(format_mem_size(100), "100.00 b");
        assert_eq!(format_mem_size(1024), "1.00 kb");
        assert_eq!(format_mem_size(1024 * 1024), "1.00 mb");
        assert_eq!(format_mem_size(1024 * 1024 + 1), "1.00 mb");
        assert_eq!(format_mem_size(1024 * 1024 * 1024), "1.00 gb");
        assert_eq!(format_mem_size(1024 * 1024 * 1024 + 100), "1.00 gb");
        assert_eq!(format_mem_size(1024 * 1024 * 1024 * 1024 + 1), "1024.00 gb");
        assert_eq!(format_mem_size(1025 * 1024 * 1024 * 1024), "1025.00 gb");
    }

    #[tokio::test]
    async fn test_collect_report() {
        let started = Utc::now();
        let report = SystemReport::collect(
            started,
            StoreStats {
                entries: 3,
                swept_total: 1,
            },
        );

        assert_eq!(report.version, env!("CARGO_PKG_VERSION"));
        assert_eq!(report.rustc_version, RUSTC_VERSION);
        assert!(report.uptime_secs >= 0);
        assert!(report.runtime.workers >= 1);
        assert_eq!(report.store.entries, 3);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["memory"]["resident"].as_str().unwrap().ends_with('b'));
    }
}
