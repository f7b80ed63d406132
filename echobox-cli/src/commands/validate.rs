// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `echobox validate` command - Validate configuration file.

use echobox_core::ConfigLoader;

pub async fn execute(file: &str) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(file = %file, "Validating configuration");

    match ConfigLoader::load_file(file) {
        Ok(config) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Server Settings:");
            println!(
                "  Listen Address:     {}:{}",
                config.server.bind, config.server.port
            );
            println!("  Payload Limit:      {}", config.server.payload_limit);
            println!("  Public Scheme:      {}", config.server.public_scheme);
            println!();
            println!("Store Settings:");
            println!("  Key Length:         {}", config.store.key_length);
            println!("  Key Attempts:       {}", config.store.max_attempts);
            println!(
                "  Entry TTL:          {}s",
                config.store.default_ttl.as_secs()
            );
            println!(
                "  Sweep Interval:     {}s",
                config.store.sweep_interval.as_secs()
            );
            println!();
            println!("GeoIP Settings:");
            println!(
                "  Database:           {}",
                config.geoip.database_path.display()
            );
            println!("  Default Language:   {}", config.geoip.default_lang);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed:");
            eprintln!("  {}", e);
            std::process::exit(1);
        }
    }
}
