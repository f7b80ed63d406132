// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! GeoLite2-City lookups.
//!
//! The database is memory-loaded once at startup and shared by all requests.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use maxminddb::{geoip2, MaxMindDBError, Reader};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeoIpError {
    #[error("ip parse failed: {0}")]
    InvalidAddress(String),

    #[error("GeoIP database not loaded")]
    DatabaseUnavailable,

    #[error("Failed to open GeoIP database {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: MaxMindDBError,
    },

    #[error("GeoIP lookup failed: {0}")]
    Lookup(#[from] MaxMindDBError),
}

impl GeoIpError {
    /// Short message safe to return to HTTP clients.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "ip parse failed",
            Self::DatabaseUnavailable | Self::Open { .. } => "geoip db read failed",
            Self::Lookup(_) => "geoip record query failed.",
        }
    }
}

/// Location details for one address, localised to a single language.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRecord {
    pub city: String,
    pub subdivision: Option<String>,
    pub country: String,
    pub continent: String,
    pub iso_code: String,
    pub time_zone: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl GeoRecord {
    /// One `Label: value` line per field.
    pub fn render(&self) -> String {
        let mut out = format!("City: {}\n", self.city);
        if let Some(subdivision) = &self.subdivision {
            out.push_str(&format!("Subdivisions: {}\n", subdivision));
        }
        out.push_str(&format!(
            "Country: {}\nContinent: {}\nISO country code: {}\nTime zone: {}\nCoordinates: {}, {}\n",
            self.country,
            self.continent,
            self.iso_code,
            self.time_zone,
            self.latitude.unwrap_or_default(),
            self.longitude.unwrap_or_default()
        ));
        out
    }
}

pub struct GeoIpDatabase {
    reader: Reader<Vec<u8>>,
}

impl GeoIpDatabase {
    pub fn open(path: &Path) -> Result<Self, GeoIpError> {
        let reader = Reader::open_readfile(path).map_err(|source| GeoIpError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), "Loaded GeoIP database");
        Ok(Self { reader })
    }

    pub fn lookup(&self, ip: IpAddr, lang: &str) -> Result<GeoRecord, GeoIpError> {
        let city: geoip2::City = self.reader.lookup(ip)?;

        Ok(GeoRecord {
            city: localized(city.city.as_ref().and_then(|c| c.names.as_ref()), lang),
            subdivision: city
                .subdivisions
                .as_ref()
                .and_then(|subdivisions| subdivisions.first())
                .map(|s| localized(s.names.as_ref(), lang)),
            country: localized(city.country.as_ref().and_then(|c| c.names.as_ref()), lang),
            continent: localized(city.continent.as_ref().and_then(|c| c.names.as_ref()), lang),
            iso_code: city
                .country
                .as_ref()
                .and_then(|c| c.iso_code)
                .unwrap_or_default()
                .to_string(),
            time_zone: city
                .location
                .as_ref()
                .and_then(|l| l.time_zone)
                .unwrap_or_default()
                .to_string(),
            latitude: city.location.as_ref().and_then(|l| l.latitude),
            longitude: city.location.as_ref().and_then(|l| l.longitude),
        })
    }
}

/// Parse `addr` and look it up, treating a missing database as an error.
pub fn query(
    db: Option<&GeoIpDatabase>,
    addr: &str,
    lang: &str,
) -> Result<GeoRecord, GeoIpError> {
    let ip: IpAddr = addr
        .trim()
        .parse()
        .map_err(|_| GeoIpError::InvalidAddress(addr.to_string()))?;
    let db = db.ok_or(GeoIpError::DatabaseUnavailable)?;
    db.lookup(ip, lang)
}

fn localized(names: Option<&BTreeMap<&str, &str>>, lang: &str) -> String {
    names
        .and_then(|names| names.get(lang))
        .map(|name| name.to_string())
        .unwrap_or_default()
}
