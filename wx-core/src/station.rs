use std::sync::LazyLock;

use regex::Regex;

use crate::{
    error::{DriverError, Result},
    model::Coordinates,
};

static GEO_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{7,8}$").expect("valid regex"));

static LAT_LON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)\s*$").expect("valid regex")
});

/// Which station forms a provider can resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationKinds {
    pub geo_id: bool,
    pub lat_lon: bool,
    pub code: bool,
}

impl StationKinds {
    /// Google, NWS and Open-Meteo. None of them resolves a geoname id.
    pub const LAT_LON_ONLY: StationKinds =
        StationKinds { geo_id: false, lat_lon: true, code: false };
    /// BBC and OWM Free, which both resolve a 7-8 digit geoname id themselves
    /// (the BBC locator and OWM's `id=` parameter).
    pub const ANY: StationKinds = StationKinds { geo_id: true, lat_lon: true, code: true };
}

/// A user supplied location, already validated.
#[derive(Debug, Clone, PartialEq)]
pub enum StationSpec {
    /// 7-8 digit geoname style id.
    GeoId(u32),
    LatLon(Coordinates),
    /// Opaque provider location code.
    Code(String),
}

impl StationSpec {
    /// Parse a station string for a provider accepting `kinds`.
    ///
    /// The numeric id pattern is tried before the `lat,lon` pattern and the
    /// first match wins. A `lat,lon` pair out of range is an error even if
    /// the provider also takes opaque codes.
    pub fn parse(input: &str, kinds: StationKinds) -> Result<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DriverError::StationMissing);
        }

        if GEO_ID.is_match(trimmed) && (kinds.geo_id || kinds.code) {
            return match trimmed.parse::<u32>() {
                Ok(id) if kinds.geo_id => Ok(StationSpec::GeoId(id)),
                _ => Ok(StationSpec::Code(trimmed.to_string())),
            };
        }

        if let Some(caps) = LAT_LON.captures(trimmed) {
            if !kinds.lat_lon {
                return Err(invalid(input, "this provider expects a location code"));
            }
            let lat = caps[1]
                .parse::<f64>()
                .map_err(|_| invalid(input, "latitude is not a number"))?;
            let lon = caps[2]
                .parse::<f64>()
                .map_err(|_| invalid(input, "longitude is not a number"))?;
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                return Err(invalid(input, "latitude or longitude out of range"));
            }
            return Ok(StationSpec::LatLon(Coordinates { lat, lon }));
        }

        if kinds.code && !trimmed.chars().any(char::is_whitespace) {
            return Ok(StationSpec::Code(trimmed.to_string()));
        }

        let expected = if kinds.code {
            "expected a location code or latitude,longitude"
        } else {
            "expected latitude,longitude"
        };
        Err(invalid(input, expected))
    }

    pub fn coordinates(&self) -> Option<Coordinates> {
        match self {
            StationSpec::LatLon(c) => Some(*c),
            _ => None,
        }
    }

    /// The provider location id for id-style specs.
    pub fn location_id(&self) -> Option<String> {
        match self {
            StationSpec::GeoId(id) => Some(id.to_string()),
            StationSpec::Code(code) => Some(code.clone()),
            StationSpec::LatLon(_) => None,
        }
    }
}

fn invalid(station: &str, reason: &str) -> DriverError {
    DriverError::InvalidStation { station: station.to_string(), reason: reason.to_string() }
}
