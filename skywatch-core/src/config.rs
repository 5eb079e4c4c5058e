use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::source::{geocode, observations, open_meteo, swpc};

/// Top-level configuration, optionally loaded from a TOML file.
///
/// Every field has a sensible default, so the server runs without any
/// configuration at all. Example TOML:
///
/// ```toml
/// port = 3000
///
/// [sources]
/// observations = "https://www.ilmateenistus.ee/ilma_andmed/xml/observations.php"
///
/// [clouds]
/// fallback_without_station = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// TCP port the HTTP server binds to.
    pub port: u16,
    pub sources: SourceUrls,
    pub clouds: CloudPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            sources: SourceUrls::default(),
            clouds: CloudPolicy::default(),
        }
    }
}

/// Upstream endpoint URLs. Overridable so tests (and deployments behind
/// proxies) can point the clients elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceUrls {
    /// Ground-observation XML feed (single fixed URL, no parameters).
    pub observations: String,
    /// Open-Meteo forecast endpoint (current + hourly variables).
    pub forecast: String,
    /// Open-Meteo geocoding search endpoint.
    pub geocode: String,
    /// NOAA SWPC planetary K-index table.
    pub kp: String,
    /// NOAA SWPC OVATION aurora grid.
    pub ovation: String,
}

impl Default for SourceUrls {
    fn default() -> Self {
        Self {
            observations: observations::OBSERVATIONS_URL.to_string(),
            forecast: open_meteo::FORECAST_URL.to_string(),
            geocode: geocode::GEOCODE_URL.to_string(),
            kp: swpc::KP_URL.to_string(),
            ovation: swpc::OVATION_URL.to_string(),
        }
    }
}

/// Policy knobs for the clouds-from-observations resolver.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CloudPolicy {
    /// Whether a feed with zero usable stations still consults the
    /// secondary forecast provider. Off by default: an empty feed yields an
    /// explicit "no stations" note rather than a substituted value.
    pub fallback_without_station: bool,
}

impl Config {
    /// Load config from the given path, or return defaults when no path is
    /// given or the file does not exist yet.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }
}
