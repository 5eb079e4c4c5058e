//! Client for the Open-Meteo forecast API.
//!
//! Serves the present-condition passthrough endpoints (cloud cover,
//! temperature, precipitation), the hourly outlook, and doubles as the
//! secondary cloud-cover provider behind [`CloudCoverSource`].

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{
    error::SourceError,
    model::Coordinate,
    source::{CloudCoverSource, CurrentCloudCover},
};

pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

pub const SOURCE_LABEL: &str = "Open-Meteo";

const SOURCE: &str = "Open-Meteo";

/// Forecast times are requested in the dashboard's local timezone, matching
/// what the landing page renders.
const TIMEZONE: &str = "Europe/Tallinn";

const HOURLY_VARIABLES: &str =
    "cloud_cover,cloud_cover_low,cloud_cover_mid,cloud_cover_high,temperature_2m,precipitation";

/// A single current-condition value with the provider's timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CurrentReading {
    pub time: Option<String>,
    pub value: Option<f64>,
}

/// One hour of the cloud outlook, serialized in the wire shape the
/// dashboard consumes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OutlookHour {
    pub time: String,
    #[serde(rename = "cloudCoverPercent")]
    pub cloud_cover_percent: Option<f64>,
    #[serde(rename = "cloudLowPercent")]
    pub cloud_low_percent: Option<f64>,
    #[serde(rename = "cloudMidPercent")]
    pub cloud_mid_percent: Option<f64>,
    #[serde(rename = "cloudHighPercent")]
    pub cloud_high_percent: Option<f64>,
    #[serde(rename = "temperatureC")]
    pub temperature_c: Option<f64>,
    #[serde(rename = "precipitationMm")]
    pub precipitation_mm: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ForecastClient {
    http: Client,
    base_url: String,
}

impl ForecastClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    pub async fn current_temperature(
        &self,
        coord: Coordinate,
    ) -> Result<CurrentReading, SourceError> {
        let current = self.fetch_current(coord, "temperature_2m").await?;
        Ok(CurrentReading {
            time: current.time,
            value: current.temperature_2m,
        })
    }

    pub async fn current_precipitation(
        &self,
        coord: Coordinate,
    ) -> Result<CurrentReading, SourceError> {
        let current = self.fetch_current(coord, "precipitation").await?;
        Ok(CurrentReading {
            time: current.time,
            value: current.precipitation,
        })
    }

    /// Hourly cloud/temperature/precipitation outlook, starting at the hour
    /// nearest to now and spanning `hours` entries (two forecast days are
    /// requested, so anything up to 48 is available).
    pub async fn hourly_outlook(
        &self,
        coord: Coordinate,
        hours: usize,
    ) -> Result<Vec<OutlookHour>, SourceError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", coord.lat.to_string()),
                ("longitude", coord.lon.to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("forecast_days", "2".to_string()),
                ("timezone", TIMEZONE.to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(SourceError::UpstreamStatus {
                provider: SOURCE,
                status,
            });
        }

        let body = res.text().await?;
        let doc: OmHourlyDoc = serde_json::from_str(&body)
            .map_err(|e| SourceError::document(SOURCE, e.to_string()))?;

        Ok(build_outlook(&doc, hours, Utc::now()))
    }

    async fn fetch_current(
        &self,
        coord: Coordinate,
        variable: &str,
    ) -> Result<OmCurrent, SourceError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", coord.lat.to_string()),
                ("longitude", coord.lon.to_string()),
                ("current", variable.to_string()),
                ("timezone", TIMEZONE.to_string()),
            ])
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(SourceError::UpstreamStatus {
                provider: SOURCE,
                status,
            });
        }

        let body = res.text().await?;
        let doc: OmCurrentDoc = serde_json::from_str(&body)
            .map_err(|e| SourceError::document(SOURCE, e.to_string()))?;

        Ok(doc.current.unwrap_or_default())
    }
}

#[async_trait]
impl CloudCoverSource for ForecastClient {
    async fn current_cloud_cover(
        &self,
        coord: Coordinate,
    ) -> Result<CurrentCloudCover, SourceError> {
        let current = self.fetch_current(coord, "cloud_cover").await?;
        Ok(CurrentCloudCover {
            time: current.time,
            percent: current.cloud_cover,
        })
    }
}

/// Select the window of `hours` entries starting at the hour closest to
/// `now`. The provider reports local times plus a UTC offset, so `now` is
/// shifted into provider-local naive time before comparison.
fn build_outlook(doc: &OmHourlyDoc, hours: usize, now: chrono::DateTime<Utc>) -> Vec<OutlookHour> {
    let hourly = &doc.hourly;
    let offset = Duration::seconds(doc.utc_offset_seconds.unwrap_or(0));
    let target = (now + offset).naive_utc();

    let mut start = 0usize;
    let mut best: Option<chrono::Duration> = None;
    for (i, t) in hourly.time.iter().enumerate() {
        let Ok(parsed) = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M") else {
            continue;
        };
        let diff = (parsed - target).abs();
        if best.is_none_or(|b| diff < b) {
            best = Some(diff);
            start = i;
        }
    }

    let mut items = Vec::new();
    for j in start..hourly.time.len().min(start + hours) {
        items.push(OutlookHour {
            time: hourly.time[j].clone(),
            cloud_cover_percent: series_at(&hourly.cloud_cover, j),
            cloud_low_percent: series_at(&hourly.cloud_cover_low, j),
            cloud_mid_percent: series_at(&hourly.cloud_cover_mid, j),
            cloud_high_percent: series_at(&hourly.cloud_cover_high, j),
            temperature_c: series_at(&hourly.temperature_2m, j),
            precipitation_mm: series_at(&hourly.precipitation, j),
        });
    }
    items
}

/// Value arrays may run shorter than the time axis; missing entries are null.
fn series_at(series: &[Option<f64>], idx: usize) -> Option<f64> {
    series.get(idx).copied().flatten()
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OmCurrentDoc {
    current: Option<OmCurrent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OmCurrent {
    time: Option<String>,
    cloud_cover: Option<f64>,
    temperature_2m: Option<f64>,
    precipitation: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OmHourlyDoc {
    utc_offset_seconds: Option<i64>,
    hourly: OmHourly,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OmHourly {
    time: Vec<String>,
    cloud_cover: Vec<Option<f64>>,
    cloud_cover_low: Vec<Option<f64>>,
    cloud_cover_mid: Vec<Option<f64>>,
    cloud_cover_high: Vec<Option<f64>>,
    temperature_2m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
}
