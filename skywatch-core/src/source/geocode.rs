//! Client for the Open-Meteo geocoding search, locked to Estonian places
//! the way the dashboard uses it.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

pub const GEOCODE_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";

const SOURCE: &str = "Open-Meteo geocoding";

const RESULT_COUNT: &str = "10";
const LANGUAGE: &str = "et";
const COUNTRY: &str = "EE";

/// One geocoding hit, reduced to what the dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub admin1: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone)]
pub struct GeocodeClient {
    http: Client,
    base_url: String,
}

impl GeocodeClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Search places by name. An empty result set is a normal outcome.
    pub async fn search(&self, name: &str) -> Result<Vec<Place>, SourceError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("name", name),
                ("count", RESULT_COUNT),
                ("language", LANGUAGE),
                ("format", "json"),
                ("country", COUNTRY),
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
        let doc: GeocodeDoc = serde_json::from_str(&body)
            .map_err(|e| SourceError::document(SOURCE, e.to_string()))?;

        Ok(doc.results)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GeocodeDoc {
    results: Vec<Place>,
}
