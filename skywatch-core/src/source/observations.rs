//! Client for the Estonian Environment Agency ground-observation feed.
//!
//! The feed is a single fixed-URL XML document: an `<observations>` root
//! carrying a feed-wide epoch timestamp and one `<station>` element per
//! reporting station. Terms of use require crediting the agency and linking
//! to ilmateenistus.ee, hence the source label below.

use reqwest::Client;
use xmltree::{Element, XMLNode};

use crate::{
    error::SourceError,
    model::{ObservationFeed, StationRecord},
};

pub const OBSERVATIONS_URL: &str = "https://www.ilmateenistus.ee/ilma_andmed/xml/observations.php";

/// Attribution string used as the base of the source-label chain.
pub const SOURCE_LABEL: &str = "Ilmateenistus (Keskkonnaagentuur)";

const SOURCE: &str = "Ilmateenistus";

#[derive(Debug, Clone)]
pub struct ObservationsClient {
    http: Client,
    url: String,
}

impl ObservationsClient {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }

    /// Fetch and decode the full observation document. Transport failures
    /// and non-success statuses are fatal for the calling request.
    pub async fn fetch(&self) -> Result<ObservationFeed, SourceError> {
        let res = self.http.get(&self.url).send().await?;

        let status = res.status();
        if !status.is_success() {
            return Err(SourceError::UpstreamStatus {
                provider: SOURCE,
                status,
            });
        }

        let body = res.text().await?;
        let feed = parse_observations(&body)?;
        tracing::debug!(stations = feed.stations.len(), "decoded observation feed");
        Ok(feed)
    }
}

/// Decode the observation XML into a normalized station sequence.
///
/// A document with one `<station>` and one with many are handled
/// identically; a malformed station only loses its own fields. The only
/// fatal condition is failing to locate the `<observations>` collection.
pub fn parse_observations(xml: &str) -> Result<ObservationFeed, SourceError> {
    let root = Element::parse(xml.as_bytes())
        .map_err(|e| SourceError::document(SOURCE, e.to_string()))?;

    if root.name != "observations" {
        return Err(SourceError::document(
            SOURCE,
            format!("expected <observations> root, found <{}>", root.name),
        ));
    }

    // The feed carries the timestamp as a root attribute; tolerate a child
    // element as well.
    let timestamp = root
        .attributes
        .get("timestamp")
        .cloned()
        .or_else(|| child_text(&root, "timestamp"))
        .and_then(|s| s.trim().parse::<i64>().ok());

    let stations = root
        .children
        .iter()
        .filter_map(XMLNode::as_element)
        .filter(|el| el.name == "station")
        .map(station_record)
        .collect();

    Ok(ObservationFeed {
        stations,
        timestamp,
    })
}

fn station_record(el: &Element) -> StationRecord {
    StationRecord {
        name: child_text(el, "name"),
        latitude: child_f64(el, "latitude"),
        longitude: child_f64(el, "longitude"),
        cloudiness: child_text(el, "cloudiness").and_then(|s| s.parse::<u8>().ok()),
        phenomenon: child_text(el, "phenomenon"),
    }
}

/// Trimmed text content of a child element; empty or absent becomes `None`.
fn child_text(el: &Element, name: &str) -> Option<String> {
    let text = el.get_child(name)?.get_text()?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Numeric child content, distinguishing absent and unparseable from valid.
fn child_f64(el: &Element, name: &str) -> Option<f64> {
    child_text(el, name)?
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
